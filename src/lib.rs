pub mod artifact;
pub mod assembler; // Record snapshot -> PDF
pub mod cancel;
pub mod capture; // Probe, camera session, frame capture
pub mod completion;
pub mod config;
pub mod controller; // Single writer of the record
pub mod error;
pub mod export;
pub mod record;
pub mod signature;

use tracing_subscriber::EnvFilter;

pub use artifact::{ImageArtifact, SignatureArtifact};
pub use assembler::{AssemblyError, AssemblyTask, DocumentAssembler, ExportArtifact, LayoutConfig, OverflowPolicy};
pub use capture::{CameraSession, CameraState, CaptureProvider, FrameCapturer, HardwareSlot};
pub use completion::{CompletionGate, CompletionReport, FieldTag};
pub use controller::{ControllerError, Notice, RetryAction, VisitController};
pub use error::{CaptureError, ValidationError};
pub use export::{DirectoryExportSink, ExportError, ExportSink};
pub use record::{PersonalData, PersonalField, RecordIntent, RecordStore};
pub use signature::{Point, SignaturePad};

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default
/// filter. Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
    }
}
