//! Camera capture: hardware probing, the session state machine, the
//! process-wide hardware slot and still-frame conversion.

pub mod device;
pub mod frame;
pub mod session;
pub mod slot;

#[cfg(test)]
pub(crate) mod fake;

pub use device::{
    probe, CaptureConfig, CaptureProvider, DeviceInfo, DeviceKind, FacingMode, FrameFormat,
    LiveStream, ProbeResult, ProviderFailure, RawFrame, StreamConstraints, StreamSettings,
};
pub use frame::{FrameCapturer, CAPTURE_JPEG_QUALITY};
pub use session::{CameraSession, CameraState, StreamHandle};
pub use slot::{ActiveCapture, HardwareSlot, SlotGuard};
