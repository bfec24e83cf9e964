//! Visit controller, the single writer of the record.
//!
//! The UI talks to one `VisitController`. It owns the record, the signature
//! pad, the camera session and the assembler, applies every change as a
//! `RecordIntent`, and turns failures into `Notice`s the UI can show with a
//! retry action. Nothing here panics on user input.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::assembler::{AssemblyError, AssemblyTask, DocumentAssembler, ExportArtifact, LayoutConfig};
use crate::cancel::CancelSignal;
use crate::capture::{CameraSession, CameraState, CaptureProvider, FacingMode, FrameCapturer, StreamHandle};
use crate::completion::{CompletionGate, CompletionReport, FieldTag};
use crate::error::{CaptureError, ValidationError};
use crate::export::{ExportError, ExportSink};
use crate::record::{PersonalData, RecordIntent, RecordStore};
use crate::signature::{Point, SignaturePad};

// ═══════════════════════════════════════════════════════════
// Errors and notices
// ═══════════════════════════════════════════════════════════

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("The camera is not streaming")]
    CameraNotOpen,

    #[error("Record is incomplete: {}", labels(.missing))]
    ExportBlocked { missing: BTreeSet<FieldTag> },
}

fn labels(missing: &BTreeSet<FieldTag>) -> String {
    missing
        .iter()
        .map(FieldTag::label)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Form sections the UI can navigate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Personal,
    Image,
    Signature,
}

impl From<FieldTag> for Section {
    fn from(tag: FieldTag) -> Self {
        match tag {
            FieldTag::Signature => Self::Signature,
            _ => Self::Personal,
        }
    }
}

/// What the UI should offer next to a notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "section", rename_all = "snake_case")]
pub enum RetryAction {
    None,
    RetryCamera,
    PickFile,
    RedrawSignature,
    GoToSection(Section),
    RetryExport,
}

/// User-facing message for a failed action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub message: String,
    pub retry: RetryAction,
}

impl Notice {
    fn new(message: impl Into<String>, retry: RetryAction) -> Self {
        Self {
            message: message.into(),
            retry,
        }
    }
}

impl ControllerError {
    pub fn notice(&self) -> Notice {
        match self {
            Self::Capture(e) => match e {
                CaptureError::PermissionDenied => Notice::new(
                    "Se ha denegado el acceso a la cámara. Permítelo en los ajustes o sube una imagen.",
                    RetryAction::RetryCamera,
                ),
                CaptureError::NoDevice => Notice::new(
                    "No se ha encontrado ninguna cámara. Puedes subir una imagen desde un archivo.",
                    RetryAction::PickFile,
                ),
                CaptureError::HardwareBusy => Notice::new(
                    "La cámara está siendo usada por otra aplicación.",
                    RetryAction::RetryCamera,
                ),
                CaptureError::Unsupported => Notice::new(
                    "Este dispositivo no permite usar la cámara. Puedes subir una imagen.",
                    RetryAction::PickFile,
                ),
                CaptureError::Device(_) | CaptureError::CaptureFailed(_) => Notice::new(
                    "No se ha podido obtener la imagen de la cámara. Inténtalo de nuevo.",
                    RetryAction::RetryCamera,
                ),
                CaptureError::Cancelled => Notice::new("Cámara cancelada.", RetryAction::None),
            },
            Self::Validation(e) => match e {
                ValidationError::InvalidType(_) => Notice::new(
                    "El archivo seleccionado no es una imagen.",
                    RetryAction::PickFile,
                ),
                ValidationError::ReadFailed(_) => Notice::new(
                    "No se ha podido leer la imagen.",
                    RetryAction::PickFile,
                ),
                ValidationError::EmptySignature => Notice::new(
                    "Dibuja la firma antes de guardarla.",
                    RetryAction::RedrawSignature,
                ),
                ValidationError::EncodeFailed(_) => Notice::new(
                    "No se ha podido guardar la firma. Inténtalo de nuevo.",
                    RetryAction::RedrawSignature,
                ),
            },
            Self::Assembly(AssemblyError::Cancelled) => {
                Notice::new("Exportación cancelada.", RetryAction::None)
            }
            Self::Assembly(_) => Notice::new(
                "No se ha podido generar el documento.",
                RetryAction::RetryExport,
            ),
            Self::Export(_) => Notice::new(
                "No se ha podido guardar el documento.",
                RetryAction::RetryExport,
            ),
            Self::CameraNotOpen => Notice::new(
                "Abre la cámara antes de capturar.",
                RetryAction::RetryCamera,
            ),
            Self::ExportBlocked { missing } => {
                let section = missing
                    .iter()
                    .copied()
                    .map(Section::from)
                    .min()
                    .unwrap_or(Section::Personal);
                Notice::new(
                    format!("Falta completar: {}", labels(missing)),
                    RetryAction::GoToSection(section),
                )
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Summary view
// ═══════════════════════════════════════════════════════════

/// Everything the summary screen shows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitSummary {
    pub personal: PersonalData,
    pub has_image: bool,
    pub has_signature: bool,
    /// Data URL for the photo thumbnail.
    pub image_preview: Option<String>,
    /// Sections with something left to do. `Image` is advisory only.
    pub pending_sections: Vec<Section>,
    pub completion: CompletionReport,
}

// ═══════════════════════════════════════════════════════════
// Controller
// ═══════════════════════════════════════════════════════════

pub struct VisitController {
    record: RecordStore,
    pad: SignaturePad,
    camera: CameraSession,
    capturer: FrameCapturer,
    assembler: DocumentAssembler,
}

impl VisitController {
    pub fn new(provider: Arc<dyn CaptureProvider>) -> Self {
        Self::with_parts(CameraSession::new(provider), LayoutConfig::default())
    }

    pub fn with_parts(camera: CameraSession, layout: LayoutConfig) -> Self {
        Self {
            record: RecordStore::new(),
            pad: SignaturePad::new(),
            camera,
            capturer: FrameCapturer::new(),
            assembler: DocumentAssembler::new(layout),
        }
    }

    pub fn record(&self) -> &RecordStore {
        &self.record
    }

    /// Independent copy of the record, safe to hand to a background task.
    pub fn snapshot(&self) -> RecordStore {
        self.record.clone()
    }

    pub fn dispatch(&mut self, intent: RecordIntent) {
        tracing::debug!(intent = intent.kind(), "Record intent");
        self.record = self.record.apply(intent);
    }

    pub fn completion(&self) -> CompletionReport {
        CompletionGate::is_complete(&self.record)
    }

    pub fn summary(&self) -> VisitSummary {
        let completion = self.completion();
        let mut pending: BTreeSet<Section> =
            completion.missing.iter().copied().map(Section::from).collect();
        if self.record.image().is_none() {
            pending.insert(Section::Image);
        }

        VisitSummary {
            personal: self.record.personal().clone(),
            has_image: self.record.image().is_some(),
            has_signature: self.record.signature().is_some(),
            image_preview: self.record.image().map(|i| i.to_data_url()),
            pending_sections: pending.into_iter().collect(),
            completion,
        }
    }

    // ── camera ──────────────────────────────────────────────

    pub fn camera_state(&self) -> &CameraState {
        self.camera.state()
    }

    /// True once the stream shows a frame. The capture button waits on this.
    pub fn camera_ready(&self) -> bool {
        self.camera.is_ready()
    }

    pub async fn open_camera(&mut self, facing: FacingMode) -> Result<StreamHandle, ControllerError> {
        self.open_camera_cancellable(facing, CancelSignal::never()).await
    }

    pub async fn open_camera_cancellable(
        &mut self,
        facing: FacingMode,
        cancel: CancelSignal,
    ) -> Result<StreamHandle, ControllerError> {
        Ok(self.camera.open_cancellable(facing, cancel).await?)
    }

    pub fn close_camera(&mut self) {
        self.camera.close();
    }

    /// Grab the current frame into the record and release the camera.
    /// On failure the camera stays open so the user can try again.
    pub fn capture_photo(&mut self) -> Result<(), ControllerError> {
        let handle = self.camera.handle().ok_or(ControllerError::CameraNotOpen)?;
        let artifact = self.capturer.capture_frame(handle)?;
        tracing::info!(fingerprint = %artifact.fingerprint(), "Photo captured");
        self.dispatch(RecordIntent::SetImage(artifact));
        self.camera.close();
        Ok(())
    }

    /// Use a picked file as the photo. A rejected file leaves the current
    /// photo in place.
    pub fn attach_file(&mut self, bytes: &[u8], declared_type: &str) -> Result<(), ControllerError> {
        let artifact = self.capturer.capture_from_file(bytes, declared_type)?;
        tracing::info!(fingerprint = %artifact.fingerprint(), "Photo attached from file");
        self.dispatch(RecordIntent::SetImage(artifact));
        Ok(())
    }

    // ── signature ───────────────────────────────────────────

    pub fn pad(&self) -> &SignaturePad {
        &self.pad
    }

    pub fn record_stroke(&mut self, points: &[Point]) {
        self.pad.record_stroke(points);
    }

    /// Wipe the drawing surface. A signature already saved to the record
    /// stays until the next commit or reset.
    pub fn clear_signature(&mut self) {
        self.pad.clear();
    }

    pub fn commit_signature(&mut self) -> Result<(), ControllerError> {
        let artifact = self.pad.commit()?;
        self.dispatch(RecordIntent::SetSignature(artifact));
        Ok(())
    }

    // ── export ──────────────────────────────────────────────

    /// Start assembling a snapshot of the record. Refused, without touching
    /// the assembler, while the record is incomplete.
    pub fn begin_export(&self) -> Result<AssemblyTask, ControllerError> {
        let report = self.completion();
        if !report.ok {
            tracing::info!(missing = report.missing.len(), "Export blocked by completion gate");
            return Err(ControllerError::ExportBlocked {
                missing: report.missing,
            });
        }
        Ok(AssemblyTask::spawn(self.assembler.clone(), self.snapshot())?)
    }

    /// Assemble and hand the document to `sink` in one step.
    pub async fn export_to(
        &self,
        sink: &dyn ExportSink,
    ) -> Result<(ExportArtifact, PathBuf), ControllerError> {
        let artifact = self.begin_export()?.join().await?;
        let path = sink.save(&artifact)?;
        Ok((artifact, path))
    }

    /// Start a new visit: camera released, pad cleared, record emptied.
    pub fn reset(&mut self) {
        self.camera.close();
        self.pad.clear();
        self.dispatch(RecordIntent::Reset);
        tracing::info!("Visit reset");
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Mutex;

    use super::*;
    use crate::assembler::tests::{ana, photo};
    use crate::capture::fake::FakeCaptureProvider;
    use crate::capture::{HardwareSlot, ProviderFailure};
    use crate::export::DirectoryExportSink;
    use crate::record::PersonalField;

    fn controller_with(provider: FakeCaptureProvider) -> (VisitController, Arc<FakeCaptureProvider>) {
        let provider = Arc::new(provider);
        let camera = CameraSession::with_slot(provider.clone(), Arc::new(HardwareSlot::new()));
        (
            VisitController::with_parts(camera, LayoutConfig::default()),
            provider,
        )
    }

    fn sign(controller: &mut VisitController) {
        controller.record_stroke(&[Point::new(10.0, 10.0), Point::new(200.0, 90.0)]);
        controller.commit_signature().unwrap();
    }

    fn png_bytes() -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(image::RgbImage::new(32, 24))
            .write_to(&mut cursor, image::ImageOutputFormat::Png)
            .unwrap();
        cursor.into_inner()
    }

    /// Sink that counts calls instead of touching disk.
    struct CountingSink(Mutex<usize>);

    impl ExportSink for CountingSink {
        fn save(&self, _artifact: &ExportArtifact) -> Result<PathBuf, ExportError> {
            *self.0.lock().unwrap() += 1;
            Ok(PathBuf::from("memory"))
        }
    }

    #[tokio::test]
    async fn full_visit_exports_document() {
        let (mut controller, provider) = controller_with(FakeCaptureProvider::with_camera());
        controller.dispatch(RecordIntent::ReplacePersonalData(ana()));

        controller.open_camera(FacingMode::Environment).await.unwrap();
        assert!(controller.camera_ready());
        controller.capture_photo().unwrap();
        assert_eq!(controller.camera_state(), &CameraState::Idle);
        assert_eq!(provider.live_streams(), 0);
        sign(&mut controller);

        let tmp = tempfile::tempdir().unwrap();
        let sink = DirectoryExportSink::new(tmp.path());
        let (artifact, path) = controller.export_to(&sink).await.unwrap();

        assert!(path.exists());
        assert!(artifact.warnings.is_empty());
        assert_eq!(artifact.manifest.embedded_assets().count(), 2);
    }

    #[tokio::test]
    async fn incomplete_record_never_reaches_assembler() {
        let (mut controller, _) = controller_with(FakeCaptureProvider::with_camera());
        controller.dispatch(RecordIntent::ReplacePersonalData(ana()));
        let sink = CountingSink(Mutex::new(0));

        let err = controller.export_to(&sink).await.unwrap_err();

        match &err {
            ControllerError::ExportBlocked { missing } => {
                assert_eq!(missing, &BTreeSet::from([FieldTag::Signature]));
            }
            other => panic!("expected ExportBlocked, got {other:?}"),
        }
        assert_eq!(*sink.0.lock().unwrap(), 0);
        let notice = err.notice();
        assert_eq!(notice.message, "Falta completar: Firma");
        assert_eq!(notice.retry, RetryAction::GoToSection(Section::Signature));
    }

    #[test]
    fn begin_export_refuses_empty_record() {
        let (controller, _) = controller_with(FakeCaptureProvider::with_camera());
        let err = controller.begin_export().err().unwrap();
        assert_eq!(
            err.notice().retry,
            RetryAction::GoToSection(Section::Personal)
        );
    }

    #[test]
    fn begin_export_without_runtime_is_an_error() {
        let (mut controller, _) = controller_with(FakeCaptureProvider::with_camera());
        controller.dispatch(RecordIntent::ReplacePersonalData(ana()));
        sign(&mut controller);

        let err = controller.begin_export().err().unwrap();
        assert!(matches!(
            err,
            ControllerError::Assembly(AssemblyError::Worker(_))
        ));
        assert_eq!(err.notice().retry, RetryAction::RetryExport);
    }

    #[test]
    fn signature_encode_failure_offers_redraw() {
        let err = ControllerError::from(ValidationError::EncodeFailed("disk full".into()));
        assert_eq!(err.to_string(), "Could not encode signature: disk full");
        let notice = err.notice();
        assert_eq!(notice.message, "No se ha podido guardar la firma. Inténtalo de nuevo.");
        assert_eq!(notice.retry, RetryAction::RedrawSignature);
    }

    #[tokio::test]
    async fn denied_camera_leaves_file_upload_usable() {
        let (mut controller, _) = controller_with(
            FakeCaptureProvider::with_camera().failing_with(ProviderFailure::NotAllowed),
        );

        let err = controller.open_camera(FacingMode::Environment).await.unwrap_err();
        assert!(matches!(err, ControllerError::Capture(CaptureError::PermissionDenied)));
        assert_eq!(controller.camera_state(), &CameraState::Denied);
        assert_eq!(err.notice().retry, RetryAction::RetryCamera);

        controller.attach_file(&png_bytes(), "image/png").unwrap();
        assert!(controller.record().image().is_some());
    }

    #[tokio::test]
    async fn no_camera_suggests_file_pick() {
        let (mut controller, _) = controller_with(FakeCaptureProvider::without_devices());
        let err = controller.open_camera(FacingMode::User).await.unwrap_err();
        assert_eq!(err.notice().retry, RetryAction::PickFile);
        assert_eq!(controller.camera_state(), &CameraState::Unavailable);
    }

    #[test]
    fn capture_without_camera_is_an_error() {
        let (mut controller, _) = controller_with(FakeCaptureProvider::with_camera());
        let err = controller.capture_photo().unwrap_err();
        assert!(matches!(err, ControllerError::CameraNotOpen));
        assert!(controller.record().image().is_none());
    }

    #[tokio::test]
    async fn failed_capture_keeps_camera_open() {
        let (mut controller, provider) =
            controller_with(FakeCaptureProvider::with_camera().without_frames());
        controller.open_camera(FacingMode::Environment).await.unwrap();
        assert!(!controller.camera_ready());

        let err = controller.capture_photo().unwrap_err();
        assert!(matches!(err, ControllerError::Capture(CaptureError::CaptureFailed(_))));
        assert_eq!(controller.camera_state(), &CameraState::Streaming);
        assert_eq!(provider.live_streams(), 1);
    }

    #[test]
    fn rejected_file_keeps_previous_photo() {
        let (mut controller, _) = controller_with(FakeCaptureProvider::with_camera());
        controller.attach_file(&png_bytes(), "image/png").unwrap();
        let before = controller.record().image().cloned();

        let err = controller.attach_file(b"%PDF-1.4", "application/pdf").unwrap_err();
        assert_eq!(err.notice().retry, RetryAction::PickFile);
        assert_eq!(controller.record().image().cloned(), before);
    }

    #[test]
    fn empty_signature_is_refused() {
        let (mut controller, _) = controller_with(FakeCaptureProvider::with_camera());
        let err = controller.commit_signature().unwrap_err();
        assert_eq!(err.notice().retry, RetryAction::RedrawSignature);
        assert!(controller.record().signature().is_none());
    }

    #[test]
    fn clearing_pad_keeps_saved_signature() {
        let (mut controller, _) = controller_with(FakeCaptureProvider::with_camera());
        sign(&mut controller);
        controller.clear_signature();
        assert!(controller.pad().is_empty());
        assert!(controller.record().signature().is_some());
    }

    #[tokio::test]
    async fn reset_discards_everything() {
        let (mut controller, provider) = controller_with(FakeCaptureProvider::with_camera());
        controller.dispatch(RecordIntent::ReplacePersonalData(ana()));
        controller.dispatch(RecordIntent::SetImage(photo()));
        sign(&mut controller);
        controller.open_camera(FacingMode::Environment).await.unwrap();

        controller.reset();

        assert!(controller.record().is_empty());
        assert!(controller.pad().is_empty());
        assert_eq!(controller.camera_state(), &CameraState::Idle);
        assert_eq!(provider.live_streams(), 0);
    }

    #[tokio::test]
    async fn export_snapshot_ignores_later_edits() {
        let (mut controller, _) = controller_with(FakeCaptureProvider::with_camera());
        controller.dispatch(RecordIntent::ReplacePersonalData(ana()));
        sign(&mut controller);

        let task = controller.begin_export().unwrap();
        controller.dispatch(RecordIntent::SetField(PersonalField::Name, "Beatriz".into()));
        let artifact = task.join().await.unwrap();

        assert!(artifact.manifest.text_lines().any(|l| l == "Nombre: Ana"));
        assert_eq!(controller.record().personal().name, "Beatriz");
    }

    #[test]
    fn summary_lists_pending_sections() {
        let (mut controller, _) = controller_with(FakeCaptureProvider::with_camera());
        controller.dispatch(RecordIntent::ReplacePersonalData(ana()));

        let summary = controller.summary();
        assert_eq!(summary.pending_sections, [Section::Image, Section::Signature]);
        assert!(!summary.completion.ok);
        assert!(summary.image_preview.is_none());

        controller.dispatch(RecordIntent::SetImage(photo()));
        sign(&mut controller);
        let summary = controller.summary();
        assert!(summary.pending_sections.is_empty());
        assert!(summary.completion.ok);
        assert!(summary
            .image_preview
            .as_deref()
            .is_some_and(|url| url.starts_with("data:image/jpeg;base64,")));
    }

    #[test]
    fn notice_serializes_for_the_ui() {
        let notice = ControllerError::ExportBlocked {
            missing: BTreeSet::from([FieldTag::Name, FieldTag::Signature]),
        }
        .notice();
        let json = serde_json::to_value(&notice).unwrap();
        assert_eq!(json["retry"]["action"], "go_to_section");
        assert_eq!(json["retry"]["section"], "personal");
        assert_eq!(json["message"], "Falta completar: Nombre, Firma");
    }
}
