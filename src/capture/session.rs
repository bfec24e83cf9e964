//! Camera session state machine.
//!
//! ```text
//!   Idle ──open──▶ Probing ──▶ Streaming
//!                     │
//!                     ├──▶ Denied        (permission refused)
//!                     ├──▶ Unavailable   (no device / no capture API)
//!                     └──▶ Error(reason) (busy or unclassified)
//!   any ──close──▶ Idle
//! ```
//!
//! The session owns the live stream and its hardware slot reservation while
//! Streaming. Both are released on close, on re-open, on cancellation and
//! when the session is dropped.

use std::sync::Arc;

use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use super::device::{
    probe, CaptureConfig, CaptureProvider, FacingMode, LiveStream, ProviderFailure, RawFrame,
    StreamConstraints, StreamSettings,
};
use super::slot::{HardwareSlot, SlotError, SlotGuard};
use crate::cancel::CancelSignal;
use crate::error::CaptureError;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum CameraState {
    Idle,
    Probing,
    Denied,
    Unavailable,
    Streaming,
    Error(String),
}

/// Reference to the live stream of a session.
///
/// Cloning the handle does not extend the hardware lifetime: once the
/// session closes, every clone reports `is_live() == false` and yields no
/// frames.
#[derive(Clone)]
pub struct StreamHandle {
    id: Uuid,
    stream: Arc<dyn LiveStream>,
    settings: StreamSettings,
}

impl StreamHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Resolution and device the hardware actually granted.
    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    pub fn is_live(&self) -> bool {
        self.stream.is_live()
    }

    /// Streaming and at least one frame decoded. Gate capture on this.
    pub fn is_ready(&self) -> bool {
        self.stream.is_live() && self.stream.has_frame()
    }

    pub fn latest_frame(&self) -> Option<RawFrame> {
        self.stream.latest_frame()
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("id", &self.id)
            .field("settings", &self.settings)
            .field("live", &self.is_live())
            .finish()
    }
}

struct ActiveStream {
    handle: StreamHandle,
    _slot: SlotGuard,
}

/// Holds `Probing` while an open is in flight and settles the final state
/// when dropped, so an abandoned open never leaves the session stuck.
struct Transition<'a> {
    state: &'a mut CameraState,
    outcome: Option<CameraState>,
}

impl<'a> Transition<'a> {
    fn begin(state: &'a mut CameraState) -> Self {
        *state = CameraState::Probing;
        Self {
            state,
            outcome: None,
        }
    }

    fn settle(&mut self, outcome: CameraState) {
        self.outcome = Some(outcome);
    }
}

impl Drop for Transition<'_> {
    fn drop(&mut self) {
        *self.state = self.outcome.take().unwrap_or(CameraState::Idle);
    }
}

/// Map a provider failure to the public error and the state it leaves.
fn classify(failure: &ProviderFailure) -> (CaptureError, CameraState) {
    match failure {
        ProviderFailure::NotAllowed => (CaptureError::PermissionDenied, CameraState::Denied),
        ProviderFailure::NotFound => (CaptureError::NoDevice, CameraState::Unavailable),
        ProviderFailure::NotSupported => (CaptureError::Unsupported, CameraState::Unavailable),
        ProviderFailure::NotReadable => (
            CaptureError::HardwareBusy,
            CameraState::Error(CaptureError::HardwareBusy.to_string()),
        ),
        ProviderFailure::Other(raw) => (
            CaptureError::Device(raw.clone()),
            CameraState::Error(raw.clone()),
        ),
    }
}

// ═══════════════════════════════════════════════════════════
// CameraSession
// ═══════════════════════════════════════════════════════════

pub struct CameraSession {
    provider: Arc<dyn CaptureProvider>,
    slot: Arc<HardwareSlot>,
    config: CaptureConfig,
    state: CameraState,
    active: Option<ActiveStream>,
}

impl CameraSession {
    /// Session bound to the process-wide hardware slot.
    pub fn new(provider: Arc<dyn CaptureProvider>) -> Self {
        Self::with_slot(provider, HardwareSlot::global())
    }

    pub fn with_slot(provider: Arc<dyn CaptureProvider>, slot: Arc<HardwareSlot>) -> Self {
        Self {
            provider,
            slot,
            config: CaptureConfig::default(),
            state: CameraState::Idle,
            active: None,
        }
    }

    pub fn with_config(mut self, config: CaptureConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state(&self) -> &CameraState {
        &self.state
    }

    pub fn handle(&self) -> Option<&StreamHandle> {
        self.active.as_ref().map(|a| &a.handle)
    }

    pub fn is_ready(&self) -> bool {
        self.handle().is_some_and(StreamHandle::is_ready)
    }

    /// Open the camera with the configured facing hint.
    pub async fn open_default(&mut self) -> Result<StreamHandle, CaptureError> {
        let facing = self.config.facing;
        self.open(facing).await
    }

    pub async fn open(&mut self, facing: FacingMode) -> Result<StreamHandle, CaptureError> {
        self.open_cancellable(facing, CancelSignal::never()).await
    }

    /// Open, aborting with `Cancelled` if `cancel` fires before the stream
    /// is granted. A stream that arrives after cancellation is stopped at once.
    pub async fn open_cancellable(
        &mut self,
        facing: FacingMode,
        cancel: CancelSignal,
    ) -> Result<StreamHandle, CaptureError> {
        // Close-before-open: the previous handle is fully released first.
        self.close();

        let handle_id = Uuid::new_v4();
        let span = tracing::info_span!("camera_open", handle = %handle_id, ?facing);
        self.acquire(handle_id, facing, cancel).instrument(span).await
    }

    async fn acquire(
        &mut self,
        handle_id: Uuid,
        facing: FacingMode,
        mut cancel: CancelSignal,
    ) -> Result<StreamHandle, CaptureError> {
        let provider = Arc::clone(&self.provider);
        let constraints = StreamConstraints::from_config(&self.config, facing);
        let mut transition = Transition::begin(&mut self.state);

        let slot_guard = match self.slot.try_acquire(handle_id) {
            Ok(guard) => guard,
            Err(SlotError::Busy) => {
                tracing::warn!("Camera already held by another session");
                transition.settle(CameraState::Error(CaptureError::HardwareBusy.to_string()));
                return Err(CaptureError::HardwareBusy);
            }
            Err(SlotError::LockPoisoned) => {
                let reason = SlotError::LockPoisoned.to_string();
                transition.settle(CameraState::Error(reason.clone()));
                return Err(CaptureError::Device(reason));
            }
        };

        // Probe result lives only for this attempt.
        let probed = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!("Camera open cancelled during probe");
                return Err(CaptureError::Cancelled);
            }
            result = probe(provider.as_ref()) => result,
        };

        if !probed.available {
            let (err, state) = match probed.failure.as_ref() {
                Some(failure) => classify(failure),
                None => (CaptureError::NoDevice, CameraState::Unavailable),
            };
            tracing::info!(error = %err, "Camera unavailable");
            transition.settle(state);
            return Err(err);
        }

        let requested = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!("Camera open cancelled while awaiting hardware");
                return Err(CaptureError::Cancelled);
            }
            result = provider.request_stream(&constraints) => result,
        };

        let stream = match requested {
            Ok(stream) => stream,
            Err(failure) => {
                let (err, state) = classify(&failure);
                if matches!(failure, ProviderFailure::Other(_)) {
                    tracing::error!(raw = %failure, "Unclassified capture failure");
                } else {
                    tracing::warn!(error = %err, "Camera request refused");
                }
                transition.settle(state);
                return Err(err);
            }
        };

        if cancel.is_cancelled() {
            stream.stop();
            tracing::info!("Stream granted after cancellation, released");
            return Err(CaptureError::Cancelled);
        }

        let settings = stream.settings();
        slot_guard.bind_device(&settings.device_id);
        let handle = StreamHandle {
            id: handle_id,
            stream,
            settings,
        };

        tracing::info!(
            requested = format!("{}x{}", constraints.ideal_width, constraints.ideal_height),
            granted = format!("{}x{}", handle.settings.width, handle.settings.height),
            "Camera streaming"
        );

        transition.settle(CameraState::Streaming);
        drop(transition);
        self.active = Some(ActiveStream {
            handle: handle.clone(),
            _slot: slot_guard,
        });
        Ok(handle)
    }

    /// Stop the stream and release the hardware. No-op when nothing is open.
    pub fn close(&mut self) {
        if let Some(active) = self.active.take() {
            active.handle.stream.stop();
            tracing::info!(handle = %active.handle.id, "Camera stream released");
        }
        self.state = CameraState::Idle;
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.close();
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
