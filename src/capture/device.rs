//! Capture hardware boundary and device probing.
//!
//! The platform camera API is consumed through `CaptureProvider` and
//! `LiveStream`; nothing in this crate talks to hardware directly.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Preferred camera orientation. Advisory: the platform may ignore it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// Rear camera, the one that photographs documents and wounds.
    #[default]
    Environment,
    /// Front camera.
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    VideoInput,
    AudioInput,
    AudioOutput,
}

/// One enumerated media device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_id: String,
    pub label: String,
    pub kind: DeviceKind,
    pub facing: Option<FacingMode>,
}

/// Defaults for stream requests.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing: FacingMode,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            ideal_width: 1280,
            ideal_height: 720,
            facing: FacingMode::Environment,
        }
    }
}

/// What the session asks the provider for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    pub facing: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl StreamConstraints {
    pub fn from_config(config: &CaptureConfig, facing: FacingMode) -> Self {
        Self {
            facing,
            ideal_width: config.ideal_width,
            ideal_height: config.ideal_height,
        }
    }
}

/// What the provider actually granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamSettings {
    pub device_id: String,
    pub width: u32,
    pub height: u32,
    pub facing: Option<FacingMode>,
}

/// Pixel layout of a raw frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    Rgb8,
    Rgba8,
}

impl FrameFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }
}

/// One decoded video frame as handed over by the provider.
#[derive(Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
    pub data: Vec<u8>,
}

impl RawFrame {
    /// Buffer size implied by the dimensions, or `None` if it overflows.
    pub fn expected_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.format.bytes_per_pixel())
    }
}

impl std::fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Failure classes reported by the platform capture API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderFailure {
    #[error("permission to use the camera was refused")]
    NotAllowed,

    #[error("no capture device matches the request")]
    NotFound,

    #[error("capture device could not be read")]
    NotReadable,

    #[error("platform has no capture API")]
    NotSupported,

    #[error("{0}")]
    Other(String),
}

// ═══════════════════════════════════════════════════════════
// Boundary traits
// ═══════════════════════════════════════════════════════════

/// A live stream granted by the provider.
pub trait LiveStream: Send + Sync {
    fn settings(&self) -> StreamSettings;

    /// Most recent frame, or `None` before the first frame arrives or after
    /// the stream stopped.
    fn latest_frame(&self) -> Option<RawFrame>;

    /// Whether at least one frame can be read right now.
    fn has_frame(&self) -> bool {
        self.latest_frame().is_some()
    }

    /// Release the hardware. Must be idempotent.
    fn stop(&self);

    fn is_live(&self) -> bool;
}

/// Platform camera API.
#[async_trait]
pub trait CaptureProvider: Send + Sync {
    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, ProviderFailure>;

    /// Ask for a stream. May suspend on a permission prompt.
    async fn request_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Arc<dyn LiveStream>, ProviderFailure>;
}

// ═══════════════════════════════════════════════════════════
// Probe
// ═══════════════════════════════════════════════════════════

/// Result of one hardware probe.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub available: bool,
    pub devices: Vec<DeviceInfo>,
    pub reason: Option<String>,
    #[serde(skip)]
    pub failure: Option<ProviderFailure>,
}

impl ProbeResult {
    fn unavailable(reason: String, failure: Option<ProviderFailure>) -> Self {
        Self {
            available: false,
            devices: Vec::new(),
            reason: Some(reason),
            failure,
        }
    }
}

/// Enumerate video capture hardware. Read-only and safe to repeat; the
/// result is never cached here because cameras come and go.
pub async fn probe(provider: &dyn CaptureProvider) -> ProbeResult {
    match provider.enumerate_devices().await {
        Ok(devices) => {
            let cameras: Vec<DeviceInfo> = devices
                .into_iter()
                .filter(|d| d.kind == DeviceKind::VideoInput)
                .collect();

            if cameras.is_empty() {
                tracing::info!("No video input devices found");
                return ProbeResult::unavailable(
                    "No camera was found on this device".to_string(),
                    None,
                );
            }

            tracing::debug!(cameras = cameras.len(), "Capture hardware probed");
            ProbeResult {
                available: true,
                devices: cameras,
                reason: None,
                failure: None,
            }
        }
        Err(failure) => {
            tracing::warn!(error = %failure, "Device enumeration failed");
            ProbeResult::unavailable(format!("Device enumeration failed: {failure}"), Some(failure))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::fake::FakeCaptureProvider;

    #[tokio::test]
    async fn probe_reports_cameras() {
        let provider = FakeCaptureProvider::with_camera();
        let result = probe(&provider).await;
        assert!(result.available);
        assert_eq!(result.devices.len(), 1);
        assert!(result.reason.is_none());
    }

    #[tokio::test]
    async fn probe_ignores_audio_devices() {
        let provider = FakeCaptureProvider::with_devices(vec![DeviceInfo {
            device_id: "mic".into(),
            label: "Microphone".into(),
            kind: DeviceKind::AudioInput,
            facing: None,
        }]);
        let result = probe(&provider).await;
        assert!(!result.available);
        assert!(result.reason.unwrap().contains("No camera"));
    }

    #[tokio::test]
    async fn probe_surfaces_enumeration_failure() {
        let provider = FakeCaptureProvider::enumeration_fails(ProviderFailure::NotSupported);
        let result = probe(&provider).await;
        assert!(!result.available);
        assert_eq!(result.failure, Some(ProviderFailure::NotSupported));
        assert!(result.reason.is_some());
    }

    #[tokio::test]
    async fn probe_is_repeatable() {
        let provider = FakeCaptureProvider::with_camera();
        let first = probe(&provider).await;
        provider.detach_all();
        let second = probe(&provider).await;
        assert!(first.available);
        assert!(!second.available);
    }

    #[test]
    fn facing_defaults_to_rear() {
        assert_eq!(FacingMode::default(), FacingMode::Environment);
        assert_eq!(CaptureConfig::default().facing, FacingMode::Environment);
    }

    #[test]
    fn raw_frame_expected_len() {
        let frame = RawFrame {
            width: 4,
            height: 2,
            format: FrameFormat::Rgba8,
            data: vec![],
        };
        assert_eq!(frame.expected_len(), Some(32));

        let huge = RawFrame {
            width: u32::MAX,
            height: u32::MAX,
            format: FrameFormat::Rgba8,
            data: vec![],
        };
        assert_eq!(huge.expected_len(), None);
    }
}
