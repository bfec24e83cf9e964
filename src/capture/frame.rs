//! Still-image capture: freeze a live frame, or canonicalize a picked file.
//!
//! Both paths end in the same artifact shape (baseline JPEG at a fixed
//! quality), so the assembler never cares where a photo came from.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageOutputFormat, RgbImage, RgbaImage};

use super::device::{FrameFormat, RawFrame};
use super::session::StreamHandle;
use crate::artifact::ImageArtifact;
use crate::error::{CaptureError, ValidationError};

/// JPEG quality for every photo artifact. Fixed, not user-configurable.
pub const CAPTURE_JPEG_QUALITY: u8 = 85;

/// Maximum picked-file size before rejecting.
/// Prevents OOM on corrupt/adversarial files.
pub const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024; // 50 MB

/// Longest side kept for picked files; larger photos are downscaled.
pub const MAX_IMAGE_DIMENSION: u32 = 4096;

/// Stateless converter from frames and files to `ImageArtifact`s.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCapturer;

impl FrameCapturer {
    pub fn new() -> Self {
        Self
    }

    /// Freeze the current frame of a streaming handle at its native size.
    ///
    /// Fails with `CaptureFailed` before the first frame arrives or after
    /// the stream stopped; callers gate on `StreamHandle::is_ready`.
    pub fn capture_frame(&self, handle: &StreamHandle) -> Result<ImageArtifact, CaptureError> {
        if !handle.is_live() {
            return Err(CaptureError::CaptureFailed("stream is not active".into()));
        }
        let frame = handle
            .latest_frame()
            .ok_or_else(|| CaptureError::CaptureFailed("no frame available yet".into()))?;

        let rgb = frame_to_rgb(frame)?;
        let (width, height) = rgb.dimensions();
        let jpeg = encode_jpeg(rgb).map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;

        tracing::info!(
            handle = %handle.id(),
            size = format!("{width}x{height}"),
            bytes = jpeg.len(),
            "Frame captured"
        );
        Ok(ImageArtifact::from_encoded(jpeg))
    }

    /// Accept externally supplied image bytes (gallery pick, file input).
    ///
    /// The declared type must be an `image/*` class whatever the bytes are.
    /// Decoded images get EXIF orientation applied, are bounded to
    /// `MAX_IMAGE_DIMENSION`, and are re-encoded like live captures.
    pub fn capture_from_file(
        &self,
        bytes: &[u8],
        declared_type: &str,
    ) -> Result<ImageArtifact, ValidationError> {
        if !is_image_type(declared_type) {
            tracing::info!(declared_type, "Rejected non-image file");
            return Err(ValidationError::InvalidType(declared_type.to_string()));
        }
        validate_image_bytes(bytes)?;

        let img = image::load_from_memory(bytes)
            .map_err(|e| ValidationError::ReadFailed(format!("could not decode image: {e}")))?;
        let (orig_w, orig_h) = img.dimensions();

        let orientation = read_exif_orientation(bytes);
        let img = apply_orientation(img, orientation);
        let img = bound_dimensions(img, MAX_IMAGE_DIMENSION);
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();

        let jpeg = encode_jpeg(rgb)
            .map_err(|e| ValidationError::ReadFailed(format!("could not re-encode image: {e}")))?;

        tracing::info!(
            original = format!("{orig_w}x{orig_h}"),
            output = format!("{width}x{height}"),
            orientation,
            bytes = jpeg.len(),
            "Picked image accepted"
        );
        Ok(ImageArtifact::from_encoded(jpeg))
    }
}

/// `image/*`, case-insensitive, parameters after `;` ignored.
fn is_image_type(declared_type: &str) -> bool {
    let essence = declared_type.split(';').next().unwrap_or("").trim();
    essence.len() > "image/".len() && essence.to_ascii_lowercase().starts_with("image/")
}

fn validate_image_bytes(bytes: &[u8]) -> Result<(), ValidationError> {
    if bytes.is_empty() {
        return Err(ValidationError::ReadFailed("file is empty".into()));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ValidationError::ReadFailed(format!(
            "file is {:.1} MB, limit is {} MB",
            bytes.len() as f64 / (1024.0 * 1024.0),
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

fn frame_to_rgb(frame: RawFrame) -> Result<RgbImage, CaptureError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(CaptureError::CaptureFailed("frame has no pixels".into()));
    }
    let expected = frame
        .expected_len()
        .ok_or_else(|| CaptureError::CaptureFailed("frame dimensions overflow".into()))?;
    if frame.data.len() != expected {
        return Err(CaptureError::CaptureFailed(format!(
            "frame buffer is {} bytes, expected {expected}",
            frame.data.len(),
        )));
    }

    let malformed = || CaptureError::CaptureFailed("frame buffer does not match its dimensions".into());
    match frame.format {
        FrameFormat::Rgb8 => RgbImage::from_raw(frame.width, frame.height, frame.data).ok_or_else(malformed),
        FrameFormat::Rgba8 => RgbaImage::from_raw(frame.width, frame.height, frame.data)
            .map(|rgba| DynamicImage::ImageRgba8(rgba).to_rgb8())
            .ok_or_else(malformed),
    }
}

/// Encode an RGB image as JPEG at the fixed capture quality.
pub fn encode_jpeg(img: RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img).write_to(&mut cursor, ImageOutputFormat::Jpeg(CAPTURE_JPEG_QUALITY))?;
    Ok(cursor.into_inner())
}

/// Read EXIF tag 0x0112 (Orientation) from raw image bytes.
/// Returns 1 (normal) if no EXIF data or tag not present.
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let reader = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(r) => r,
        Err(_) => return 1,
    };

    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

/// Apply an EXIF orientation transform.
///
/// 1 = Normal, 2 = Mirrored, 3 = 180deg, 4 = Flipped V,
/// 5 = Mirrored + 90deg CW, 6 = 90deg CW, 7 = Mirrored + 270deg CW, 8 = 270deg CW
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

fn bound_dimensions(img: DynamicImage, max_dim: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    if w.max(h) <= max_dim {
        return img;
    }
    tracing::debug!(from = format!("{w}x{h}"), max_dim, "Downscaling oversized image");
    img.resize(max_dim, max_dim, FilterType::Triangle)
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
