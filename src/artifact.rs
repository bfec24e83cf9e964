//! Immutable encoded payloads exchanged between capture, the record and assembly.
//!
//! An artifact is produced once and never mutated. Payloads sit behind an
//! `Arc<[u8]>`, so record snapshots clone a pointer rather than the image.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Raster container format, detected from magic bytes (never from a
/// declared type, which the caller may get wrong).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageEncoding {
    Jpeg,
    Png,
    Unknown,
}

impl ImageEncoding {
    pub fn sniff(bytes: &[u8]) -> Self {
        match bytes {
            // JPEG: starts with FF D8 FF
            [0xFF, 0xD8, 0xFF, ..] => Self::Jpeg,
            // PNG: starts with 89 50 4E 47
            [0x89, 0x50, 0x4E, 0x47, ..] => Self::Png,
            _ => Self::Unknown,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Unknown => "application/octet-stream",
        }
    }
}

/// Shared representation behind both artifact kinds.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedRaster {
    bytes: Arc<[u8]>,
    encoding: ImageEncoding,
}

impl EncodedRaster {
    fn new(bytes: Vec<u8>) -> Self {
        let encoding = ImageEncoding::sniff(&bytes);
        Self {
            bytes: Arc::from(bytes),
            encoding,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn encoding(&self) -> ImageEncoding {
        self.encoding
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// First 12 hex chars of the SHA-256 digest. Safe to log: identifies the
    /// payload without revealing any of it.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.bytes);
        digest.iter().take(6).map(|b| format!("{b:02x}")).collect()
    }

    /// `data:` URL for UI previews.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.encoding.mime_type(),
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

impl fmt::Debug for EncodedRaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedRaster")
            .field("encoding", &self.encoding)
            .field("len", &self.bytes.len())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// A captured or picked photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageArtifact(EncodedRaster);

impl ImageArtifact {
    /// Wraps already-encoded bytes. No decoding happens here: the payload is
    /// opaque until the assembler embeds it.
    pub fn from_encoded(bytes: Vec<u8>) -> Self {
        Self(EncodedRaster::new(bytes))
    }
}

impl Deref for ImageArtifact {
    type Target = EncodedRaster;

    fn deref(&self) -> &EncodedRaster {
        &self.0
    }
}

/// A rasterized handwritten signature. Only `SignaturePad::commit` builds
/// one outside this crate, so an empty pad never yields an artifact.
///
/// ```compile_fail
/// let _ = registro_visitas::SignatureArtifact::from_encoded(vec![0x89, 0x50, 0x4E, 0x47]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureArtifact(EncodedRaster);

impl SignatureArtifact {
    pub(crate) fn from_encoded(bytes: Vec<u8>) -> Self {
        Self(EncodedRaster::new(bytes))
    }
}

impl Deref for SignatureArtifact {
    type Target = EncodedRaster;

    fn deref(&self) -> &EncodedRaster {
        &self.0
    }
}
