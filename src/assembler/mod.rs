//! Document assembly: turns a record snapshot into a printable PDF.
//!
//! Assembly runs in three steps. Embedded rasters are decoded first; a raster
//! that fails to decode becomes an `EmbeddingWarning` and takes no space.
//! `layout::plan` then positions every element, and `render` writes the PDF.
//! Only a failure of the PDF writer itself fails the whole assembly.

pub mod layout;
mod render;
pub mod task;

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::config::{EXPORT_FILENAME, EXPORT_MIME};
use crate::record::RecordStore;

pub use layout::{LayoutConfig, OverflowPolicy, DOCUMENT_TITLE};
pub use task::AssemblyTask;

use layout::{Element, LayoutPlan};
use render::DecodedAsset;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("PDF generation failed: {0}")]
    Pdf(String),

    #[error("Document assembly was cancelled")]
    Cancelled,

    #[error("Assembly worker failed: {0}")]
    Worker(String),
}

/// Embedded rasters a document may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Photo,
    Signature,
}

impl AssetKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Photo => "Imagen",
            Self::Signature => "Firma",
        }
    }
}

/// An asset that could not be embedded. The document was still produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbeddingWarning {
    pub asset: AssetKind,
    pub reason: String,
}

impl std::fmt::Display for EmbeddingWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} not embedded: {}", self.asset.label(), self.reason)
    }
}

/// Content of one rendered page, for callers that need to inspect the
/// document without parsing PDF.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageManifest {
    pub lines: Vec<String>,
    pub assets: Vec<AssetKind>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentManifest {
    pub pages: Vec<PageManifest>,
}

impl DocumentManifest {
    fn from_plan(plan: &LayoutPlan) -> Self {
        let pages = plan
            .pages
            .iter()
            .map(|page| {
                let mut manifest = PageManifest::default();
                for element in &page.elements {
                    match element {
                        Element::Text { text, .. } => manifest.lines.push(text.clone()),
                        Element::ImageBox { asset, .. } => manifest.assets.push(*asset),
                    }
                }
                manifest
            })
            .collect();
        Self { pages }
    }

    pub fn text_lines(&self) -> impl Iterator<Item = &str> {
        self.pages.iter().flat_map(|p| p.lines.iter().map(String::as_str))
    }

    pub fn embedded_assets(&self) -> impl Iterator<Item = AssetKind> + '_ {
        self.pages.iter().flat_map(|p| p.assets.iter().copied())
    }
}

/// A finished document, ready to hand to an `ExportSink`.
#[derive(Clone, PartialEq, Serialize)]
pub struct ExportArtifact {
    #[serde(skip)]
    bytes: Arc<[u8]>,
    pub filename: String,
    pub mime: &'static str,
    pub page_count: usize,
    pub warnings: Vec<EmbeddingWarning>,
    pub manifest: DocumentManifest,
    /// Elements dropped by `OverflowPolicy::Truncate`.
    pub dropped_elements: usize,
    pub generated_at: String,
}

impl ExportArtifact {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn truncated(&self) -> bool {
        self.dropped_elements > 0
    }
}

impl std::fmt::Debug for ExportArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportArtifact")
            .field("filename", &self.filename)
            .field("len", &self.bytes.len())
            .field("page_count", &self.page_count)
            .field("warnings", &self.warnings)
            .field("dropped_elements", &self.dropped_elements)
            .finish()
    }
}

/// Builds the visit document from a record snapshot.
#[derive(Debug, Clone, Default)]
pub struct DocumentAssembler {
    config: LayoutConfig,
}

impl DocumentAssembler {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Assemble synchronously. CPU-bound; async callers go through
    /// `AssemblyTask`.
    pub fn assemble(&self, record: &RecordStore) -> Result<ExportArtifact, AssemblyError> {
        let _span = tracing::info_span!("assemble_document").entered();

        let candidates = [
            (AssetKind::Photo, record.image().map(|a| a.bytes())),
            (AssetKind::Signature, record.signature().map(|a| a.bytes())),
        ];

        let mut decoded = Vec::new();
        let mut warnings = Vec::new();
        for (kind, bytes) in candidates {
            let Some(bytes) = bytes else { continue };
            match render::decode_asset(bytes) {
                Ok(image) => decoded.push(DecodedAsset { kind, image }),
                Err(reason) => {
                    tracing::warn!(asset = ?kind, reason = %reason, "Asset not embedded");
                    warnings.push(EmbeddingWarning {
                        asset: kind,
                        reason,
                    });
                }
            }
        }

        let kinds: Vec<AssetKind> = decoded.iter().map(|a| a.kind).collect();
        let plan = layout::plan(record.personal(), &kinds, &self.config);
        if plan.truncated() {
            tracing::warn!(dropped = plan.dropped, "Document truncated at page bottom");
        }

        let bytes = render::render(&plan, &decoded, &self.config)?;

        tracing::info!(
            pages = plan.page_count(),
            embedded = kinds.len(),
            warnings = warnings.len(),
            bytes = bytes.len(),
            "Document assembled"
        );

        Ok(ExportArtifact {
            bytes: Arc::from(bytes),
            filename: EXPORT_FILENAME.to_string(),
            mime: EXPORT_MIME,
            page_count: plan.page_count(),
            warnings,
            manifest: DocumentManifest::from_plan(&plan),
            dropped_elements: plan.dropped,
            generated_at: chrono::Local::now().to_rfc3339(),
        })
    }
}
