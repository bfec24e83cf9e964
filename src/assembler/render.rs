//! PDF rendering of a `LayoutPlan` via `printpdf`.

use std::io::BufWriter;

use image::{DynamicImage, GenericImageView};
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfLayerReference,
};

use super::layout::{Element, LayoutConfig, LayoutPlan, DOCUMENT_TITLE};
use super::{AssemblyError, AssetKind};

/// Resolution images are embedded at before scaling to their box.
const EMBED_DPI: f32 = 300.0;
const MM_PER_INCH: f32 = 25.4;

/// A decoded asset ready to be placed.
pub(crate) struct DecodedAsset {
    pub kind: AssetKind,
    pub image: DynamicImage,
}

/// Decode an embedded raster. Errors are reasons for an embedding warning.
pub(crate) fn decode_asset(bytes: &[u8]) -> Result<DynamicImage, String> {
    if bytes.is_empty() {
        return Err("no image data".into());
    }
    let img = image::load_from_memory(bytes).map_err(|e| format!("cannot decode image: {e}"))?;
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Err(format!("invalid dimensions {w}x{h}"));
    }
    // Alpha is dropped before embedding.
    Ok(DynamicImage::ImageRgb8(img.to_rgb8()))
}

/// Render the plan. Every `ImageBox` must have a matching decoded asset;
/// a box without one is left blank.
pub(crate) fn render(
    plan: &LayoutPlan,
    assets: &[DecodedAsset],
    config: &LayoutConfig,
) -> Result<Vec<u8>, AssemblyError> {
    let page_w = Mm(config.page_width_mm);
    let page_h = Mm(config.page_height_mm);

    let (doc, page1, layer1) = PdfDocument::new(DOCUMENT_TITLE, page_w, page_h, "Layer 1");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| AssemblyError::Pdf(format!("PDF font error: {e}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| AssemblyError::Pdf(format!("PDF font error: {e}")))?;

    for (i, page) in plan.pages.iter().enumerate() {
        let (page_idx, layer_idx) = if i == 0 {
            (page1, layer1)
        } else {
            doc.add_page(page_w, page_h, format!("Page {}, Layer 1", i + 1))
        };
        let layer = doc.get_page(page_idx).get_layer(layer_idx);

        for element in &page.elements {
            match element {
                Element::Text {
                    text,
                    size_pt,
                    bold: is_bold,
                    x_mm,
                    baseline_mm,
                } => {
                    let face: &IndirectFontRef = if *is_bold { &bold } else { &font };
                    layer.use_text(
                        text.as_str(),
                        *size_pt,
                        Mm(*x_mm),
                        Mm(config.page_height_mm - baseline_mm),
                        face,
                    );
                }
                Element::ImageBox {
                    asset,
                    x_mm,
                    top_mm,
                    width_mm,
                    height_mm,
                } => {
                    let Some(decoded) = assets.iter().find(|a| a.kind == *asset) else {
                        tracing::warn!(asset = ?asset, "No decoded image for layout box");
                        continue;
                    };
                    place_image(
                        &layer,
                        &decoded.image,
                        Frame {
                            x_mm: *x_mm,
                            top_mm: *top_mm,
                            width_mm: *width_mm,
                            height_mm: *height_mm,
                        },
                        config.page_height_mm,
                    );
                }
            }
        }
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| AssemblyError::Pdf(format!("PDF save error: {e}")))?;
    buf.into_inner()
        .map_err(|e| AssemblyError::Pdf(format!("PDF buffer error: {e}")))
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    x_mm: f32,
    top_mm: f32,
    width_mm: f32,
    height_mm: f32,
}

/// Scale factor and drawn size that fit `px` pixels into `frame`,
/// preserving aspect ratio.
fn fit(px: (u32, u32), frame: Frame) -> (f32, f32, f32) {
    let native_w = px.0 as f32 / EMBED_DPI * MM_PER_INCH;
    let native_h = px.1 as f32 / EMBED_DPI * MM_PER_INCH;
    let scale = (frame.width_mm / native_w).min(frame.height_mm / native_h);
    (scale, native_w * scale, native_h * scale)
}

/// Top-left aligned inside the frame, matching the paper form.
fn place_image(layer: &PdfLayerReference, img: &DynamicImage, frame: Frame, page_height_mm: f32) {
    let (scale, _, drawn_h) = fit(img.dimensions(), frame);
    let bottom = page_height_mm - (frame.top_mm + drawn_h);

    Image::from_dynamic_image(img).add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(frame.x_mm)),
            translate_y: Some(Mm(bottom)),
            scale_x: Some(scale),
            scale_y: Some(scale),
            dpi: Some(EMBED_DPI),
            ..Default::default()
        },
    );
}
