//! Handwritten signature pad: stroke accumulation and rasterization.
//!
//! Purely in-memory. Strokes are polylines in surface pixel coordinates;
//! `commit` renders them onto a fixed-size white raster and encodes PNG.

use std::io::Cursor;

use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::artifact::SignatureArtifact;
use crate::error::ValidationError;

/// Drawing surface size in pixels.
pub const SURFACE_WIDTH: u32 = 640;
pub const SURFACE_HEIGHT: u32 = 256;

const PEN_RADIUS: f32 = 1.5;
const INK: Rgb<u8> = Rgb([20, 24, 64]);
const PAPER: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone)]
pub struct SignaturePad {
    width: u32,
    height: u32,
    strokes: Vec<Vec<Point>>,
}

impl SignaturePad {
    pub fn new() -> Self {
        Self::with_surface(SURFACE_WIDTH, SURFACE_HEIGHT)
    }

    pub fn with_surface(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            strokes: Vec::new(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Append one polyline. Points are clamped onto the surface; non-finite
    /// points are dropped. A stroke left with no points is ignored.
    pub fn record_stroke(&mut self, points: &[Point]) {
        let max_x = (self.width - 1) as f32;
        let max_y = (self.height - 1) as f32;
        let stroke: Vec<Point> = points
            .iter()
            .filter(|p| p.x.is_finite() && p.y.is_finite())
            .map(|p| Point::new(p.x.clamp(0.0, max_x), p.y.clamp(0.0, max_y)))
            .collect();

        if !stroke.is_empty() {
            self.strokes.push(stroke);
        }
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn stroke_count(&self) -> usize {
        self.strokes.len()
    }

    pub fn point_count(&self) -> usize {
        self.strokes.iter().map(Vec::len).sum()
    }

    /// Rasterize to a PNG artifact. The pad keeps its strokes.
    pub fn commit(&self) -> Result<SignatureArtifact, ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptySignature);
        }

        let raster = self.rasterize();
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(raster)
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .map_err(|e| ValidationError::EncodeFailed(format!("PNG encoding failed: {e}")))?;
        let png = cursor.into_inner();

        tracing::info!(
            strokes = self.stroke_count(),
            points = self.point_count(),
            bytes = png.len(),
            "Signature committed"
        );
        Ok(SignatureArtifact::from_encoded(png))
    }

    fn rasterize(&self) -> RgbImage {
        let mut canvas = RgbImage::from_pixel(self.width, self.height, PAPER);
        for stroke in &self.strokes {
            match stroke.as_slice() {
                [single] => stamp(&mut canvas, *single),
                points => {
                    for pair in points.windows(2) {
                        draw_segment(&mut canvas, pair[0], pair[1]);
                    }
                }
            }
        }
        canvas
    }
}

impl Default for SignaturePad {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk the segment in half-pixel steps, stamping the pen at each step.
fn draw_segment(canvas: &mut RgbImage, from: Point, to: Point) {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let steps = ((dx * dx + dy * dy).sqrt() * 2.0).ceil().max(1.0) as u32;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        stamp(canvas, Point::new(from.x + dx * t, from.y + dy * t));
    }
}

/// Paint a filled disc of `PEN_RADIUS` centred on `center`.
fn stamp(canvas: &mut RgbImage, center: Point) {
    let (w, h) = canvas.dimensions();
    let x0 = (center.x - PEN_RADIUS).floor().max(0.0) as u32;
    let y0 = (center.y - PEN_RADIUS).floor().max(0.0) as u32;
    let x1 = ((center.x + PEN_RADIUS).ceil() as u32).min(w - 1);
    let y1 = ((center.y + PEN_RADIUS).ceil() as u32).min(h - 1);

    for y in y0..=y1 {
        for x in x0..=x1 {
            let px = x as f32 + 0.5 - center.x;
            let py = y as f32 + 0.5 - center.y;
            if px * px + py * py <= PEN_RADIUS * PEN_RADIUS {
                canvas.put_pixel(x, y, INK);
            }
        }
    }
}
