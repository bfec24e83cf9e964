//! Page layout planning. Pure geometry, no PDF types.
//!
//! Coordinates are millimetres measured from the top-left corner of the
//! page; the renderer flips them for PDF's bottom-left origin.

use serde::{Deserialize, Serialize};

use super::AssetKind;
use crate::record::{PersonalData, PersonalField};

/// Document title printed on the first page.
pub const DOCUMENT_TITLE: &str = "Registro de Visita Médica";

/// What happens when content runs past the bottom margin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Move the element that does not fit to a new page. Lines and image
    /// boxes are never split.
    #[default]
    Paginate,
    /// Stop at the first element that does not fit and drop it and
    /// everything after it.
    Truncate,
}

/// Page geometry and typography. Defaults reproduce the paper form: A4,
/// title at 20 mm, 10 mm field spacing, photo 80x60 mm, signature 80x40 mm.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    pub page_width_mm: f32,
    pub page_height_mm: f32,
    pub margin_left_mm: f32,
    pub margin_top_mm: f32,
    pub margin_bottom_mm: f32,
    pub title_size_pt: f32,
    pub body_size_pt: f32,
    /// Space between the title baseline and the first field.
    pub title_advance_mm: f32,
    pub line_height_mm: f32,
    /// Characters per line for the visit reason.
    pub wrap_chars: usize,
    /// Indent of wrapped continuation lines.
    pub continuation_indent_mm: f32,
    /// Gap above each image box.
    pub block_gap_mm: f32,
    pub photo_box_mm: (f32, f32),
    pub signature_box_mm: (f32, f32),
    pub overflow: OverflowPolicy,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            page_width_mm: 210.0,
            page_height_mm: 297.0,
            margin_left_mm: 20.0,
            margin_top_mm: 20.0,
            margin_bottom_mm: 20.0,
            title_size_pt: 20.0,
            body_size_pt: 12.0,
            title_advance_mm: 20.0,
            line_height_mm: 10.0,
            wrap_chars: 80,
            continuation_indent_mm: 5.0,
            block_gap_mm: 10.0,
            photo_box_mm: (80.0, 60.0),
            signature_box_mm: (80.0, 40.0),
            overflow: OverflowPolicy::Paginate,
        }
    }
}

impl LayoutConfig {
    fn content_bottom(&self) -> f32 {
        self.page_height_mm - self.margin_bottom_mm
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Text {
        text: String,
        size_pt: f32,
        bold: bool,
        x_mm: f32,
        baseline_mm: f32,
    },
    ImageBox {
        asset: AssetKind,
        x_mm: f32,
        top_mm: f32,
        width_mm: f32,
        height_mm: f32,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PagePlan {
    pub elements: Vec<Element>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutPlan {
    pub pages: Vec<PagePlan>,
    /// Elements discarded under `OverflowPolicy::Truncate`.
    pub dropped: usize,
}

impl LayoutPlan {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn truncated(&self) -> bool {
        self.dropped > 0
    }
}

/// Something to place, before it has a position.
enum Block {
    Title(String),
    Line { text: String, indent: bool },
    Image(AssetKind),
}

/// Lay out the record top to bottom: title, the five fields in form order,
/// then each asset in `assets` order.
pub fn plan(personal: &PersonalData, assets: &[AssetKind], config: &LayoutConfig) -> LayoutPlan {
    let mut blocks = vec![Block::Title(DOCUMENT_TITLE.to_string())];

    for field in PersonalField::ALL {
        let text = format!("{}: {}", field.label(), personal.get(field).trim());
        if field == PersonalField::VisitReason {
            for (i, line) in wrap_text(&text, config.wrap_chars).into_iter().enumerate() {
                blocks.push(Block::Line {
                    text: line,
                    indent: i > 0,
                });
            }
        } else {
            blocks.push(Block::Line {
                text,
                indent: false,
            });
        }
    }

    blocks.extend(assets.iter().copied().map(Block::Image));

    Cursor::new(config).place_all(blocks)
}

struct Cursor<'a> {
    config: &'a LayoutConfig,
    pages: Vec<PagePlan>,
    y: f32,
    dropped: usize,
    stopped: bool,
}

impl<'a> Cursor<'a> {
    fn new(config: &'a LayoutConfig) -> Self {
        Self {
            config,
            pages: vec![PagePlan::default()],
            y: config.margin_top_mm,
            dropped: 0,
            stopped: false,
        }
    }

    fn place_all(mut self, blocks: Vec<Block>) -> LayoutPlan {
        for block in blocks {
            self.place(block);
        }
        LayoutPlan {
            pages: self.pages,
            dropped: self.dropped,
        }
    }

    fn at_page_top(&self) -> bool {
        self.pages.last().map_or(true, |p| p.elements.is_empty())
    }

    /// Make room for an element occupying `[top, top + height]`. Returns the
    /// top to use, or `None` when the element is dropped.
    fn reserve(&mut self, gap: f32, height: f32) -> Option<f32> {
        if self.stopped {
            self.dropped += 1;
            return None;
        }

        let top = if self.at_page_top() { self.y } else { self.y + gap };
        if top + height <= self.config.content_bottom() || self.at_page_top() {
            return Some(top);
        }

        match self.config.overflow {
            OverflowPolicy::Paginate => {
                self.pages.push(PagePlan::default());
                self.y = self.config.margin_top_mm;
                Some(self.y)
            }
            OverflowPolicy::Truncate => {
                self.stopped = true;
                self.dropped += 1;
                None
            }
        }
    }

    fn push(&mut self, element: Element) {
        if let Some(page) = self.pages.last_mut() {
            page.elements.push(element);
        }
    }

    fn place(&mut self, block: Block) {
        let config = self.config;
        match block {
            Block::Title(text) => {
                // A text line occupies the band below its baseline.
                if let Some(baseline) = self.reserve(0.0, config.title_advance_mm) {
                    self.push(Element::Text {
                        text,
                        size_pt: config.title_size_pt,
                        bold: true,
                        x_mm: config.margin_left_mm,
                        baseline_mm: baseline,
                    });
                    self.y = baseline + config.title_advance_mm;
                }
            }
            Block::Line { text, indent } => {
                // The last line on a page only needs its baseline inside the margin.
                if let Some(baseline) = self.reserve(0.0, 0.0) {
                    let x_mm = if indent {
                        config.margin_left_mm + config.continuation_indent_mm
                    } else {
                        config.margin_left_mm
                    };
                    self.push(Element::Text {
                        text,
                        size_pt: config.body_size_pt,
                        bold: false,
                        x_mm,
                        baseline_mm: baseline,
                    });
                    self.y = baseline + config.line_height_mm;
                }
            }
            Block::Image(asset) => {
                let (width_mm, height_mm) = match asset {
                    AssetKind::Photo => config.photo_box_mm,
                    AssetKind::Signature => config.signature_box_mm,
                };
                if let Some(top) = self.reserve(config.block_gap_mm, height_mm) {
                    self.push(Element::ImageBox {
                        asset,
                        x_mm: config.margin_left_mm,
                        top_mm: top,
                        width_mm,
                        height_mm,
                    });
                    self.y = top + height_mm;
                }
            }
        }
    }
}

/// Simple word-wrap helper for PDF text rendering. Words longer than
/// `max_chars` are broken into chunks of `max_chars` characters.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if word.chars().count() > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let chars: Vec<char> = word.chars().collect();
            let mut chunks = chars.chunks(max_chars).peekable();
            while let Some(chunk) = chunks.next() {
                let piece: String = chunk.iter().collect();
                if chunks.peek().is_some() {
                    lines.push(piece);
                } else {
                    current = piece;
                }
            }
            continue;
        }
        if current.chars().count() + word.chars().count() + 1 > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
