//! Rectangles and the three coordinate spaces we juggle.
//!
//! Blocks are stored in PDF point space (72 units per inch, top-left origin).
//! Page images live in pixel space at whatever DPI they were rasterized at, and
//! OCR boxes live in the pixel space of the image that was OCRed, which need
//! not match the annotation image. [`reconcile`] converts between any two of
//! these, given the extent of each space.

use std::collections::BTreeMap;

use image::DynamicImage;

use crate::prelude::*;

/// An axis-aligned rectangle. Producers do not guarantee `x0 <= x1` or
/// `y0 <= y1`; consumers must cope with degenerate or inverted rectangles.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    /// Create a new rectangle from two corners.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// The same rectangle with `x0 <= x1` and `y0 <= y1`.
    pub fn normalized(&self) -> Self {
        Self {
            x0: self.x0.min(self.x1),
            y0: self.y0.min(self.y1),
            x1: self.x0.max(self.x1),
            y1: self.y0.max(self.y1),
        }
    }
}

impl From<[f32; 4]> for Rect {
    fn from([x0, y0, x1, y1]: [f32; 4]) -> Self {
        Self { x0, y0, x1, y1 }
    }
}

impl From<Rect> for [f32; 4] {
    fn from(r: Rect) -> Self {
        [r.x0, r.y0, r.x1, r.y1]
    }
}

/// The width and height of a coordinate space: a page in points, or an image
/// in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Extent {
    pub width: f32,
    pub height: f32,
}

impl Extent {
    /// A4, in points.
    pub const A4: Extent = Extent {
        width: 595.0,
        height: 842.0,
    };

    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// The pixel extent of an image.
    pub fn of_image(image: &DynamicImage) -> Self {
        Self {
            width: image.width() as f32,
            height: image.height() as f32,
        }
    }
}

/// Map `rect` from the space described by `from` into the space described by
/// `to`. Each axis is scaled independently, and a zero-sized source axis
/// scales by 1.0.
pub fn reconcile(rect: Rect, from: Extent, to: Extent) -> Rect {
    let sx = if from.width != 0.0 {
        to.width / from.width
    } else {
        1.0
    };
    let sy = if from.height != 0.0 {
        to.height / from.height
    } else {
        1.0
    };
    Rect {
        x0: rect.x0 * sx,
        y0: rect.y0 * sy,
        x1: rect.x1 * sx,
        y1: rect.y1 * sy,
    }
}

/// Where did a block come from?
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockSource {
    /// Layout geometry from a model or from the PDF itself.
    Layout,
    /// A word box found by OCR.
    Ocr,
}

/// A detected layout element, in point space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Block {
    pub rect: Rect,
    pub source: BlockSource,
}

impl Block {
    pub fn layout(rect: Rect) -> Self {
        Self {
            rect,
            source: BlockSource::Layout,
        }
    }

    pub fn ocr(rect: Rect) -> Self {
        Self {
            rect,
            source: BlockSource::Ocr,
        }
    }
}

/// Blocks for each processed page, keyed by 0-based page index.
pub type BlocksByPage = BTreeMap<usize, Vec<Block>>;
