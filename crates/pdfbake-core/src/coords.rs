//! Coordinate transformation between raster preview and PDF coordinate systems
//!
//! The raster preview has its origin at the top-left with y growing downward
//! (pixels). PDF user space has its origin at the bottom-left of the MediaBox
//! with y growing upward (points). The y flip happens in [`PageTransform::y_top`]
//! and nowhere else.

use crate::error::ExportError;

/// Default fraction of the font size between the top of a text box and its baseline
pub const DEFAULT_BASELINE_RATIO: f64 = 0.85;

/// A rectangle in PDF space, anchored at its bottom-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Raster → PDF mapping for a single page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageTransform {
    scale: f64,
    page_height: f64,
    origin_x: f64,
    origin_y: f64,
}

impl PageTransform {
    /// Build a transform for a page whose MediaBox starts at (0, 0)
    pub fn new(pdf_page_height: f64, raster_page_height: f64) -> Result<Self, ExportError> {
        Self::from_media_box([0.0, 0.0, 0.0, pdf_page_height], raster_page_height)
    }

    /// Build a transform from a MediaBox `[llx, lly, urx, ury]`
    pub fn from_media_box(media_box: [f64; 4], raster_page_height: f64) -> Result<Self, ExportError> {
        if !raster_page_height.is_finite() || raster_page_height <= 0.0 {
            return Err(ExportError::InvalidRasterHeight(raster_page_height));
        }
        let [llx, lly, _, ury] = media_box;
        let page_height = (ury - lly).abs();
        Ok(Self {
            scale: page_height / raster_page_height,
            page_height,
            origin_x: llx,
            origin_y: lly.min(ury),
        })
    }

    /// PDF units per raster pixel
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn page_height(&self) -> f64 {
        self.page_height
    }

    pub fn x(&self, raster_x: f64) -> f64 {
        self.origin_x + raster_x * self.scale
    }

    /// Top-referenced PDF y for a raster y
    pub fn y_top(&self, raster_y: f64) -> f64 {
        self.origin_y + self.page_height - raster_y * self.scale
    }

    /// Scale a raster length (width, height, font size, stroke width)
    pub fn length(&self, raster_len: f64) -> f64 {
        raster_len * self.scale
    }

    /// Convert a raster rectangle (top-left anchored) to a PDF rectangle
    /// (bottom-left anchored)
    pub fn rect(&self, x: f64, y: f64, width: f64, height: f64) -> PdfRect {
        let height = self.length(height);
        PdfRect {
            x: self.x(x),
            y: self.y_top(y) - height,
            width: self.length(width),
            height,
        }
    }

    /// Baseline origin for text whose box top-left is at raster `(x, y)`.
    ///
    /// `pdf_font_size` is already in PDF units.
    pub fn text_origin(&self, x: f64, y: f64, pdf_font_size: f64, baseline_ratio: f64) -> (f64, f64) {
        (self.x(x), self.y_top(y) - pdf_font_size * baseline_ratio)
    }

    /// Inverse of [`Self::x`] / [`Self::y_top`]
    pub fn to_raster(&self, pdf_x: f64, pdf_y: f64) -> (f64, f64) {
        (
            (pdf_x - self.origin_x) / self.scale,
            (self.origin_y + self.page_height - pdf_y) / self.scale,
        )
    }
}

/// Convert raster coordinates (top-left origin, pixels) to PDF coordinates
/// (bottom-left origin, points)
pub fn raster_to_pdf(raster_x: f64, raster_y: f64, pdf_page_height: f64, raster_page_height: f64) -> (f64, f64) {
    let scale = pdf_page_height / raster_page_height;
    (raster_x * scale, pdf_page_height - raster_y * scale)
}

/// Convert PDF coordinates back to raster coordinates
pub fn pdf_to_raster(pdf_x: f64, pdf_y: f64, pdf_page_height: f64, raster_page_height: f64) -> (f64, f64) {
    let scale = pdf_page_height / raster_page_height;
    (pdf_x / scale, (pdf_page_height - pdf_y) / scale)
}
