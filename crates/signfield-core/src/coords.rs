//! Coordinate transformation between normalized, viewport and PDF spaces
//!
//! Field geometry is stored as fractions of the page extent with a top-left
//! origin. Viewports (the rendered page in pixels) share that origin; PDF
//! pages use points with a bottom-left origin.

use serde::{Deserialize, Serialize};

use crate::error::CoordinateRangeError;

/// Pixel dimensions of a rendered page viewport
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportExtent {
    pub width: f64,
    pub height: f64,
}

impl ViewportExtent {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Whether this extent can be divided by (positive and finite on both axes)
    pub fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    fn ensure_usable(&self) -> Result<(), CoordinateRangeError> {
        if self.is_usable() {
            Ok(())
        } else {
            Err(CoordinateRangeError(format!(
                "viewport extent {}x{} must be positive",
                self.width, self.height
            )))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

/// A point in the unit square, top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizedCoordinate {
    x: f64,
    y: f64,
}

fn in_unit_range(v: f64) -> bool {
    (0.0..=1.0).contains(&v)
}

impl NormalizedCoordinate {
    pub fn new(x: f64, y: f64) -> Result<Self, CoordinateRangeError> {
        if !in_unit_range(x) || !in_unit_range(y) {
            return Err(CoordinateRangeError(format!(
                "({}, {}) is outside [0, 1]",
                x, y
            )));
        }
        Ok(Self { x, y })
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn to_viewport(&self, extent: ViewportExtent) -> PixelPoint {
        PixelPoint {
            x: self.x * extent.width,
            y: self.y * extent.height,
        }
    }

    pub fn from_viewport(
        point: PixelPoint,
        extent: ViewportExtent,
    ) -> Result<Self, CoordinateRangeError> {
        extent.ensure_usable()?;
        Self::new(point.x / extent.width, point.y / extent.height)
    }
}

/// Pixel-space box, top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Pull the box back inside the viewport: size is capped at the extent,
    /// then the origin is shifted so the far edges stay within bounds.
    pub fn clamp_to(&self, extent: ViewportExtent) -> PixelRect {
        let width = self.width.abs().min(extent.width);
        let height = self.height.abs().min(extent.height);
        let left = self.left.clamp(0.0, extent.width - width);
        let top = self.top.clamp(0.0, extent.height - height);
        PixelRect {
            left,
            top,
            width,
            height,
        }
    }

    /// Component-wise comparison within `epsilon` pixels
    pub fn approx_eq(&self, other: &PixelRect, epsilon: f64) -> bool {
        (self.left - other.left).abs() <= epsilon
            && (self.top - other.top).abs() <= epsilon
            && (self.width - other.width).abs() <= epsilon
            && (self.height - other.height).abs() <= epsilon
    }
}

/// Normalized field box: origin plus size, all fractions of the page extent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Result<Self, CoordinateRangeError> {
        NormalizedCoordinate::new(x, y)?;
        NormalizedCoordinate::new(width, height)?;
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    pub fn to_viewport(&self, extent: ViewportExtent) -> PixelRect {
        PixelRect {
            left: self.x * extent.width,
            top: self.y * extent.height,
            width: self.width * extent.width,
            height: self.height * extent.height,
        }
    }

    pub fn from_viewport(
        rect: PixelRect,
        extent: ViewportExtent,
    ) -> Result<Self, CoordinateRangeError> {
        let origin =
            NormalizedCoordinate::from_viewport(PixelPoint { x: rect.left, y: rect.top }, extent)?;
        let size = NormalizedCoordinate::from_viewport(
            PixelPoint {
                x: rect.width,
                y: rect.height,
            },
            extent,
        )?;
        Ok(Self {
            x: origin.x,
            y: origin.y,
            width: size.x,
            height: size.y,
        })
    }

    /// Project into PDF page space (bottom-left origin, points).
    ///
    /// `media_box` is `[x, y, width, height]`. Returns `[x, y, width, height]`
    /// where `(x, y)` is the lower-left corner of the box on the page.
    pub fn to_pdf(&self, media_box: [f64; 4]) -> [f64; 4] {
        let [mb_x, mb_y, mb_width, mb_height] = media_box;

        let width = self.width * mb_width;
        let height = self.height * mb_height;
        let pdf_x = mb_x + self.x * mb_width;
        // Flip Y: the top edge sits at (1 - y) of the page, the box hangs below it
        let pdf_y = mb_y + (1.0 - self.y) * mb_height - height;

        [pdf_x, pdf_y, width, height]
    }
}
