use serde::{Deserialize, Serialize};

/// Axis-aligned box in page pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f32 / self.height as f32
    }

    /// True if the box is non-empty and lies inside a `width` x `height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }
}

/// An external contour reduced to what panel filtering needs
#[derive(Debug, Clone, PartialEq)]
pub struct PanelContour {
    pub bbox: BoundingBox,
    /// Area enclosed by the contour polygon (shoelace formula)
    pub area: f64,
}

impl PanelContour {
    pub fn aspect_ratio(&self) -> f32 {
        self.bbox.aspect_ratio()
    }

    /// Both gates are open intervals: a contour sitting exactly on a bound is rejected.
    pub fn is_plausible_panel(
        &self,
        min_area: u32,
        max_area: u32,
        min_aspect: f32,
        max_aspect: f32,
    ) -> bool {
        let aspect = self.aspect_ratio();
        self.area > min_area as f64
            && self.area < max_area as f64
            && aspect > min_aspect
            && aspect < max_aspect
    }
}

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

/// One text detection returned by an OCR engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRegion {
    /// Quadrilateral around the text, first vertex is the ordering anchor
    pub quad: [Point; 4],
    pub text: String,
    /// Recognition confidence in [0, 1]
    pub confidence: f32,
}

impl TextRegion {
    pub fn new(quad: [Point; 4], text: impl Into<String>, confidence: f32) -> Self {
        Self {
            quad,
            text: text.into(),
            confidence,
        }
    }

    /// Region whose quad is the axis-aligned rectangle at (`left`, `top`).
    pub fn from_rect(
        left: f32,
        top: f32,
        right: f32,
        bottom: f32,
        text: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self::new(
            [
                Point::new(left, top),
                Point::new(right, top),
                Point::new(right, bottom),
                Point::new(left, bottom),
            ],
            text,
            confidence,
        )
    }

    pub fn anchor(&self) -> Point {
        self.quad[0]
    }
}
