use std::path::{Path, PathBuf};

/// Tunables for turning a page into panel crops.
///
/// The defaults suit ~1000px-tall scans of printed comics; art density and
/// scan resolution vary per source, so every threshold is adjustable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentationParams {
    /// Side of the square Gaussian kernel. The sigma is derived from it.
    pub blur_kernel: u32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Side of the square dilation kernel (one iteration).
    pub dilation_kernel: u32,
    /// Contours with a filled area at or below this are noise.
    pub min_area: u32,
    /// Contours with a filled area at or above this are whole-page outlines.
    pub max_area: u32,
    pub min_aspect: f32,
    pub max_aspect: f32,
}

impl SegmentationParams {
    /// Sigma for `blur_kernel`, using the same derivation as a zero sigma in OpenCV.
    pub fn blur_sigma(&self) -> f32 {
        let k = self.blur_kernel.max(1) as f32;
        0.3 * ((k - 1.0) * 0.5 - 1.0) + 0.8
    }

    /// Chebyshev radius of the dilation square.
    pub fn dilation_radius(&self) -> u8 {
        (self.dilation_kernel / 2).min(u8::MAX as u32) as u8
    }
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            blur_kernel: 5,
            canny_low: 100.0,
            canny_high: 200.0,
            dilation_kernel: 5,
            min_area: 5_000,
            max_area: 1_000_000,
            min_aspect: 0.1,
            max_aspect: 10.0,
        }
    }
}

/// Locations of the `ocrs` detection and recognition models.
#[derive(Debug, Clone)]
pub struct OcrModelConfig {
    pub detection_model: PathBuf,
    pub recognition_model: PathBuf,
}

impl OcrModelConfig {
    pub fn new(detection_model: impl AsRef<Path>, recognition_model: impl AsRef<Path>) -> Self {
        Self {
            detection_model: detection_model.as_ref().to_path_buf(),
            recognition_model: recognition_model.as_ref().to_path_buf(),
        }
    }

    /// Models in `~/.cache/ocrs`, where `ocrs-cli` downloads them.
    pub fn from_cache_dir() -> anyhow::Result<Self> {
        let home_dir = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE"))?;
        let cache_dir = Path::new(&home_dir).join(".cache/ocrs");
        Ok(Self::new(
            cache_dir.join("text-detection.rten"),
            cache_dir.join("text-recognition.rten"),
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexOptions {
    /// Text regions scoring below this are dropped.
    pub confidence_threshold: f32,
    /// Maximum number of panels sent to OCR in one run.
    pub limit: Option<usize>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            limit: None,
        }
    }
}
