use image::{DynamicImage, GrayImage};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::dilate;

use crate::config::SegmentationParams;
use crate::error::{Error, Result};

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Gaussian blur to suppress print halftone noise
pub fn apply_blur(img: &GrayImage, sigma: f32) -> GrayImage {
    gaussian_blur_f32(img, sigma)
}

/// Detect edges using Canny edge detector
pub fn detect_edges(img: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    canny(img, low_threshold, high_threshold)
}

/// Grow edges by `radius` in every direction (a square of side `2 * radius + 1`)
pub fn dilate_edges(edges: &GrayImage, radius: u8) -> GrayImage {
    if radius == 0 {
        return edges.clone();
    }
    dilate(edges, Norm::LInf, radius)
}

/// Binary edge map of a page: non-zero pixels are panel borders.
///
/// Dilation closes the gaps that compression artifacts and bleed leave in
/// gutters, so borders come out as closed contours.
pub fn preprocess_page(img: &DynamicImage, params: &SegmentationParams) -> Result<GrayImage> {
    if img.width() == 0 || img.height() == 0 {
        return Err(Error::EmptyRaster {
            width: img.width(),
            height: img.height(),
        });
    }
    let gray = to_grayscale(img);
    let blurred = apply_blur(&gray, params.blur_sigma());
    let edges = detect_edges(&blurred, params.canny_low, params.canny_high);
    Ok(dilate_edges(&edges, params.dilation_radius()))
}
