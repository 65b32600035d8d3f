use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};
use imageproc::point::Point;

use crate::models::{BoundingBox, PanelContour};

/// Trace the outermost contours of a binary edge image.
///
/// Only top-level outer borders are returned since panels do not nest.
/// Contours come back in the tracer's discovery order (raster order of
/// their first pixel), which is not reading order.
pub fn find_external_contours(edges: &GrayImage) -> Vec<PanelContour> {
    find_contours::<i32>(edges)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .filter_map(|c| {
            let chain = compress_chain(&c.points);
            let bbox = bounding_rect(&chain)?;
            Some(PanelContour {
                bbox,
                area: polygon_area(&chain),
            })
        })
        .collect()
}

/// Keep only the corner points of a closed chain, dropping points that
/// continue a straight horizontal, vertical or diagonal run.
pub fn compress_chain(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    let step = |a: Point<i32>, b: Point<i32>| ((b.x - a.x).signum(), (b.y - a.y).signum());

    let corners: Vec<Point<i32>> = (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            step(prev, points[i]) != step(points[i], next)
        })
        .map(|i| points[i])
        .collect();

    // A degenerate chain (e.g. a straight line traced out and back) keeps its ends
    if corners.is_empty() {
        points.to_vec()
    } else {
        corners
    }
}

/// Smallest upright rectangle containing every point, in pixel units
pub fn bounding_rect(points: &[Point<i32>]) -> Option<BoundingBox> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    if min_x < 0 || min_y < 0 {
        return None;
    }
    Some(BoundingBox::new(
        min_x as u32,
        min_y as u32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    ))
}

/// Area enclosed by a closed polygon through pixel centers
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    twice.abs() as f64 / 2.0
}

/// Candidate panel boxes, in contour discovery order
pub fn find_panel_boxes(
    edges: &GrayImage,
    min_area: u32,
    max_area: u32,
    min_aspect: f32,
    max_aspect: f32,
) -> Vec<BoundingBox> {
    find_external_contours(edges)
        .into_iter()
        .filter(|c| c.is_plausible_panel(min_area, max_area, min_aspect, max_aspect))
        .map(|c| c.bbox)
        .collect()
}
