use ocrs::{ImageSource, OcrEngine, OcrEngineParams, TextItem};
use rten::Model;
use std::path::Path;

use crate::config::OcrModelConfig;
use crate::error::{Error, Result};
use crate::models::{Point, TextRegion};

/// Anything that can find and read text regions in an image file.
///
/// The engine is treated as a blocking black box. Implementations are
/// constructed once per run and passed by reference to whoever needs them.
pub trait TextDetector {
    fn detect(&mut self, image_path: &Path) -> anyhow::Result<Vec<TextRegion>>;
}

/// `ocrs`-backed detector
pub struct OcrsDetector {
    engine: OcrEngine,
}

impl OcrsDetector {
    /// Load both models and build the engine
    pub fn open(config: &OcrModelConfig) -> anyhow::Result<Self> {
        if !config.detection_model.exists() || !config.recognition_model.exists() {
            anyhow::bail!(
                "OCR models not found. Please run: ocrs-cli --help (or download models manually)\n\
                 Expected locations:\n  - {}\n  - {}",
                config.detection_model.display(),
                config.recognition_model.display()
            );
        }

        let detection_model = Model::load_file(&config.detection_model)?;
        let recognition_model = Model::load_file(&config.recognition_model)?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })?;
        tracing::info!("OCR engine initialized");

        Ok(Self { engine })
    }

    /// Release the models. Dropping has the same effect.
    pub fn close(self) {
        tracing::debug!("OCR engine released");
    }
}

impl TextDetector for OcrsDetector {
    fn detect(&mut self, image_path: &Path) -> anyhow::Result<Vec<TextRegion>> {
        let img = super::open_image(image_path)?.to_rgb8();

        let img_source = ImageSource::from_bytes(img.as_raw(), img.dimensions())?;
        let ocr_input = self.engine.prepare_input(img_source)?;

        let words = self.engine.detect_words(&ocr_input)?;
        let lines = self.engine.find_text_lines(&ocr_input, &words);
        let recognized = self.engine.recognize_text(&ocr_input, &lines)?;

        // ocrs reports no per-line score, so every recognized line passes the threshold
        Ok(recognized
            .into_iter()
            .flatten()
            .filter_map(|line| {
                let text = line.to_string();
                if text.trim().is_empty() {
                    return None;
                }
                let rect = line.bounding_rect();
                Some(TextRegion::from_rect(
                    rect.left() as f32,
                    rect.top() as f32,
                    rect.right() as f32,
                    rect.bottom() as f32,
                    text,
                    1.0,
                ))
            })
            .collect())
    }
}

/// Concatenate the confident regions of one panel in reading order.
///
/// Reading order is right-to-left, then top-to-bottom, keyed on each
/// region's first vertex. Regions with identical anchors keep their
/// detection order. Regions below `threshold` are dropped outright, and
/// the survivors are joined without a separator.
pub fn order_text_regions(regions: &[TextRegion], threshold: f32) -> String {
    let mut ordered: Vec<&TextRegion> = regions.iter().collect();
    ordered.sort_by(|a, b| {
        let (pa, pb): (Point, Point) = (a.anchor(), b.anchor());
        pb.x.total_cmp(&pa.x).then(pa.y.total_cmp(&pb.y))
    });

    ordered
        .into_iter()
        .filter(|r| r.confidence >= threshold)
        .map(|r| r.text.as_str())
        .collect()
}

/// Run OCR on one panel file and return its ordered text
pub fn extract_panel_text<D: TextDetector + ?Sized>(
    detector: &mut D,
    image_path: &Path,
    threshold: f32,
) -> Result<String> {
    if !image_path.exists() {
        return Err(Error::ImageNotFound(image_path.to_path_buf()));
    }

    let regions = detector.detect(image_path).map_err(|e| Error::Ocr {
        path: image_path.to_path_buf(),
        source: e.into(),
    })?;
    tracing::debug!("{} text regions in {:?}", regions.len(), image_path);

    Ok(order_text_regions(&regions, threshold))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(x: f32, y: f32, text: &str, confidence: f32) -> TextRegion {
        TextRegion::from_rect(x, y, x + 20.0, y + 40.0, text, confidence)
    }

    #[test]
    fn right_column_reads_first() {
        let regions = vec![
            region(10.0, 0.0, "C", 0.9),
            region(100.0, 50.0, "B", 0.9),
            region(100.0, 5.0, "A", 0.9),
        ];
        assert_eq!(order_text_regions(&regions, 0.6), "ABC");
    }

    #[test]
    fn output_ignores_discovery_order() {
        let regions = vec![
            region(300.0, 10.0, "一", 0.95),
            region(250.0, 10.0, "二", 0.7),
            region(250.0, 90.0, "三", 0.8),
            region(40.0, 0.0, "四", 0.6),
        ];
        let expected = order_text_regions(&regions, 0.6);
        assert_eq!(expected, "一二三四");

        let mut rotated = regions.clone();
        for _ in 0..regions.len() {
            rotated.rotate_left(1);
            assert_eq!(order_text_regions(&rotated, 0.6), expected);
        }
        let reversed: Vec<_> = regions.iter().rev().cloned().collect();
        assert_eq!(order_text_regions(&reversed, 0.6), expected);
    }

    #[test]
    fn low_confidence_regions_are_dropped() {
        let regions = vec![
            region(200.0, 0.0, "keep", 0.6),
            region(150.0, 0.0, "noise", 0.59),
            region(100.0, 0.0, "also", 0.99),
        ];
        let text = order_text_regions(&regions, 0.6);
        assert_eq!(text, "keepalso");
        assert!(!text.contains("noise"));
    }

    #[test]
    fn nothing_confident_gives_empty_string() {
        let regions = vec![region(0.0, 0.0, "x", 0.1)];
        assert_eq!(order_text_regions(&regions, 0.6), "");
        assert_eq!(order_text_regions(&[], 0.6), "");
    }

    #[test]
    fn identical_anchors_keep_detection_order() {
        let regions = vec![
            region(50.0, 50.0, "first", 0.9),
            region(50.0, 50.0, "second", 0.9),
        ];
        assert_eq!(order_text_regions(&regions, 0.6), "firstsecond");
    }

    struct NeverCalled;

    impl TextDetector for NeverCalled {
        fn detect(&mut self, image_path: &Path) -> anyhow::Result<Vec<TextRegion>> {
            panic!("detector called for {:?}", image_path);
        }
    }

    #[test]
    fn missing_panel_is_an_error() {
        let err = extract_panel_text(&mut NeverCalled, Path::new("/no/such/panel_1.jpg"), 0.6)
            .unwrap_err();
        assert!(matches!(err, Error::ImageNotFound(_)));
    }
}
