use crate::pipeline::{PipelineData, PipelineStep, PipelineContext, MetadataValue};
use crate::detection::{preprocessing, contours};
use anyhow::Result;
use image::DynamicImage;

/// Convert image to grayscale
pub struct GrayscaleStep;

impl PipelineStep for GrayscaleStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        Ok(data
            .iter()
            .map(|item| item.with_image(DynamicImage::ImageLuma8(preprocessing::to_grayscale(&item.image))))
            .collect())
    }

    fn name(&self) -> &str {
        "Grayscale Conversion"
    }
}

/// Apply Gaussian blur
pub struct BlurStep {
    pub sigma: f32,
}

impl PipelineStep for BlurStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        Ok(data
            .iter()
            .map(|item| {
                let blurred = preprocessing::apply_blur(&item.image.to_luma8(), self.sigma);
                item.with_image(DynamicImage::ImageLuma8(blurred))
            })
            .collect())
    }

    fn name(&self) -> &str {
        "Gaussian Blur"
    }
}

/// Detect edges using Canny
pub struct EdgeDetectionStep {
    pub low_threshold: f32,
    pub high_threshold: f32,
}

impl PipelineStep for EdgeDetectionStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        Ok(data
            .iter()
            .map(|item| {
                let edges = preprocessing::detect_edges(
                    &item.image.to_luma8(),
                    self.low_threshold,
                    self.high_threshold,
                );
                item.with_image(DynamicImage::ImageLuma8(edges))
            })
            .collect())
    }

    fn name(&self) -> &str {
        "Edge Detection"
    }
}

/// Thicken edges so broken gutters close into loops
pub struct DilateStep {
    pub radius: u8,
}

impl PipelineStep for DilateStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        Ok(data
            .iter()
            .map(|item| {
                let dilated = preprocessing::dilate_edges(&item.image.to_luma8(), self.radius);
                item.with_image(DynamicImage::ImageLuma8(dilated))
            })
            .collect())
    }

    fn name(&self) -> &str {
        "Dilation"
    }
}

/// Find panel contours in the edge map - splits one page into many panel crops
///
/// Crops are cut from the original color page, not the edge map. Each output
/// carries its 1-based detection ordinal under `"ordinal"`.
pub struct PanelExtractionStep {
    pub min_area: u32,
    pub max_area: u32,
    pub min_aspect: f32,
    pub max_aspect: f32,
}

impl PipelineStep for PanelExtractionStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();

        for item in data {
            let edges = item.image.to_luma8();
            let candidates = contours::find_external_contours(&edges);
            let total = candidates.len();

            let panels = candidates.into_iter().filter(|c| {
                c.is_plausible_panel(self.min_area, self.max_area, self.min_aspect, self.max_aspect)
            });

            let mut kept = 0;
            for contour in panels {
                let bbox = contour.bbox;
                if !bbox.fits_within(item.original.width(), item.original.height()) {
                    anyhow::bail!("Contour box {:?} lies outside the page", bbox);
                }
                kept += 1;

                let cropped = item.original.crop_imm(bbox.x, bbox.y, bbox.width, bbox.height);
                let panel = PipelineData::from_region(cropped, item.original.clone(), bbox)
                    .with_metadata("ordinal", MetadataValue::Int(kept))
                    .with_metadata("contour_area", MetadataValue::Float(contour.area as f32))
                    .with_metadata("aspect_ratio", MetadataValue::Float(contour.aspect_ratio()));
                result.push(panel);
            }

            tracing::debug!("kept {} of {} contours as panels", kept, total);
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "Panel Extraction"
    }
}
