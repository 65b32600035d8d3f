pub mod preprocessing;
pub mod contours;
pub mod ocr;
pub mod steps;

use anyhow::Context;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::config::SegmentationParams;
use crate::error::Error;
use crate::models::BoundingBox;
use crate::pipeline::Pipeline;

/// Extensions recognised as page or panel rasters
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

/// File name of the `ordinal`-th (1-based) panel of a page
pub fn panel_file_name(ordinal: usize) -> String {
    format!("panel_{}.jpg", ordinal)
}

/// Decode an image file, telling a missing file apart from an unreadable one
pub fn open_image(path: &Path) -> crate::error::Result<DynamicImage> {
    if !path.exists() {
        return Err(Error::ImageNotFound(path.to_path_buf()));
    }
    image::open(path).map_err(|source| Error::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Totals for a batch segmentation run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SegmentationReport {
    pub pages: usize,
    pub skipped_pages: usize,
    pub panels: usize,
}

/// Cuts comic pages into panel images
pub struct PanelSegmenter {
    pub params: SegmentationParams,
    pipeline: Pipeline,
}

impl PanelSegmenter {
    pub fn new(params: SegmentationParams) -> Self {
        Self {
            params,
            pipeline: build_panel_pipeline(&params),
        }
    }

    /// Dump every intermediate image under `output_dir` (must be empty or absent)
    pub fn with_debug(mut self, output_dir: PathBuf) -> anyhow::Result<Self> {
        self.pipeline = self.pipeline.with_debug(output_dir)?;
        Ok(self)
    }

    /// Panel boxes of a decoded page, in contour discovery order
    pub fn detect_panels(&self, img: &DynamicImage) -> anyhow::Result<Vec<BoundingBox>> {
        let edges = preprocessing::preprocess_page(img, &self.params)?;
        Ok(contours::find_panel_boxes(
            &edges,
            self.params.min_area,
            self.params.max_area,
            self.params.min_aspect,
            self.params.max_aspect,
        ))
    }

    /// Split one page into `output_dir/panel_<n>.jpg`, returning the panel count.
    ///
    /// A page that cannot be decoded is logged and skipped with a count of
    /// zero so one corrupt scan does not stop a batch. Existing panel files
    /// with the same names are overwritten.
    pub fn split_page(&self, page_path: &Path, output_dir: &Path) -> anyhow::Result<usize> {
        Ok(self.split_page_with(&self.pipeline, page_path, output_dir)?.unwrap_or(0))
    }

    /// `None` means the page was skipped as undecodable
    fn split_page_with(
        &self,
        pipeline: &Pipeline,
        page_path: &Path,
        output_dir: &Path,
    ) -> anyhow::Result<Option<usize>> {
        let img = match open_image(page_path) {
            Ok(img) => img,
            Err(e @ Error::Decode { .. }) => {
                tracing::warn!("skipping undecodable page: {}", e);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create panel directory {:?}", output_dir))?;

        let panels = pipeline.run(img)?;
        for (idx, panel) in panels.iter().enumerate() {
            let output_path = output_dir.join(panel_file_name(idx + 1));
            // JPEG has no alpha channel, crop pixels are otherwise untouched
            DynamicImage::ImageRgb8(panel.image.to_rgb8())
                .save(&output_path)
                .map_err(|source| Error::Encode { path: output_path.clone(), source })?;
        }

        tracing::info!("{:?}: {} panels", page_path, panels.len());
        Ok(Some(panels.len()))
    }

    /// Split every page under `pages_root`, mirroring the tree under `panels_root`.
    ///
    /// `pages_root/ch_01/page_8.png` lands in `panels_root/ch_01/page_8/`.
    /// Failures are per page: they are logged and counted, never fatal.
    pub fn split_directory(
        &self,
        pages_root: &Path,
        panels_root: &Path,
    ) -> anyhow::Result<SegmentationReport> {
        if !pages_root.is_dir() {
            anyhow::bail!("Page directory does not exist: {}", pages_root.display());
        }

        let mut report = SegmentationReport::default();

        for entry in WalkDir::new(pages_root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|res| res.ok())
        {
            if !entry.file_type().is_file() || !is_image_file(entry.path()) {
                continue;
            }
            report.pages += 1;

            let page_path = entry.path();
            let relative = page_path.strip_prefix(pages_root).unwrap_or(page_path);
            let page_id = relative.with_extension("");
            let output_dir = panels_root.join(&page_id);

            let page_pipeline = self
                .pipeline
                .debug_dir()
                .map(|debug_root| self.pipeline.with_debug_subdir(debug_root.join(&page_id)));
            let pipeline = page_pipeline.as_ref().unwrap_or(&self.pipeline);

            match self.split_page_with(pipeline, page_path, &output_dir) {
                Ok(Some(count)) => report.panels += count,
                Ok(None) => report.skipped_pages += 1,
                Err(e) => {
                    tracing::warn!("failed to split {:?}: {:#}", page_path, e);
                    report.skipped_pages += 1;
                }
            }
        }

        tracing::info!(
            "segmented {} pages into {} panels ({} skipped)",
            report.pages, report.panels, report.skipped_pages
        );
        Ok(report)
    }
}

impl Default for PanelSegmenter {
    fn default() -> Self {
        Self::new(SegmentationParams::default())
    }
}

/// Page → edge map → panel crops, as a composable pipeline
pub fn build_panel_pipeline(params: &SegmentationParams) -> Pipeline {
    use crate::detection::steps::*;

    Pipeline::new()
        .add_step(Arc::new(GrayscaleStep))
        .add_step(Arc::new(BlurStep { sigma: params.blur_sigma() }))
        .add_step(Arc::new(EdgeDetectionStep {
            low_threshold: params.canny_low,
            high_threshold: params.canny_high,
        }))
        .add_step(Arc::new(DilateStep { radius: params.dilation_radius() }))
        .add_step(Arc::new(PanelExtractionStep {
            min_area: params.min_area,
            max_area: params.max_area,
            min_aspect: params.min_aspect,
            max_aspect: params.max_aspect,
        }))
}
