//! Boundary with the document rasterizer.
//!
//! Turning a PDF (or any paged document) into page images is left to an
//! external backend implementing [`PageRasterizer`]; this module owns the
//! page-range rules and the on-disk naming of the pages it produces.

use image::DynamicImage;
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Pages to drop from the start (front matter) and end (back cover) of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageRange {
    pub start_skip: usize,
    pub end_skip: usize,
}

impl PageRange {
    pub fn new(start_skip: usize, end_skip: usize) -> Self {
        Self { start_skip, end_skip }
    }

    /// Zero-based indices of the retained pages of a `total_pages` document
    pub fn resolve(&self, total_pages: usize) -> Result<Range<usize>> {
        let start = self.start_skip;
        let end = total_pages.saturating_sub(self.end_skip);
        if start >= end {
            return Err(Error::EmptyPageRange { start, end });
        }
        Ok(start..end)
    }
}

pub trait PageRasterizer {
    fn page_count(&mut self, document: &Path) -> anyhow::Result<usize>;

    /// Render the zero-based page `index` as an RGB raster
    fn render_page(&mut self, document: &Path, index: usize) -> anyhow::Result<DynamicImage>;
}

/// File name of a page, numbered from 1
pub fn page_file_name(page_number: usize) -> String {
    format!("page_{}.png", page_number)
}

/// Render the retained pages of `document` into `output_dir/page_<n>.png`.
pub fn rasterize_document<R: PageRasterizer + ?Sized>(
    rasterizer: &mut R,
    document: &Path,
    output_dir: &Path,
    range: PageRange,
) -> anyhow::Result<Vec<PathBuf>> {
    if !document.exists() {
        return Err(Error::DocumentNotFound(document.to_path_buf()).into());
    }

    let total = rasterizer.page_count(document)?;
    let pages = range.resolve(total)?;
    std::fs::create_dir_all(output_dir)?;

    let mut written = Vec::with_capacity(pages.len());
    for index in pages {
        let page = rasterizer.render_page(document, index)?;
        let output_path = output_dir.join(page_file_name(index + 1));
        DynamicImage::ImageRgb8(page.to_rgb8())
            .save(&output_path)
            .map_err(|source| Error::Encode { path: output_path.clone(), source })?;
        written.push(output_path);
    }

    tracing::info!("rasterized {} pages of {:?}", written.len(), document);
    Ok(written)
}
