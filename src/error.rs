use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Image not found: {0:?}")]
    ImageNotFound(PathBuf),

    #[error("Document not found: {0:?}")]
    DocumentNotFound(PathBuf),

    #[error("Page raster is empty ({width}x{height})")]
    EmptyRaster { width: u32, height: u32 },

    #[error("Empty page range: start page {start} >= end page {end}")]
    EmptyPageRange { start: usize, end: usize },

    #[error("Failed to decode image {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to save image {path:?}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("OCR failed for {path:?}: {source}")]
    Ocr {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Corrupt index {path:?}: {reason}")]
    CorruptIndex { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
