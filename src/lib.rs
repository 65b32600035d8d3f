pub mod config;
pub mod core;
pub mod detection;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod raster;

pub use config::{IndexOptions, OcrModelConfig, SegmentationParams};
pub use crate::core::{IndexReport, IndexStore, Indexer, PersistMode, SearchEngine, SearchHit};
pub use detection::{PanelSegmenter, SegmentationReport};
pub use detection::ocr::{OcrsDetector, TextDetector, extract_panel_text, order_text_regions};
pub use error::{Error, Result};
pub use models::{BoundingBox, PanelContour, Point, TextRegion};
pub use pipeline::{Pipeline, PipelineContext, PipelineData, PipelineStep, MetadataValue};
