use image::DynamicImage;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use anyhow::Result;

use crate::models::BoundingBox;

/// Data that flows through the pipeline
/// Each PipelineData is either a whole page or one region cut out of it
#[derive(Clone)]
pub struct PipelineData {
    /// The working image (edge map, grayscale, or a color crop)
    pub image: DynamicImage,

    /// The page as decoded, shared by every region cut from it
    pub original: Arc<DynamicImage>,

    /// Region of the original page (None means the full page)
    pub bbox: Option<BoundingBox>,

    pub metadata: HashMap<String, MetadataValue>,
}

#[derive(Debug, Clone)]
pub enum MetadataValue {
    Float(f32),
    Int(i64),
}

impl PipelineData {
    /// Create PipelineData for a full image
    pub fn from_image(image: DynamicImage) -> Self {
        let original = Arc::new(image.clone());
        Self {
            image,
            original,
            bbox: None,
            metadata: HashMap::new(),
        }
    }

    /// Create PipelineData for a region of an image
    pub fn from_region(
        image: DynamicImage,
        original: Arc<DynamicImage>,
        bbox: BoundingBox,
    ) -> Self {
        Self {
            image,
            original,
            bbox: Some(bbox),
            metadata: HashMap::new(),
        }
    }

    /// Same region and metadata, different working image
    pub fn with_image(&self, image: DynamicImage) -> Self {
        Self {
            image,
            original: self.original.clone(),
            bbox: self.bbox,
            metadata: self.metadata.clone(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn get_float(&self, key: &str) -> Option<f32> {
        match self.metadata.get(key) {
            Some(MetadataValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.metadata.get(key) {
            Some(MetadataValue::Int(v)) => Some(*v),
            _ => None,
        }
    }
}

/// Where intermediate step images are dumped
#[derive(Clone, Debug)]
pub struct DebugConfig {
    pub output_dir: PathBuf,
}

/// Context available to all pipeline steps
#[derive(Clone, Default)]
pub struct PipelineContext {
    pub debug: Option<DebugConfig>,
}

/// Trait that all pipeline steps must implement
pub trait PipelineStep: Send + Sync {
    /// Steps can split data (1 → many), filter (many → fewer), or transform (many → many)
    fn process(&self, data: Vec<PipelineData>, context: &PipelineContext) -> Result<Vec<PipelineData>>;

    /// Human-readable name, also used for debug directory names
    fn name(&self) -> &str;
}

/// Composable pipeline builder
pub struct Pipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
    context: PipelineContext,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            context: PipelineContext::default(),
        }
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.context.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    /// Same pipeline, debug images go to `output_dir` (created if missing, not checked for emptiness)
    pub fn with_debug_subdir(&self, output_dir: PathBuf) -> Self {
        Self {
            steps: self.steps.clone(),
            context: PipelineContext {
                debug: Some(DebugConfig { output_dir }),
            },
        }
    }

    pub fn debug_dir(&self) -> Option<&std::path::Path> {
        self.context.debug.as_ref().map(|d| d.output_dir.as_path())
    }

    pub fn add_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    fn save_debug(&self, dir_name: &str, data: &[PipelineData]) -> Result<()> {
        let Some(debug_config) = &self.context.debug else {
            return Ok(());
        };
        let step_dir = debug_config.output_dir.join(dir_name);
        std::fs::create_dir_all(&step_dir)?;

        for (idx, item) in data.iter().enumerate() {
            let output_path = step_dir.join(format!("{:02}.png", idx + 1));
            item.image.save(&output_path)
                .map_err(|e| anyhow::anyhow!("Failed to save debug image: {}", e))?;
        }
        tracing::debug!("saved {} debug images to {}/", data.len(), dir_name);
        Ok(())
    }

    /// Run every step in order on a single input image
    pub fn run(&self, input: DynamicImage) -> Result<Vec<PipelineData>> {
        let mut data = vec![PipelineData::from_image(input)];
        self.save_debug("00_input", &data)?;

        for (step_idx, step) in self.steps.iter().enumerate() {
            tracing::debug!("running step: {} ({} items)", step.name(), data.len());
            data = step.process(data, &self.context)?;

            let step_dir_name = format!("{:02}_{}", step_idx + 1,
                step.name().to_lowercase().replace(' ', "_"));
            self.save_debug(&step_dir_name, &data)?;
            tracing::debug!("  → {} items", data.len());
        }

        Ok(data)
    }

    /// Run only the first `num_steps` steps (useful for inspecting intermediates)
    pub fn run_partial(&self, input: DynamicImage, num_steps: usize) -> Result<Vec<PipelineData>> {
        let mut data = vec![PipelineData::from_image(input)];
        for step in self.steps.iter().take(num_steps) {
            data = step.process(data, &self.context)?;
        }
        Ok(data)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
