use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use panelscan::{
    IndexOptions, IndexStore, Indexer, OcrModelConfig, OcrsDetector, PanelSegmenter,
    PersistMode, SearchEngine, SegmentationParams,
};

#[derive(Parser)]
#[command(name = "panelscan")]
#[command(about = "Cut comic pages into panels, OCR their dialogue and search it")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split page images into panel images
    Split {
        /// A page image, or a directory of pages (searched recursively)
        #[arg(value_name = "PAGES")]
        pages: PathBuf,

        /// Where panel images are written
        #[arg(short, long, default_value = "data/panels")]
        out: PathBuf,

        #[arg(long, default_value_t = 5_000)]
        min_area: u32,

        #[arg(long, default_value_t = 1_000_000)]
        max_area: u32,

        /// Save intermediate images to directory (must be empty)
        #[arg(long, value_name = "DIR")]
        debug_out: Option<PathBuf>,
    },

    /// OCR every panel not yet in the index
    Index {
        /// Directory of panel images (searched recursively)
        #[arg(value_name = "PANELS", default_value = "data/panels")]
        panels: PathBuf,

        #[arg(long, default_value = "data/panel_index.json")]
        index: PathBuf,

        /// Minimum recognition confidence for a text region
        #[arg(long, default_value_t = 0.6)]
        threshold: f32,

        /// Stop after sending this many panels to OCR
        #[arg(long)]
        limit: Option<usize>,

        /// Append entries to a journal instead of rewriting the snapshot each time
        #[arg(long)]
        journal: bool,

        /// Text detection model (default: ~/.cache/ocrs/text-detection.rten)
        #[arg(long, requires = "rec_model")]
        det_model: Option<PathBuf>,

        /// Text recognition model (default: ~/.cache/ocrs/text-recognition.rten)
        #[arg(long, requires = "det_model")]
        rec_model: Option<PathBuf>,
    },

    /// Find panels whose text contains a query (read from stdin if omitted)
    Search {
        #[arg(value_name = "QUERY")]
        query: Option<String>,

        #[arg(long, default_value = "data/panel_index.json")]
        index: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match args.command {
        Command::Split { pages, out, min_area, max_area, debug_out } => {
            let params = SegmentationParams {
                min_area,
                max_area,
                ..Default::default()
            };
            let mut segmenter = PanelSegmenter::new(params);
            if let Some(debug_dir) = debug_out {
                segmenter = segmenter.with_debug(debug_dir)?;
            }

            if pages.is_dir() {
                let report = segmenter.split_directory(&pages, &out)?;
                println!(
                    "Split {} pages into {} panels ({} skipped)",
                    report.pages, report.panels, report.skipped_pages
                );
            } else {
                let count = segmenter.split_page(&pages, &out)?;
                println!("Split {} into {} panels", pages.display(), count);
            }
        }

        Command::Index { panels, index, threshold, limit, journal, det_model, rec_model } => {
            let models = match (det_model, rec_model) {
                (Some(det), Some(rec)) => OcrModelConfig::new(det, rec),
                _ => OcrModelConfig::from_cache_dir()?,
            };
            let mode = if journal { PersistMode::Journal } else { PersistMode::Snapshot };

            let mut store = IndexStore::open(&index, mode)
                .with_context(|| format!("Failed to load index {}", index.display()))?;
            let mut detector = OcrsDetector::open(&models)?;

            let report = Indexer::new(&mut store, &mut detector)
                .with_options(IndexOptions { confidence_threshold: threshold, limit })
                .index_directory(&panels)?;

            detector.close();
            let total = store.len();
            store.close()?;

            println!(
                "Indexed {} new panels ({} already indexed, {} without text, {} failed); {} total",
                report.indexed, report.already_indexed, report.empty, report.failed, total
            );
        }

        Command::Search { query, index } => {
            let store = IndexStore::open(&index, PersistMode::Journal)
                .with_context(|| format!("Failed to load index {}", index.display()))?;

            let query = match query {
                Some(query) => query,
                None => {
                    println!("Enter the text to search for: ");
                    let mut line = String::new();
                    std::io::stdin().lock().read_line(&mut line)?;
                    line.trim_end_matches(['\r', '\n']).to_string()
                }
            };

            let hits = SearchEngine::new(store.entries()).query(&query);
            if hits.is_empty() {
                println!("No panels found.");
            } else {
                println!("Found {} panels:", hits.len());
                for hit in hits {
                    println!("{} with text {}", hit.panel, hit.text);
                }
            }
        }
    }

    Ok(())
}
