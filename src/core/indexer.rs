use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::config::IndexOptions;
use crate::core::index::IndexStore;
use crate::detection::is_image_file;
use crate::detection::ocr::{TextDetector, extract_panel_text};
use crate::error::Result;

/// Index identity of a panel: its absolute path with `.` and `..` folded away.
///
/// The folding is lexical, symlinks are left alone.
pub fn panel_key(path: &Path) -> std::io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut key = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            // popping at the root is a no-op, as for `/..`
            Component::ParentDir => {
                key.pop();
            }
            other => key.push(other.as_os_str()),
        }
    }
    Ok(key)
}

/// Totals for one indexing run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexReport {
    /// Panels committed during this run
    pub indexed: usize,
    /// Panels skipped because a previous run indexed them
    pub already_indexed: usize,
    /// Panels whose text came back empty (retried next run)
    pub empty: usize,
    /// Panels whose OCR failed
    pub failed: usize,
}

/// Drives OCR over a panel tree into an [`IndexStore`].
///
/// Every committed panel is on disk before the next one is read, so an
/// interrupted run loses at most the panel in flight and a restart picks up
/// where it stopped.
pub struct Indexer<'a, D: TextDetector + ?Sized> {
    store: &'a mut IndexStore,
    detector: &'a mut D,
    options: IndexOptions,
}

impl<'a, D: TextDetector + ?Sized> Indexer<'a, D> {
    pub fn new(store: &'a mut IndexStore, detector: &'a mut D) -> Self {
        Self {
            store,
            detector,
            options: IndexOptions::default(),
        }
    }

    pub fn with_options(mut self, options: IndexOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.options.confidence_threshold = threshold;
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.options.limit = limit;
        self
    }

    /// Index every panel image under `root`.
    ///
    /// Per-panel OCR failures are logged and counted. A failed write to the
    /// index aborts the run.
    pub fn index_directory(&mut self, root: &Path) -> Result<IndexReport> {
        if !root.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("panel directory does not exist: {}", root.display()),
            )
            .into());
        }

        let mut report = IndexReport::default();
        let mut attempted = 0usize;

        for entry in WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|res| res.ok())
        {
            if !entry.file_type().is_file() || !is_image_file(entry.path()) {
                continue;
            }

            let panel_path = panel_key(entry.path())?;
            let panel = panel_path.to_string_lossy().into_owned();
            if self.store.has(&panel) {
                report.already_indexed += 1;
                continue;
            }

            if self.options.limit.is_some_and(|limit| attempted >= limit) {
                tracing::info!("panel limit of {} reached", attempted);
                break;
            }
            attempted += 1;

            let text = match extract_panel_text(
                &mut *self.detector,
                &panel_path,
                self.options.confidence_threshold,
            ) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("error processing {:?}: {}", panel_path, e);
                    report.failed += 1;
                    continue;
                }
            };

            if text.trim().is_empty() {
                tracing::debug!("no confident text in {:?}", panel_path);
                report.empty += 1;
                continue;
            }

            self.store.commit(panel, text)?;
            report.indexed += 1;
            tracing::info!("updated index with {:?}", panel_path);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn dot_segments_fold_away() {
        let key = panel_key(Path::new("/data/panels/../panels/./ch_01/panel_1.jpg")).unwrap();
        assert_eq!(key, PathBuf::from("/data/panels/ch_01/panel_1.jpg"));
        assert_eq!(panel_key(Path::new("/../p/panel_1.jpg")).unwrap(), PathBuf::from("/p/panel_1.jpg"));
    }

    #[test]
    fn relative_paths_become_absolute() {
        let key = panel_key(Path::new("panels/../panels/panel_1.jpg")).unwrap();
        assert!(key.is_absolute());
        assert!(key.ends_with("panels/panel_1.jpg"));
        assert!(!key.components().any(|c| matches!(c, Component::ParentDir | Component::CurDir)));
    }
}
