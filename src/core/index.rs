use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// How committed entries reach the disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistMode {
    /// Rewrite the whole snapshot on every persist
    #[default]
    Snapshot,
    /// Append each entry to `<snapshot>.journal`, fold into the snapshot on close
    Journal,
}

#[derive(Serialize, Deserialize)]
struct JournalRecord {
    path: String,
    text: String,
}

/// Durable mapping of panel path to extracted text.
///
/// Keys are absolute panel paths with `.` and `..` folded away. An entry is written once and never
/// recomputed; empty text is never stored. The store does not check that
/// keys still point at existing files.
#[derive(Debug)]
pub struct IndexStore {
    path: PathBuf,
    mode: PersistMode,
    entries: HashMap<String, String>,
    pending: Vec<String>,
}

impl IndexStore {
    /// Load the snapshot at `path` in snapshot mode
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path, PersistMode::Snapshot)
    }

    /// Load the snapshot at `path`, or start empty if there is none.
    ///
    /// Any journal left next to the snapshot is replayed regardless of
    /// `mode`, so switching modes never loses entries.
    pub fn open(path: impl AsRef<Path>, mode: PersistMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut entries = if path.is_file() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str::<HashMap<String, String>>(&raw).map_err(|e| {
                Error::CorruptIndex {
                    path: path.clone(),
                    reason: e.to_string(),
                }
            })?
        } else {
            HashMap::new()
        };
        let snapshot_len = entries.len();

        let journal = journal_path(&path);
        let replayed = if journal.is_file() {
            replay_journal(&journal, &mut entries)?
        } else {
            0
        };

        tracing::info!(
            "loaded index {:?}: {} entries ({} from journal)",
            path, snapshot_len + replayed, replayed
        );

        let mut store = Self {
            path,
            mode,
            entries,
            pending: Vec::new(),
        };

        // Snapshot mode has no journal of its own; absorb the leftover one now
        if replayed > 0 && mode == PersistMode::Snapshot {
            store.compact()?;
        }
        Ok(store)
    }

    pub fn has(&self, panel: &str) -> bool {
        self.entries.contains_key(panel)
    }

    pub fn get(&self, panel: &str) -> Option<&str> {
        self.entries.get(panel).map(String::as_str)
    }

    pub fn entries(&self) -> &HashMap<String, String> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stage an entry for the next `persist`.
    ///
    /// Returns false (and does nothing) for whitespace-only text or for a
    /// panel that is already indexed.
    pub fn put(&mut self, panel: impl Into<String>, text: impl Into<String>) -> bool {
        let (panel, text) = (panel.into(), text.into());
        if text.trim().is_empty() || self.entries.contains_key(&panel) {
            return false;
        }
        self.entries.insert(panel.clone(), text);
        self.pending.push(panel);
        true
    }

    /// Flush every staged entry to disk
    pub fn persist(&mut self) -> Result<()> {
        match self.mode {
            PersistMode::Snapshot => self.write_snapshot()?,
            PersistMode::Journal => self.append_journal()?,
        }
        self.pending.clear();
        Ok(())
    }

    /// `put` then `persist`; returns whether the entry was new
    pub fn commit(&mut self, panel: impl Into<String>, text: impl Into<String>) -> Result<bool> {
        if !self.put(panel, text) {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    /// Write the full snapshot and drop the journal
    pub fn compact(&mut self) -> Result<()> {
        self.write_snapshot()?;
        self.pending.clear();
        let journal = journal_path(&self.path);
        if journal.exists() {
            fs::remove_file(&journal)?;
        }
        Ok(())
    }

    /// Final flush at the end of a run
    pub fn close(mut self) -> Result<()> {
        match self.mode {
            PersistMode::Snapshot => {
                if !self.pending.is_empty() {
                    self.persist()?;
                }
                Ok(())
            }
            PersistMode::Journal => self.compact(),
        }
    }

    /// Replace the snapshot atomically: write a sibling temp file, fsync, rename
    fn write_snapshot(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        // Temp files are created 0600; keep whatever the snapshot had
        if let Ok(existing) = fs::metadata(&self.path) {
            tmp.as_file().set_permissions(existing.permissions())?;
        }
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
            let mut ser = serde_json::Serializer::with_formatter(&mut writer, formatter);
            let sorted: BTreeMap<&str, &str> = self
                .entries
                .iter()
                .map(|(panel, text)| (panel.as_str(), text.as_str()))
                .collect();
            sorted.serialize(&mut ser)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    fn append_journal(&self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(journal_path(&self.path))?;
        let mut writer = BufWriter::new(&file);
        for panel in &self.pending {
            let record = JournalRecord {
                path: panel.clone(),
                text: self.entries[panel].clone(),
            };
            serde_json::to_writer(&mut writer, &record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        drop(writer);
        file.sync_data()?;
        Ok(())
    }
}

pub fn journal_path(snapshot: &Path) -> PathBuf {
    let mut name = snapshot.as_os_str().to_owned();
    name.push(".journal");
    PathBuf::from(name)
}

/// Apply journal records over `entries`, returning how many were new.
///
/// Only the last line may be torn (the process died mid-append); it is
/// cut off the file so later appends start on a fresh line. A bad line
/// anywhere else means the journal is corrupt.
fn replay_journal(journal: &Path, entries: &mut HashMap<String, String>) -> Result<usize> {
    let raw = fs::read_to_string(journal)?;
    let complete = raw.ends_with('\n');
    let lines: Vec<&str> = raw.lines().collect();

    let mut added = 0;
    for (idx, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: JournalRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(_) if idx + 1 == lines.len() && !complete => {
                tracing::warn!("discarding torn final journal record in {:?}", journal);
                truncate_torn_tail(journal, &raw)?;
                break;
            }
            Err(e) => {
                return Err(Error::CorruptIndex {
                    path: journal.to_path_buf(),
                    reason: format!("line {}: {}", idx + 1, e),
                });
            }
        };
        if !entries.contains_key(&record.path) {
            entries.insert(record.path, record.text);
            added += 1;
        }
    }
    Ok(added)
}

/// Shorten the journal to its last complete line
fn truncate_torn_tail(journal: &Path, raw: &str) -> Result<()> {
    let keep = raw.rfind('\n').map_or(0, |pos| pos + 1);
    let file = OpenOptions::new().write(true).open(journal)?;
    file.set_len(keep as u64)?;
    file.sync_data()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_snapshot(path: &Path) -> BTreeMap<String, String> {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn missing_snapshot_loads_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = IndexStore::load(dir.path().join("index.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn blank_text_is_never_stored() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut store = IndexStore::load(dir.path().join("index.json")).unwrap();
        assert!(!store.commit("/p/panel_1.jpg", "  \n\t").unwrap());
        assert!(!store.has("/p/panel_1.jpg"));
        assert!(!dir.path().join("index.json").exists());
    }

    #[test]
    fn existing_entry_is_not_recomputed() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut store = IndexStore::load(dir.path().join("index.json")).unwrap();
        assert!(store.commit("/p/panel_1.jpg", "first").unwrap());
        assert!(!store.commit("/p/panel_1.jpg", "second").unwrap());
        assert_eq!(store.get("/p/panel_1.jpg"), Some("first"));
    }

    #[test]
    fn snapshot_is_pretty_utf8_with_four_space_indent() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        let mut store = IndexStore::load(&path).unwrap();
        store.commit("/p/panel_1.jpg", "哆啦A梦").unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(raw, "{\n    \"/p/panel_1.jpg\": \"哆啦A梦\"\n}");
    }

    #[test]
    fn corrupt_snapshot_is_fatal() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        fs::write(&path, "{\"a.jpg\": ").unwrap();
        assert!(matches!(IndexStore::load(&path), Err(Error::CorruptIndex { .. })));
    }

    #[test]
    fn journal_replays_and_tolerates_torn_tail() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        {
            let mut store = IndexStore::open(&path, PersistMode::Journal).unwrap();
            store.commit("/p/a.jpg", "one").unwrap();
            store.commit("/p/b.jpg", "two").unwrap();
            // dropped without close: the journal is all that survives
        }
        assert!(!path.exists());

        let mut journal = OpenOptions::new().append(true).open(journal_path(&path)).unwrap();
        journal.write_all(b"{\"path\": \"/p/c.jpg\", \"te").unwrap();
        drop(journal);

        let store = IndexStore::open(&path, PersistMode::Journal).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("/p/b.jpg"), Some("two"));
        assert!(!store.has("/p/c.jpg"));

        store.close().unwrap();
        assert!(!journal_path(&path).exists());
        assert_eq!(read_snapshot(&path).len(), 2);
    }

    #[test]
    fn appends_after_torn_tail_start_on_a_fresh_line() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        {
            let mut store = IndexStore::open(&path, PersistMode::Journal).unwrap();
            store.commit("/p/a.jpg", "one").unwrap();
        }
        let mut journal = OpenOptions::new().append(true).open(journal_path(&path)).unwrap();
        journal.write_all(b"{\"path\": \"/p/c.jpg\", \"te").unwrap();
        drop(journal);

        {
            let mut store = IndexStore::open(&path, PersistMode::Journal).unwrap();
            assert_eq!(store.len(), 1);
            assert!(store.commit("/p/d.jpg", "four").unwrap());
            // dropped again without close
        }

        let raw = fs::read_to_string(journal_path(&path)).unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert!(!raw.contains("/p/c.jpg"));

        let store = IndexStore::open(&path, PersistMode::Journal).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("/p/a.jpg"), Some("one"));
        assert_eq!(store.get("/p/d.jpg"), Some("four"));
    }

    #[test]
    fn snapshot_keys_are_written_sorted() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        let mut store = IndexStore::load(&path).unwrap();
        store.commit("/p/b.jpg", "two").unwrap();
        store.commit("/p/a.jpg", "one").unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(
            raw,
            "{\n    \"/p/a.jpg\": \"one\",\n    \"/p/b.jpg\": \"two\"\n}"
        );
    }

    #[cfg(unix)]
    #[test]
    fn persist_keeps_snapshot_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        let mut store = IndexStore::load(&path).unwrap();
        store.commit("/p/a.jpg", "one").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        store.commit("/p/b.jpg", "two").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn torn_middle_journal_line_is_corruption() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        fs::write(
            journal_path(&path),
            "{\"path\": \"/p/a.jpg\", \"te\n{\"path\": \"/p/b.jpg\", \"text\": \"two\"}\n",
        )
        .unwrap();
        assert!(matches!(
            IndexStore::open(&path, PersistMode::Journal),
            Err(Error::CorruptIndex { .. })
        ));
    }

    #[test]
    fn snapshot_mode_absorbs_leftover_journal() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        {
            let mut store = IndexStore::open(&path, PersistMode::Journal).unwrap();
            store.commit("/p/a.jpg", "one").unwrap();
        }
        let store = IndexStore::load(&path).unwrap();
        assert!(store.has("/p/a.jpg"));
        assert!(!journal_path(&path).exists());
        assert_eq!(read_snapshot(&path).get("/p/a.jpg").map(String::as_str), Some("one"));
    }
}
