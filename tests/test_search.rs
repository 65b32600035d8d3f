//! Integration tests for searching a persisted index.

use panelscan::{IndexStore, SearchEngine};

fn load_fixture(json: &str) -> (IndexStore, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let path = dir.path().join("panel_index.json");
    std::fs::write(&path, json).expect("Failed to write index fixture");
    let store = IndexStore::load(&path).expect("Failed to load index fixture");
    (store, dir)
}

#[test]
fn queries_against_loaded_snapshot() {
    let (store, _dir) = load_fixture(r#"{"a.jpg": "HELLO", "b.jpg": "world"}"#);
    let engine = SearchEngine::new(store.entries());

    assert_eq!(engine.panels("ell"), vec!["a.jpg"]);
    assert_eq!(engine.panels(""), vec!["a.jpg", "b.jpg"]);
    assert!(engine.panels("xyz").is_empty());
}

#[test]
fn stale_paths_are_still_searchable() {
    let (store, _dir) = load_fixture(r#"{"/gone/panel_1.jpg": "静香"}"#);
    let hits = SearchEngine::new(store.entries()).query("静香");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].panel, "/gone/panel_1.jpg");
}
