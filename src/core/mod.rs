pub mod index;
pub mod indexer;
pub mod search;

pub use index::{IndexStore, PersistMode};
pub use indexer::{IndexReport, Indexer, panel_key};
pub use search::{SearchEngine, SearchHit};
