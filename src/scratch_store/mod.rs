//! Scratch Store: the per-scan SQLite database that holds everything a
//! Scanner/Grouper pass discovers before any of it touches the catalog
//! (§4.2).

mod models;
mod schema;
mod store;

pub use models::{AlbumGroup, NewScannedFile, ScanStats, ScannedFile};
pub use store::{ScratchStoreError, SqliteScratchStore, INSERT_BATCH_LIMIT};
pub(crate) use store::FileForGrouping;
