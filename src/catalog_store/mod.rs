//! Catalog Store: the production database the Promotion Engine writes
//! into and the Review API reads from (§4.8, data model §3).

mod models;
mod schema;
mod store;
mod trait_def;

pub use models::{Album, Artist, NewAlbumPromotion, NewTrackPromotion, Track};
pub use store::SqliteCatalogStore;
pub use trait_def::{CatalogStore, CatalogStoreError, WritableCatalogStore};
