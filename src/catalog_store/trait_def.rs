//! Catalog Store trait split along its two access patterns: a read side
//! used by the Review API's catalog lookups, and a writable side the
//! Promotion Engine uses to commit promoted albums. Kept as two traits
//! (rather than one) so read-only callers (e.g. future library browsing
//! endpoints) don't need to depend on transaction semantics.

use super::models::{Album, Artist, NewAlbumPromotion, Track};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogStoreError {
    #[error("catalog sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("catalog schema: {0}")]
    Schema(#[from] anyhow::Error),
    #[error("unknown artist: {0}")]
    UnknownArtist(String),
    #[error("unknown album: {0}")]
    UnknownAlbum(String),
}

pub type Result<T> = std::result::Result<T, CatalogStoreError>;

pub trait CatalogStore: Send + Sync {
    fn get_artist(&self, id: &str) -> Result<Option<Artist>>;
    fn find_artist_by_normalized_name(&self, name_normalized: &str) -> Result<Option<Artist>>;
    fn get_album(&self, id: &str) -> Result<Option<Album>>;
    fn list_tracks_of_album(&self, album_id: &str) -> Result<Vec<Track>>;
}

/// The Promotion Engine's only entry point into the catalog: one call,
/// one transaction, inserting (or reusing) the artist, inserting the
/// album, and inserting every track.
pub trait WritableCatalogStore: CatalogStore {
    fn promote_album(&self, promotion: NewAlbumPromotion) -> Result<Album>;
}
