//! Promotion Engine: moves an approved staging item into the production
//! library and records it in the catalog (§4.8).
//!
//! Promotion is staged as: move the album directory into the production
//! root, then commit the catalog rows in one transaction, then mark the
//! review item promoted. If the catalog write fails, the directory move is
//! undone so staging and the catalog never disagree about where an album
//! lives (P7). Rejection with `delete_files` removes the staged directory
//! outright; rejection without it just flips state, leaving the operator
//! to clean up by hand.

use crate::catalog_store::{NewAlbumPromotion, NewTrackPromotion, WritableCatalogStore};
use crate::grouper::normalize;
use crate::review_store::{ReviewError, SqliteReviewStore, StagingItem, StagingStatus};
use crate::sidecar;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromotionError {
    #[error("review store: {0}")]
    Review(#[from] ReviewError),
    #[error("catalog store: {0}")]
    Catalog(#[from] crate::catalog_store::CatalogStoreError),
    #[error("sidecar: {0}")]
    Sidecar(#[from] sidecar::SidecarError),
    #[error("staging directory corrupted: {0}")]
    StagingCorrupted(String),
    #[error("promotion target already exists: {0}")]
    TargetAlreadyExists(String),
    #[error("promotion io failed: {0}")]
    PromotionIoFailed(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PromotionError>;

pub struct PromotionEngine<C: WritableCatalogStore> {
    review: SqliteReviewStore,
    catalog: Arc<C>,
    production_root: PathBuf,
}

impl<C: WritableCatalogStore> PromotionEngine<C> {
    pub fn new(review: SqliteReviewStore, catalog: Arc<C>, production_root: PathBuf) -> Self {
        Self {
            review,
            catalog,
            production_root,
        }
    }

    pub fn approve(&self, item_id: &str, reviewer_id: &str, notes: Option<&str>) -> Result<StagingItem> {
        Ok(self
            .review
            .transition(item_id, StagingStatus::Approved, Some(reviewer_id), notes)?)
    }

    /// Rejects a staging item. When `delete_files` is set, the staged
    /// album directory is removed as part of the same call, leaving the
    /// item in `Deleted`; otherwise it's left `Rejected` for manual cleanup.
    pub fn reject(
        &self,
        item_id: &str,
        reviewer_id: &str,
        notes: Option<&str>,
        delete_files: bool,
    ) -> Result<StagingItem> {
        let item = self
            .review
            .transition(item_id, StagingStatus::Rejected, Some(reviewer_id), notes)?;
        if delete_files {
            let _ = std::fs::remove_dir_all(&item.staged_path);
            return Ok(self
                .review
                .transition(item_id, StagingStatus::Deleted, Some(reviewer_id), notes)?);
        }
        Ok(item)
    }

    pub fn delete(&self, item_id: &str) -> Result<()> {
        let item = self.review.get(item_id)?.ok_or(ReviewError::UnknownItem(item_id.to_string()))?;
        let _ = std::fs::remove_dir_all(&item.staged_path);
        self.review.delete(item_id)?;
        Ok(())
    }

    /// Promotes an approved item: validates its sidecar against the
    /// checksum recorded at staging time, relocates its directory into the
    /// production library, writes the catalog rows, and marks the item
    /// promoted. Requires the item to currently be `Approved`.
    pub fn promote(&self, item_id: &str) -> Result<()> {
        let item = self.review.get(item_id)?.ok_or(ReviewError::UnknownItem(item_id.to_string()))?;
        if item.status != StagingStatus::Approved {
            return Err(PromotionError::Review(ReviewError::InvalidStateTransition {
                from: item.status,
                to: StagingStatus::Promoted,
            }));
        }

        let staged_dir = Path::new(&item.staged_path);

        // Step 1: sidecar integrity. A mismatch means the staged files were
        // tampered with or corrupted since the processor wrote them.
        let actual_checksum = sidecar::checksum_of_file(staged_dir)?;
        if actual_checksum != item.sidecar_checksum {
            return Err(PromotionError::StagingCorrupted(format!(
                "sidecar checksum {actual_checksum} does not match recorded checksum {}",
                item.sidecar_checksum
            )));
        }
        let doc = sidecar::read(staged_dir)?;

        // Step 2: resolve the production target from the same
        // code/artist/year-album subpath the Path Planner laid out under
        // staging, and refuse to clobber an existing album there.
        let production_dir = self.production_target(staged_dir, &doc);
        if production_dir.exists() {
            return Err(PromotionError::TargetAlreadyExists(production_dir.to_string_lossy().to_string()));
        }

        atomic_move_dir(staged_dir, &production_dir)?;

        let tracks: Vec<NewTrackPromotion> = doc
            .tracks
            .iter()
            .map(|t| {
                let filename = Path::new(&t.file_path).file_name().unwrap_or_default();
                NewTrackPromotion {
                    title: t.name.clone(),
                    track_number: t.track_number,
                    disc_number: t.disc_number,
                    duration_ms: t.duration,
                    file_path: production_dir.join(filename).to_string_lossy().to_string(),
                    content_digest: t.checksum.clone(),
                }
            })
            .collect();

        let promotion = NewAlbumPromotion {
            artist_name: doc.artist.name.clone(),
            artist_name_normalized: doc.artist.name_normalized.clone(),
            artist_directory_code: doc.artist.directory_code.clone(),
            album_name: doc.album.name.clone(),
            album_name_normalized: doc.album.name_normalized.clone(),
            year: doc.album.year,
            is_compilation: doc.album.is_compilation,
            genres: doc.album.genres.clone(),
            directory_path: production_dir.to_string_lossy().to_string(),
            tracks,
        };

        match self.catalog.promote_album(promotion) {
            Ok(_) => {
                self.review.transition(item_id, StagingStatus::Promoted, None, None)?;
                Ok(())
            }
            Err(e) => {
                // undo the move so staging and the catalog stay consistent
                let _ = atomic_move_dir(&production_dir, staged_dir);
                Err(PromotionError::Catalog(e))
            }
        }
    }

    /// Resolves the production directory from the same
    /// `<code>/<artist>/<year> - <album>` subpath the Path Planner laid out
    /// under staging, read off the tail of the staged directory itself.
    /// Falls back to rebuilding it from the sidecar when the staged path is
    /// too shallow to have a full subpath (e.g. hand-built test fixtures).
    fn production_target(&self, staged_dir: &Path, doc: &sidecar::AlbumMelodeeDocument) -> PathBuf {
        let mut tail: Vec<String> = staged_dir
            .components()
            .rev()
            .take(3)
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        tail.reverse();
        if tail.len() == 3 {
            return self.production_root.join(&tail[0]).join(&tail[1]).join(&tail[2]);
        }

        let album_component = match doc.album.year {
            Some(year) => format!("{year} - {}", doc.album.name),
            None => doc.album.name.clone(),
        };
        self.production_root
            .join(&doc.artist.directory_code)
            .join(&doc.artist.name)
            .join(album_component)
    }
}

fn atomic_move_dir(src: &Path, dst: &Path) -> std::io::Result<()> {
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(_) => {
            copy_dir_recursive(src, dst)?;
            std::fs::remove_dir_all(src)?;
            Ok(())
        }
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::SqliteCatalogStore;
    use crate::review_store::NewStagingItem;
    use crate::sidecar::{AlbumMelodeeDocument, SidecarAlbum, SidecarArtist, SidecarTrack, SidecarValidation};

    /// Writes a staged album under `staging_root/TE/Artist/2021 - Album`
    /// and returns the directory plus the checksum `sidecar::write` reports,
    /// so callers can build a matching `NewStagingItem`.
    fn write_staged_album(staging_root: &Path) -> (PathBuf, String) {
        let album_dir = staging_root.join("TE").join("Artist").join("2021 - Album");
        std::fs::create_dir_all(&album_dir).unwrap();
        std::fs::write(album_dir.join("01 - Track.flac"), b"fake audio").unwrap();
        let doc = AlbumMelodeeDocument {
            version: sidecar::SIDECAR_VERSION.to_string(),
            processed_at: "2026-01-01T00:00:00Z".to_string(),
            scan_id: "scan-1".to_string(),
            group_id: "group-1".to_string(),
            artist: SidecarArtist {
                name: "Artist".to_string(),
                name_normalized: "artist".to_string(),
                directory_code: "TE".to_string(),
            },
            album: SidecarAlbum {
                name: "Album".to_string(),
                name_normalized: "album".to_string(),
                album_type: "album".to_string(),
                year: Some(2021),
                genres: vec!["rock".to_string()],
                is_compilation: false,
            },
            tracks: vec![SidecarTrack {
                track_number: Some(1),
                disc_number: Some(1),
                name: "Track".to_string(),
                duration: 1000,
                file_path: "TE/Artist/2021 - Album/01 - Track.flac".to_string(),
                file_size: 10,
                bitrate: Some(320),
                sample_rate: Some(44_100),
                checksum: "abc".to_string(),
                original_path: "/in/track.flac".to_string(),
            }],
            status: "pending_review".to_string(),
            validation: SidecarValidation {
                is_valid: true,
                errors: vec![],
                warnings: vec![],
            },
        };
        let checksum = sidecar::write(&album_dir, &doc).unwrap();
        (album_dir, checksum)
    }

    fn insert_item(review: &SqliteReviewStore, album_dir: &Path, checksum: &str) {
        review
            .insert(NewStagingItem {
                id: "item-1".to_string(),
                scan_id: "scan-1".to_string(),
                group_id: "group-1".to_string(),
                staged_path: album_dir.to_string_lossy().to_string(),
                sidecar_path: album_dir.join(sidecar::SIDECAR_FILENAME).to_string_lossy().to_string(),
                sidecar_checksum: checksum.to_string(),
                artist_display: "Artist".to_string(),
                album_display: "Album".to_string(),
                year: Some(2021),
                track_count: 1,
                total_size_bytes: 10,
            })
            .unwrap();
    }

    #[test]
    fn promote_moves_directory_and_writes_catalog_rows() {
        let staging_root = tempfile::tempdir().unwrap();
        let production_root = tempfile::tempdir().unwrap();
        let (album_dir, checksum) = write_staged_album(staging_root.path());

        let review = SqliteReviewStore::open_in_memory().unwrap();
        insert_item(&review, &album_dir, &checksum);

        let catalog = Arc::new(SqliteCatalogStore::open_in_memory().unwrap());
        let engine = PromotionEngine::new(review.clone(), catalog.clone(), production_root.path().to_path_buf());

        engine.approve("item-1", "admin-1", Some("looks good")).unwrap();
        engine.promote("item-1").unwrap();

        let item = review.get("item-1").unwrap().unwrap();
        assert_eq!(item.status, StagingStatus::Promoted);
        assert!(!album_dir.exists());

        let production_dir = production_root.path().join("TE").join("Artist").join("2021 - Album");
        assert!(production_dir.join("01 - Track.flac").exists());

        use crate::catalog_store::CatalogStore;
        let artist = catalog.find_artist_by_normalized_name("artist").unwrap().unwrap();
        assert_eq!(artist.album_count, 1);
    }

    #[test]
    fn promote_without_approval_fails() {
        let staging_root = tempfile::tempdir().unwrap();
        let production_root = tempfile::tempdir().unwrap();
        let (album_dir, checksum) = write_staged_album(staging_root.path());

        let review = SqliteReviewStore::open_in_memory().unwrap();
        insert_item(&review, &album_dir, &checksum);

        let catalog = Arc::new(SqliteCatalogStore::open_in_memory().unwrap());
        let engine = PromotionEngine::new(review, catalog, production_root.path().to_path_buf());

        assert!(engine.promote("item-1").is_err());
    }

    #[test]
    fn promote_rejects_a_tampered_sidecar() {
        let staging_root = tempfile::tempdir().unwrap();
        let production_root = tempfile::tempdir().unwrap();
        let (album_dir, checksum) = write_staged_album(staging_root.path());

        let review = SqliteReviewStore::open_in_memory().unwrap();
        insert_item(&review, &album_dir, &checksum);

        // Tamper with the sidecar after staging but before promotion.
        let mut doc = sidecar::read(&album_dir).unwrap();
        doc.album.name = "Tampered".to_string();
        sidecar::write(&album_dir, &doc).unwrap();

        let catalog = Arc::new(SqliteCatalogStore::open_in_memory().unwrap());
        let engine = PromotionEngine::new(review, catalog, production_root.path().to_path_buf());

        engine.approve("item-1", "admin-1", None).unwrap();
        let err = engine.promote("item-1").unwrap_err();
        assert!(matches!(err, PromotionError::StagingCorrupted(_)));
        assert!(album_dir.exists());
    }

    #[test]
    fn promote_rejects_when_the_production_directory_already_exists() {
        let staging_root = tempfile::tempdir().unwrap();
        let production_root = tempfile::tempdir().unwrap();
        let (album_dir, checksum) = write_staged_album(staging_root.path());

        let production_dir = production_root.path().join("TE").join("Artist").join("2021 - Album");
        std::fs::create_dir_all(&production_dir).unwrap();

        let review = SqliteReviewStore::open_in_memory().unwrap();
        insert_item(&review, &album_dir, &checksum);

        let catalog = Arc::new(SqliteCatalogStore::open_in_memory().unwrap());
        let engine = PromotionEngine::new(review, catalog, production_root.path().to_path_buf());

        engine.approve("item-1", "admin-1", None).unwrap();
        let err = engine.promote("item-1").unwrap_err();
        assert!(matches!(err, PromotionError::TargetAlreadyExists(_)));
        assert!(album_dir.exists());
    }

    #[test]
    fn reject_with_delete_files_removes_the_staged_directory() {
        let staging_root = tempfile::tempdir().unwrap();
        let production_root = tempfile::tempdir().unwrap();
        let (album_dir, checksum) = write_staged_album(staging_root.path());

        let review = SqliteReviewStore::open_in_memory().unwrap();
        insert_item(&review, &album_dir, &checksum);

        let catalog = Arc::new(SqliteCatalogStore::open_in_memory().unwrap());
        let engine = PromotionEngine::new(review.clone(), catalog, production_root.path().to_path_buf());

        let item = engine.reject("item-1", "admin-1", Some("bad rip"), true).unwrap();
        assert_eq!(item.status, StagingStatus::Deleted);
        assert_eq!(item.reviewer_notes.as_deref(), Some("bad rip"));
        assert!(!album_dir.exists());
    }
}
