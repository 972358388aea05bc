//! Full pipeline coverage from a staged album through the Review API's
//! underlying engine to a promoted catalog row (scenario 4, 6), plus the
//! reject-and-delete path.

use melodee_staging::catalog_store::{CatalogStore, SqliteCatalogStore};
use melodee_staging::path_planner::ArtistDirectoryCodes;
use melodee_staging::promotion::PromotionEngine;
use melodee_staging::review_store::{NewStagingItem, SqliteReviewStore, StagingStatus};
use melodee_staging::scratch_store::{NewScannedFile, SqliteScratchStore};
use melodee_staging::staging_processor::{FileOpThrottler, ProcessStatus, StagingProcessor};
use melodee_staging::tag_reader::TagRecord;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

fn tags(artist: &str, album: &str, title: &str, track: u32, year: i32) -> TagRecord {
    TagRecord {
        artist: artist.to_string(),
        album_artist: artist.to_string(),
        album: album.to_string(),
        title: title.to_string(),
        track_number: Some(track),
        disc_number: Some(1),
        year: Some(year),
        genres: vec!["ambient".to_string()],
        is_compilation: false,
        duration_ms: 180_000,
        bit_rate_kbps: Some(256),
        sample_rate_hz: Some(44_100),
        channels: Some(2),
        bit_depth: Some(16),
    }
}

async fn stage_one_album(
    inbound: &std::path::Path,
    staging: &std::path::Path,
) -> melodee_staging::staging_processor::ProcessResult {
    let scratch = SqliteScratchStore::open_in_memory(&Uuid::new_v4().to_string()).unwrap();
    let path = inbound.join("01.flac");
    std::fs::write(&path, b"stand-in bytes, tags come from the row").unwrap();

    scratch
        .insert_files(&[NewScannedFile {
            path: path.to_string_lossy().to_string(),
            size_bytes: 4096,
            content_digest: "digest".to_string(),
            tags: tags("Brian Eno", "Ambient 1", "1/1", 1, 1978),
            is_valid: true,
            rejection_reason: None,
        }])
        .unwrap();
    scratch.compute_grouping().unwrap();

    let codes = ArtistDirectoryCodes::new(Arc::new(Mutex::new(Connection::open_in_memory().unwrap()))).unwrap();
    let processor = StagingProcessor::new(
        scratch,
        codes,
        staging.to_path_buf(),
        Arc::new(FileOpThrottler::unlimited()),
        false,
    );
    let mut results = processor.run(1).await.unwrap();
    results.remove(0)
}

#[tokio::test]
async fn approved_item_promotes_into_the_catalog() {
    let inbound = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let production = tempfile::tempdir().unwrap();

    let staged = stage_one_album(inbound.path(), staging.path()).await;
    assert_eq!(staged.status, ProcessStatus::Staged);
    let staged_path = staged.staged_path.clone().unwrap();

    let review = SqliteReviewStore::open_in_memory().unwrap();
    let item = review
        .insert(NewStagingItem {
            id: Uuid::new_v4().to_string(),
            scan_id: "scan-1".to_string(),
            group_id: staged.group_id.clone(),
            staged_path: staged_path.to_string_lossy().to_string(),
            sidecar_path: staged.sidecar_path.clone().unwrap().to_string_lossy().to_string(),
            sidecar_checksum: staged.sidecar_checksum.clone().unwrap(),
            artist_display: "Brian Eno".to_string(),
            album_display: "Ambient 1".to_string(),
            year: Some(1978),
            track_count: staged.track_count,
            total_size_bytes: staged.total_size_bytes,
        })
        .unwrap();
    assert_eq!(item.status, StagingStatus::PendingReview);

    let catalog = Arc::new(SqliteCatalogStore::open_in_memory().unwrap());
    let engine = PromotionEngine::new(review.clone(), catalog.clone(), production.path().to_path_buf());

    engine.approve(&item.id, "admin-1", None).unwrap();
    engine.promote(&item.id).unwrap();

    let promoted = review.get(&item.id).unwrap().unwrap();
    assert_eq!(promoted.status, StagingStatus::Promoted);
    assert!(!staged_path.exists(), "staged directory should have moved into production");

    let artist = catalog.find_artist_by_normalized_name("brian eno").unwrap().unwrap();
    assert_eq!(artist.album_count, 1);
}

#[tokio::test]
async fn rejecting_with_delete_removes_the_staged_directory() {
    let inbound = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let production = tempfile::tempdir().unwrap();

    let staged = stage_one_album(inbound.path(), staging.path()).await;
    let staged_path = staged.staged_path.clone().unwrap();
    assert!(staged_path.exists());

    let review = SqliteReviewStore::open_in_memory().unwrap();
    let item = review
        .insert(NewStagingItem {
            id: Uuid::new_v4().to_string(),
            scan_id: "scan-1".to_string(),
            group_id: staged.group_id.clone(),
            staged_path: staged_path.to_string_lossy().to_string(),
            sidecar_path: staged.sidecar_path.clone().unwrap().to_string_lossy().to_string(),
            sidecar_checksum: staged.sidecar_checksum.clone().unwrap(),
            artist_display: "Brian Eno".to_string(),
            album_display: "Ambient 1".to_string(),
            year: Some(1978),
            track_count: staged.track_count,
            total_size_bytes: staged.total_size_bytes,
        })
        .unwrap();

    let catalog = Arc::new(SqliteCatalogStore::open_in_memory().unwrap());
    let engine = PromotionEngine::new(review.clone(), catalog, production.path().to_path_buf());

    engine.reject(&item.id, "admin-1", Some("not a match"), true).unwrap();

    let rejected = review.get(&item.id).unwrap().unwrap();
    assert_eq!(rejected.status, StagingStatus::Deleted);
    assert!(!staged_path.exists());
}

#[tokio::test]
async fn cannot_promote_an_item_still_pending_review() {
    let inbound = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let production = tempfile::tempdir().unwrap();

    let staged = stage_one_album(inbound.path(), staging.path()).await;
    let staged_path = staged.staged_path.clone().unwrap();

    let review = SqliteReviewStore::open_in_memory().unwrap();
    let item = review
        .insert(NewStagingItem {
            id: Uuid::new_v4().to_string(),
            scan_id: "scan-1".to_string(),
            group_id: staged.group_id.clone(),
            staged_path: staged_path.to_string_lossy().to_string(),
            sidecar_path: staged.sidecar_path.clone().unwrap().to_string_lossy().to_string(),
            sidecar_checksum: staged.sidecar_checksum.clone().unwrap(),
            artist_display: "Brian Eno".to_string(),
            album_display: "Ambient 1".to_string(),
            year: Some(1978),
            track_count: staged.track_count,
            total_size_bytes: staged.total_size_bytes,
        })
        .unwrap();

    let catalog = Arc::new(SqliteCatalogStore::open_in_memory().unwrap());
    let engine = PromotionEngine::new(review, catalog, production.path().to_path_buf());

    assert!(engine.promote(&item.id).is_err());
}
