//! Staging Processor: moves valid album groups from a scratch store's scan
//! into the staging library root, writing an `album.melodee.json` sidecar
//! per album (§4.6).
//!
//! A fixed pool of worker tasks pulls album groups off a shared queue and
//! processes each one independently; per-group failures are recorded and
//! do not stop the run (scenario 5). Every filesystem mutation for a group
//! happens before its sidecar is written, and the sidecar write is the last
//! step, so a crash mid-group never leaves a sidecar claiming files that
//! aren't actually there yet.

mod fsops;
mod throttle;

pub use throttle::FileOpThrottler;

use crate::grouper::normalize;
use crate::path_planner::ArtistDirectoryCodes;
use crate::scratch_store::{AlbumGroup, ScannedFile, SqliteScratchStore};
use crate::sidecar::{self, AlbumMelodeeDocument, SidecarAlbum, SidecarArtist, SidecarTrack, SidecarValidation};
use chrono::Utc;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StagingMoveError {
    #[error("staging io: {0}")]
    Io(#[from] std::io::Error),
    #[error("scratch store: {0}")]
    ScratchStore(#[from] crate::scratch_store::ScratchStoreError),
    #[error("path planner: {0}")]
    PathPlanner(#[from] crate::path_planner::PathPlannerError),
    #[error("sidecar: {0}")]
    Sidecar(#[from] sidecar::SidecarError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessStatus {
    Staged,
    Skipped,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub group_id: String,
    pub status: ProcessStatus,
    pub staged_path: Option<PathBuf>,
    pub track_count: u32,
    pub total_size_bytes: u64,
    pub sidecar_path: Option<PathBuf>,
    pub sidecar_checksum: Option<String>,
    pub error: Option<String>,
}

impl ProcessResult {
    fn failed(group_id: &str, error: impl Into<String>) -> Self {
        Self {
            group_id: group_id.to_string(),
            status: ProcessStatus::Failed,
            staged_path: None,
            track_count: 0,
            total_size_bytes: 0,
            sidecar_path: None,
            sidecar_checksum: None,
            error: Some(error.into()),
        }
    }
}

pub struct StagingProcessor {
    scratch: SqliteScratchStore,
    codes: ArtistDirectoryCodes,
    staging_root: PathBuf,
    scan_id: String,
    throttler: Arc<FileOpThrottler>,
    dry_run: bool,
}

impl StagingProcessor {
    pub fn new(
        scratch: SqliteScratchStore,
        codes: ArtistDirectoryCodes,
        staging_root: PathBuf,
        throttler: Arc<FileOpThrottler>,
        dry_run: bool,
    ) -> Self {
        let scan_id = scratch.scan_id().to_string();
        Self {
            scratch,
            codes,
            staging_root,
            scan_id,
            throttler,
            dry_run,
        }
    }

    /// Processes every valid album group in the scratch store's current
    /// grouping using `workers` concurrent tasks. Returns one
    /// [`ProcessResult`] per group, in no particular order.
    pub async fn run(&self, workers: usize) -> Result<Vec<ProcessResult>, StagingMoveError> {
        let groups: VecDeque<AlbumGroup> = self
            .scratch
            .list_groups()?
            .into_iter()
            .filter(|g| g.is_valid)
            .collect();
        let queue = Arc::new(Mutex::new(groups));
        let results = Arc::new(Mutex::new(Vec::new()));

        let worker_count = workers.max(1);
        let mut handles = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let queue = Arc::clone(&queue);
            let results = Arc::clone(&results);
            let this = self.clone_handle();
            handles.push(tokio::spawn(async move {
                loop {
                    let next = queue.lock().unwrap().pop_front();
                    let Some(group) = next else { break };
                    this.throttler.acquire().await;
                    let result = this.process_group(&group).await;
                    results.lock().unwrap().push(result);
                }
            }));
        }
        for h in handles {
            let _ = h.await;
        }

        Ok(Arc::try_unwrap(results).unwrap().into_inner().unwrap())
    }

    fn clone_handle(&self) -> Self {
        Self {
            scratch: self.scratch.clone(),
            codes: self.codes.clone(),
            staging_root: self.staging_root.clone(),
            scan_id: self.scan_id.clone(),
            throttler: Arc::clone(&self.throttler),
            dry_run: self.dry_run,
        }
    }

    async fn process_group(&self, group: &AlbumGroup) -> ProcessResult {
        let files = match self.scratch.files_of_group(&group.id) {
            Ok(f) => f,
            Err(e) => return ProcessResult::failed(&group.id, e.to_string()),
        };

        let group = group.clone();
        let group_id = group.id.clone();
        let codes = self.codes.clone();
        let staging_root = self.staging_root.clone();
        let scan_id = self.scan_id.clone();
        let dry_run = self.dry_run;

        tokio::task::spawn_blocking(move || {
            stage_group_sync(&group, &files, &codes, &staging_root, &scan_id, dry_run)
        })
        .await
        .unwrap_or_else(|_| ProcessResult::failed(&group_id, "worker task panicked"))
    }
}

/// Synchronous body of one group's staging: target directory resolution,
/// deterministic filename assignment, atomic moves, then the sidecar
/// write. Runs on a blocking thread pool thread.
fn stage_group_sync(
    group: &AlbumGroup,
    files: &[ScannedFile],
    codes: &ArtistDirectoryCodes,
    staging_root: &Path,
    scan_id: &str,
    dry_run: bool,
) -> ProcessResult {
    let artist_key = normalize(&group.artist_normalized);
    let code = match codes.get_or_assign(&artist_key, &group.artist_display) {
        Ok(c) => c,
        Err(e) => return ProcessResult::failed(&group.id, e.to_string()),
    };

    // <directory_code>/<artist_display>/<year> - <album_display>
    let artist_dir_name = fsops::sanitize_filename(&group.artist_display);
    let album_dir_name = match group.year {
        Some(year) => fsops::sanitize_filename(&format!("{year} - {}", group.album_display)),
        None => fsops::sanitize_filename(&group.album_display),
    };
    let album_dir = staging_root.join(&code).join(artist_dir_name).join(album_dir_name);

    if dry_run {
        return ProcessResult {
            group_id: group.id.clone(),
            status: ProcessStatus::Skipped,
            staged_path: Some(album_dir),
            track_count: files.len() as u32,
            total_size_bytes: files.iter().map(|f| f.size_bytes).sum(),
            sidecar_path: None,
            sidecar_checksum: None,
            error: None,
        };
    }

    if let Err(e) = std::fs::create_dir_all(&album_dir) {
        return ProcessResult::failed(&group.id, e.to_string());
    }

    let mut tracks = Vec::with_capacity(files.len());
    let mut moved: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(files.len());

    for file in files {
        let src = Path::new(&file.path);
        let ext = src.extension().and_then(|e| e.to_str()).unwrap_or("bin");
        let base_name = track_filename(file, ext);
        let target = fsops::unique_target(&album_dir, &base_name);

        if let Err(e) = fsops::atomic_move(src, &target) {
            rollback(&moved);
            return ProcessResult::failed(&group.id, format!("moving {}: {e}", file.path));
        }
        moved.push((src.to_path_buf(), target.clone()));

        let relative_path = target
            .strip_prefix(staging_root)
            .unwrap_or(&target)
            .to_string_lossy()
            .to_string();

        tracks.push(SidecarTrack {
            track_number: file.tags.track_number,
            disc_number: file.tags.disc_number,
            name: file.tags.title.clone(),
            duration: file.tags.duration_ms,
            file_path: relative_path,
            file_size: file.size_bytes,
            bitrate: file.tags.bit_rate_kbps,
            sample_rate: file.tags.sample_rate_hz,
            checksum: file.content_digest.clone(),
            original_path: file.path.clone(),
        });
    }

    let track_count = tracks.len() as u32;
    let total_size_bytes: u64 = files.iter().map(|f| f.size_bytes).sum();

    let doc = AlbumMelodeeDocument {
        version: sidecar::SIDECAR_VERSION.to_string(),
        processed_at: Utc::now().to_rfc3339(),
        scan_id: scan_id.to_string(),
        group_id: group.id.clone(),
        artist: SidecarArtist {
            name: group.artist_display.clone(),
            name_normalized: group.artist_normalized.clone(),
            directory_code: code,
        },
        album: SidecarAlbum {
            name: group.album_display.clone(),
            name_normalized: group.album_normalized.clone(),
            album_type: if group.is_compilation { "compilation".to_string() } else { "album".to_string() },
            year: group.year,
            genres: group.genres.clone(),
            is_compilation: group.is_compilation,
        },
        tracks,
        status: "pending_review".to_string(),
        validation: SidecarValidation {
            is_valid: group.is_valid,
            errors: Vec::new(),
            warnings: Vec::new(),
        },
    };

    let sidecar_checksum = match sidecar::write(&album_dir, &doc) {
        Ok(checksum) => checksum,
        Err(e) => {
            rollback(&moved);
            return ProcessResult::failed(&group.id, e.to_string());
        }
    };

    ProcessResult {
        group_id: group.id.clone(),
        status: ProcessStatus::Staged,
        staged_path: Some(album_dir.clone()),
        track_count,
        total_size_bytes,
        sidecar_path: Some(album_dir.join(sidecar::SIDECAR_FILENAME)),
        sidecar_checksum: Some(sidecar_checksum),
        error: None,
    }
}

fn track_filename(file: &ScannedFile, ext: &str) -> String {
    let disc = file.tags.disc_number.unwrap_or(1);
    let track = file.tags.track_number.unwrap_or(0);
    let title = if file.tags.title.is_empty() { "Untitled" } else { &file.tags.title };
    let name = if disc > 1 {
        format!("{disc}-{track:02} - {title}.{ext}")
    } else {
        format!("{track:02} - {title}.{ext}")
    };
    fsops::sanitize_filename(&name)
}

/// Reverses already-completed moves when a group fails partway through, so
/// either every member file ends up staged with its sidecar or none do and
/// every source file is back at its original path (P5). Best-effort: if a
/// reverse move itself fails (source directory gone, permissions), the file
/// is left at its staged location and the failure is swallowed — the group
/// is already being reported failed, and there is no safer fallback.
fn rollback(moved: &[(PathBuf, PathBuf)]) {
    for (src, dst) in moved.iter().rev() {
        let _ = fsops::atomic_move(dst, src);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_planner::ArtistDirectoryCodes;
    use crate::scratch_store::NewScannedFile;
    use crate::tag_reader::TagRecord;
    use rusqlite::Connection;

    fn sample_tags(artist: &str, album: &str, title: &str, track: u32) -> TagRecord {
        TagRecord {
            artist: artist.to_string(),
            album_artist: artist.to_string(),
            album: album.to_string(),
            title: title.to_string(),
            track_number: Some(track),
            disc_number: Some(1),
            year: Some(2021),
            genres: vec!["rock".to_string()],
            is_compilation: false,
            duration_ms: 1000,
            bit_rate_kbps: Some(320),
            sample_rate_hz: Some(44_100),
            channels: Some(2),
            bit_depth: Some(16),
        }
    }

    #[tokio::test]
    async fn stages_a_group_end_to_end() {
        let inbound = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();

        let track_path = inbound.path().join("track1.flac");
        std::fs::write(&track_path, b"fake audio").unwrap();

        let scratch = SqliteScratchStore::open_in_memory("scan-1").unwrap();
        scratch
            .insert_files(&[NewScannedFile {
                path: track_path.to_string_lossy().to_string(),
                size_bytes: 10,
                content_digest: "deadbeef".to_string(),
                tags: sample_tags("Test Artist", "Test Album", "Song One", 1),
                is_valid: true,
                rejection_reason: None,
            }])
            .unwrap();
        scratch.compute_grouping().unwrap();

        let codes = ArtistDirectoryCodes::new(Arc::new(Mutex::new(Connection::open_in_memory().unwrap()))).unwrap();
        let processor = StagingProcessor::new(
            scratch.clone(),
            codes,
            staging.path().to_path_buf(),
            Arc::new(FileOpThrottler::unlimited()),
            false,
        );

        let results = processor.run(2).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, ProcessStatus::Staged);
        assert_eq!(results[0].track_count, 1);
        assert_eq!(results[0].total_size_bytes, 10);
        assert!(results[0].sidecar_checksum.is_some());

        let staged_dir = results[0].staged_path.as_ref().unwrap();
        assert!(staged_dir.join(sidecar::SIDECAR_FILENAME).exists());
        assert_eq!(results[0].sidecar_path.as_deref(), Some(staged_dir.join(sidecar::SIDECAR_FILENAME).as_path()));
        assert!(!track_path.exists());

        // <directory_code>/<artist_display>/<year> - <album_display>
        let relative = staged_dir.strip_prefix(staging.path()).unwrap();
        let components: Vec<_> = relative.components().map(|c| c.as_os_str().to_string_lossy().to_string()).collect();
        assert_eq!(components.len(), 3);
        assert_eq!(components[0], "TE");
        assert_eq!(components[1], "Test Artist");
        assert_eq!(components[2], "2021 - Test Album");

        let doc = sidecar::read(staged_dir).unwrap();
        assert_eq!(doc.status, "pending_review");
        assert_eq!(doc.version, sidecar::SIDECAR_VERSION);
        assert_eq!(doc.tracks[0].name, "Song One");
        assert_eq!(doc.tracks[0].file_path, "TE/Test Artist/2021 - Test Album/01 - Song One.flac");
    }

    #[tokio::test]
    async fn a_failed_move_rolls_back_earlier_moves_in_the_group() {
        let inbound = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();

        let track_one = inbound.path().join("track1.flac");
        std::fs::write(&track_one, b"fake audio one").unwrap();
        // track2 is registered but never written to disk, so its move fails
        // and the already-moved track1 must come back.
        let track_two = inbound.path().join("track2.flac");

        let scratch = SqliteScratchStore::open_in_memory("scan-1").unwrap();
        scratch
            .insert_files(&[
                NewScannedFile {
                    path: track_one.to_string_lossy().to_string(),
                    size_bytes: 14,
                    content_digest: "digest-1".to_string(),
                    tags: sample_tags("Test Artist", "Test Album", "Song One", 1),
                    is_valid: true,
                    rejection_reason: None,
                },
                NewScannedFile {
                    path: track_two.to_string_lossy().to_string(),
                    size_bytes: 14,
                    content_digest: "digest-2".to_string(),
                    tags: sample_tags("Test Artist", "Test Album", "Song Two", 2),
                    is_valid: true,
                    rejection_reason: None,
                },
            ])
            .unwrap();
        scratch.compute_grouping().unwrap();

        let codes = ArtistDirectoryCodes::new(Arc::new(Mutex::new(Connection::open_in_memory().unwrap()))).unwrap();
        let processor = StagingProcessor::new(
            scratch,
            codes,
            staging.path().to_path_buf(),
            Arc::new(FileOpThrottler::unlimited()),
            false,
        );

        let results = processor.run(1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, ProcessStatus::Failed);

        // track1 must be back at its original path, not stranded in staging.
        assert!(track_one.exists());
        assert_eq!(std::fs::read(&track_one).unwrap(), b"fake audio one");
    }

    #[tokio::test]
    async fn dry_run_does_not_touch_the_filesystem() {
        let inbound = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let track_path = inbound.path().join("track1.flac");
        std::fs::write(&track_path, b"fake audio").unwrap();

        let scratch = SqliteScratchStore::open_in_memory("scan-1").unwrap();
        scratch
            .insert_files(&[NewScannedFile {
                path: track_path.to_string_lossy().to_string(),
                size_bytes: 10,
                content_digest: "deadbeef".to_string(),
                tags: sample_tags("Test Artist", "Test Album", "Song One", 1),
                is_valid: true,
                rejection_reason: None,
            }])
            .unwrap();
        scratch.compute_grouping().unwrap();

        let codes = ArtistDirectoryCodes::new(Arc::new(Mutex::new(Connection::open_in_memory().unwrap()))).unwrap();
        let processor = StagingProcessor::new(
            scratch.clone(),
            codes,
            staging.path().to_path_buf(),
            Arc::new(FileOpThrottler::unlimited()),
            true,
        );

        let results = processor.run(1).await.unwrap();
        assert_eq!(results[0].status, ProcessStatus::Skipped);
        assert!(track_path.exists());
    }
}
