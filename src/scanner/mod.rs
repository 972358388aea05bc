//! Scanner: walks an inbound library root, reads tags off every supported
//! audio file, and inserts the results into a scratch store (§4.3).
//!
//! Candidate paths are discovered up front (cheap, metadata-only) and
//! handed to a bounded channel that a fixed pool of worker tasks drains.
//! Each worker does its tag-reading and hashing on a blocking-pool thread
//! via `spawn_blocking`, since `lofty` and file IO are both synchronous.
//! Workers send completed rows to a single collector task, which is the
//! only task touching the scratch store's writer connection, batching
//! inserts up to the store's batch limit.

use crate::scratch_store::{NewScannedFile, ScratchStoreError, SqliteScratchStore, INSERT_BATCH_LIMIT};
use crate::tag_reader::{self, TagRecord};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum ScannerError {
    #[error("inbound io: {0}")]
    InboundIo(#[from] std::io::Error),
    #[error("scratch store: {0}")]
    ScratchStore(#[from] ScratchStoreError),
}

#[derive(Debug, Default, Clone)]
pub struct ScanSummary {
    pub files_discovered: u64,
    pub files_valid: u64,
    pub files_invalid: u64,
}

pub struct Scanner {
    scratch: SqliteScratchStore,
    root: PathBuf,
    workers: usize,
    channel_buffer: usize,
}

impl Scanner {
    pub fn new(scratch: SqliteScratchStore, root: PathBuf, workers: usize, channel_buffer: usize) -> Self {
        Self {
            scratch,
            root,
            workers: workers.max(1),
            channel_buffer: channel_buffer.max(1),
        }
    }

    pub async fn run(&self) -> Result<ScanSummary, ScannerError> {
        let root = self.root.clone();
        let paths = tokio::task::spawn_blocking(move || discover_paths(&root))
            .await
            .map_err(|e| ScannerError::InboundIo(std::io::Error::other(e.to_string())))??;

        let (tx, mut rx) = mpsc::channel::<NewScannedFile>(self.channel_buffer);
        let queue = std::sync::Arc::new(std::sync::Mutex::new(paths.into_iter().collect::<std::collections::VecDeque<_>>()));

        let mut worker_handles = Vec::with_capacity(self.workers);
        for _ in 0..self.workers {
            let queue = std::sync::Arc::clone(&queue);
            let tx = tx.clone();
            worker_handles.push(tokio::task::spawn_blocking(move || worker_loop(queue, tx)));
        }
        drop(tx);

        let mut summary = ScanSummary::default();
        let mut batch = Vec::with_capacity(INSERT_BATCH_LIMIT);
        while let Some(file) = rx.recv().await {
            summary.files_discovered += 1;
            if file.is_valid {
                summary.files_valid += 1;
            } else {
                summary.files_invalid += 1;
            }
            batch.push(file);
            if batch.len() >= INSERT_BATCH_LIMIT {
                self.scratch.insert_files(&batch)?;
                batch.clear();
            }
        }
        if !batch.is_empty() {
            self.scratch.insert_files(&batch)?;
        }

        for h in worker_handles {
            let _ = h.await;
        }

        Ok(summary)
    }
}

/// Collects candidate audio file paths under `root`, descending
/// directories in sorted order so repeated scans enumerate files in a
/// stable sequence.
fn discover_paths(root: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name().into_iter() {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() && tag_reader::is_supported(entry.path()) {
            paths.push(entry.into_path());
        }
    }
    Ok(paths)
}

fn worker_loop(
    queue: std::sync::Arc<std::sync::Mutex<std::collections::VecDeque<PathBuf>>>,
    tx: mpsc::Sender<NewScannedFile>,
) {
    loop {
        let next = queue.lock().unwrap().pop_front();
        let Some(path) = next else { break };
        let row = read_one(&path);
        if tx.blocking_send(row).is_err() {
            break;
        }
    }
}

fn read_one(path: &Path) -> NewScannedFile {
    let size_bytes = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);

    match hash_file(path) {
        Err(e) => NewScannedFile {
            path: path.to_string_lossy().to_string(),
            size_bytes,
            content_digest: String::new(),
            tags: TagRecord::default(),
            is_valid: false,
            rejection_reason: Some(format!("unreadable file: {e}")),
        },
        Ok(digest) => match tag_reader::read(path) {
            Ok(tags) => {
                let (is_valid, reason) = validate_tags(&tags);
                NewScannedFile {
                    path: path.to_string_lossy().to_string(),
                    size_bytes,
                    content_digest: digest,
                    tags,
                    is_valid,
                    rejection_reason: reason,
                }
            }
            Err(e) => NewScannedFile {
                path: path.to_string_lossy().to_string(),
                size_bytes,
                content_digest: digest,
                tags: TagRecord::default(),
                is_valid: false,
                rejection_reason: Some(e.to_string()),
            },
        },
    }
}

/// A file with no usable artist/album tag is flagged invalid rather than
/// dropped, so it still surfaces in `Stats()` and an operator can see what
/// the scan rejected and why.
fn validate_tags(tags: &TagRecord) -> (bool, Option<String>) {
    if tags.album_artist_or_artist().trim().is_empty() {
        return (false, Some("missing artist tag".to_string()));
    }
    if tags.album.trim().is_empty() {
        return (false, Some("missing album tag".to_string()));
    }
    (true, None)
}

fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}
