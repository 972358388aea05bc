//! Shared handles the staging cycle job needs on every run.

use crate::path_planner::ArtistDirectoryCodes;
use crate::review_store::SqliteReviewStore;
use crate::staging_processor::FileOpThrottler;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone)]
pub struct JobContext {
    pub inbound_root: PathBuf,
    pub staging_root: PathBuf,
    pub scan_db_dir: PathBuf,
    pub scan_workers: usize,
    pub scan_buffer_size: usize,
    pub processing_workers: usize,
    pub dry_run: bool,
    pub review_store: SqliteReviewStore,
    pub directory_codes: ArtistDirectoryCodes,
    pub throttler: Arc<FileOpThrottler>,
}
