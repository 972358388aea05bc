//! The single job this crate schedules: a full scan-group-stage cycle over
//! the inbound library root (§4.9).

use super::context::JobContext;
use super::job::{BackgroundJob, JobError, JobSchedule, ShutdownBehavior};
use crate::review_store::NewStagingItem;
use crate::scanner::Scanner;
use crate::scratch_store::SqliteScratchStore;
use crate::staging_processor::{ProcessStatus, StagingProcessor};
use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Summary returned (and logged) after each cycle (scenario 1-3, 5).
#[derive(Debug, Clone, Default, Serialize)]
pub struct StagingJobResult {
    pub scan_id: String,
    pub files_discovered: u64,
    pub files_valid: u64,
    pub files_invalid: u64,
    pub groups_found: usize,
    pub groups_staged: usize,
    pub groups_failed: usize,
}

pub struct StagingCycleJob {
    schedule: JobSchedule,
    context: JobContext,
}

impl StagingCycleJob {
    pub fn new(schedule: JobSchedule, context: JobContext) -> Self {
        Self { schedule, context }
    }

    async fn run_cycle(&self, cancellation: &CancellationToken) -> Result<StagingJobResult, JobError> {
        let scan_id = Uuid::new_v4().to_string();
        let scan_db_path = self.context.scan_db_dir.join(format!("{scan_id}.sqlite"));

        let scratch = SqliteScratchStore::open(&scan_db_path, &scan_id)
            .map_err(|e| JobError::Failed(format!("opening scratch store: {e}")))?;

        if cancellation.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let scanner = Scanner::new(
            scratch.clone(),
            self.context.inbound_root.clone(),
            self.context.scan_workers,
            self.context.scan_buffer_size,
        );
        let scan_summary = scanner.run().await.map_err(|e| JobError::Failed(e.to_string()))?;
        info!(scan_id, files = scan_summary.files_discovered, "scan complete");

        if cancellation.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let group_count = scratch
            .compute_grouping()
            .map_err(|e| JobError::Failed(format!("grouping: {e}")))?;

        let processor = StagingProcessor::new(
            scratch.clone(),
            self.context.directory_codes.clone(),
            self.context.staging_root.clone(),
            self.context.throttler.clone(),
            self.context.dry_run,
        );
        let results = processor.run(self.context.processing_workers).await.map_err(|e| JobError::Failed(e.to_string()))?;

        let mut groups_staged = 0;
        let mut groups_failed = 0;
        for result in &results {
            match result.status {
                ProcessStatus::Staged => {
                    groups_staged += 1;
                    if let (Some(path), Some(sidecar_path), Some(sidecar_checksum), Ok(Some(group))) = (
                        &result.staged_path,
                        &result.sidecar_path,
                        &result.sidecar_checksum,
                        scratch.group(&result.group_id),
                    ) {
                        let item = NewStagingItem {
                            id: Uuid::new_v4().to_string(),
                            scan_id: scan_id.clone(),
                            group_id: result.group_id.clone(),
                            staged_path: path.to_string_lossy().to_string(),
                            sidecar_path: sidecar_path.to_string_lossy().to_string(),
                            sidecar_checksum: sidecar_checksum.clone(),
                            artist_display: group.artist_display.clone(),
                            album_display: group.album_display.clone(),
                            year: group.year,
                            track_count: result.track_count,
                            total_size_bytes: result.total_size_bytes,
                        };
                        if let Err(e) = self.context.review_store.insert(item) {
                            warn!(group_id = %result.group_id, error = %e, "failed to register staged album for review");
                            groups_failed += 1;
                            groups_staged -= 1;
                        }
                    }
                }
                ProcessStatus::Skipped => {}
                ProcessStatus::Failed => {
                    groups_failed += 1;
                    warn!(group_id = %result.group_id, error = ?result.error, "group failed to stage");
                }
            }
        }

        let _ = scratch.close();

        Ok(StagingJobResult {
            scan_id,
            files_discovered: scan_summary.files_discovered,
            files_valid: scan_summary.files_valid,
            files_invalid: scan_summary.files_invalid,
            groups_found: group_count,
            groups_staged,
            groups_failed,
        })
    }
}

#[async_trait]
impl BackgroundJob for StagingCycleJob {
    fn name(&self) -> &str {
        "staging-cycle"
    }

    fn schedule(&self) -> JobSchedule {
        self.schedule.clone()
    }

    fn shutdown_behavior(&self) -> ShutdownBehavior {
        ShutdownBehavior::WaitForCompletion
    }

    async fn run(&self, cancellation: CancellationToken) -> Result<(), JobError> {
        let result = self.run_cycle(&cancellation).await?;
        info!(
            scan_id = %result.scan_id,
            staged = result.groups_staged,
            failed = result.groups_failed,
            "staging cycle finished"
        );
        Ok(())
    }
}
