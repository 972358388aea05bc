//! Shared vocabulary for background jobs. Only one job is actually
//! scheduled by this crate (`StagingCycleJob`), but the trait is kept
//! general so a future job type doesn't need to reinvent cancellation and
//! scheduling.

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job failed: {0}")]
    Failed(String),
    #[error("job cancelled")]
    Cancelled,
}

/// When a shutdown is requested while a job is running, whether the
/// supervisor waits for it to finish or cancels it immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownBehavior {
    WaitForCompletion,
    CancelImmediately,
}

/// A job's schedule. The staging cycle always uses `Cron`; other variants
/// are kept for jobs that don't run on a calendar schedule.
#[derive(Debug, Clone)]
pub enum JobSchedule {
    Cron(String),
    Interval(std::time::Duration),
}

#[async_trait]
pub trait BackgroundJob: Send + Sync {
    fn name(&self) -> &str;
    fn schedule(&self) -> JobSchedule;
    fn shutdown_behavior(&self) -> ShutdownBehavior {
        ShutdownBehavior::WaitForCompletion
    }

    async fn run(&self, cancellation: CancellationToken) -> Result<(), JobError>;
}
