//! Cycle Supervisor: runs a single cron-scheduled job, one cycle at a
//! time (§4.9). A `tokio::sync::Mutex<()>` guard held for the duration of
//! `run_cycle` guarantees two cycles never overlap, even if the scheduler
//! wakes up again before the previous cycle finished.

use super::job::{BackgroundJob, JobSchedule};
use chrono::Utc;
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid cron expression {0:?}: {1}")]
    InvalidCron(String, cron::error::Error),
    #[error("job schedule is not a cron schedule")]
    NotCronScheduled,
}

pub struct JobScheduler {
    job: Arc<dyn BackgroundJob>,
    running: Arc<Mutex<()>>,
    cancellation: CancellationToken,
}

impl JobScheduler {
    pub fn new(job: Arc<dyn BackgroundJob>, cancellation: CancellationToken) -> Self {
        Self {
            job,
            running: Arc::new(Mutex::new(())),
            cancellation,
        }
    }

    /// Runs forever, sleeping until each cron occurrence and then running
    /// the job, until the cancellation token fires. Returns once shutdown
    /// is observed and the in-flight cycle (if any) has honored the job's
    /// `shutdown_behavior`.
    pub async fn run(&self) -> Result<(), SchedulerError> {
        let JobSchedule::Cron(expr) = self.job.schedule() else {
            return Err(SchedulerError::NotCronScheduled);
        };
        let schedule = Schedule::from_str(&expr).map_err(|e| SchedulerError::InvalidCron(expr.clone(), e))?;

        loop {
            let Some(next) = schedule.upcoming(Utc).next() else {
                warn!(job = self.job.name(), "cron schedule has no upcoming occurrences");
                return Ok(());
            };
            let now = Utc::now();
            let delay = (next - now).to_std().unwrap_or(std::time::Duration::ZERO);

            tokio::select! {
                _ = sleep(delay) => {}
                _ = self.cancellation.cancelled() => {
                    info!(job = self.job.name(), "scheduler shutting down before next occurrence");
                    return Ok(());
                }
            }

            if self.cancellation.is_cancelled() {
                return Ok(());
            }

            self.run_one_cycle().await;
        }
    }

    async fn run_one_cycle(&self) {
        let _guard = self.running.lock().await;
        info!(job = self.job.name(), "starting cycle");
        match self.job.run(self.cancellation.clone()).await {
            Ok(()) => info!(job = self.job.name(), "cycle succeeded"),
            Err(e) => error!(job = self.job.name(), error = %e, "cycle failed"),
        }
    }
}
