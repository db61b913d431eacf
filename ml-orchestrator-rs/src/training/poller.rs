//! Job lifecycle state machine
//!
//! Polls the scheduler for one job until it reaches a terminal state, the
//! wall-clock deadline passes, or the caller cancels. Each wait is a biased
//! three-way select so cancellation always wins over the deadline, and the
//! deadline always wins over another status query.

use std::sync::Arc;

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::PollConfig;
use crate::core::{BatchScheduler, CancellationSignal};
use crate::error::{OrchestratorError, OrchestratorResult, Stage};
use crate::models::{JobHandle, JobStatus};

const UNKNOWN_FAILURE_REASON: &str = "Unknown error";

pub struct JobPoller {
    scheduler: Arc<dyn BatchScheduler>,
    config: PollConfig,
}

impl JobPoller {
    pub fn new(scheduler: Arc<dyn BatchScheduler>, config: PollConfig) -> Self {
        Self { scheduler, config }
    }

    /// Block until the job succeeds, or return why it did not.
    ///
    /// The deadline is measured from the start of this call. The first status
    /// query happens one interval in. Query errors are fatal.
    pub async fn wait(
        &self,
        handle: &JobHandle,
        cancellation: &CancellationSignal,
    ) -> OrchestratorResult<()> {
        let mut cancellation = cancellation.clone();
        let started = Instant::now();
        let deadline = time::sleep_until(started + self.config.timeout);
        tokio::pin!(deadline);

        let mut ticker = time::interval_at(started + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let job_ids = vec![handle.job_id.clone()];

        loop {
            tokio::select! {
                biased;

                cause = cancellation.cancelled() => {
                    return Err(self.cancelled(handle, cause));
                }
                _ = &mut deadline => {
                    let elapsed = started.elapsed();
                    warn!(job_id = %handle.job_id, job_name = %handle.job_name, ?elapsed, "job wait timed out");
                    return Err(OrchestratorError::Timeout {
                        job_name: handle.job_name.clone(),
                        elapsed,
                    });
                }
                _ = ticker.tick() => {}
            }

            // The tick may have raced a cancellation; do not start a query after it
            if let Some(cause) = cancellation.cause() {
                return Err(self.cancelled(handle, cause));
            }

            let jobs = self
                .scheduler
                .describe(&job_ids)
                .await
                .map_err(|e| OrchestratorError::stage(Stage::Poll, e))?;

            let Some(job) = jobs.into_iter().find(|j| j.job_id == handle.job_id) else {
                warn!(job_id = %handle.job_id, "job missing from scheduler");
                return Err(OrchestratorError::JobNotFound {
                    job_id: handle.job_id.clone(),
                });
            };

            info!(job_name = %handle.job_name, status = %job.status, "job status");

            if !job.status.is_terminal() {
                debug!(job_id = %handle.job_id, "job not finished, waiting for next tick");
                continue;
            }

            match job.status {
                JobStatus::Succeeded => {
                    info!(job_name = %handle.job_name, elapsed = ?started.elapsed(), "training job completed successfully");
                    return Ok(());
                }
                JobStatus::Failed => {
                    let reason = job
                        .status_reason
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| UNKNOWN_FAILURE_REASON.to_string());
                    return Err(OrchestratorError::JobFailed {
                        job_name: handle.job_name.clone(),
                        reason,
                    });
                }
                JobStatus::Cancelled => {
                    return Err(OrchestratorError::JobCancelled {
                        job_name: handle.job_name.clone(),
                    });
                }
                // NotFound is the only remaining terminal state
                _ => {
                    return Err(OrchestratorError::JobNotFound {
                        job_id: handle.job_id.clone(),
                    });
                }
            }
        }
    }

    fn cancelled(&self, handle: &JobHandle, cause: String) -> OrchestratorError {
        info!(job_id = %handle.job_id, %cause, "job wait cancelled");
        OrchestratorError::Cancelled {
            stage: Stage::Poll,
            cause,
        }
    }
}
