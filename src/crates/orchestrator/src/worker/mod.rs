//! Worker Loop
//!
//! A tokio task that polls for runnable Jobs and drives each one via
//! `JobController::tick` until it blocks or goes terminal. Any number of
//! Worker processes can run the same loop against the same database: the
//! Job lease (see `db::repositories::job_repo`) is what keeps them from
//! double-driving a Job.

use crate::controller::JobController;
use crate::db::repositories::JobRepository;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

/// Polls `list_runnable` every `poll_interval` and ticks each runnable Job
/// once per pass. A Job whose tick leaves it still runnable (budget
/// exhausted, more fan-out work pending) is picked up again on the next pass.
pub struct WorkerLoop {
    controller: Arc<JobController>,
    poll_interval: Duration,
}

impl WorkerLoop {
    pub fn new(controller: Arc<JobController>, poll_interval: Duration) -> Self {
        Self { controller, poll_interval }
    }

    /// Runs until `shutdown` reports `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("worker loop started");
        loop {
            if *shutdown.borrow() {
                tracing::info!("worker loop shutting down");
                return;
            }
            self.poll_once().await;

            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
                _ = sleep(self.poll_interval) => {}
            }
        }
    }

    async fn poll_once(&self) {
        let runnable = match JobRepository::list_runnable(self.controller.pool()).await {
            Ok(jobs) => jobs,
            Err(err) => {
                tracing::warn!(error = %err, "failed to list runnable jobs");
                return;
            }
        };

        for job in runnable {
            match self.controller.tick(&job.id).await {
                Ok(snapshot) => {
                    tracing::debug!(job_id = %job.id, status = %snapshot.job.status, progress = snapshot.progress.percent, "ticked job");
                }
                Err(err) => {
                    tracing::warn!(job_id = %job.id, error = %err, "tick failed");
                }
            }
        }
    }
}
