use std::sync::Arc;

use time::Duration;
use tokio::sync::watch;

use super::queue::QueueResult;
use super::{DeletionScheduler, JobKey, PurgeReport};

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Pause between polls when nothing is due.
    pub poll_interval: std::time::Duration,
    /// How long a claimed job stays hidden from other workers.
    pub lease: Duration,
    /// How often a running firing pushes its lease out. Keep it well under
    /// `lease`.
    pub lease_renewal: std::time::Duration,
    /// Deliveries allowed before a job is parked as failed.
    pub max_attempts: u32,
    /// Multiplied by the attempt number to space out retries.
    pub retry_backoff: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_interval: std::time::Duration::from_secs(1),
            lease: Duration::minutes(5),
            lease_renewal: std::time::Duration::from_secs(60),
            max_attempts: 1,
            retry_backoff: Duration::seconds(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed(JobKey, PurgeReport),
    Retrying(JobKey, PurgeReport),
    Failed(JobKey, PurgeReport),
    /// The payload could not be decoded.
    Rejected(JobKey),
}

/// Consumer loop pulling due purges off the queue.
pub struct DeletionWorker {
    id: usize,
    scheduler: Arc<DeletionScheduler>,
    settings: WorkerSettings,
}

impl DeletionWorker {
    pub fn new(id: usize, scheduler: Arc<DeletionScheduler>, settings: WorkerSettings) -> Self {
        Self {
            id,
            scheduler,
            settings,
        }
    }

    /// Polls until `shutdown` turns true. An in-flight firing always runs to
    /// completion before the loop checks the signal.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(worker = self.id, "Deletion worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.tick().await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => tracing::error!(worker = self.id, error = %e, "Deletion queue error"),
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }

        tracing::info!(worker = self.id, "Deletion worker stopped");
    }

    /// Claims and fires at most one due job.
    pub async fn tick(&self) -> QueueResult<Option<JobOutcome>> {
        let queue = &self.scheduler.queue;
        let now = self.scheduler.clock.now();

        let Some(job) = queue.dequeue(now, self.settings.lease).await? else {
            return Ok(None);
        };
        tracing::debug!(worker = self.id, job_id = %job.id, attempt = job.attempts, "Picked up job");

        let fired = {
            let fire = self.scheduler.fire(&job);
            tokio::pin!(fire);
            let mut renewal = tokio::time::interval(self.settings.lease_renewal);
            renewal.tick().await;
            loop {
                tokio::select! {
                    fired = &mut fire => break fired,
                    _ = renewal.tick() => self.renew_lease(&job.id).await,
                }
            }
        };

        let report = match fired {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Rejecting job");
                queue.fail(&job.id, &e.to_string()).await?;
                return Ok(Some(JobOutcome::Rejected(job.id)));
            }
        };

        if report.is_complete() {
            queue.complete(&job.id).await?;
            return Ok(Some(JobOutcome::Completed(job.id, report)));
        }

        let summary = report.failure_summary();
        if job.attempts < self.settings.max_attempts {
            let run_at = now + self.settings.retry_backoff * job.attempts;
            tracing::warn!(job_id = %job.id, attempt = job.attempts, retry_at = %run_at, failures = %summary, "Deletion incomplete, retrying");
            queue.retry(&job.id, run_at, &summary).await?;
            Ok(Some(JobOutcome::Retrying(job.id, report)))
        } else {
            tracing::error!(job_id = %job.id, attempt = job.attempts, failures = %summary, "Failed job");
            queue.fail(&job.id, &summary).await?;
            Ok(Some(JobOutcome::Failed(job.id, report)))
        }
    }

    async fn renew_lease(&self, id: &JobKey) {
        let locked_until = self.scheduler.clock.now() + self.settings.lease;
        match self.scheduler.queue.extend_lease(id, locked_until).await {
            Ok(true) => tracing::debug!(job_id = %id, %locked_until, "Lease renewed"),
            Ok(false) => tracing::warn!(job_id = %id, "Lease lost while firing"),
            Err(e) => tracing::warn!(job_id = %id, error = %e, "Failed to renew lease"),
        }
    }
}
