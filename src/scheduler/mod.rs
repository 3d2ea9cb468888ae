//! Delayed purging of uploaded files.
//!
//! Every upload gets one job in a durable queue, keyed by its
//! `(file_id, share_id)` pair. When the job fires the blob is removed from
//! the object store and the `Share`/`View` rows are removed from the
//! metadata store. A successful view pulls the fire time in; an early
//! revocation cancels the job and purges straight away.

mod job;
#[cfg(any(test, feature = "testing"))]
mod memory;
mod postgres;
mod queue;
mod sweep;
mod worker;

use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::blob::BlobStore;
use crate::clock::Clock;
use crate::storage::MetadataStore;

pub use job::{
    DELETE_JOB_NAME, DeleteJob, Enqueued, JobKey, JobPayload, JobState, NewJob, QueuedJob,
    delay_until,
};
#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryJobQueue;
pub use postgres::PostgresJobQueue;
pub use queue::{JobQueue, QueueError, QueueResult};
pub use sweep::ExpiredSweep;
pub use worker::{DeletionWorker, JobOutcome, WorkerSettings};

/// Handle to a scheduled purge.
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub key: JobKey,
    pub run_at: OffsetDateTime,
    /// `false` when a job for the same key was already queued.
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RescheduleOutcome {
    /// No waiting job for the key: it already fired, was cancelled, is in
    /// flight, or never existed.
    Missing,
    /// The job already fires at or before the requested window.
    Skipped { run_at: OffsetDateTime },
    Rescheduled { run_at: OffsetDateTime },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Deleted,
    AlreadyGone,
    Failed(String),
}

impl StepOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }
}

/// Result of the two independent purge steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeReport {
    pub blob: StepOutcome,
    pub metadata: StepOutcome,
}

impl PurgeReport {
    pub fn is_complete(&self) -> bool {
        !self.blob.is_failed() && !self.metadata.is_failed()
    }

    pub fn failure_summary(&self) -> String {
        let mut failures = Vec::new();
        if let StepOutcome::Failed(e) = &self.blob {
            failures.push(format!("blob: {e}"));
        }
        if let StepOutcome::Failed(e) = &self.metadata {
            failures.push(format!("metadata: {e}"));
        }
        failures.join("; ")
    }
}

pub struct DeletionScheduler {
    pub(crate) queue: Arc<dyn JobQueue>,
    blobs: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl DeletionScheduler {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        blobs: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            queue,
            blobs,
            metadata,
            clock,
        }
    }

    /// Queues the purge of a file to fire at `expiration`.
    ///
    /// A second call for the same pair targets the job already queued and
    /// does not move it.
    pub async fn schedule(
        &self,
        file_id: &str,
        share_id: &Uuid,
        expiration: OffsetDateTime,
    ) -> QueueResult<JobHandle> {
        let now = self.clock.now();
        let delay = delay_until(now, expiration);
        let key = JobKey::for_file(file_id, share_id);
        let payload = JobPayload::Delete(DeleteJob {
            file_id: file_id.to_string(),
            share_id: *share_id,
        });

        let enqueued = self
            .queue
            .add(NewJob {
                id: key.clone(),
                name: DELETE_JOB_NAME.to_string(),
                payload: serde_json::to_value(&payload).map_err(QueueError::MalformedPayload)?,
                run_at: now + delay,
            })
            .await?;

        let created = matches!(enqueued, Enqueued::Added(_));
        let run_at = enqueued.job().run_at;
        if created {
            tracing::info!(
                job_id = %key,
                delay_ms = delay.whole_milliseconds(),
                run_at = %run_at,
                "Scheduled file deletion"
            );
        } else {
            tracing::warn!(job_id = %key, run_at = %run_at, "Deletion already scheduled");
        }

        Ok(JobHandle {
            key,
            run_at,
            created,
        })
    }

    /// Moves a waiting purge to fire `new_delay` from now.
    ///
    /// A missing job is left missing. With `skip_if_lower` a job that already
    /// fires within `new_delay` keeps its time, so the window only shrinks.
    pub async fn reschedule(
        &self,
        file_id: &str,
        share_id: &Uuid,
        new_delay: Duration,
        skip_if_lower: bool,
    ) -> QueueResult<RescheduleOutcome> {
        let key = JobKey::for_file(file_id, share_id);

        let Some(job) = self.queue.get_job(&key).await? else {
            tracing::info!(job_id = %key, "Job not found, nothing to reschedule");
            return Ok(RescheduleOutcome::Missing);
        };

        if job.state != JobState::Delayed {
            tracing::info!(job_id = %key, state = job.state.as_str(), "Job is not waiting, nothing to reschedule");
            return Ok(RescheduleOutcome::Missing);
        }

        let now = self.clock.now();
        let new_delay = new_delay.max(Duration::ZERO);
        if skip_if_lower && job.remaining(now) <= new_delay {
            tracing::info!(job_id = %key, run_at = %job.run_at, "Skipping job rescheduling");
            return Ok(RescheduleOutcome::Skipped { run_at: job.run_at });
        }

        let run_at = now + new_delay;
        if !self.queue.change_run_at(&key, run_at).await? {
            // Claimed or removed between the lookup and the update.
            tracing::info!(job_id = %key, "Job left the queue before it could be rescheduled");
            return Ok(RescheduleOutcome::Missing);
        }

        tracing::info!(
            job_id = %key,
            minutes = new_delay.whole_minutes(),
            run_at = %run_at,
            "Rescheduled file deletion"
        );
        Ok(RescheduleOutcome::Rescheduled { run_at })
    }

    /// Drops a purge that has not been handed to a worker yet.
    pub async fn cancel(&self, file_id: &str, share_id: &Uuid) -> QueueResult<bool> {
        let key = JobKey::for_file(file_id, share_id);
        let removed = self.queue.remove(&key).await?;
        tracing::debug!(job_id = %key, removed, "Cancelled file deletion");
        Ok(removed)
    }

    /// Runs a delivered job.
    pub async fn fire(&self, job: &QueuedJob) -> QueueResult<PurgeReport> {
        match JobPayload::decode(&job.payload)? {
            JobPayload::Delete(delete) => Ok(self.on_fire(&delete).await),
        }
    }

    pub async fn on_fire(&self, job: &DeleteJob) -> PurgeReport {
        let report = self.purge(&job.file_id, &job.share_id).await;
        if report.is_complete() {
            tracing::info!(
                file_id = %job.file_id,
                share_id = %job.share_id,
                blob = ?report.blob,
                metadata = ?report.metadata,
                "Deleted expired file"
            );
        }
        report
    }

    /// Deletes the blob, then the `Share`/`View` pair.
    ///
    /// Both steps always run; a failure in one is logged and reported but
    /// never stops the other.
    pub async fn purge(&self, file_id: &str, share_id: &Uuid) -> PurgeReport {
        let blob = match self.blobs.delete(file_id).await {
            Ok(()) => StepOutcome::Deleted,
            Err(e) => {
                tracing::error!(file_id = %file_id, error = %e, "Failed to delete blob");
                StepOutcome::Failed(e.to_string())
            }
        };

        let metadata = match self.metadata.delete_file_record(share_id).await {
            Ok(true) => StepOutcome::Deleted,
            Ok(false) => StepOutcome::AlreadyGone,
            Err(e) => {
                tracing::error!(share_id = %share_id, error = %e, "Failed to delete file record");
                StepOutcome::Failed(e.to_string())
            }
        };

        PurgeReport { blob, metadata }
    }
}
