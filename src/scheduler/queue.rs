use async_trait::async_trait;
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use super::job::{Enqueued, JobKey, NewJob, QueuedJob};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Malformed job payload: {0}")]
    MalformedPayload(#[source] serde_json::Error),

    #[error("Unknown job state: {0}")]
    UnknownState(String),

    #[error("Job queue unavailable: {0}")]
    Unavailable(String),
}

pub type QueueResult<T> = Result<T, QueueError>;

/// Durable delayed-job queue.
///
/// A claimed job is hidden from other workers until its lease runs out.
/// The holder keeps it hidden for as long as it works on the job by calling
/// [`JobQueue::extend_lease`] more often than the lease length. A worker that
/// dies or stalls past its lease loses the job and it is handed out again,
/// so delivery is at-least-once and a stalled firing may overlap the next
/// one. Firings must therefore be idempotent.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Adds a delayed job. If a job with the same key exists it is left
    /// untouched and returned as `Existing`.
    async fn add(&self, job: NewJob) -> QueueResult<Enqueued>;

    async fn get_job(&self, id: &JobKey) -> QueueResult<Option<QueuedJob>>;

    /// Moves the fire time of a job that is still waiting. Returns `false` if
    /// no waiting job has that key.
    async fn change_run_at(&self, id: &JobKey, run_at: OffsetDateTime) -> QueueResult<bool>;

    /// Removes a job that has not been handed to a worker.
    async fn remove(&self, id: &JobKey) -> QueueResult<bool>;

    /// Claims the earliest due job for `lease`.
    async fn dequeue(&self, now: OffsetDateTime, lease: Duration)
    -> QueueResult<Option<QueuedJob>>;

    /// Pushes the lease of a claimed job out to `locked_until`. Returns
    /// `false` if the job is no longer active.
    async fn extend_lease(&self, id: &JobKey, locked_until: OffsetDateTime) -> QueueResult<bool>;

    /// Acknowledges a fired job. The job is dropped from the queue.
    async fn complete(&self, id: &JobKey) -> QueueResult<()>;

    /// Puts a claimed job back to wait until `run_at`.
    async fn retry(&self, id: &JobKey, run_at: OffsetDateTime, error: &str) -> QueueResult<()>;

    /// Parks a claimed job as failed.
    async fn fail(&self, id: &JobKey, error: &str) -> QueueResult<()>;
}
