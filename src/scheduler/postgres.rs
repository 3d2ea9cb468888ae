use async_trait::async_trait;
use sqlx::FromRow;
use sqlx::postgres::PgPool;
use time::{Duration, OffsetDateTime};

use super::job::{Enqueued, JobKey, JobState, NewJob, QueuedJob};
use super::queue::{JobQueue, QueueError, QueueResult};

const JOB_COLUMNS: &str = "job_id, name, payload, state, run_at, attempts";

#[derive(Debug, FromRow)]
struct JobRow {
    job_id: String,
    name: String,
    payload: serde_json::Value,
    state: String,
    run_at: OffsetDateTime,
    attempts: i32,
}

impl TryFrom<JobRow> for QueuedJob {
    type Error = QueueError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let state = JobState::parse(&row.state).ok_or(QueueError::UnknownState(row.state))?;
        Ok(QueuedJob {
            id: JobKey::from_raw(row.job_id),
            name: row.name,
            payload: row.payload,
            state,
            run_at: row.run_at,
            attempts: row.attempts.max(0) as u32,
        })
    }
}

/// Job queue stored in the `deletion_jobs` table.
///
/// Claims use `FOR UPDATE SKIP LOCKED`, so any number of workers across
/// processes can poll the same table.
#[derive(Clone)]
pub struct PostgresJobQueue {
    pool: PgPool,
}

impl PostgresJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobQueue for PostgresJobQueue {
    async fn add(&self, job: NewJob) -> QueueResult<Enqueued> {
        let inserted = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            INSERT INTO deletion_jobs (job_id, name, payload, state, run_at)
            VALUES ($1, $2, $3, 'delayed', $4)
            ON CONFLICT (job_id) DO NOTHING
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(job.id.as_str())
        .bind(&job.name)
        .bind(&job.payload)
        .bind(job.run_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok(Enqueued::Added(row.try_into()?));
        }

        match self.get_job(&job.id).await? {
            Some(existing) => Ok(Enqueued::Existing(existing)),
            None => Err(QueueError::Unavailable(format!(
                "job {} vanished while being enqueued",
                job.id
            ))),
        }
    }

    async fn get_job(&self, id: &JobKey) -> QueueResult<Option<QueuedJob>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM deletion_jobs WHERE job_id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(QueuedJob::try_from).transpose()
    }

    async fn change_run_at(&self, id: &JobKey, run_at: OffsetDateTime) -> QueueResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE deletion_jobs
            SET run_at = $2, updated_at = NOW()
            WHERE job_id = $1 AND state = 'delayed'
            "#,
        )
        .bind(id.as_str())
        .bind(run_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove(&self, id: &JobKey) -> QueueResult<bool> {
        let result = sqlx::query("DELETE FROM deletion_jobs WHERE job_id = $1 AND state <> 'active'")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn dequeue(
        &self,
        now: OffsetDateTime,
        lease: Duration,
    ) -> QueueResult<Option<QueuedJob>> {
        // Active rows with a lapsed lease belong to a worker that died mid-firing.
        let row = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            UPDATE deletion_jobs
            SET state = 'active', attempts = attempts + 1, locked_until = $2, updated_at = $1
            WHERE job_id = (
                SELECT job_id FROM deletion_jobs
                WHERE (state = 'delayed' AND run_at <= $1)
                   OR (state = 'active' AND locked_until < $1)
                ORDER BY run_at
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(now)
        .bind(now + lease)
        .fetch_optional(&self.pool)
        .await?;

        row.map(QueuedJob::try_from).transpose()
    }

    async fn extend_lease(&self, id: &JobKey, locked_until: OffsetDateTime) -> QueueResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE deletion_jobs
            SET locked_until = $2, updated_at = NOW()
            WHERE job_id = $1 AND state = 'active'
            "#,
        )
        .bind(id.as_str())
        .bind(locked_until)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn complete(&self, id: &JobKey) -> QueueResult<()> {
        sqlx::query("DELETE FROM deletion_jobs WHERE job_id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn retry(&self, id: &JobKey, run_at: OffsetDateTime, error: &str) -> QueueResult<()> {
        sqlx::query(
            r#"
            UPDATE deletion_jobs
            SET state = 'delayed', run_at = $2, locked_until = NULL, last_error = $3, updated_at = NOW()
            WHERE job_id = $1
            "#,
        )
        .bind(id.as_str())
        .bind(run_at)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fail(&self, id: &JobKey, error: &str) -> QueueResult<()> {
        sqlx::query(
            r#"
            UPDATE deletion_jobs
            SET state = 'failed', locked_until = NULL, last_error = $2, updated_at = NOW()
            WHERE job_id = $1
            "#,
        )
        .bind(id.as_str())
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
