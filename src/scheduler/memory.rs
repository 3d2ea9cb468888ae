use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};

use super::job::{Enqueued, JobKey, JobState, NewJob, QueuedJob};
use super::queue::{JobQueue, QueueError, QueueResult};

#[derive(Debug, Clone)]
struct Entry {
    job: QueuedJob,
    locked_until: Option<OffsetDateTime>,
    last_error: Option<String>,
}

/// Job queue kept in process memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryJobQueue {
    entries: Mutex<HashMap<JobKey, Entry>>,
    unavailable: AtomicBool,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_error(&self, id: &JobKey) -> Option<String> {
        self.lock().get(id).and_then(|e| e.last_error.clone())
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> QueueResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(QueueError::Unavailable("queue unreachable".into()));
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<JobKey, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn add(&self, job: NewJob) -> QueueResult<Enqueued> {
        self.check()?;
        let mut entries = self.lock();

        if let Some(existing) = entries.get(&job.id) {
            return Ok(Enqueued::Existing(existing.job.clone()));
        }

        let queued = QueuedJob {
            id: job.id.clone(),
            name: job.name,
            payload: job.payload,
            state: JobState::Delayed,
            run_at: job.run_at,
            attempts: 0,
        };
        entries.insert(
            job.id,
            Entry {
                job: queued.clone(),
                locked_until: None,
                last_error: None,
            },
        );

        Ok(Enqueued::Added(queued))
    }

    async fn get_job(&self, id: &JobKey) -> QueueResult<Option<QueuedJob>> {
        self.check()?;
        Ok(self.lock().get(id).map(|e| e.job.clone()))
    }

    async fn change_run_at(&self, id: &JobKey, run_at: OffsetDateTime) -> QueueResult<bool> {
        self.check()?;
        match self.lock().get_mut(id) {
            Some(entry) if entry.job.state == JobState::Delayed => {
                entry.job.run_at = run_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn remove(&self, id: &JobKey) -> QueueResult<bool> {
        self.check()?;
        let mut entries = self.lock();
        match entries.get(id) {
            Some(entry) if entry.job.state != JobState::Active => {
                entries.remove(id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn dequeue(
        &self,
        now: OffsetDateTime,
        lease: Duration,
    ) -> QueueResult<Option<QueuedJob>> {
        self.check()?;
        let mut entries = self.lock();

        let next = entries
            .values()
            .filter(|e| match e.job.state {
                JobState::Delayed => e.job.run_at <= now,
                JobState::Active => e.locked_until.is_some_and(|until| until < now),
                JobState::Failed => false,
            })
            .min_by_key(|e| e.job.run_at)
            .map(|e| e.job.id.clone());

        let Some(id) = next else {
            return Ok(None);
        };
        let Some(entry) = entries.get_mut(&id) else {
            return Ok(None);
        };

        entry.job.state = JobState::Active;
        entry.job.attempts += 1;
        entry.locked_until = Some(now + lease);
        Ok(Some(entry.job.clone()))
    }

    async fn extend_lease(&self, id: &JobKey, locked_until: OffsetDateTime) -> QueueResult<bool> {
        self.check()?;
        match self.lock().get_mut(id) {
            Some(entry) if entry.job.state == JobState::Active => {
                entry.locked_until = Some(locked_until);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete(&self, id: &JobKey) -> QueueResult<()> {
        self.check()?;
        self.lock().remove(id);
        Ok(())
    }

    async fn retry(&self, id: &JobKey, run_at: OffsetDateTime, error: &str) -> QueueResult<()> {
        self.check()?;
        if let Some(entry) = self.lock().get_mut(id) {
            entry.job.state = JobState::Delayed;
            entry.job.run_at = run_at;
            entry.locked_until = None;
            entry.last_error = Some(error.to_string());
        }
        Ok(())
    }

    async fn fail(&self, id: &JobKey, error: &str) -> QueueResult<()> {
        self.check()?;
        if let Some(entry) = self.lock().get_mut(id) {
            entry.job.state = JobState::Failed;
            entry.locked_until = None;
            entry.last_error = Some(error.to_string());
        }
        Ok(())
    }
}
