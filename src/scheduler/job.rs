use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::QueueError;

pub const DELETE_JOB_NAME: &str = "delete";

/// Deterministic queue id for the purge of one `(file, share)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey(String);

impl JobKey {
    pub fn for_file(file_id: &str, share_id: &Uuid) -> Self {
        Self(format!("delete-{file_id}-{share_id}"))
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteJob {
    pub file_id: String,
    pub share_id: Uuid,
}

/// What a queued job asks the worker to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobPayload {
    Delete(DeleteJob),
}

impl JobPayload {
    pub fn decode(value: &serde_json::Value) -> Result<Self, QueueError> {
        serde_json::from_value(value.clone()).map_err(QueueError::MalformedPayload)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Waiting for its fire time.
    Delayed,
    /// Claimed by a worker.
    Active,
    /// Gave up after its last attempt.
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Delayed => "delayed",
            JobState::Active => "active",
            JobState::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "delayed" => Some(JobState::Delayed),
            "active" => Some(JobState::Active),
            "failed" => Some(JobState::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: JobKey,
    pub name: String,
    pub payload: serde_json::Value,
    pub run_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub id: JobKey,
    pub name: String,
    pub payload: serde_json::Value,
    pub state: JobState,
    pub run_at: OffsetDateTime,
    pub attempts: u32,
}

impl QueuedJob {
    /// Time left before the job fires, never negative.
    pub fn remaining(&self, now: OffsetDateTime) -> Duration {
        delay_until(now, self.run_at)
    }
}

/// Outcome of adding a job whose key may already be queued.
#[derive(Debug, Clone)]
pub enum Enqueued {
    Added(QueuedJob),
    Existing(QueuedJob),
}

impl Enqueued {
    pub fn job(&self) -> &QueuedJob {
        match self {
            Enqueued::Added(job) | Enqueued::Existing(job) => job,
        }
    }
}

pub fn delay_until(now: OffsetDateTime, deadline: OffsetDateTime) -> Duration {
    (deadline - now).max(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_job_key_is_deterministic() {
        let share_id = Uuid::parse_str("6f1c0a52-4a55-4a4f-8a65-3f1cb3b5a111").unwrap();
        let a = JobKey::for_file("file-1", &share_id);
        let b = JobKey::for_file("file-1", &share_id);

        assert_eq!(a, b);
        assert_eq!(
            a.as_str(),
            "delete-file-1-6f1c0a52-4a55-4a4f-8a65-3f1cb3b5a111"
        );
    }

    #[test]
    fn test_delay_is_never_negative() {
        let now = datetime!(2026-01-01 12:00 UTC);
        assert_eq!(
            delay_until(now, datetime!(2026-01-01 11:00 UTC)),
            Duration::ZERO
        );
        assert_eq!(
            delay_until(now, datetime!(2026-01-01 13:00 UTC)),
            Duration::hours(1)
        );
    }

    #[test]
    fn test_payload_is_tagged() {
        let payload = JobPayload::Delete(DeleteJob {
            file_id: "abc".into(),
            share_id: Uuid::nil(),
        });
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(value["type"], "delete");
        assert_eq!(value["fileId"], "abc");
        assert_eq!(JobPayload::decode(&value).unwrap(), payload);
    }

    #[test]
    fn test_malformed_payload_is_rejected() {
        let value = serde_json::json!({ "fileId": "abc" });
        assert!(matches!(
            JobPayload::decode(&value),
            Err(QueueError::MalformedPayload(_))
        ));

        let value = serde_json::json!({ "type": "delete", "fileId": "abc", "shareId": "nope" });
        assert!(JobPayload::decode(&value).is_err());
    }
}
