//! In-memory wiring of the whole service, driven by a manual clock.
//!
//! Built for unit tests and behind the `testing` feature for the
//! integration tests.

use std::sync::Arc;

use bytes::Bytes;
use secrecy::SecretString;
use time::{Duration, OffsetDateTime, macros::datetime};

use crate::access::{AccessService, AccessSettings, UploadReceipt};
use crate::blob::{BlobUpload, MemoryBlobStore};
use crate::clock::ManualClock;
use crate::config::Config;
use crate::models::Expiration;
use crate::passphrase::hash_passphrase;
use crate::state::AppState;
use crate::scheduler::{
    DeletionScheduler, DeletionWorker, ExpiredSweep, MemoryJobQueue, WorkerSettings,
};
use crate::storage::MemoryStorage;

pub const PASSPHRASE: &str = "correct horse battery staple";

pub fn secret(value: &str) -> SecretString {
    SecretString::from(value.to_string())
}

pub fn test_upload(bytes: &'static [u8]) -> BlobUpload {
    BlobUpload {
        bytes: Bytes::from_static(bytes),
        filename: "report.pdf".to_string(),
        mime_type: "application/pdf".to_string(),
    }
}

/// Configuration whose database and bucket settings are never used.
pub fn test_config() -> Config {
    serde_json::from_value(serde_json::json!({
        "server": { "host": "127.0.0.1", "port": 0, "base_url": "http://localhost" },
        "database": {
            "host": "unused", "port": 5432, "username": "unused", "password": "unused",
            "database_name": "unused", "max_connections": 1
        },
        "object_store": {
            "bucket": "unused", "region": "us-east-1",
            "access_key_id": "unused", "secret_access_key": "unused"
        }
    }))
    .expect("test config")
}

pub struct TestHarness {
    pub t0: OffsetDateTime,
    pub clock: Arc<ManualClock>,
    pub blobs: Arc<MemoryBlobStore>,
    pub metadata: Arc<MemoryStorage>,
    pub queue: Arc<MemoryJobQueue>,
    pub scheduler: Arc<DeletionScheduler>,
    pub access: Arc<AccessService>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_settings(AccessSettings::default())
    }

    pub fn with_settings(settings: AccessSettings) -> Self {
        let t0 = datetime!(2025-03-01 12:00 UTC);
        let clock = Arc::new(ManualClock::new(t0));
        let blobs = Arc::new(MemoryBlobStore::new());
        let metadata = Arc::new(MemoryStorage::new());
        let queue = Arc::new(MemoryJobQueue::new());

        let scheduler = Arc::new(DeletionScheduler::new(
            queue.clone(),
            blobs.clone(),
            metadata.clone(),
            clock.clone(),
        ));
        let access = Arc::new(AccessService::new(
            metadata.clone(),
            blobs.clone(),
            scheduler.clone(),
            clock.clone(),
            settings,
        ));

        Self {
            t0,
            clock,
            blobs,
            metadata,
            queue,
            scheduler,
            access,
        }
    }

    /// Uploads `bytes` protected by [`PASSPHRASE`].
    pub async fn upload(&self, bytes: &'static [u8], policy: Expiration) -> UploadReceipt {
        let hash = hash_passphrase(secret(PASSPHRASE))
            .await
            .expect("hashing test passphrase");
        self.access
            .upload(test_upload(bytes), hash, policy)
            .await
            .expect("test upload")
    }

    pub fn worker(&self, settings: WorkerSettings) -> DeletionWorker {
        DeletionWorker::new(0, self.scheduler.clone(), settings)
    }

    /// Router state sharing this harness's stores and clock.
    pub fn app_state(&self) -> AppState {
        AppState::from_parts(
            test_config(),
            self.metadata.clone(),
            self.blobs.clone(),
            self.queue.clone(),
            self.clock.clone(),
        )
    }

    pub fn sweep(&self, grace: Duration) -> ExpiredSweep {
        ExpiredSweep::new(self.scheduler.clone(), self.metadata.clone(), grace, 100)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
