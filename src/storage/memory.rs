use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::{FileRecord, NewFileRecord};
use crate::storage::{MetadataStore, StorageResult, StoreError};

/// Metadata store held in a map keyed by share id.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: Mutex<HashMap<Uuid, FileRecord>>,
    unavailable: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Makes every call fail, as if the database went away.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, FileRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl MetadataStore for MemoryStorage {
    async fn create_file_record(&self, record: NewFileRecord) -> StorageResult<FileRecord> {
        self.check()?;

        let created = FileRecord {
            view_id: Uuid::new_v4(),
            share_id: Uuid::new_v4(),
            file_id: record.file_id,
            cid: record.cid,
            hashed_passphrase: record.hashed_passphrase,
            expiration: record.expiration,
            created_at: OffsetDateTime::now_utc(),
        };
        self.lock().insert(created.share_id, created.clone());

        Ok(created)
    }

    async fn find_by_view(&self, view_id: &Uuid) -> StorageResult<Option<FileRecord>> {
        self.check()?;
        Ok(self.lock().values().find(|r| r.view_id == *view_id).cloned())
    }

    async fn find_by_share(&self, share_id: &Uuid) -> StorageResult<Option<FileRecord>> {
        self.check()?;
        Ok(self.lock().get(share_id).cloned())
    }

    async fn delete_file_record(&self, share_id: &Uuid) -> StorageResult<bool> {
        self.check()?;
        Ok(self.lock().remove(share_id).is_some())
    }

    async fn tighten_expiration(
        &self,
        share_id: &Uuid,
        deadline: OffsetDateTime,
    ) -> StorageResult<()> {
        self.check()?;
        if let Some(record) = self.lock().get_mut(share_id) {
            record.expiration = record.expiration.min(deadline);
        }
        Ok(())
    }

    async fn find_expired(
        &self,
        cutoff: OffsetDateTime,
        limit: i64,
    ) -> StorageResult<Vec<FileRecord>> {
        self.check()?;
        let mut expired: Vec<FileRecord> = self
            .lock()
            .values()
            .filter(|r| r.expiration <= cutoff)
            .cloned()
            .collect();
        expired.sort_by_key(|r| r.expiration);
        expired.truncate(limit.max(0) as usize);
        Ok(expired)
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.check()
    }
}
