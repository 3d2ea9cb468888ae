use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::{BlobError, BlobResult, BlobStore, BlobUpload, StoredBlob, content_id};

/// In-process blob store for tests. Only content ids are kept.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, String>>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
    delete_delay_ms: AtomicU64,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, file_id: &str) -> bool {
        self.lock().contains_key(file_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Makes every delete take `delay` of real time.
    pub fn set_delete_delay(&self, delay: Duration) {
        self.delete_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, upload: BlobUpload) -> BlobResult<StoredBlob> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(BlobError::Rejected("put disabled".into()));
        }

        let id = Uuid::new_v4().to_string();
        let cid = content_id(&upload.bytes);
        self.lock().insert(id.clone(), cid.clone());

        Ok(StoredBlob { id, cid })
    }

    async fn delete(&self, file_id: &str) -> BlobResult<()> {
        let delay = self.delete_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BlobError::Rejected("delete disabled".into()));
        }

        self.lock().remove(file_id);
        Ok(())
    }

    async fn signed_url(&self, blob: &StoredBlob, ttl: Duration) -> BlobResult<Option<String>> {
        let objects = self.lock();
        Ok(objects
            .get(&blob.id)
            .filter(|cid| **cid == blob.cid)
            .map(|cid| format!("memory://{}/{}?ttl={}", cid, blob.id, ttl.as_secs())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn upload(content: &'static [u8]) -> BlobUpload {
        BlobUpload {
            bytes: Bytes::from_static(content),
            filename: "notes.txt".into(),
            mime_type: "text/plain".into(),
        }
    }

    #[tokio::test]
    async fn test_put_then_sign() {
        let store = MemoryBlobStore::new();
        let blob = store.put(upload(b"hello")).await.unwrap();

        assert_eq!(blob.cid, content_id(b"hello"));
        let url = store
            .signed_url(&blob, Duration::from_secs(300))
            .await
            .unwrap()
            .unwrap();
        assert!(url.ends_with("ttl=300"));
    }

    #[tokio::test]
    async fn test_identical_content_gets_distinct_ids() {
        let store = MemoryBlobStore::new();
        let a = store.put(upload(b"same")).await.unwrap();
        let b = store.put(upload(b"same")).await.unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(a.cid, b.cid);

        store.delete(&a.id).await.unwrap();
        assert!(store.contains(&b.id));
    }

    #[tokio::test]
    async fn test_delete_missing_blob_is_ok() {
        let store = MemoryBlobStore::new();
        store.delete("never-stored").await.unwrap();
    }

    #[tokio::test]
    async fn test_signed_url_for_missing_blob_is_none() {
        let store = MemoryBlobStore::new();
        let missing = StoredBlob {
            id: "gone".into(),
            cid: "abc".into(),
        };
        assert!(
            store
                .signed_url(&missing, Duration::from_secs(60))
                .await
                .unwrap()
                .is_none()
        );
    }
}
