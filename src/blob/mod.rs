#[cfg(any(test, feature = "testing"))]
mod memory;
mod s3;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryBlobStore;
pub use s3::S3BlobStore;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Object store rejected the request: {0}")]
    Rejected(String),
}

pub type BlobResult<T> = Result<T, BlobError>;

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct BlobUpload {
    pub bytes: Bytes,
    pub filename: String,
    pub mime_type: String,
}

/// Where a stored blob lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Opaque identifier, unique per upload.
    pub id: String,
    /// SHA-256 of the content, hex encoded.
    pub cid: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, upload: BlobUpload) -> BlobResult<StoredBlob>;

    /// Removes a blob. A blob that is already gone counts as deleted.
    async fn delete(&self, file_id: &str) -> BlobResult<()>;

    /// Issues a time-limited retrieval URL, or `None` when the blob is absent.
    async fn signed_url(&self, blob: &StoredBlob, ttl: Duration) -> BlobResult<Option<String>>;
}

pub fn content_id(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Keeps a client-supplied filename safe to embed in a header.
pub(crate) fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect();

    if cleaned.trim().is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}
