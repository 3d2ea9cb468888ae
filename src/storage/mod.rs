#[cfg(any(test, feature = "testing"))]
mod memory;
mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::{FileRecord, NewFileRecord};

#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migrate error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Metadata store unavailable: {0}")]
    Unavailable(String),
}

pub type StorageResult<T> = Result<T, StoreError>;

/// Relational home of the `View` and `Share` rows.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Creates a `View` and its nested `Share` in one transaction.
    async fn create_file_record(&self, record: NewFileRecord) -> StorageResult<FileRecord>;

    async fn find_by_view(&self, view_id: &Uuid) -> StorageResult<Option<FileRecord>>;

    async fn find_by_share(&self, share_id: &Uuid) -> StorageResult<Option<FileRecord>>;

    /// Deletes a `Share` and then its parent `View` in one transaction.
    ///
    /// Returns `false` when the share was already gone.
    async fn delete_file_record(&self, share_id: &Uuid) -> StorageResult<bool>;

    /// Moves a share's expiration to `deadline` if that is earlier.
    async fn tighten_expiration(
        &self,
        share_id: &Uuid,
        deadline: OffsetDateTime,
    ) -> StorageResult<()>;

    /// Records whose expiration is at or before `cutoff`, oldest first.
    async fn find_expired(
        &self,
        cutoff: OffsetDateTime,
        limit: i64,
    ) -> StorageResult<Vec<FileRecord>>;

    async fn health_check(&self) -> StorageResult<()>;
}
