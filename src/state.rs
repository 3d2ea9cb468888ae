use std::sync::Arc;

use crate::ApiError;
use crate::access::AccessService;
use crate::blob::{BlobStore, S3BlobStore};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::scheduler::{DeletionScheduler, JobQueue, PostgresJobQueue};
use crate::storage::{MetadataStore, PostgresStorage};

#[derive(Clone)]
pub struct AppState {
    pub metadata: Arc<dyn MetadataStore>,
    pub scheduler: Arc<DeletionScheduler>,
    pub access: Arc<AccessService>,
    pub config: Config,
}

impl AppState {
    /// Connects Postgres (metadata and job queue) and the object store.
    pub async fn new(config: Config) -> Result<Self, ApiError> {
        let postgres = PostgresStorage::new(&config.database).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to the database");
            ApiError::new(format!("Database error: {}", e), 500)
        })?;
        let queue: Arc<dyn JobQueue> = Arc::new(PostgresJobQueue::new(postgres.pool().clone()));
        let metadata: Arc<dyn MetadataStore> = Arc::new(postgres);

        let blobs: Arc<dyn BlobStore> = Arc::new(
            S3BlobStore::new(&config.object_store)
                .map_err(|e| ApiError::new(format!("Object store error: {}", e), 500))?,
        );

        Ok(Self::from_parts(config, metadata, blobs, queue, Arc::new(SystemClock)))
    }

    pub fn from_parts(
        config: Config,
        metadata: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
        queue: Arc<dyn JobQueue>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let scheduler = Arc::new(DeletionScheduler::new(
            queue,
            blobs.clone(),
            metadata.clone(),
            clock.clone(),
        ));
        let access = Arc::new(AccessService::new(
            metadata.clone(),
            blobs,
            scheduler.clone(),
            clock,
            config.files.access_settings(),
        ));

        Self {
            metadata,
            scheduler,
            access,
            config,
        }
    }
}
