use std::time::Duration;

use async_trait::async_trait;
use axum::http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use uuid::Uuid;

use super::{BlobResult, BlobStore, BlobUpload, StoredBlob, content_id, sanitize_filename};
use crate::config::ObjectStoreConfig;

/// Blob store backed by an S3-compatible bucket.
pub struct S3BlobStore {
    store: AmazonS3,
    prefix: String,
}

impl S3BlobStore {
    pub fn new(config: &ObjectStoreConfig) -> BlobResult<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_access_key_id(&config.access_key_id)
            .with_secret_access_key(&config.secret_access_key)
            .with_allow_http(config.allow_http);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }

        tracing::info!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = config.endpoint.as_deref().unwrap_or("<aws>"),
            "Configured S3 blob store"
        );

        Ok(Self {
            store: builder.build()?,
            prefix: config.prefix.trim_matches('/').to_string(),
        })
    }

    fn object_path(&self, file_id: &str) -> Path {
        if self.prefix.is_empty() {
            Path::from(file_id)
        } else {
            Path::from(format!("{}/{}", self.prefix, file_id))
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, upload: BlobUpload) -> BlobResult<StoredBlob> {
        let id = Uuid::new_v4().to_string();
        let cid = content_id(&upload.bytes);
        let path = self.object_path(&id);

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, upload.mime_type.into());
        attributes.insert(
            Attribute::ContentDisposition,
            format!(
                "attachment; filename=\"{}\"",
                sanitize_filename(&upload.filename)
            )
            .into(),
        );
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&path, PutPayload::from(upload.bytes), options)
            .await?;

        tracing::debug!(file_id = %id, cid = %cid, "Stored blob");
        Ok(StoredBlob { id, cid })
    }

    async fn delete(&self, file_id: &str) -> BlobResult<()> {
        match self.store.delete(&self.object_path(file_id)).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn signed_url(&self, blob: &StoredBlob, ttl: Duration) -> BlobResult<Option<String>> {
        let path = self.object_path(&blob.id);

        match self.store.head(&path).await {
            Ok(_) => {}
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let url = self.store.signed_url(Method::GET, &path, ttl).await?;
        Ok(Some(url.to_string()))
    }
}
