//! Upload, passphrase-gated view and early revocation of shared files.
//!
//! `upload` stores the blob, writes the `View`/`Share` pair and schedules the
//! purge. `view` checks the passphrase, hands out a short-lived signed URL and
//! pulls the purge in to a short window. `manual_delete` cancels the purge
//! and removes everything immediately.

use std::sync::Arc;

use secrecy::SecretString;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::blob::{BlobStore, BlobUpload, StoredBlob};
use crate::clock::Clock;
use crate::error::{AccessError, AccessResult};
use crate::models::{Expiration, FileRecord, NewFileRecord};
use crate::passphrase::verify_passphrase;
use crate::scheduler::{DeletionScheduler, PurgeReport, RescheduleOutcome};
use crate::storage::MetadataStore;

#[derive(Debug, Clone)]
pub struct AccessSettings {
    /// How long a file survives after a successful view.
    pub view_window: Duration,
    /// Validity of the retrieval URL handed to the viewer.
    pub signed_url_ttl: std::time::Duration,
}

impl Default for AccessSettings {
    fn default() -> Self {
        Self {
            view_window: Duration::minutes(5),
            signed_url_ttl: std::time::Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub share_id: Uuid,
    pub view_id: Uuid,
    pub file_id: String,
    pub expiration: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct SignedUrl {
    pub url: String,
    pub ttl: std::time::Duration,
}

#[derive(Debug, Clone)]
pub struct ShareDetails {
    pub share_id: Uuid,
    pub view_id: Uuid,
    pub expiration: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct ViewDetails {
    pub view_id: Uuid,
    pub expiration: OffsetDateTime,
}

pub struct AccessService {
    metadata: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
    scheduler: Arc<DeletionScheduler>,
    clock: Arc<dyn Clock>,
    settings: AccessSettings,
}

impl AccessService {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
        scheduler: Arc<DeletionScheduler>,
        clock: Arc<dyn Clock>,
        settings: AccessSettings,
    ) -> Self {
        Self {
            metadata,
            blobs,
            scheduler,
            clock,
            settings,
        }
    }

    /// Stores a file and arms its purge at the policy's deadline.
    ///
    /// If the metadata write fails after the blob was stored, the blob is
    /// left behind and logged as orphaned.
    pub async fn upload(
        &self,
        blob: BlobUpload,
        passphrase_hash: String,
        policy: Expiration,
    ) -> AccessResult<UploadReceipt> {
        let size = blob.bytes.len();
        let stored = self.blobs.put(blob).await.map_err(|e| {
            tracing::error!(error = %e, "Blob store rejected upload");
            e
        })?;

        let expiration = policy.resolve(self.clock.now());
        let record = self
            .metadata
            .create_file_record(NewFileRecord {
                file_id: stored.id.clone(),
                cid: stored.cid.clone(),
                hashed_passphrase: passphrase_hash,
                expiration,
            })
            .await
            .map_err(|e| {
                tracing::error!(
                    file_id = %stored.id,
                    cid = %stored.cid,
                    error = %e,
                    "Saving file record failed, stored blob is orphaned"
                );
                e
            })?;

        if let Err(e) = self
            .scheduler
            .schedule(&record.file_id, &record.share_id, record.expiration)
            .await
        {
            // Without a job nothing would ever purge this file.
            tracing::error!(share_id = %record.share_id, error = %e, "Scheduling deletion failed, rolling back upload");
            let report = self.scheduler.purge(&record.file_id, &record.share_id).await;
            if !report.is_complete() {
                tracing::warn!(share_id = %record.share_id, failures = %report.failure_summary(), "Upload rollback incomplete");
            }
            return Err(e.into());
        }

        tracing::info!(
            share_id = %record.share_id,
            view_id = %record.view_id,
            size,
            expiration = %record.expiration,
            policy = %policy,
            "File uploaded"
        );

        Ok(UploadReceipt {
            share_id: record.share_id,
            view_id: record.view_id,
            file_id: record.file_id,
            expiration: record.expiration,
        })
    }

    /// Unlocks a file for the holder of its passphrase.
    ///
    /// On success the purge is moved to `view_window` from now unless it was
    /// already due sooner.
    pub async fn view(&self, view_id: &Uuid, entered: SecretString) -> AccessResult<SignedUrl> {
        let record = self.live_record_by_view(view_id).await?;

        if !verify_passphrase(entered, record.hashed_passphrase.clone()).await? {
            tracing::warn!(view_id = %view_id, "Rejected passphrase");
            return Err(AccessError::Unauthorized);
        }

        let blob = StoredBlob {
            id: record.file_id.clone(),
            cid: record.cid.clone(),
        };
        let url = self
            .blobs
            .signed_url(&blob, self.settings.signed_url_ttl)
            .await?
            .ok_or(AccessError::NotFound("file"))?;

        match self
            .scheduler
            .reschedule(
                &record.file_id,
                &record.share_id,
                self.settings.view_window,
                true,
            )
            .await
        {
            Ok(RescheduleOutcome::Rescheduled { run_at }) => {
                if let Err(e) = self
                    .metadata
                    .tighten_expiration(&record.share_id, run_at)
                    .await
                {
                    tracing::warn!(share_id = %record.share_id, error = %e, "Could not record tightened expiration");
                }
            }
            Ok(_) => {}
            Err(e) => {
                // The upload deadline still stands.
                tracing::warn!(share_id = %record.share_id, error = %e, "Could not reschedule deletion after view");
            }
        }

        tracing::info!(view_id = %view_id, "File viewed");
        Ok(SignedUrl {
            url,
            ttl: self.settings.signed_url_ttl,
        })
    }

    /// Purges a file ahead of its deadline.
    ///
    /// The job is cancelled first so it cannot fire on rows being removed
    /// here. A job already claimed by a worker may still run; the purge is
    /// idempotent so that is harmless.
    pub async fn manual_delete(&self, file_id: &str, share_id: &Uuid) -> PurgeReport {
        match self.scheduler.cancel(file_id, share_id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(share_id = %share_id, "No waiting deletion job to cancel")
            }
            Err(e) => {
                tracing::warn!(share_id = %share_id, error = %e, "Could not cancel deletion job")
            }
        }

        let report = self.scheduler.purge(file_id, share_id).await;
        if report.is_complete() {
            tracing::info!(file_id = %file_id, share_id = %share_id, "File manually deleted and job removed");
        } else {
            tracing::warn!(share_id = %share_id, failures = %report.failure_summary(), "Manual deletion incomplete");
        }
        report
    }

    /// Revokes a share for the holder of its passphrase.
    pub async fn revoke(&self, share_id: &Uuid, entered: SecretString) -> AccessResult<PurgeReport> {
        let record = self
            .metadata
            .find_by_share(share_id)
            .await?
            .ok_or(AccessError::NotFound("share"))?;

        if !verify_passphrase(entered, record.hashed_passphrase.clone()).await? {
            tracing::warn!(share_id = %share_id, "Rejected passphrase for revocation");
            return Err(AccessError::Unauthorized);
        }

        Ok(self.manual_delete(&record.file_id, &record.share_id).await)
    }

    pub async fn share_details(&self, share_id: &Uuid) -> AccessResult<ShareDetails> {
        let record = self
            .metadata
            .find_by_share(share_id)
            .await?
            .filter(|r| r.expiration > self.clock.now())
            .ok_or(AccessError::NotFound("share"))?;

        Ok(ShareDetails {
            share_id: record.share_id,
            view_id: record.view_id,
            expiration: record.expiration,
        })
    }

    pub async fn view_details(&self, view_id: &Uuid) -> AccessResult<ViewDetails> {
        let record = self.live_record_by_view(view_id).await?;
        Ok(ViewDetails {
            view_id: record.view_id,
            expiration: record.expiration,
        })
    }

    /// Past its expiration a record is treated as gone even if the purge
    /// has not run yet.
    async fn live_record_by_view(&self, view_id: &Uuid) -> AccessResult<FileRecord> {
        self.metadata
            .find_by_view(view_id)
            .await?
            .filter(|r| r.expiration > self.clock.now())
            .ok_or(AccessError::NotFound("view"))
    }
}
