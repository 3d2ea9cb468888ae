use std::sync::Arc;

use time::Duration;
use tokio::sync::watch;

use super::DeletionScheduler;
use crate::storage::{MetadataStore, StorageResult};

/// Backstop for purges whose job was lost or gave up.
///
/// Only records past `expiration + grace` are touched, so anything the queue
/// is still going to handle is left alone.
pub struct ExpiredSweep {
    scheduler: Arc<DeletionScheduler>,
    metadata: Arc<dyn MetadataStore>,
    grace: Duration,
    batch_size: i64,
}

impl ExpiredSweep {
    pub fn new(
        scheduler: Arc<DeletionScheduler>,
        metadata: Arc<dyn MetadataStore>,
        grace: Duration,
        batch_size: i64,
    ) -> Self {
        Self {
            scheduler,
            metadata,
            grace,
            batch_size,
        }
    }

    /// Purges one batch of overdue records. Returns how many were fully removed.
    pub async fn run_once(&self) -> StorageResult<usize> {
        let cutoff = self.scheduler.clock.now() - self.grace;
        let overdue = self.metadata.find_expired(cutoff, self.batch_size).await?;

        let mut purged = 0;
        for record in overdue {
            if let Err(e) = self.scheduler.cancel(&record.file_id, &record.share_id).await {
                tracing::warn!(share_id = %record.share_id, error = %e, "Could not drop stale deletion job");
            }

            let report = self.scheduler.purge(&record.file_id, &record.share_id).await;
            if report.is_complete() {
                purged += 1;
            }
        }

        Ok(purged)
    }

    pub async fn run(self, interval: std::time::Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            match self.run_once().await {
                Ok(purged) => {
                    if purged > 0 {
                        tracing::info!("Swept {} overdue files", purged);
                    }
                }
                Err(e) => {
                    tracing::error!("Sweep error: {:?}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Expiration;
    use crate::testing::TestHarness;

    #[tokio::test]
    async fn test_sweep_skips_records_within_grace() {
        let h = TestHarness::new();
        h.upload(b"data", Expiration::OneHour).await;
        let sweep = h.sweep(Duration::hours(1));

        h.clock.advance(Duration::hours(1) + Duration::minutes(30));
        assert_eq!(sweep.run_once().await.unwrap(), 0);
        assert_eq!(h.metadata.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_purges_orphaned_records() {
        let h = TestHarness::new();
        let receipt = h.upload(b"data", Expiration::OneHour).await;
        // Lose the job, as if the queue had been wiped.
        h.scheduler
            .cancel(&receipt.file_id, &receipt.share_id)
            .await
            .unwrap();
        let sweep = h.sweep(Duration::hours(1));

        h.clock.advance(Duration::hours(2));
        assert_eq!(sweep.run_once().await.unwrap(), 1);
        assert!(h.metadata.is_empty());
        assert!(!h.blobs.contains(&receipt.file_id));
    }
}
