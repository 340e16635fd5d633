use chrono::Utc;
use serde::Serialize;

use super::{SocialResult, SocialService};
use crate::storage::models::WriteOp;

#[derive(Debug, Default, Serialize)]
pub struct ReconcileStats {
    pub cleared: u64,
    pub remaining: u64,
}

impl SocialService {
    /// Best-effort delete of a media object.
    ///
    /// A failed delete never blocks the caller: it is logged and recorded as
    /// orphaned media for [`SocialService::reconcile_orphaned_media`].
    /// Returns true if the object is gone.
    pub(super) async fn discard_media(&self, filename: &str) -> bool {
        let Err(e) = self.media.delete(filename).await else {
            return true;
        };

        tracing::warn!(filename = %filename, error = %e, "Failed to delete media object");
        let record = WriteOp::RecordOrphanedMedia {
            filename: filename.to_string(),
            recorded_at: Utc::now(),
        };
        if let Err(e) = self.commit(record).await {
            tracing::error!(filename = %filename, error = %e, "Failed to record orphaned media");
        }
        false
    }

    /// Delete media that a committed op recorded as orphaned.
    ///
    /// Does nothing unless `filename` is still in the orphan table, so a
    /// stale view of what was replaced never deletes referenced media. A
    /// failed delete stays recorded for the reconciler.
    pub(super) async fn release_media(&self, filename: &str) -> bool {
        match self.db.get_orphan(filename) {
            Ok(Some(_)) => {}
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(filename = %filename, error = %e, "Failed to look up orphaned media");
                return false;
            }
        }

        match self.media.delete(filename).await {
            Ok(()) => {
                let clear = WriteOp::ClearOrphanedMedia {
                    filename: filename.to_string(),
                };
                if let Err(e) = self.commit(clear).await {
                    tracing::warn!(filename = %filename, error = %e, "Failed to clear orphaned media");
                }
                true
            }
            Err(e) => {
                tracing::warn!(filename = %filename, error = %e, "Failed to delete media object");
                let record = WriteOp::RecordOrphanedMedia {
                    filename: filename.to_string(),
                    recorded_at: Utc::now(),
                };
                if let Err(e) = self.commit(record).await {
                    tracing::error!(filename = %filename, error = %e, "Failed to record orphaned media");
                }
                false
            }
        }
    }

    /// Delete every media object recorded as orphaned.
    pub async fn reconcile_orphaned_media(&self) -> SocialResult<ReconcileStats> {
        let mut stats = ReconcileStats::default();

        for orphan in self.db.get_orphaned_media()? {
            match self.media.delete(&orphan.filename).await {
                Ok(()) => {
                    self.commit(WriteOp::ClearOrphanedMedia {
                        filename: orphan.filename.clone(),
                    })
                    .await?;
                    stats.cleared += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        filename = %orphan.filename,
                        attempts = orphan.attempts + 1,
                        error = %e,
                        "Orphaned media delete failed again"
                    );
                    self.commit(WriteOp::RecordOrphanedMedia {
                        filename: orphan.filename,
                        recorded_at: orphan.recorded_at,
                    })
                    .await?;
                    stats.remaining += 1;
                }
            }
        }

        if stats.cleared > 0 || stats.remaining > 0 {
            tracing::info!(
                cleared = stats.cleared,
                remaining = stats.remaining,
                "Reconciled orphaned media"
            );
        }
        Ok(stats)
    }
}
