use chrono::{DateTime, Duration, Utc};

use super::{require, validation, Principal, SocialError, SocialResult, SocialService, Upload};
use crate::storage::models::{DraftRecord, ImageRecord, PostRecord, WriteOp};

impl SocialService {
    /// Stage an upload that waits for its caption. A newer draft replaces the old one.
    pub async fn stage_draft(
        &self,
        principal: Option<&Principal>,
        upload: Upload,
    ) -> SocialResult<DraftRecord> {
        let principal = require(principal)?;
        self.principal_user(principal)?;
        if upload.data.is_empty() {
            return Err(SocialError::validation("image", "is required"));
        }
        let previous = self.db.get_draft(&principal.id)?;
        let now = Utc::now();
        let expires_at = self.draft_expiry(now)?;

        let stored = self
            .media
            .store(upload.data, upload.file_name.as_deref())
            .await?;
        let draft = DraftRecord {
            user_id: principal.id.clone(),
            image: ImageRecord {
                id: uuid::Uuid::new_v4().to_string(),
                url: stored.url,
                filename: stored.filename,
            },
            created_at: now,
            expires_at,
        };

        if let Err(e) = self.commit(WriteOp::PutDraft(draft.clone())).await {
            self.discard_media(&draft.image.filename).await;
            return Err(e);
        }
        if let Some(old) = previous {
            self.release_media(&old.image.filename).await;
        }

        tracing::debug!(user_id = %principal.id, expires_at = %draft.expires_at, "Staged draft");
        Ok(draft)
    }

    fn draft_expiry(&self, now: DateTime<Utc>) -> SocialResult<DateTime<Utc>> {
        i64::try_from(self.config.draft_ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                SocialError::Dependency(format!(
                    "draft ttl of {}s is out of range",
                    self.config.draft_ttl_seconds
                ))
            })
    }

    /// The principal's unexpired draft.
    pub fn current_draft(&self, principal: Option<&Principal>) -> SocialResult<DraftRecord> {
        let principal = require(principal)?;
        self.db
            .get_draft(&principal.id)?
            .filter(|draft| !draft.is_expired(Utc::now()))
            .ok_or(SocialError::NotFound("Draft"))
    }

    /// Turn the principal's draft into a post with `caption`.
    pub async fn publish_draft(
        &self,
        principal: Option<&Principal>,
        caption: &str,
    ) -> SocialResult<PostRecord> {
        let principal = require(principal)?;
        validation::plain_text("caption", caption)?;
        self.principal_user(principal)?;
        let draft = self.current_draft(Some(principal))?;

        self.insert_post(principal, caption, draft.image, true).await
    }

    /// Remove drafts that expired before `now`, with their media. Returns how many.
    pub async fn sweep_expired_drafts(&self, now: DateTime<Utc>) -> SocialResult<usize> {
        let expired: Vec<DraftRecord> = self
            .db
            .get_all_drafts()?
            .into_iter()
            .filter(|draft| draft.is_expired(now))
            .collect();

        for draft in &expired {
            self.commit(WriteOp::DeleteDraft {
                user_id: draft.user_id.clone(),
                image_id: draft.image.id.clone(),
                recorded_at: now,
            })
            .await?;
            self.release_media(&draft.image.filename).await;
        }

        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "Swept expired drafts");
        }
        Ok(expired.len())
    }
}
