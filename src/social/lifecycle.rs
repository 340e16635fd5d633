use chrono::Utc;
use serde::Serialize;

use super::{require, validation, Principal, SocialError, SocialResult, SocialService, Upload};
use crate::storage::models::{CommentRecord, DeletionStage, ImageRecord, PostRecord, WriteOp};

/// What a finished post deletion did.
#[derive(Debug, Clone, Serialize)]
pub struct DeletionReport {
    pub post_id: String,
    /// Stage the cascade started from, when resuming an interrupted deletion
    pub resumed_from: Option<DeletionStage>,
    /// False when the media object could not be deleted and was recorded as orphaned
    pub media_deleted: bool,
    pub comments_deleted: usize,
}

impl SocialService {
    // ========================================================================
    // Posts
    // ========================================================================

    /// Store the upload, then persist its image and a new post owned by the principal.
    pub async fn create_post(
        &self,
        principal: Option<&Principal>,
        caption: &str,
        upload: Upload,
    ) -> SocialResult<PostRecord> {
        let principal = require(principal)?;
        validation::plain_text("caption", caption)?;
        self.principal_user(principal)?;
        if upload.data.is_empty() {
            return Err(SocialError::validation("image", "is required"));
        }

        let stored = self
            .media
            .store(upload.data, upload.file_name.as_deref())
            .await?;
        let image = ImageRecord {
            id: uuid::Uuid::new_v4().to_string(),
            url: stored.url,
            filename: stored.filename,
        };

        self.insert_post(principal, caption, image, false).await
    }

    /// Shared tail of direct and draft-based post creation.
    pub(super) async fn insert_post(
        &self,
        principal: &Principal,
        caption: &str,
        image: ImageRecord,
        from_draft: bool,
    ) -> SocialResult<PostRecord> {
        let now = Utc::now();
        let post = PostRecord {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: principal.id.clone(),
            image_id: image.id.clone(),
            caption: caption.to_string(),
            likes: Default::default(),
            comments: Vec::new(),
            created_at: now,
            updated_at: now,
            deletion: None,
        };

        let filename = image.filename.clone();
        let op = WriteOp::CreatePost {
            post: post.clone(),
            image,
            from_draft,
        };
        if let Err(e) = self.commit(op).await {
            // A draft keeps its media so it can be published again
            if !from_draft {
                self.discard_media(&filename).await;
            }
            return Err(e);
        }
        if from_draft && self.db.get_post(&post.id)?.is_none() {
            // The draft was replaced or swept after it was read
            self.release_media(&filename).await;
            return Err(SocialError::NotFound("Draft"));
        }

        tracing::debug!(post_id = %post.id, owner_id = %post.owner_id, "Created post");
        Ok(post)
    }

    /// Replace the caption of a post. Only the owner may edit.
    pub async fn edit_post(
        &self,
        principal: Option<&Principal>,
        post_id: &str,
        caption: &str,
    ) -> SocialResult<PostRecord> {
        let principal = require(principal)?;
        let post = self.live_post(post_id)?;
        if post.owner_id != principal.id {
            return Err(SocialError::Forbidden);
        }
        validation::plain_text("caption", caption)?;

        self.commit(WriteOp::UpdateCaption {
            post_id: post_id.to_string(),
            caption: caption.to_string(),
            updated_at: Utc::now(),
        })
        .await?;

        tracing::debug!(post_id = %post_id, "Updated post caption");
        self.live_post(post_id)
    }

    /// Delete a post with its image and comments. Only the owner may delete.
    ///
    /// A post whose deletion was interrupted resumes from its recorded stage.
    pub async fn delete_post(
        &self,
        principal: Option<&Principal>,
        post_id: &str,
    ) -> SocialResult<DeletionReport> {
        let principal = require(principal)?;
        let post = self
            .db
            .get_post(post_id)?
            .ok_or(SocialError::NotFound("Post"))?;
        if post.owner_id != principal.id {
            return Err(SocialError::Forbidden);
        }

        self.run_deletion(post).await
    }

    /// Drive every interrupted deletion to completion. Returns how many finished.
    pub async fn resume_pending_deletions(&self) -> SocialResult<usize> {
        let pending: Vec<PostRecord> = self
            .db
            .get_all_posts()?
            .into_iter()
            .filter(|post| !post.is_live())
            .collect();

        let mut finished = 0;
        for post in pending {
            let post_id = post.id.clone();
            match self.run_deletion(post).await {
                Ok(_) => finished += 1,
                Err(e) => {
                    tracing::error!(post_id = %post_id, error = %e, "Could not resume post deletion")
                }
            }
        }
        Ok(finished)
    }

    /// pending -> media_deleted -> children_deleted -> complete.
    ///
    /// Each step is its own committed write; a failed step leaves the stage
    /// recorded so the next call picks up from there.
    async fn run_deletion(&self, post: PostRecord) -> SocialResult<DeletionReport> {
        let post_id = post.id.clone();
        let resumed_from = post.deletion;

        if resumed_from.is_none() {
            self.cascade_step(&post_id, DeletionStage::Pending, WriteOp::BeginPostDeletion {
                post_id: post_id.clone(),
            })
            .await?;
        }

        let mut media_deleted = true;
        if resumed_from < Some(DeletionStage::MediaDeleted) {
            if let Some(image) = self.db.get_image(&post.image_id)? {
                media_deleted = self.discard_media(&image.filename).await;
            }
            self.cascade_step(&post_id, DeletionStage::MediaDeleted, WriteOp::DeletePostImage {
                post_id: post_id.clone(),
            })
            .await?;
        }

        let comments_deleted = post.comments.len();
        if resumed_from < Some(DeletionStage::ChildrenDeleted) {
            self.cascade_step(
                &post_id,
                DeletionStage::ChildrenDeleted,
                WriteOp::DeletePostComments {
                    post_id: post_id.clone(),
                },
            )
            .await?;
        }

        self.cascade_step(&post_id, DeletionStage::Complete, WriteOp::DeletePost {
            post_id: post_id.clone(),
        })
        .await?;

        tracing::debug!(
            post_id = %post_id,
            comments_deleted,
            media_deleted,
            resumed = resumed_from.is_some(),
            "Deleted post"
        );
        Ok(DeletionReport {
            post_id,
            resumed_from,
            media_deleted,
            comments_deleted,
        })
    }

    async fn cascade_step(
        &self,
        post_id: &str,
        stage: DeletionStage,
        op: WriteOp,
    ) -> SocialResult<()> {
        self.commit(op).await.inspect_err(|e| {
            tracing::error!(
                post_id = %post_id,
                stage = ?stage,
                error = %e,
                "Post deletion step failed, cascade left resumable"
            )
        })
    }

    // ========================================================================
    // Comments
    // ========================================================================

    /// Append a new comment to a post.
    pub async fn add_comment(
        &self,
        principal: Option<&Principal>,
        post_id: &str,
        body: &str,
    ) -> SocialResult<CommentRecord> {
        let principal = require(principal)?;
        validation::required_text("body", body)?;
        self.principal_user(principal)?;
        self.live_post(post_id)?;

        let comment = CommentRecord {
            id: uuid::Uuid::new_v4().to_string(),
            author_id: principal.id.clone(),
            body: body.to_string(),
            created_at: Utc::now(),
        };
        self.commit(WriteOp::AddComment {
            post_id: post_id.to_string(),
            comment: comment.clone(),
        })
        .await?;
        if self.db.get_comment(&comment.id)?.is_none() {
            // The post was deleted after the liveness check
            return Err(SocialError::NotFound("Post"));
        }

        tracing::debug!(post_id = %post_id, comment_id = %comment.id, "Created comment");
        Ok(comment)
    }

    /// Remove a comment and its reference on the post in one write.
    /// The comment's author and the post's owner may delete.
    pub async fn delete_comment(
        &self,
        principal: Option<&Principal>,
        post_id: &str,
        comment_id: &str,
    ) -> SocialResult<()> {
        let principal = require(principal)?;
        let comment = self
            .db
            .get_comment(comment_id)?
            .ok_or(SocialError::NotFound("Comment"))?;
        let post = self.live_post(post_id)?;
        if !post.comments.iter().any(|id| id == comment_id) {
            return Err(SocialError::NotFound("Comment"));
        }
        if comment.author_id != principal.id && post.owner_id != principal.id {
            return Err(SocialError::Forbidden);
        }

        self.commit(WriteOp::RemoveComment {
            post_id: post_id.to_string(),
            comment_id: comment_id.to_string(),
        })
        .await?;

        tracing::debug!(post_id = %post_id, comment_id = %comment_id, "Deleted comment");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{principal, register, test_service, test_service_interleaved, upload};

    #[tokio::test]
    async fn create_post_stores_caption_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_service(&dir);
        let alice = register(&env.service, "alice").await;

        let post = env
            .service
            .create_post(Some(&alice), "hello", upload())
            .await
            .unwrap();

        let stored = env.db.get_post(&post.id).unwrap().unwrap();
        assert_eq!(stored.caption, "hello");
        assert_eq!(stored.owner_id, alice.id);
        assert_eq!(stored.likes.count(), 0);
        let image = env.db.get_image(&stored.image_id).unwrap().unwrap();
        assert!(env.media.exists(&image.filename).await.unwrap());
    }

    #[tokio::test]
    async fn create_post_rejects_markup_without_storing_media() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_service(&dir);
        let alice = register(&env.service, "alice").await;

        let err = env
            .service
            .create_post(Some(&alice), "<script>x</script>", upload())
            .await
            .unwrap_err();

        assert!(matches!(err, SocialError::Validation { field: "caption", .. }));
        assert!(env.db.get_all_posts().unwrap().is_empty());
        assert!(env.db.get_all_images().unwrap().is_empty());
    }

    #[tokio::test]
    async fn anonymous_and_unknown_principals_cannot_post() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_service(&dir);

        let err = env.service.create_post(None, "hi", upload()).await.unwrap_err();
        assert!(matches!(err, SocialError::Unauthenticated));

        let ghost = principal("ghost-id", "ghost");
        let err = env
            .service
            .create_post(Some(&ghost), "hi", upload())
            .await
            .unwrap_err();
        assert!(matches!(err, SocialError::Unauthenticated));
    }

    #[tokio::test]
    async fn only_owner_edits_caption() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_service(&dir);
        let alice = register(&env.service, "alice").await;
        let bob = register(&env.service, "bob").await;
        let post = env
            .service
            .create_post(Some(&alice), "first", upload())
            .await
            .unwrap();

        let err = env
            .service
            .edit_post(Some(&bob), &post.id, "mine now")
            .await
            .unwrap_err();
        assert!(matches!(err, SocialError::Forbidden));

        let edited = env
            .service
            .edit_post(Some(&alice), &post.id, "second")
            .await
            .unwrap();
        assert_eq!(edited.caption, "second");
        assert_eq!(edited.image_id, post.image_id);

        let err = env
            .service
            .edit_post(Some(&alice), &post.id, "<b>x</b>")
            .await
            .unwrap_err();
        assert!(matches!(err, SocialError::Validation { field: "caption", .. }));
        assert_eq!(env.db.get_post(&post.id).unwrap().unwrap().caption, "second");

        let err = env
            .service
            .edit_post(Some(&alice), "missing", "x")
            .await
            .unwrap_err();
        assert!(matches!(err, SocialError::NotFound("Post")));
    }

    #[tokio::test]
    async fn delete_post_cascades_to_image_and_comments() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_service(&dir);
        let alice = register(&env.service, "alice").await;
        let bob = register(&env.service, "bob").await;
        let post = env
            .service
            .create_post(Some(&alice), "bye", upload())
            .await
            .unwrap();
        let image = env.db.get_image(&post.image_id).unwrap().unwrap();
        let c1 = env
            .service
            .add_comment(Some(&bob), &post.id, "nice")
            .await
            .unwrap();
        let c2 = env
            .service
            .add_comment(Some(&alice), &post.id, "thanks")
            .await
            .unwrap();

        let err = env
            .service
            .delete_post(Some(&bob), &post.id)
            .await
            .unwrap_err();
        assert!(matches!(err, SocialError::Forbidden));

        let report = env.service.delete_post(Some(&alice), &post.id).await.unwrap();
        assert_eq!(report.comments_deleted, 2);
        assert!(report.media_deleted);
        assert!(report.resumed_from.is_none());

        assert!(env.db.get_post(&post.id).unwrap().is_none());
        assert!(env.db.get_image(&post.image_id).unwrap().is_none());
        assert!(env.db.get_comment(&c1.id).unwrap().is_none());
        assert!(env.db.get_comment(&c2.id).unwrap().is_none());
        assert!(!env.media.exists(&image.filename).await.unwrap());
        assert!(env.db.get_posts_by_owner(&alice.id).unwrap().is_empty());

        let err = env
            .service
            .delete_post(Some(&alice), &post.id)
            .await
            .unwrap_err();
        assert!(matches!(err, SocialError::NotFound("Post")));
    }

    #[tokio::test]
    async fn interrupted_deletion_resumes_from_recorded_stage() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_service(&dir);
        let alice = register(&env.service, "alice").await;
        let post = env
            .service
            .create_post(Some(&alice), "half gone", upload())
            .await
            .unwrap();
        let comment = env
            .service
            .add_comment(Some(&alice), &post.id, "note")
            .await
            .unwrap();

        // Simulate a crash after the image step
        env.db
            .apply(&WriteOp::BeginPostDeletion {
                post_id: post.id.clone(),
            })
            .unwrap();
        env.db
            .apply(&WriteOp::DeletePostImage {
                post_id: post.id.clone(),
            })
            .unwrap();

        // Hidden from readers while in progress
        assert!(matches!(
            env.service.get_post(&post.id).unwrap_err(),
            SocialError::NotFound("Post")
        ));

        let finished = env.service.resume_pending_deletions().await.unwrap();
        assert_eq!(finished, 1);
        assert!(env.db.get_post(&post.id).unwrap().is_none());
        assert!(env.db.get_comment(&comment.id).unwrap().is_none());
        assert_eq!(env.service.resume_pending_deletions().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn replaying_cascade_steps_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_service(&dir);
        let alice = register(&env.service, "alice").await;
        let post = env
            .service
            .create_post(Some(&alice), "again", upload())
            .await
            .unwrap();

        env.service.delete_post(Some(&alice), &post.id).await.unwrap();

        for op in [
            WriteOp::BeginPostDeletion { post_id: post.id.clone() },
            WriteOp::DeletePostImage { post_id: post.id.clone() },
            WriteOp::DeletePostComments { post_id: post.id.clone() },
            WriteOp::DeletePost { post_id: post.id.clone() },
        ] {
            env.db.apply(&op).unwrap();
        }
        assert!(env.db.get_post(&post.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_media_delete_does_not_block_post_deletion() {
        let dir = tempfile::tempdir().unwrap();
        let env = crate::testutil::test_service_with_failing_deletes(&dir);
        let alice = register(&env.service, "alice").await;
        let post = env
            .service
            .create_post(Some(&alice), "stuck?", upload())
            .await
            .unwrap();
        let image = env.db.get_image(&post.image_id).unwrap().unwrap();

        let report = env.service.delete_post(Some(&alice), &post.id).await.unwrap();
        assert!(!report.media_deleted);
        assert!(env.db.get_post(&post.id).unwrap().is_none());
        assert!(env.db.get_image(&post.image_id).unwrap().is_none());

        let orphans = env.db.get_orphaned_media().unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].filename, image.filename);
    }

    #[tokio::test]
    async fn add_then_delete_comment_restores_list() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_service(&dir);
        let alice = register(&env.service, "alice").await;
        let bob = register(&env.service, "bob").await;
        let post = env
            .service
            .create_post(Some(&alice), "talk", upload())
            .await
            .unwrap();
        let first = env
            .service
            .add_comment(Some(&alice), &post.id, "first")
            .await
            .unwrap();
        let before = env.db.get_post(&post.id).unwrap().unwrap().comments;

        let comment = env
            .service
            .add_comment(Some(&bob), &post.id, "hey")
            .await
            .unwrap();
        let during = env.db.get_post(&post.id).unwrap().unwrap().comments;
        assert_eq!(during, vec![first.id.clone(), comment.id.clone()]);

        env.service
            .delete_comment(Some(&bob), &post.id, &comment.id)
            .await
            .unwrap();

        let after = env.db.get_post(&post.id).unwrap().unwrap().comments;
        assert_eq!(after, before);
        assert!(env.db.get_comment(&comment.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn comment_deletion_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_service(&dir);
        let alice = register(&env.service, "alice").await;
        let bob = register(&env.service, "bob").await;
        let carol = register(&env.service, "carol").await;
        let post = env
            .service
            .create_post(Some(&alice), "rules", upload())
            .await
            .unwrap();
        let by_bob = env
            .service
            .add_comment(Some(&bob), &post.id, "from bob")
            .await
            .unwrap();

        let err = env
            .service
            .delete_comment(Some(&carol), &post.id, &by_bob.id)
            .await
            .unwrap_err();
        assert!(matches!(err, SocialError::Forbidden));

        // Post owner may remove anyone's comment
        env.service
            .delete_comment(Some(&alice), &post.id, &by_bob.id)
            .await
            .unwrap();

        let err = env
            .service
            .delete_comment(Some(&alice), &post.id, &by_bob.id)
            .await
            .unwrap_err();
        assert!(matches!(err, SocialError::NotFound("Comment")));
    }

    #[tokio::test]
    async fn comment_body_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_service(&dir);
        let alice = register(&env.service, "alice").await;
        let post = env
            .service
            .create_post(Some(&alice), "x", upload())
            .await
            .unwrap();

        for body in ["", "<b>bold</b>"] {
            let err = env
                .service
                .add_comment(Some(&alice), &post.id, body)
                .await
                .unwrap_err();
            assert!(matches!(err, SocialError::Validation { field: "body", .. }));
        }

        let err = env
            .service
            .add_comment(Some(&alice), "nope", "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, SocialError::NotFound("Post")));
    }

    #[tokio::test]
    async fn comment_on_post_deleted_mid_flight_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (env, interleaving) = test_service_interleaved(&dir);
        let alice = register(&env.service, "alice").await;
        let bob = register(&env.service, "bob").await;
        let post = env
            .service
            .create_post(Some(&alice), "going away", upload())
            .await
            .unwrap();

        interleaving.before_next(
            |op| matches!(op, WriteOp::AddComment { .. }),
            WriteOp::BeginPostDeletion {
                post_id: post.id.clone(),
            },
        );

        let err = env
            .service
            .add_comment(Some(&bob), &post.id, "too late")
            .await
            .unwrap_err();
        assert!(matches!(err, SocialError::NotFound("Post")));
        assert!(env.db.get_all_comments().unwrap().is_empty());
        assert!(env.db.get_post(&post.id).unwrap().unwrap().comments.is_empty());
    }
}
