//! snapgram's state machine for muster cluster replication.

use serde::{Deserialize, Serialize};

use crate::storage::models::{
    CommentRecord, DraftRecord, ImageRecord, OrphanedMedia, PostRecord, UserRecord, WriteOp,
};
use crate::storage::{Database, DatabaseError};

/// The snapgram state machine, replicated by muster.
pub struct SocialStateMachine {
    db: Database,
}

impl SocialStateMachine {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

/// Full state snapshot for syncing lagging followers.
#[derive(Debug, Serialize, Deserialize)]
pub struct SocialSnapshot {
    pub users: Vec<UserRecord>,
    pub images: Vec<ImageRecord>,
    pub posts: Vec<PostRecord>,
    pub comments: Vec<CommentRecord>,
    pub drafts: Vec<DraftRecord>,
    pub orphaned_media: Vec<OrphanedMedia>,
}

impl SocialSnapshot {
    pub fn capture(db: &Database) -> Result<Self, DatabaseError> {
        let mut posts = db.get_all_posts()?;
        posts.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        Ok(Self {
            users: db.get_all_users()?,
            images: db.get_all_images()?,
            posts,
            comments: db.get_all_comments()?,
            drafts: db.get_all_drafts()?,
            orphaned_media: db.get_orphaned_media()?,
        })
    }

    /// Replace the contents of `db` with the snapshot, replayed as write ops.
    pub fn restore_into(self, db: &Database) -> Result<(), DatabaseError> {
        db.purge_all()?;

        let mut images: std::collections::HashMap<String, ImageRecord> = self
            .images
            .into_iter()
            .map(|image| (image.id.clone(), image))
            .collect();

        for user in self.users {
            let photo = user
                .profile_photo
                .as_ref()
                .and_then(|id| images.remove(id));
            db.apply(&WriteOp::CreateUser(user.clone()))?;
            if let Some(image) = photo {
                db.apply(&WriteOp::SetProfilePhoto {
                    user_id: user.id.clone(),
                    image,
                    replaced_at: user.created_at,
                })?;
            }
        }

        let comments: std::collections::HashMap<String, CommentRecord> = self
            .comments
            .into_iter()
            .map(|comment| (comment.id.clone(), comment))
            .collect();

        for mut post in self.posts {
            let Some(image) = images.remove(&post.image_id) else {
                continue;
            };
            let comment_ids = std::mem::take(&mut post.comments);
            let post_id = post.id.clone();
            db.apply(&WriteOp::CreatePost {
                post,
                image,
                from_draft: false,
            })?;
            for comment in comment_ids.iter().filter_map(|id| comments.get(id)) {
                db.apply(&WriteOp::AddComment {
                    post_id: post_id.clone(),
                    comment: comment.clone(),
                })?;
            }
        }

        for draft in self.drafts {
            db.apply(&WriteOp::PutDraft(draft))?;
        }
        for orphan in self.orphaned_media {
            let record = WriteOp::RecordOrphanedMedia {
                filename: orphan.filename,
                recorded_at: orphan.recorded_at,
            };
            for _ in 0..orphan.attempts.max(1) {
                db.apply(&record)?;
            }
        }
        Ok(())
    }
}

impl muster::StateMachine for SocialStateMachine {
    type WriteOp = WriteOp;
    type Snapshot = SocialSnapshot;

    fn apply(&self, op: &WriteOp) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.db.apply(op)?;
        Ok(())
    }

    fn snapshot(&self) -> Result<SocialSnapshot, Box<dyn std::error::Error + Send + Sync>> {
        Ok(SocialSnapshot::capture(&self.db)?)
    }

    fn restore(
        &self,
        snapshot: SocialSnapshot,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        snapshot.restore_into(&self.db)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{register, test_service, upload};

    #[tokio::test]
    async fn snapshot_restores_relationships_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_service(&dir);
        let alice = register(&env.service, "alice").await;
        let bob = register(&env.service, "bob").await;
        let post = env
            .service
            .create_post(Some(&alice), "hello", upload())
            .await
            .unwrap();
        env.service.toggle_like(Some(&bob), &post.id).await.unwrap();
        env.service.toggle_follow(Some(&bob), "alice").await.unwrap();
        env.service
            .add_comment(Some(&bob), &post.id, "nice")
            .await
            .unwrap();

        let snapshot = SocialSnapshot::capture(&env.db).unwrap();

        let other_dir = tempfile::tempdir().unwrap();
        let replica = Database::open(other_dir.path()).unwrap();
        replica
            .apply(&WriteOp::SetPostCount {
                user_id: "stale".to_string(),
                count: 1,
            })
            .unwrap();
        snapshot.restore_into(&replica).unwrap();

        let restored = replica.get_post(&post.id).unwrap().unwrap();
        assert!(restored.likes.contains(&bob.id));
        assert_eq!(restored.comments.len(), 1);
        assert!(replica.get_image(&restored.image_id).unwrap().is_some());

        let alice_rec = replica.get_user_by_username("alice").unwrap().unwrap();
        assert!(alice_rec.followers.contains(&bob.id));
        assert_eq!(replica.get_posts_by_owner(&alice.id).unwrap().len(), 1);
        assert_eq!(replica.get_all_users().unwrap().len(), 2);
    }
}
