use chrono::{DateTime, Utc};
use redb::{ReadableTable, TableDefinition, WriteTransaction};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::db::{decode, encode, Database, DatabaseError};
use super::models::{
    DeletionStage, DraftRecord, ImageRecord, OrphanedMedia, PostRecord, UserRecord, WriteOp,
};
use super::tables::*;

type RecordTable = TableDefinition<'static, &'static str, &'static [u8]>;

impl Database {
    /// Apply a write operation inside a single write transaction.
    ///
    /// Ops that reference a missing record are no-ops, so replaying an op
    /// (or a partially applied cascade) never fails on absent state.
    pub fn apply(&self, op: &WriteOp) -> Result<(), DatabaseError> {
        let write_txn = self.begin_write()?;

        match op {
            WriteOp::CreateUser(user) => {
                let email = user.email.to_lowercase();
                let mut usernames = write_txn.open_table(USERNAMES)?;
                let mut emails = write_txn.open_table(EMAILS)?;
                // Whoever claimed the name or address first keeps it
                let taken = usernames.get(user.username.as_str())?.is_some()
                    || emails.get(email.as_str())?.is_some();
                if !taken {
                    usernames.insert(user.username.as_str(), user.id.as_str())?;
                    emails.insert(email.as_str(), user.id.as_str())?;
                    drop(usernames);
                    drop(emails);
                    store(&write_txn, USERS, &user.id, user)?;
                }
            }
            WriteOp::UpdateBio { user_id, bio } => {
                if let Some(mut user) = load::<UserRecord>(&write_txn, USERS, user_id)? {
                    user.bio = bio.clone();
                    store(&write_txn, USERS, user_id, &user)?;
                }
            }
            WriteOp::SetProfilePhoto {
                user_id,
                image,
                replaced_at,
            } => {
                if let Some(mut user) = load::<UserRecord>(&write_txn, USERS, user_id)? {
                    let previous = user.profile_photo.replace(image.id.clone());
                    store(&write_txn, IMAGES, &image.id, image)?;
                    store(&write_txn, USERS, user_id, &user)?;
                    if let Some(old_id) = previous.filter(|old| *old != image.id) {
                        if let Some(old) = load::<ImageRecord>(&write_txn, IMAGES, &old_id)? {
                            remove(&write_txn, IMAGES, &old_id)?;
                            record_orphan(&write_txn, &old.filename, *replaced_at, false)?;
                        }
                    }
                }
            }
            WriteOp::CreatePost {
                post,
                image,
                from_draft,
            } => {
                let draft_matches = || -> Result<bool, DatabaseError> {
                    let draft = load::<DraftRecord>(&write_txn, DRAFTS, &post.owner_id)?;
                    Ok(draft.is_some_and(|draft| draft.image.id == image.id))
                };
                // A draft replaced or swept since it was read is not published
                if !*from_draft || draft_matches()? {
                    store(&write_txn, IMAGES, &image.id, image)?;
                    store(&write_txn, POSTS, &post.id, post)?;
                    index_owner_post(&write_txn, &post.owner_id, &post.id)?;
                    if *from_draft {
                        remove(&write_txn, DRAFTS, &post.owner_id)?;
                    }
                }
            }
            WriteOp::UpdateCaption {
                post_id,
                caption,
                updated_at,
            } => {
                if let Some(mut post) = load::<PostRecord>(&write_txn, POSTS, post_id)? {
                    if post.is_live() {
                        post.caption = caption.clone();
                        post.updated_at = *updated_at;
                        store(&write_txn, POSTS, post_id, &post)?;
                    }
                }
            }
            WriteOp::BeginPostDeletion { post_id } => {
                advance_deletion(&write_txn, post_id, DeletionStage::Pending, |_, _| Ok(()))?;
            }
            WriteOp::DeletePostImage { post_id } => {
                advance_deletion(
                    &write_txn,
                    post_id,
                    DeletionStage::MediaDeleted,
                    |txn, post| remove(txn, IMAGES, &post.image_id).map(|_| ()),
                )?;
            }
            WriteOp::DeletePostComments { post_id } => {
                advance_deletion(
                    &write_txn,
                    post_id,
                    DeletionStage::ChildrenDeleted,
                    |txn, post| {
                        remove_comments(txn, &post.comments)?;
                        post.comments.clear();
                        Ok(())
                    },
                )?;
            }
            WriteOp::DeletePost { post_id } => {
                if let Some(post) = load::<PostRecord>(&write_txn, POSTS, post_id)? {
                    remove(&write_txn, POSTS, post_id)?;
                    unindex_owner_post(&write_txn, &post.owner_id, post_id)?;
                }
            }
            WriteOp::AddComment { post_id, comment } => {
                if let Some(mut post) = load::<PostRecord>(&write_txn, POSTS, post_id)? {
                    if post.is_live() && !post.comments.contains(&comment.id) {
                        store(&write_txn, COMMENTS, &comment.id, comment)?;
                        post.comments.push(comment.id.clone());
                        store(&write_txn, POSTS, post_id, &post)?;
                    }
                }
            }
            WriteOp::RemoveComment {
                post_id,
                comment_id,
            } => {
                if let Some(mut post) = load::<PostRecord>(&write_txn, POSTS, post_id)? {
                    post.comments.retain(|id| id != comment_id);
                    store(&write_txn, POSTS, post_id, &post)?;
                }
                remove(&write_txn, COMMENTS, comment_id)?;
            }
            WriteOp::ToggleLike { post_id, user_id } => {
                if let Some(mut post) = load::<PostRecord>(&write_txn, POSTS, post_id)? {
                    if post.is_live() {
                        post.likes.toggle(user_id);
                        store(&write_txn, POSTS, post_id, &post)?;
                    }
                }
            }
            WriteOp::ToggleFollow {
                follower_id,
                target_id,
            } => {
                if follower_id != target_id {
                    let follower = load::<UserRecord>(&write_txn, USERS, follower_id)?;
                    let target = load::<UserRecord>(&write_txn, USERS, target_id)?;
                    if let (Some(mut follower), Some(mut target)) = (follower, target) {
                        // Direction is decided by the target's follower set alone
                        if target.followers.toggle(follower_id) {
                            follower.following.insert(target_id);
                        } else {
                            follower.following.remove(target_id);
                        }
                        store(&write_txn, USERS, follower_id, &follower)?;
                        store(&write_txn, USERS, target_id, &target)?;
                    }
                }
            }
            WriteOp::SetPostCount { user_id, count } => {
                if let Some(mut user) = load::<UserRecord>(&write_txn, USERS, user_id)? {
                    if user.num_of_posts != *count {
                        user.num_of_posts = *count;
                        store(&write_txn, USERS, user_id, &user)?;
                    }
                }
            }
            WriteOp::PutDraft(draft) => {
                if let Some(old) = load::<DraftRecord>(&write_txn, DRAFTS, &draft.user_id)? {
                    if old.image.id != draft.image.id {
                        record_orphan(&write_txn, &old.image.filename, draft.created_at, false)?;
                    }
                }
                store(&write_txn, DRAFTS, &draft.user_id, draft)?;
            }
            WriteOp::DeleteDraft {
                user_id,
                image_id,
                recorded_at,
            } => {
                if let Some(draft) = load::<DraftRecord>(&write_txn, DRAFTS, user_id)? {
                    if draft.image.id == *image_id {
                        remove(&write_txn, DRAFTS, user_id)?;
                        record_orphan(&write_txn, &draft.image.filename, *recorded_at, false)?;
                    }
                }
            }
            WriteOp::RecordOrphanedMedia {
                filename,
                recorded_at,
            } => {
                record_orphan(&write_txn, filename, *recorded_at, true)?;
            }
            WriteOp::ClearOrphanedMedia { filename } => {
                remove(&write_txn, ORPHANED_MEDIA, filename)?;
            }
        }

        write_txn.commit()?;
        Ok(())
    }
}

fn load<T: DeserializeOwned>(
    write_txn: &WriteTransaction,
    definition: RecordTable,
    key: &str,
) -> Result<Option<T>, DatabaseError> {
    let table = write_txn.open_table(definition)?;
    let result = match table.get(key)? {
        Some(data) => Some(decode(data.value())?),
        None => None,
    };
    Ok(result)
}

fn store<T: Serialize>(
    write_txn: &WriteTransaction,
    definition: RecordTable,
    key: &str,
    value: &T,
) -> Result<(), DatabaseError> {
    let data = encode(value)?;
    let mut table = write_txn.open_table(definition)?;
    table.insert(key, data.as_slice())?;
    Ok(())
}

fn remove(
    write_txn: &WriteTransaction,
    definition: RecordTable,
    key: &str,
) -> Result<bool, DatabaseError> {
    let mut table = write_txn.open_table(definition)?;
    let existed = table.remove(key)?.is_some();
    Ok(existed)
}

fn remove_comments(write_txn: &WriteTransaction, ids: &[String]) -> Result<(), DatabaseError> {
    let mut table = write_txn.open_table(COMMENTS)?;
    for id in ids {
        table.remove(id.as_str())?;
    }
    Ok(())
}

/// Track a media object that no record references any more.
///
/// `failed` counts a failed delete; a newly released object starts at zero
/// attempts.
fn record_orphan(
    write_txn: &WriteTransaction,
    filename: &str,
    recorded_at: DateTime<Utc>,
    failed: bool,
) -> Result<(), DatabaseError> {
    let orphan = match load::<OrphanedMedia>(write_txn, ORPHANED_MEDIA, filename)? {
        Some(mut existing) => {
            existing.attempts += u32::from(failed);
            existing
        }
        None => OrphanedMedia {
            filename: filename.to_string(),
            attempts: u32::from(failed),
            recorded_at,
        },
    };
    store(write_txn, ORPHANED_MEDIA, filename, &orphan)
}

/// Run one cascade step and record the stage it reached.
///
/// The step is skipped when the post already reached `stage`, and the whole
/// call is a no-op when the post record is gone.
fn advance_deletion<F>(
    write_txn: &WriteTransaction,
    post_id: &str,
    stage: DeletionStage,
    step: F,
) -> Result<(), DatabaseError>
where
    F: FnOnce(&WriteTransaction, &mut PostRecord) -> Result<(), DatabaseError>,
{
    let Some(mut post) = load::<PostRecord>(write_txn, POSTS, post_id)? else {
        return Ok(());
    };
    if post.deletion.is_some_and(|current| current >= stage) {
        return Ok(());
    }
    step(write_txn, &mut post)?;
    post.deletion = Some(stage);
    store(write_txn, POSTS, post_id, &post)
}

fn index_owner_post(
    write_txn: &WriteTransaction,
    owner_id: &str,
    post_id: &str,
) -> Result<(), DatabaseError> {
    let mut post_ids: Vec<String> = load(write_txn, OWNER_POSTS, owner_id)?.unwrap_or_default();
    if !post_ids.iter().any(|id| id == post_id) {
        post_ids.push(post_id.to_string());
        store(write_txn, OWNER_POSTS, owner_id, &post_ids)?;
    }
    Ok(())
}

fn unindex_owner_post(
    write_txn: &WriteTransaction,
    owner_id: &str,
    post_id: &str,
) -> Result<(), DatabaseError> {
    let Some(mut post_ids) = load::<Vec<String>>(write_txn, OWNER_POSTS, owner_id)? else {
        return Ok(());
    };
    post_ids.retain(|id| id != post_id);
    if post_ids.is_empty() {
        remove(write_txn, OWNER_POSTS, owner_id)?;
    } else {
        store(write_txn, OWNER_POSTS, owner_id, &post_ids)?;
    }
    Ok(())
}
