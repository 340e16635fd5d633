use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Set of user ids paired with a stored count.
///
/// The fields are private so the count can only change together with the set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    users: Vec<String>,
    count: u64,
}

impl Membership {
    pub fn contains(&self, user_id: &str) -> bool {
        self.users.iter().any(|u| u == user_id)
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn users(&self) -> &[String] {
        &self.users
    }

    /// Add `user_id` if absent. Returns true if the set changed.
    pub fn insert(&mut self, user_id: &str) -> bool {
        if self.contains(user_id) {
            return false;
        }
        self.users.push(user_id.to_string());
        self.count = self.users.len() as u64;
        true
    }

    /// Remove `user_id` if present. Returns true if the set changed.
    pub fn remove(&mut self, user_id: &str) -> bool {
        let before = self.users.len();
        self.users.retain(|u| u != user_id);
        self.count = self.users.len() as u64;
        before != self.users.len()
    }

    /// Add if absent, remove if present. Returns true if `user_id` is now a member.
    pub fn toggle(&mut self, user_id: &str) -> bool {
        if self.contains(user_id) {
            self.remove(user_id);
            false
        } else {
            self.insert(user_id);
            true
        }
    }

    /// True when the stored count agrees with the set size.
    pub fn is_consistent(&self) -> bool {
        self.count == self.users.len() as u64
    }
}

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub username: String,
    pub bio: String,
    #[serde(default)]
    pub profile_photo: Option<String>,
    #[serde(default)]
    pub followers: Membership,
    #[serde(default)]
    pub following: Membership,
    /// Refreshed from the owner index on every profile view.
    #[serde(default)]
    pub num_of_posts: u64,
    pub created_at: DateTime<Utc>,
}

/// Reference to an object held by the media store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    /// Public locator of the stored object
    pub url: String,
    /// Media store key, used for deletion
    pub filename: String,
}

impl ImageRecord {
    /// Resized variant of the locator (`/upload` -> `/upload/w_300`).
    pub fn thumbnail(&self) -> String {
        thumbnail_url(&self.url)
    }
}

pub fn thumbnail_url(url: &str) -> String {
    url.replacen("/upload", "/upload/w_300", 1)
}

/// Progress of a post deletion cascade. A post with no stage is live;
/// a completed cascade leaves no record at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionStage {
    Pending,
    MediaDeleted,
    ChildrenDeleted,
    Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    pub owner_id: String,
    pub image_id: String,
    pub caption: String,
    #[serde(default)]
    pub likes: Membership,
    /// Comment ids, oldest first
    #[serde(default)]
    pub comments: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deletion: Option<DeletionStage>,
}

impl PostRecord {
    pub fn is_live(&self) -> bool {
        self.deletion.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: String,
    pub author_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// An uploaded image waiting for its caption, one per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftRecord {
    pub user_id: String,
    pub image: ImageRecord,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl DraftRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A media object no record references, waiting to be deleted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrphanedMedia {
    pub filename: String,
    /// Failed deletes so far
    pub attempts: u32,
    pub recorded_at: DateTime<Utc>,
}

/// Types of write operations (replicated via muster).
///
/// Each op is applied inside one redb write transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WriteOp {
    CreateUser(UserRecord),
    UpdateBio {
        user_id: String,
        bio: String,
    },
    /// Point the user at a new photo. The previous image record is dropped
    /// and its media recorded as orphaned, to be deleted by the caller or
    /// the reconciler.
    SetProfilePhoto {
        user_id: String,
        image: ImageRecord,
        replaced_at: DateTime<Utc>,
    },
    /// Insert image and post together.
    ///
    /// With `from_draft`, the owner's current draft must hold `image`; the
    /// draft is consumed, and nothing is written when it does not.
    CreatePost {
        post: PostRecord,
        image: ImageRecord,
        #[serde(default)]
        from_draft: bool,
    },
    UpdateCaption {
        post_id: String,
        caption: String,
        updated_at: DateTime<Utc>,
    },
    BeginPostDeletion {
        post_id: String,
    },
    DeletePostImage {
        post_id: String,
    },
    DeletePostComments {
        post_id: String,
    },
    DeletePost {
        post_id: String,
    },
    AddComment {
        post_id: String,
        comment: CommentRecord,
    },
    RemoveComment {
        post_id: String,
        comment_id: String,
    },
    ToggleLike {
        post_id: String,
        user_id: String,
    },
    ToggleFollow {
        follower_id: String,
        target_id: String,
    },
    SetPostCount {
        user_id: String,
        count: u64,
    },
    /// Stage a draft. A replaced draft's media is recorded as orphaned.
    PutDraft(DraftRecord),
    /// Drop the user's draft if it still holds `image_id`, recording its media as orphaned.
    DeleteDraft {
        user_id: String,
        image_id: String,
        recorded_at: DateTime<Utc>,
    },
    RecordOrphanedMedia {
        filename: String,
        recorded_at: DateTime<Utc>,
    },
    ClearOrphanedMedia {
        filename: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_toggle_keeps_count_in_step() {
        let mut likes = Membership::default();
        assert!(likes.toggle("u1"));
        assert!(likes.toggle("u2"));
        assert_eq!(likes.count(), 2);
        assert!(!likes.toggle("u1"));
        assert_eq!(likes.count(), 1);
        assert_eq!(likes.users(), ["u2".to_string()]);
        assert!(likes.is_consistent());
    }

    #[test]
    fn membership_insert_is_idempotent() {
        let mut set = Membership::default();
        assert!(set.insert("a"));
        assert!(!set.insert("a"));
        assert_eq!(set.count(), 1);
        assert!(!set.remove("b"));
        assert_eq!(set.count(), 1);
    }

    #[test]
    fn thumbnail_rewrites_first_upload_segment() {
        assert_eq!(
            thumbnail_url("https://cdn.example/upload/v1/a.png"),
            "https://cdn.example/upload/w_300/v1/a.png"
        );
        assert_eq!(thumbnail_url("/media/plain.png"), "/media/plain.png");
    }
}
