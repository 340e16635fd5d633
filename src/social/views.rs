//! Read models assembled from records for callers that render them.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{SocialError, SocialResult, SocialService};
use crate::storage::models::{ImageRecord, PostRecord, UserRecord};

#[derive(Debug, Clone, Serialize)]
pub struct ImageView {
    pub url: String,
    pub thumbnail: String,
}

impl From<&ImageRecord> for ImageView {
    fn from(image: &ImageRecord) -> Self {
        ImageView {
            url: image.url.clone(),
            thumbnail: image.thumbnail(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub profile_photo: Option<ImageView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: String,
    pub body: String,
    /// None when the author record is gone
    pub author: Option<UserSummary>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: String,
    pub caption: String,
    pub image: Option<ImageView>,
    pub owner: Option<UserSummary>,
    pub likes: u64,
    pub liked_by: Vec<String>,
    pub comments: Vec<CommentView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub id: String,
    pub username: String,
    pub bio: String,
    pub profile_photo: Option<ImageView>,
    pub num_of_posts: u64,
    pub followers_count: u64,
    pub following_count: u64,
    pub followers: Vec<UserSummary>,
    pub following: Vec<UserSummary>,
    /// Newest first
    pub posts: Vec<PostView>,
}

impl SocialService {
    /// Every live post, newest first.
    pub fn feed(&self) -> SocialResult<Vec<PostView>> {
        let mut posts: Vec<PostRecord> = self
            .db
            .get_all_posts()?
            .into_iter()
            .filter(PostRecord::is_live)
            .collect();
        newest_first(&mut posts);

        posts.iter().map(|post| self.post_view(post)).collect()
    }

    pub fn get_post(&self, post_id: &str) -> SocialResult<PostView> {
        let post = self.live_post(post_id)?;
        self.post_view(&post)
    }

    /// Users who liked a post, in the order they liked it.
    pub fn list_likers(&self, post_id: &str) -> SocialResult<Vec<UserSummary>> {
        let post = self.live_post(post_id)?;
        self.user_summaries(post.likes.users())
    }

    pub fn get_user(&self, user_id: &str) -> SocialResult<UserRecord> {
        self.db
            .get_user(user_id)?
            .ok_or(SocialError::NotFound("User"))
    }

    pub(super) fn post_view(&self, post: &PostRecord) -> SocialResult<PostView> {
        let image = self.db.get_image(&post.image_id)?;
        let owner = match self.db.get_user(&post.owner_id)? {
            Some(owner) => Some(self.user_summary(&owner)?),
            None => None,
        };

        let mut comments = Vec::with_capacity(post.comments.len());
        for comment in self.db.get_comments(&post.comments)? {
            let author = match self.db.get_user(&comment.author_id)? {
                Some(author) => Some(self.user_summary(&author)?),
                None => None,
            };
            comments.push(CommentView {
                id: comment.id,
                body: comment.body,
                author,
                created_at: comment.created_at,
            });
        }

        Ok(PostView {
            id: post.id.clone(),
            caption: post.caption.clone(),
            image: image.as_ref().map(ImageView::from),
            owner,
            likes: post.likes.count(),
            liked_by: post.likes.users().to_vec(),
            comments,
            created_at: post.created_at,
            updated_at: post.updated_at,
        })
    }

    pub(super) fn user_summary(&self, user: &UserRecord) -> SocialResult<UserSummary> {
        let profile_photo = match user.profile_photo {
            Some(ref image_id) => self.db.get_image(image_id)?,
            None => None,
        };
        Ok(UserSummary {
            id: user.id.clone(),
            username: user.username.clone(),
            profile_photo: profile_photo.as_ref().map(ImageView::from),
        })
    }

    pub(super) fn user_summaries(&self, ids: &[String]) -> SocialResult<Vec<UserSummary>> {
        self.db
            .get_users(ids)?
            .iter()
            .map(|user| self.user_summary(user))
            .collect()
    }
}

/// Newest first; posts created in the same instant keep reverse insertion order.
pub(super) fn newest_first(posts: &mut [PostRecord]) {
    posts.reverse();
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
