use chrono::Utc;

use super::views::{newest_first, ImageView, ProfileView};
use super::{require, validation, Principal, SocialError, SocialResult, SocialService, Upload};
use crate::storage::models::{ImageRecord, Membership, PostRecord, UserRecord, WriteOp};

pub const DEFAULT_BIO: &str = "I should probably update this...";

/// Number of live posts, the authoritative value behind `num_of_posts`.
pub fn reconcile_post_count(posts: &[PostRecord]) -> u64 {
    posts.iter().filter(|post| post.is_live()).count() as u64
}

impl SocialService {
    /// Create a user with empty relationship sets and the default bio.
    pub async fn register_user(&self, email: &str, username: &str) -> SocialResult<UserRecord> {
        validation::email(email)?;
        validation::username(username)?;

        if self.db.email_exists(email)? {
            return Err(SocialError::validation(
                "email",
                "A user with the given email is already registered",
            ));
        }
        if self.db.username_exists(username)? {
            return Err(SocialError::validation(
                "username",
                "A user with the given username is already registered",
            ));
        }

        let user = UserRecord {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            username: username.to_string(),
            bio: DEFAULT_BIO.to_string(),
            profile_photo: None,
            followers: Membership::default(),
            following: Membership::default(),
            num_of_posts: 0,
            created_at: Utc::now(),
        };
        self.commit(WriteOp::CreateUser(user.clone())).await?;

        // A concurrent registration may have claimed the name first
        match self.db.get_user_by_username(username)? {
            Some(stored) if stored.id == user.id => {
                tracing::debug!(user_id = %user.id, username = %username, "Registered user");
                Ok(user)
            }
            _ => Err(SocialError::validation(
                "username",
                "A user with the given username is already registered",
            )),
        }
    }

    pub async fn edit_bio(
        &self,
        principal: Option<&Principal>,
        bio: &str,
    ) -> SocialResult<UserRecord> {
        let principal = require(principal)?;
        validation::plain_text("bio", bio)?;
        self.principal_user(principal)?;

        self.commit(WriteOp::UpdateBio {
            user_id: principal.id.clone(),
            bio: bio.to_string(),
        })
        .await?;

        self.principal_user(principal)
    }

    /// Swap the principal's profile photo; the previous image is deleted.
    pub async fn replace_profile_photo(
        &self,
        principal: Option<&Principal>,
        upload: Upload,
    ) -> SocialResult<UserRecord> {
        let principal = require(principal)?;
        let user = self.principal_user(principal)?;
        if upload.data.is_empty() {
            return Err(SocialError::validation("photo", "is required"));
        }
        let previous = match user.profile_photo {
            Some(ref image_id) => self.db.get_image(image_id)?,
            None => None,
        };

        let stored = self
            .media
            .store(upload.data, upload.file_name.as_deref())
            .await?;
        let image = ImageRecord {
            id: uuid::Uuid::new_v4().to_string(),
            url: stored.url,
            filename: stored.filename,
        };

        let filename = image.filename.clone();
        let op = WriteOp::SetProfilePhoto {
            user_id: user.id.clone(),
            image,
            replaced_at: Utc::now(),
        };
        if let Err(e) = self.commit(op).await {
            self.discard_media(&filename).await;
            return Err(e);
        }

        if let Some(old) = previous {
            self.release_media(&old.filename).await;
        }

        tracing::debug!(user_id = %user.id, "Replaced profile photo");
        self.principal_user(principal)
    }

    /// Profile page data. Refreshes the stored post count from the owner's
    /// posts as a side effect.
    pub async fn view_profile(&self, username: &str) -> SocialResult<ProfileView> {
        let mut user = self
            .db
            .get_user_by_username(username)?
            .ok_or(SocialError::NotFound("User"))?;

        let mut posts: Vec<PostRecord> = self
            .db
            .get_posts_by_owner(&user.id)?
            .into_iter()
            .filter(PostRecord::is_live)
            .collect();
        newest_first(&mut posts);

        let count = reconcile_post_count(&posts);
        if user.num_of_posts != count {
            self.commit(WriteOp::SetPostCount {
                user_id: user.id.clone(),
                count,
            })
            .await?;
            tracing::debug!(
                username = %username,
                stored = user.num_of_posts,
                actual = count,
                "Refreshed post count"
            );
            user.num_of_posts = count;
        }

        let profile_photo = match user.profile_photo {
            Some(ref image_id) => self.db.get_image(image_id)?,
            None => None,
        };
        let posts = posts
            .iter()
            .map(|post| self.post_view(post))
            .collect::<SocialResult<Vec<_>>>()?;

        Ok(ProfileView {
            id: user.id.clone(),
            username: user.username.clone(),
            bio: user.bio.clone(),
            profile_photo: profile_photo.as_ref().map(ImageView::from),
            num_of_posts: user.num_of_posts,
            followers_count: user.followers.count(),
            following_count: user.following.count(),
            followers: self.user_summaries(user.followers.users())?,
            following: self.user_summaries(user.following.users())?,
            posts,
        })
    }
}
