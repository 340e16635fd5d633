use super::{require, Principal, SocialError, SocialResult, SocialService};
use crate::storage::models::{PostRecord, WriteOp};

impl SocialService {
    /// Like the post if the principal has not, unlike it otherwise.
    ///
    /// The direction is decided inside the store transaction, so concurrent
    /// toggles on one post never lose a count update.
    pub async fn toggle_like(
        &self,
        principal: Option<&Principal>,
        post_id: &str,
    ) -> SocialResult<PostRecord> {
        let principal = require(principal)?;
        self.principal_user(principal)?;
        self.live_post(post_id)?;

        self.commit(WriteOp::ToggleLike {
            post_id: post_id.to_string(),
            user_id: principal.id.clone(),
        })
        .await?;

        let post = self.live_post(post_id)?;
        tracing::debug!(
            post_id = %post_id,
            user_id = %principal.id,
            liked = post.likes.contains(&principal.id),
            likes = post.likes.count(),
            "Toggled like"
        );
        Ok(post)
    }

    /// Follow `target_username` if not already following, unfollow otherwise.
    ///
    /// Both users' records change in the same write. Returns whether the
    /// principal now follows the target.
    pub async fn toggle_follow(
        &self,
        principal: Option<&Principal>,
        target_username: &str,
    ) -> SocialResult<bool> {
        let principal = require(principal)?;
        let follower = self.principal_user(principal)?;
        let target = self
            .db
            .get_user_by_username(target_username)?
            .ok_or(SocialError::NotFound("User"))?;
        if target.id == follower.id {
            return Err(SocialError::validation(
                "username",
                "You cannot follow yourself",
            ));
        }

        self.commit(WriteOp::ToggleFollow {
            follower_id: follower.id.clone(),
            target_id: target.id.clone(),
        })
        .await?;

        let following = self
            .db
            .get_user(&target.id)?
            .is_some_and(|target| target.followers.contains(&follower.id));
        tracing::debug!(
            follower = %follower.username,
            target = %target.username,
            following,
            "Toggled follow"
        );
        Ok(following)
    }
}
