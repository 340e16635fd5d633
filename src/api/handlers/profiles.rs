use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::read_multipart;
use crate::api::principal::MaybePrincipal;
use crate::api::response::{ApiError, AppJson, JSend};
use crate::social::{ImageView, ProfileView};
use crate::storage::models::UserRecord;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct EditBioRequest {
    #[serde(default)]
    pub bio: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub username: String,
    pub bio: String,
    pub profile_photo: Option<ImageView>,
    pub num_of_posts: u64,
    pub followers_count: u64,
    pub following_count: u64,
}

#[derive(Debug, Serialize)]
pub struct FollowResponse {
    pub username: String,
    pub following: bool,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn register_user(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<Json<JSend<UserResponse>>, ApiError> {
    let user = state.social.register_user(&req.email, &req.username).await?;
    Ok(JSend::success(user_to_response(&state, user)?))
}

pub async fn view_profile(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<JSend<ProfileView>>, ApiError> {
    Ok(JSend::success(state.social.view_profile(&username).await?))
}

pub async fn toggle_follow(
    State(state): State<Arc<AppState>>,
    principal: MaybePrincipal,
    Path(username): Path<String>,
) -> Result<Json<JSend<FollowResponse>>, ApiError> {
    let following = state
        .social
        .toggle_follow(principal.principal(), &username)
        .await?;
    Ok(JSend::success(FollowResponse {
        username,
        following,
    }))
}

pub async fn edit_bio(
    State(state): State<Arc<AppState>>,
    principal: MaybePrincipal,
    AppJson(req): AppJson<EditBioRequest>,
) -> Result<Json<JSend<UserResponse>>, ApiError> {
    let user = state.social.edit_bio(principal.principal(), &req.bio).await?;
    Ok(JSend::success(user_to_response(&state, user)?))
}

pub async fn replace_photo(
    State(state): State<Arc<AppState>>,
    principal: MaybePrincipal,
    multipart: Multipart,
) -> Result<Json<JSend<UserResponse>>, ApiError> {
    let mut form = read_multipart(multipart, "photo", state.config.max_upload_size).await?;
    let upload = form.require_upload("photo")?;

    let user = state
        .social
        .replace_profile_photo(principal.principal(), upload)
        .await?;
    Ok(JSend::success(user_to_response(&state, user)?))
}

// ============================================================================
// Helpers
// ============================================================================

fn user_to_response(state: &AppState, user: UserRecord) -> Result<UserResponse, ApiError> {
    let profile_photo = match user.profile_photo {
        Some(ref image_id) => state.db.get_image(image_id)?,
        None => None,
    };

    Ok(UserResponse {
        followers_count: user.followers.count(),
        following_count: user.following.count(),
        profile_photo: profile_photo.as_ref().map(ImageView::from),
        id: user.id,
        email: user.email,
        username: user.username,
        bio: user.bio,
        num_of_posts: user.num_of_posts,
    })
}
