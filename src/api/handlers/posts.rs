use axum::extract::{Multipart, Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::read_multipart;
use crate::api::principal::MaybePrincipal;
use crate::api::response::{ApiError, AppJson, AppQuery, JSend, JSendPaginated, Pagination};
use crate::social::{DeletionReport, ImageView, PostView, UserSummary};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListPostsParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    20
}

#[derive(Debug, Deserialize)]
pub struct CaptionRequest {
    #[serde(default)]
    pub caption: String,
}

#[derive(Debug, Serialize)]
pub struct DraftResponse {
    pub image: ImageView,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub post_id: String,
    pub liked: bool,
    pub likes: u64,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ListPostsParams>,
) -> Result<Json<JSendPaginated<PostView>>, ApiError> {
    if params.limit == 0 {
        return Err(ApiError::bad_request("limit must be greater than 0"));
    }

    let posts = state.social.feed()?;
    let total = posts.len() as u64;
    let items: Vec<PostView> = posts
        .into_iter()
        .skip(params.offset as usize)
        .take(params.limit as usize)
        .collect();

    Ok(JSendPaginated::success(
        items,
        Pagination {
            limit: params.limit,
            offset: params.offset,
            total,
        },
    ))
}

pub async fn create_post(
    State(state): State<Arc<AppState>>,
    principal: MaybePrincipal,
    multipart: Multipart,
) -> Result<Json<JSend<PostView>>, ApiError> {
    let mut form = read_multipart(multipart, "image", state.config.max_upload_size).await?;
    let upload = form.require_upload("image")?;
    let caption = form.fields.remove("caption").unwrap_or_default();

    let post = state
        .social
        .create_post(principal.principal(), &caption, upload)
        .await?;

    Ok(JSend::success(state.social.get_post(&post.id)?))
}

pub async fn stage_draft(
    State(state): State<Arc<AppState>>,
    principal: MaybePrincipal,
    multipart: Multipart,
) -> Result<Json<JSend<DraftResponse>>, ApiError> {
    let mut form = read_multipart(multipart, "image", state.config.max_upload_size).await?;
    let upload = form.require_upload("image")?;

    let draft = state
        .social
        .stage_draft(principal.principal(), upload)
        .await?;

    Ok(JSend::success(DraftResponse {
        image: ImageView::from(&draft.image),
        created_at: draft.created_at,
        expires_at: draft.expires_at,
    }))
}

pub async fn publish_draft(
    State(state): State<Arc<AppState>>,
    principal: MaybePrincipal,
    AppJson(req): AppJson<CaptionRequest>,
) -> Result<Json<JSend<PostView>>, ApiError> {
    let post = state
        .social
        .publish_draft(principal.principal(), &req.caption)
        .await?;

    Ok(JSend::success(state.social.get_post(&post.id)?))
}

pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<PostView>>, ApiError> {
    Ok(JSend::success(state.social.get_post(&id)?))
}

pub async fn edit_post(
    State(state): State<Arc<AppState>>,
    principal: MaybePrincipal,
    Path(id): Path<String>,
    AppJson(req): AppJson<CaptionRequest>,
) -> Result<Json<JSend<PostView>>, ApiError> {
    state
        .social
        .edit_post(principal.principal(), &id, &req.caption)
        .await?;

    Ok(JSend::success(state.social.get_post(&id)?))
}

pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    principal: MaybePrincipal,
    Path(id): Path<String>,
) -> Result<Json<JSend<DeletionReport>>, ApiError> {
    let report = state.social.delete_post(principal.principal(), &id).await?;
    Ok(JSend::success(report))
}

pub async fn toggle_like(
    State(state): State<Arc<AppState>>,
    principal: MaybePrincipal,
    Path(id): Path<String>,
) -> Result<Json<JSend<LikeResponse>>, ApiError> {
    let post = state.social.toggle_like(principal.principal(), &id).await?;
    let liked = principal
        .principal()
        .is_some_and(|p| post.likes.contains(&p.id));

    Ok(JSend::success(LikeResponse {
        post_id: post.id,
        liked,
        likes: post.likes.count(),
    }))
}

pub async fn list_likers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<Vec<UserSummary>>>, ApiError> {
    Ok(JSend::success(state.social.list_likers(&id)?))
}
