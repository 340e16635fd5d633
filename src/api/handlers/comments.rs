use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use crate::api::principal::MaybePrincipal;
use crate::api::response::{ApiError, AppJson, JSend};
use crate::storage::models::CommentRecord;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    #[serde(default)]
    pub body: String,
}

pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    principal: MaybePrincipal,
    Path(post_id): Path<String>,
    AppJson(req): AppJson<CreateCommentRequest>,
) -> Result<Json<JSend<CommentRecord>>, ApiError> {
    let comment = state
        .social
        .add_comment(principal.principal(), &post_id, &req.body)
        .await?;
    Ok(JSend::success(comment))
}

pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    principal: MaybePrincipal,
    Path((post_id, comment_id)): Path<(String, String)>,
) -> Result<Json<JSend<()>>, ApiError> {
    state
        .social
        .delete_comment(principal.principal(), &post_id, &comment_id)
        .await?;
    Ok(JSend::success(()))
}
