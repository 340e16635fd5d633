use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::api::response::{ApiError, JSend};
use crate::social::ReconcileStats;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ClusterStatusResponse {
    pub cluster_info: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub users_deleted: u64,
    pub posts_deleted: u64,
    pub comments_deleted: u64,
    pub images_deleted: u64,
    pub drafts_deleted: u64,
    pub media_deleted: u64,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health() -> Json<JSend<HealthResponse>> {
    JSend::success(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn cluster_status(
    State(state): State<Arc<AppState>>,
) -> Json<JSend<ClusterStatusResponse>> {
    let info = state.node.cluster_info().await;
    let peers: Vec<serde_json::Value> = info
        .peers
        .iter()
        .map(|p| {
            serde_json::json!({
                "id": p.id,
                "address": p.address,
                "status": format!("{:?}", p.status),
                "sequence": p.sequence,
            })
        })
        .collect();

    JSend::success(ClusterStatusResponse {
        cluster_info: serde_json::json!({
            "node_id": info.node_id,
            "role": format!("{:?}", info.role),
            "term": info.term,
            "leader_id": info.leader_id,
            "peers": peers,
            "sequence": info.sequence,
        }),
    })
}

/// Retry media deletes that failed earlier.
pub async fn reconcile_media(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<ReconcileStats>>, ApiError> {
    Ok(JSend::success(state.social.reconcile_orphaned_media().await?))
}

/// Wipe every record on this node and the media they referenced.
pub async fn admin_purge(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<PurgeResponse>>, ApiError> {
    let stats = state.db.purge_all()?;

    let media = state.social.media_store();
    let mut media_deleted = 0;
    for key in &stats.media_keys {
        match media.delete(key).await {
            Ok(()) => media_deleted += 1,
            Err(e) => tracing::warn!(filename = %key, error = %e, "Failed to purge media object"),
        }
    }

    tracing::warn!(
        users = stats.users,
        posts = stats.posts,
        media = media_deleted,
        "Purged all data"
    );

    Ok(JSend::success(PurgeResponse {
        users_deleted: stats.users,
        posts_deleted: stats.posts,
        comments_deleted: stats.comments,
        images_deleted: stats.images,
        drafts_deleted: stats.drafts,
        media_deleted,
    }))
}
