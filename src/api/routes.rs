use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.max_upload_size as usize;

    let mut router = Router::new()
        // Posts
        .route(
            "/posts",
            get(handlers::list_posts)
                .post(handlers::create_post)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/posts/drafts",
            post(handlers::stage_draft).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/posts/drafts/publish", post(handlers::publish_draft))
        .route(
            "/posts/:id",
            get(handlers::get_post)
                .patch(handlers::edit_post)
                .delete(handlers::delete_post),
        )
        .route("/posts/:id/like", patch(handlers::toggle_like))
        .route("/posts/:id/likes", get(handlers::list_likers))
        // Comments
        .route("/posts/:id/comments", post(handlers::create_comment))
        .route(
            "/posts/:id/comments/:comment_id",
            delete(handlers::delete_comment),
        )
        // Users and profiles
        .route("/users", post(handlers::register_user))
        .route("/profiles/:username", get(handlers::view_profile))
        .route("/profiles/:username/follow", post(handlers::toggle_follow))
        .route("/profile/bio", patch(handlers::edit_bio))
        .route(
            "/profile/photo",
            put(handlers::replace_photo).layer(DefaultBodyLimit::max(upload_limit)),
        )
        // Media served by the local backend
        .route("/media/*key", get(handlers::serve_media))
        // Internal
        .route("/_internal/cluster/status", get(handlers::cluster_status))
        .route("/_internal/health", get(handlers::health))
        .route("/_internal/media/reconcile", post(handlers::reconcile_media));

    // Test-only routes
    if state.config.test_mode {
        tracing::warn!("Test mode enabled, purge route is available.");
        router = router.route("/admin/purge", delete(handlers::admin_purge));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
