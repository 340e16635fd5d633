use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::api::response::ApiError;
use crate::media_store::MediaStoreError;
use crate::AppState;

/// Serve media stored by the local backend.
/// Route: GET /media/*key, where key is `upload/{filename}` or the
/// thumbnail form `upload/w_300/{filename}`.
pub async fn serve_media(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let filename = media_filename(&key).ok_or_else(|| ApiError::not_found("Media not found"))?;

    let data = state
        .social
        .media_store()
        .get(filename)
        .await
        .map_err(|e| match e {
            MediaStoreError::NotFound(_) => ApiError::not_found("Media not found"),
            _ => {
                tracing::error!(filename = %filename, error = %e, "Failed to read media");
                ApiError::internal("Something went wrong")
            }
        })?;

    let mime_type = mime_guess::from_path(filename)
        .first_or_octet_stream()
        .to_string();

    let mut response = (StatusCode::OK, data).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        mime_type
            .parse()
            .unwrap_or(header::HeaderValue::from_static("application/octet-stream")),
    );

    // Keys are never reused, so objects are immutable
    headers.insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    Ok(response)
}

/// Storage key for a media path. Thumbnails are served at full size.
fn media_filename(key: &str) -> Option<&str> {
    let rest = key.strip_prefix("upload/")?;
    let filename = rest.strip_prefix("w_300/").unwrap_or(rest);
    (!filename.is_empty() && !filename.contains('/')).then_some(filename)
}
