use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::sync::Arc;

use crate::api::response::ApiError;
use crate::social::Principal;
use crate::AppState;

/// Header carrying the authenticated user's id, set by the fronting auth proxy.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The request's principal, `None` for anonymous requests.
///
/// An id with no matching user is treated as anonymous.
pub struct MaybePrincipal(pub Option<Principal>);

impl MaybePrincipal {
    pub fn principal(&self) -> Option<&Principal> {
        self.0.as_ref()
    }
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for MaybePrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, ApiError> {
        let Some(value) = parts.headers.get(USER_ID_HEADER) else {
            return Ok(MaybePrincipal(None));
        };
        let user_id = value
            .to_str()
            .map_err(|_| ApiError::bad_request("X-User-Id header must be valid ASCII"))?
            .trim();
        if user_id.is_empty() {
            return Ok(MaybePrincipal(None));
        }

        let user = state.db.get_user(user_id)?;

        Ok(MaybePrincipal(user.map(|user| Principal {
            id: user.id,
            username: user.username,
        })))
    }
}
