use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::state::AppState;
use crate::utils::error::ApiError;

/// The signed-in caller. Extraction fails with 401 before any handler
/// code runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        state
            .sessions
            .resolve(&parts.headers)
            .map(|user_id| AuthUser { user_id })
            .ok_or(ApiError::Unauthorized)
    }
}
