use axum::extract::State;

use crate::auth::AuthUser;
use crate::models::{BacklinkProfileParams, BacklinkProfileView, RefreshBacklinksRequest};
use crate::state::AppState;
use crate::utils::{ok, ApiError, ApiResult, ValidatedJson, ValidatedQuery};

use super::require_active;

pub const PROFILE_NOT_FOUND: &str = "Backlink profile not found";

/// GET /api/backlinks/profile?domainId=&includeDetails=
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedQuery(query): ValidatedQuery<BacklinkProfileParams>,
) -> ApiResult<BacklinkProfileView> {
    let domain = state.guard.require_domain(user.user_id, query.domain_id).await?;
    let profile = state
        .repos
        .profiles
        .backlink_profile(domain.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(PROFILE_NOT_FOUND.to_string()))?;
    ok(BacklinkProfileView::new(profile, query.include_details))
}

/// POST /api/backlinks/refresh
///
/// Fetches from the provider inline and returns the fresh summary.
pub async fn refresh_profile(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(request): ValidatedJson<RefreshBacklinksRequest>,
) -> ApiResult<BacklinkProfileView> {
    let domain = state.guard.require_domain(user.user_id, request.domain_id).await?;
    require_active(&domain)?;

    let profile = state.backlinks.refresh(&domain).await?;
    ok(BacklinkProfileView::new(profile, false))
}
