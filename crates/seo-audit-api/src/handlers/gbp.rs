use axum::extract::State;
use tracing::info;

use crate::auth::AuthUser;
use crate::models::{BusinessProfile, BusinessProfileParams, SaveBusinessProfileRequest};
use crate::state::AppState;
use crate::utils::{ok, ApiError, ApiResult, ValidatedJson, ValidatedQuery};

pub const PROFILE_NOT_FOUND: &str = "Business profile not found";

/// GET /api/gbp/profile?domainId=
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedQuery(query): ValidatedQuery<BusinessProfileParams>,
) -> ApiResult<BusinessProfile> {
    let domain = state.guard.require_domain(user.user_id, query.domain_id).await?;
    let profile = state
        .repos
        .profiles
        .business_profile(domain.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(PROFILE_NOT_FOUND.to_string()))?;
    ok(profile)
}

/// POST /api/gbp/profile
pub async fn save_profile(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(request): ValidatedJson<SaveBusinessProfileRequest>,
) -> ApiResult<BusinessProfile> {
    state.guard.require_domain(user.user_id, request.domain_id).await?;

    let profile = state.repos.profiles.save_business_profile(&request).await?;
    info!("Business profile saved for domain {}", profile.domain_id);
    ok(profile)
}
