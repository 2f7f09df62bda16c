use axum::extract::{Path, State};
use chrono::Utc;
use tracing::info;

use crate::auth::AuthUser;
use crate::models::{
    CreateScheduleRequest, DomainScopeParams, KeywordRanking, KeywordSchedule, NewKeywordSchedule,
};
use crate::security::ownership::{OwnershipGuard, SCHEDULE_NOT_FOUND};
use crate::state::AppState;
use crate::utils::validation::{push_error, FieldErrors};
use crate::utils::{ok, ApiError, ApiResult, ValidatedJson, ValidatedQuery};

use super::require_active;

/// GET /api/keywords/schedules?domainId=
pub async fn list_schedules(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedQuery(scope): ValidatedQuery<DomainScopeParams>,
) -> ApiResult<Vec<KeywordSchedule>> {
    let domain = state.guard.require_domain(user.user_id, scope.domain_id).await?;
    ok(state.repos.keywords.list_for_domain(domain.id).await?)
}

/// POST /api/keywords/schedules
pub async fn create_schedule(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(request): ValidatedJson<CreateScheduleRequest>,
) -> ApiResult<KeywordSchedule> {
    let spec = request.to_spec()?;
    let keywords = request.keywords();
    if keywords.is_empty() {
        let mut errors = FieldErrors::new();
        push_error(&mut errors, "keywords", "must contain at least one non-blank keyword");
        return Err(ApiError::Validation(errors));
    }

    let domain = state.guard.require_domain(user.user_id, request.domain_id).await?;
    require_active(&domain)?;

    let schedule = state
        .repos
        .keywords
        .create(&NewKeywordSchedule {
            domain_id: domain.id,
            keywords,
            spec,
            next_run_at: spec.next_run_after(Utc::now()),
        })
        .await?;

    info!("Schedule {} tracks {} keywords for {}", schedule.id, schedule.keywords.len(), domain.host);
    ok(schedule)
}

/// GET /api/keywords/schedules/{id}/rankings
pub async fn latest_rankings(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Vec<KeywordRanking>> {
    let id = OwnershipGuard::path_id(&id, SCHEDULE_NOT_FOUND)?;
    let schedule = state.guard.require_schedule(user.user_id, id).await?;
    ok(state.repos.keywords.latest_rankings(schedule.id).await?)
}
