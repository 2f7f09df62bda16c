use axum::extract::{Path, State};
use tracing::info;

use crate::auth::AuthUser;
use crate::models::{CreateDomainRequest, Domain, DomainListParams, NewDomain, ToolCounts};
use crate::security::ownership::{OwnershipGuard, DOMAIN_NOT_FOUND};
use crate::state::AppState;
use crate::utils::{ok, ApiError, ApiResult, ValidatedJson, ValidatedQuery};

/// GET /api/domains
pub async fn list_domains(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedQuery(query): ValidatedQuery<DomainListParams>,
) -> ApiResult<Vec<Domain>> {
    let domains = state
        .repos
        .domains
        .list_for_user(user.user_id, query.include_inactive)
        .await?;
    ok(domains)
}

/// POST /api/domains
pub async fn create_domain(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(request): ValidatedJson<CreateDomainRequest>,
) -> ApiResult<Domain> {
    let new_domain = NewDomain::from_request(user.user_id, request);

    if state
        .repos
        .domains
        .name_exists(user.user_id, &new_domain.name)
        .await?
    {
        return Err(ApiError::Conflict(format!(
            "A domain named '{}' already exists",
            new_domain.name
        )));
    }

    let domain = state.repos.domains.create(&new_domain).await?;
    info!("User {} registered domain {} ({})", user.user_id, domain.id, domain.host);
    ok(domain)
}

/// GET /api/domains/{id}
pub async fn get_domain(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Domain> {
    let id = OwnershipGuard::path_id(&id, DOMAIN_NOT_FOUND)?;
    ok(state.guard.require_domain(user.user_id, id).await?)
}

/// DELETE /api/domains/{id}
///
/// Soft-retires the domain; its history stays readable.
pub async fn deactivate_domain(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Domain> {
    let id = OwnershipGuard::path_id(&id, DOMAIN_NOT_FOUND)?;
    let domain = state.guard.require_domain(user.user_id, id).await?;
    if !domain.is_active() {
        return ok(domain);
    }

    let domain = state.repos.domains.deactivate(domain.id).await?;
    info!("User {} deactivated domain {}", user.user_id, domain.id);
    ok(domain)
}

/// GET /api/domains/{id}/tool-counts
pub async fn tool_counts(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<ToolCounts> {
    let id = OwnershipGuard::path_id(&id, DOMAIN_NOT_FOUND)?;
    let domain = state.guard.require_domain(user.user_id, id).await?;
    ok(state.repos.domains.tool_counts(domain.id).await?)
}
