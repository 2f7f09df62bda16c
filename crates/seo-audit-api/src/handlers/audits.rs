use axum::extract::{Path, State};
use tracing::{error, info};

use crate::auth::AuthUser;
use crate::models::{normalize_keywords, AuditView, DomainScopeParams, StartAuditRequest};
use crate::security::ownership::{OwnershipGuard, AUDIT_NOT_FOUND};
use crate::services::jobs::ENQUEUE_FAILED_MESSAGE;
use crate::services::JobEvent;
use crate::state::AppState;
use crate::utils::{ok, ApiResult, ValidatedJson, ValidatedQuery};

use super::require_active;

const RECENT_AUDITS: i64 = 20;

/// POST /api/audits
pub async fn start_audit(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(request): ValidatedJson<StartAuditRequest>,
) -> ApiResult<AuditView> {
    let domain = state.guard.require_domain(user.user_id, request.domain_id).await?;
    require_active(&domain)?;

    let audit = state
        .repos
        .audits
        .create_pending(domain.id, normalize_keywords(&request.keywords))
        .await?;

    if let Err(e) = state.queue.enqueue(JobEvent::AuditRequested { audit_id: audit.id }).await {
        error!("Audit {} could not be enqueued: {}", audit.id, e);
        state.repos.audits.fail(audit.id, ENQUEUE_FAILED_MESSAGE.to_string()).await?;
        return Err(e.into());
    }

    info!("Audit {} queued for domain {}", audit.id, domain.host);
    ok(audit.into())
}

/// GET /api/audits?domainId=
pub async fn list_audits(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedQuery(scope): ValidatedQuery<DomainScopeParams>,
) -> ApiResult<Vec<AuditView>> {
    let domain = state.guard.require_domain(user.user_id, scope.domain_id).await?;
    let audits = state
        .repos
        .audits
        .list_for_domain(domain.id, RECENT_AUDITS)
        .await?;
    ok(audits.into_iter().map(AuditView::from).collect())
}

/// GET /api/audits/{id}
pub async fn get_audit(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<AuditView> {
    let id = OwnershipGuard::path_id(&id, AUDIT_NOT_FOUND)?;
    let audit = state.guard.require_audit(user.user_id, id).await?;
    ok(audit.into())
}
