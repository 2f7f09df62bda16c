use axum::extract::{rejection::QueryRejection, Path, Query, State};
use tracing::{error, info};

use crate::auth::AuthUser;
use crate::models::{PageListing, PageQueryParams, Scan, ScanStatusView, StartScanRequest};
use crate::security::ownership::{OwnershipGuard, SCAN_NOT_FOUND};
use crate::services::jobs::ENQUEUE_FAILED_MESSAGE;
use crate::services::JobEvent;
use crate::state::AppState;
use crate::utils::validation::{push_error, FieldErrors, QueryParams};
use crate::utils::{ok, ApiError, ApiResult, ValidatedJson};

use super::require_active;

/// POST /api/site-audit/scans
pub async fn start_scan(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(request): ValidatedJson<StartScanRequest>,
) -> ApiResult<Scan> {
    let domain = state.guard.require_domain(user.user_id, request.domain_id).await?;
    require_active(&domain)?;

    let scan = state
        .repos
        .scans
        .create_pending(domain.id, request.max_pages())
        .await?;

    if let Err(e) = state.queue.enqueue(JobEvent::ScanRequested { scan_id: scan.id }).await {
        error!("Scan {} could not be enqueued: {}", scan.id, e);
        state.repos.scans.fail(scan.id, ENQUEUE_FAILED_MESSAGE.to_string()).await?;
        return Err(e.into());
    }

    info!("Scan {} queued for {} (max {} pages)", scan.id, domain.host, scan.max_pages);
    ok(scan)
}

/// GET /api/site-audit/scans/{scanId}/status
pub async fn scan_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(scan_id): Path<String>,
) -> ApiResult<ScanStatusView> {
    let scan_id = OwnershipGuard::path_id(&scan_id, SCAN_NOT_FOUND)?;
    let scan = state.guard.require_scan(user.user_id, scan_id).await?;
    ok(scan.into())
}

/// GET /api/site-audit/scans/{scanId}/pages
///
/// Ownership is settled before the query string is looked at, so a
/// foreign scan id is a 404 whatever the parameters.
pub async fn scan_pages(
    State(state): State<AppState>,
    user: AuthUser,
    Path(scan_id): Path<String>,
    params: Result<Query<PageQueryParams>, QueryRejection>,
) -> ApiResult<PageListing> {
    let scan_id = OwnershipGuard::path_id(&scan_id, SCAN_NOT_FOUND)?;
    let scan = state.guard.require_scan(user.user_id, scan_id).await?;

    let Query(params) = params.map_err(|rejection| {
        let mut errors = FieldErrors::new();
        push_error(&mut errors, "query", rejection.body_text());
        ApiError::Validation(errors)
    })?;
    let query = params.into_validated()?;

    let (pages, total) = state.repos.scans.list_pages(scan.id, &query).await?;
    ok(PageListing::new(pages, total, &query))
}
