use axum::extract::{Path, State};
use tracing::{error, info};

use crate::auth::AuthUser;
use crate::models::{CampaignDetail, CreateCampaignRequest, DomainScopeParams, GridScan, LocalCampaign};
use crate::security::ownership::{OwnershipGuard, CAMPAIGN_NOT_FOUND};
use crate::services::jobs::ENQUEUE_FAILED_MESSAGE;
use crate::services::JobEvent;
use crate::state::AppState;
use crate::utils::{ok, ApiResult, ValidatedJson, ValidatedQuery};

use super::require_active;

/// GET /api/local-campaigns?domainId=
pub async fn list_campaigns(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedQuery(scope): ValidatedQuery<DomainScopeParams>,
) -> ApiResult<Vec<LocalCampaign>> {
    let domain = state.guard.require_domain(user.user_id, scope.domain_id).await?;
    ok(state.repos.campaigns.list_for_domain(domain.id).await?)
}

/// POST /api/local-campaigns
pub async fn create_campaign(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(request): ValidatedJson<CreateCampaignRequest>,
) -> ApiResult<LocalCampaign> {
    let domain = state.guard.require_domain(user.user_id, request.domain_id).await?;
    require_active(&domain)?;

    let campaign = state.repos.campaigns.create(&request).await?;
    info!(
        "Campaign {} created for {}: {}x{} grid, {} keywords",
        campaign.id,
        domain.host,
        campaign.grid_size,
        campaign.grid_size,
        campaign.keywords.len()
    );
    ok(campaign)
}

/// GET /api/local-campaigns/{id}
pub async fn get_campaign(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<CampaignDetail> {
    let id = OwnershipGuard::path_id(&id, CAMPAIGN_NOT_FOUND)?;
    let campaign = state.guard.require_campaign(user.user_id, id).await?;
    let latest_scan = state.repos.campaigns.latest_grid_scan(campaign.id).await?;
    ok(CampaignDetail {
        campaign,
        latest_scan,
    })
}

/// POST /api/local-campaigns/{id}/scans
pub async fn start_grid_scan(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<GridScan> {
    let id = OwnershipGuard::path_id(&id, CAMPAIGN_NOT_FOUND)?;
    let campaign = state.guard.require_campaign(user.user_id, id).await?;
    let domain = state.guard.require_domain(user.user_id, campaign.domain_id).await?;
    require_active(&domain)?;

    let grid_scan = state.repos.campaigns.create_grid_scan(campaign.id).await?;
    let event = JobEvent::GridScanRequested {
        grid_scan_id: grid_scan.id,
    };
    if let Err(e) = state.queue.enqueue(event).await {
        error!("Grid scan {} could not be enqueued: {}", grid_scan.id, e);
        state
            .repos
            .campaigns
            .fail_grid_scan(grid_scan.id, ENQUEUE_FAILED_MESSAGE.to_string())
            .await?;
        return Err(e.into());
    }

    info!("Grid scan {} queued for campaign {}", grid_scan.id, campaign.id);
    ok(grid_scan)
}
