//! Local campaign repository trait (port)

use async_trait::async_trait;
use uuid::Uuid;

use super::StoreError;
use crate::models::{CreateCampaignRequest, GridKeywordResult, GridScan, LocalCampaign};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    async fn create(&self, request: &CreateCampaignRequest) -> Result<LocalCampaign, StoreError>;
    async fn list_for_domain(&self, domain_id: Uuid) -> Result<Vec<LocalCampaign>, StoreError>;
    async fn find_owned(&self, id: Uuid, user_id: Uuid) -> Result<Option<LocalCampaign>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<LocalCampaign>, StoreError>;

    async fn create_grid_scan(&self, campaign_id: Uuid) -> Result<GridScan, StoreError>;
    async fn find_grid_scan(&self, id: Uuid) -> Result<Option<GridScan>, StoreError>;
    async fn latest_grid_scan(&self, campaign_id: Uuid) -> Result<Option<GridScan>, StoreError>;
    async fn complete_grid_scan(
        &self,
        id: Uuid,
        results: Vec<GridKeywordResult>,
    ) -> Result<bool, StoreError>;
    async fn fail_grid_scan(&self, id: Uuid, message: String) -> Result<bool, StoreError>;
}
