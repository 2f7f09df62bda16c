//! Backlink and business profile repository trait (port)

use async_trait::async_trait;
use uuid::Uuid;

use super::StoreError;
use crate::models::{BacklinkProfile, BusinessProfile, SaveBusinessProfileRequest};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn backlink_profile(&self, domain_id: Uuid) -> Result<Option<BacklinkProfile>, StoreError>;
    async fn save_backlink_profile(&self, profile: &BacklinkProfile) -> Result<(), StoreError>;

    async fn business_profile(&self, domain_id: Uuid) -> Result<Option<BusinessProfile>, StoreError>;
    async fn save_business_profile(
        &self,
        request: &SaveBusinessProfileRequest,
    ) -> Result<BusinessProfile, StoreError>;
}
