use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::models::{BacklinkProfile, Domain};
use crate::repositories::{ProfileRepository, StoreError};
use crate::services::seo_provider::{ProviderError, SeoDataProvider};
use crate::utils::error::ApiError;

#[derive(Error, Debug)]
pub enum RefreshError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<RefreshError> for ApiError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Provider(e) => e.into(),
            RefreshError::Store(e) => e.into(),
        }
    }
}

/// Fetches a domain's backlink profile from the provider and stores it.
pub struct BacklinkService {
    provider: Arc<dyn SeoDataProvider>,
    profiles: Arc<dyn ProfileRepository>,
}

impl BacklinkService {
    pub fn new(provider: Arc<dyn SeoDataProvider>, profiles: Arc<dyn ProfileRepository>) -> Self {
        Self { provider, profiles }
    }

    pub async fn refresh(&self, domain: &Domain) -> Result<BacklinkProfile, RefreshError> {
        let data = self.provider.backlink_profile(&domain.host).await?;

        let profile = BacklinkProfile {
            domain_id: domain.id,
            summary: data.summary,
            backlinks: data.backlinks,
            fetched_at: Utc::now(),
        };
        self.profiles.save_backlink_profile(&profile).await?;

        info!(
            "Backlinks refreshed for {}: {} total, {} referring domains",
            domain.host, profile.summary.total_backlinks, profile.summary.referring_domains
        );
        Ok(profile)
    }
}
