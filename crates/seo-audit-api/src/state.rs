use std::sync::Arc;

use crate::auth::SessionResolver;
use crate::config::JobsConfig;
use crate::database::HealthCheck;
use crate::repositories::Repositories;
use crate::security::{OwnershipGuard, WebhookVerifier};
use crate::services::{BacklinkService, JobExecutor, JobQueue};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub guard: Arc<OwnershipGuard>,
    pub sessions: Arc<dyn SessionResolver>,
    pub queue: Arc<dyn JobQueue>,
    pub backlinks: Arc<BacklinkService>,
    pub executor: Arc<JobExecutor>,
    pub verifier: Arc<WebhookVerifier>,
    pub health: Arc<dyn HealthCheck>,
    pub jobs: JobsConfig,
}
