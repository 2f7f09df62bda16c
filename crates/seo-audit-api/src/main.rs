use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use seo_audit_api::auth::JwtManager;
use seo_audit_api::config::Settings;
use seo_audit_api::database::{
    DbPool, PgAuditRepository, PgCampaignRepository, PgDomainRepository, PgKeywordRepository,
    PgProfileRepository, PgScanRepository,
};
use seo_audit_api::repositories::Repositories;
use seo_audit_api::routes::build_router;
use seo_audit_api::security::{OwnershipGuard, WebhookVerifier};
use seo_audit_api::services::jobs::{manifest, CrawlPolling};
use seo_audit_api::services::{
    BacklinkService, DataForSeoClient, InngestClient, JobExecutor, JobQueue, SeoDataProvider,
};
use seo_audit_api::state::AppState;
use seo_audit_api::utils::logger::init_logger;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::load()?;

    // Initialize logging; the guard flushes the file writer on exit
    let _log_guard = init_logger(&settings.logging)?;
    info!("Starting SEO audit API...");

    // Initialize database pool
    let db_pool = DbPool::new(&settings.database).await?;
    info!("Database connection established");
    if settings.database.run_migrations {
        db_pool.migrate().await?;
    }

    let pool = db_pool.get_pool().clone();
    let repos = Repositories {
        domains: Arc::new(PgDomainRepository::new(pool.clone())),
        audits: Arc::new(PgAuditRepository::new(pool.clone())),
        scans: Arc::new(PgScanRepository::new(pool.clone())),
        campaigns: Arc::new(PgCampaignRepository::new(pool.clone())),
        keywords: Arc::new(PgKeywordRepository::new(pool.clone())),
        profiles: Arc::new(PgProfileRepository::new(pool)),
    };

    // Initialize services
    let provider: Arc<dyn SeoDataProvider> =
        Arc::new(DataForSeoClient::new(settings.provider.clone())?);
    let queue: Arc<dyn JobQueue> = Arc::new(InngestClient::new(settings.jobs.clone())?);
    let backlinks = Arc::new(BacklinkService::new(provider.clone(), repos.profiles.clone()));
    let executor = Arc::new(JobExecutor::new(
        repos.clone(),
        provider,
        queue.clone(),
        backlinks.clone(),
        settings.jobs.app_id.clone(),
        CrawlPolling::from(&settings.provider),
    ));

    let verifier = WebhookVerifier::new(
        settings.jobs.signing_key.clone(),
        settings.jobs.signature_tolerance_seconds,
        settings.jobs.dev_mode,
    );
    if !settings.jobs.dev_mode && !verifier.has_signing_key() {
        warn!("No job signing key configured; webhook invocations will be rejected");
    }

    // Announce functions to the runner; it can also be triggered with PUT /api/inngest
    if let Err(e) = queue
        .register(manifest(&settings.jobs.app_id, &settings.jobs.serve_url))
        .await
    {
        warn!("Job function registration failed, continuing: {}", e);
    }

    let state = AppState {
        guard: Arc::new(OwnershipGuard::new(&repos)),
        repos,
        sessions: Arc::new(JwtManager::new(
            &settings.auth.jwt_secret,
            &settings.auth.session_cookie,
        )),
        queue,
        backlinks,
        executor,
        verifier: Arc::new(verifier),
        health: Arc::new(db_pool.clone()),
        jobs: settings.jobs.clone(),
    };

    // Build router
    let app = build_router(state, &settings.server.allowed_origins);

    // Server address
    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));
    info!("Server listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db_pool.close().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
}
