//! Background job functions.
//!
//! The runner delivers an event to `/api/inngest?fnId=..`; [`JobExecutor`]
//! looks the function up and runs it to completion. Provider failures are
//! terminal for the record being processed and are reported as
//! [`JobOutcome::Failed`]. Store and queue failures bubble up as
//! [`JobError`] so the runner retries the whole invocation; every function
//! is written so a retry picks up where the last attempt stopped.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ProviderConfig;
use crate::models::{
    AuditCategory, GridKeywordResult, GridPointRank, KeywordRanking, ScanStatus, StepResult,
};
use crate::repositories::{Repositories, StoreError};
use crate::services::backlinks::{BacklinkService, RefreshError};
use crate::services::job_queue::{
    FunctionManifest, JobEvent, JobQueue, JobQueueError, StepManifest, StepRuntime,
    TriggerManifest,
};
use crate::services::seo_provider::{ProviderError, SeoDataProvider};

pub const ENQUEUE_FAILED_MESSAGE: &str = "Failed to enqueue background job";
const DUE_SCHEDULE_BATCH: i64 = 500;
const STEP_ID: &str = "step";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    RunAudit,
    RunSiteScan,
    RunGridScan,
    RefreshBacklinks,
    CheckKeywords,
    DispatchKeywordChecks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobTrigger {
    Event(&'static str),
    Cron(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct JobFunction {
    pub kind: JobKind,
    pub id: &'static str,
    pub name: &'static str,
    pub trigger: JobTrigger,
}

pub const FUNCTIONS: [JobFunction; 6] = [
    JobFunction {
        kind: JobKind::RunAudit,
        id: "run-audit",
        name: "Run SEO audit",
        trigger: JobTrigger::Event(JobEvent::AUDIT_REQUESTED),
    },
    JobFunction {
        kind: JobKind::RunSiteScan,
        id: "run-site-scan",
        name: "Run site audit crawl",
        trigger: JobTrigger::Event(JobEvent::SCAN_REQUESTED),
    },
    JobFunction {
        kind: JobKind::RunGridScan,
        id: "run-grid-scan",
        name: "Run local grid scan",
        trigger: JobTrigger::Event(JobEvent::GRID_SCAN_REQUESTED),
    },
    JobFunction {
        kind: JobKind::RefreshBacklinks,
        id: "refresh-backlinks",
        name: "Refresh backlink profile",
        trigger: JobTrigger::Event(JobEvent::BACKLINKS_REFRESH_REQUESTED),
    },
    JobFunction {
        kind: JobKind::CheckKeywords,
        id: "check-keywords",
        name: "Check keyword rankings",
        trigger: JobTrigger::Event(JobEvent::KEYWORD_CHECK_REQUESTED),
    },
    JobFunction {
        kind: JobKind::DispatchKeywordChecks,
        id: "dispatch-keyword-checks",
        name: "Dispatch due keyword checks",
        trigger: JobTrigger::Cron("*/15 * * * *"),
    },
];

/// Accepts both the bare id and the runner's `<app>-<id>` slug.
pub fn find_function(fn_id: &str, app_id: &str) -> Option<&'static JobFunction> {
    let bare = fn_id
        .strip_prefix(app_id)
        .and_then(|rest| rest.strip_prefix('-'))
        .unwrap_or(fn_id);
    FUNCTIONS.iter().find(|f| f.id == bare)
}

/// Registration payload for every function, invoked over HTTP at `serve_url`.
pub fn manifest(app_id: &str, serve_url: &str) -> Vec<FunctionManifest> {
    FUNCTIONS
        .iter()
        .map(|f| {
            let slug = format!("{}-{}", app_id, f.id);
            let trigger = match f.trigger {
                JobTrigger::Event(event) => TriggerManifest::Event {
                    event: event.to_string(),
                },
                JobTrigger::Cron(cron) => TriggerManifest::Cron {
                    cron: cron.to_string(),
                },
            };
            let step = StepManifest {
                id: STEP_ID.to_string(),
                name: STEP_ID.to_string(),
                runtime: StepRuntime {
                    kind: "http".to_string(),
                    url: format!("{}?fnId={}&stepId={}", serve_url, slug, STEP_ID),
                },
            };
            FunctionManifest {
                id: slug,
                name: f.name.to_string(),
                triggers: vec![trigger],
                steps: BTreeMap::from([(STEP_ID.to_string(), step)]),
            }
        })
        .collect()
}

/// Event as delivered in the invocation body.
#[derive(Debug, Clone, Deserialize)]
pub struct InvocationEvent {
    pub name: String,
    #[serde(default)]
    pub data: Value,
}

impl InvocationEvent {
    fn parse(&self) -> Result<JobEvent, JobError> {
        serde_json::from_value(json!({ "name": self.name, "data": self.data }))
            .map_err(|e| JobError::InvalidEvent(format!("{}: {}", self.name, e)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum JobOutcome {
    Completed,
    /// Nothing to do: record gone, already terminal, or not due.
    Skipped(String),
    /// The record was marked failed with this message.
    Failed(String),
    Dispatched(usize),
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Invalid event payload: {0}")]
    InvalidEvent(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] JobQueueError),
}

#[derive(Debug, Clone, Copy)]
pub struct CrawlPolling {
    pub interval: Duration,
    pub max_polls: u32,
}

impl From<&ProviderConfig> for CrawlPolling {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.crawl_poll_interval_seconds),
            max_polls: config.crawl_max_polls,
        }
    }
}

pub struct JobExecutor {
    repos: Repositories,
    provider: Arc<dyn SeoDataProvider>,
    queue: Arc<dyn JobQueue>,
    backlinks: Arc<BacklinkService>,
    app_id: String,
    polling: CrawlPolling,
}

impl JobExecutor {
    pub fn new(
        repos: Repositories,
        provider: Arc<dyn SeoDataProvider>,
        queue: Arc<dyn JobQueue>,
        backlinks: Arc<BacklinkService>,
        app_id: String,
        polling: CrawlPolling,
    ) -> Self {
        Self {
            repos,
            provider,
            queue,
            backlinks,
            app_id,
            polling,
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub async fn invoke(&self, fn_id: &str, event: InvocationEvent) -> Result<JobOutcome, JobError> {
        let function = find_function(fn_id, &self.app_id)
            .ok_or_else(|| JobError::UnknownFunction(fn_id.to_string()))?;
        info!("Running job {} for event {}", function.id, event.name);

        if function.kind == JobKind::DispatchKeywordChecks {
            return self.dispatch_keyword_checks().await;
        }

        let outcome = match (function.kind, event.parse()?) {
            (JobKind::RunAudit, JobEvent::AuditRequested { audit_id }) => {
                self.run_audit(audit_id).await?
            }
            (JobKind::RunSiteScan, JobEvent::ScanRequested { scan_id }) => {
                self.run_site_scan(scan_id).await?
            }
            (JobKind::RunGridScan, JobEvent::GridScanRequested { grid_scan_id }) => {
                self.run_grid_scan(grid_scan_id).await?
            }
            (JobKind::RefreshBacklinks, JobEvent::BacklinksRefreshRequested { domain_id }) => {
                self.refresh_backlinks(domain_id).await?
            }
            (JobKind::CheckKeywords, JobEvent::KeywordCheckRequested { schedule_id }) => {
                self.check_keywords(schedule_id).await?
            }
            (_, other) => {
                return Err(JobError::InvalidEvent(format!(
                    "{} does not handle {}",
                    function.id,
                    other.name()
                )))
            }
        };

        info!("Job {} finished: {:?}", function.id, outcome);
        Ok(outcome)
    }

    async fn run_audit(&self, audit_id: Uuid) -> Result<JobOutcome, JobError> {
        let audits = &self.repos.audits;
        let Some(audit) = audits.find_by_id(audit_id).await? else {
            return Ok(JobOutcome::Skipped(format!("audit {audit_id} not found")));
        };
        if audit.status.is_terminal() {
            return Ok(JobOutcome::Skipped(format!("audit {audit_id} already {}", audit.status.as_str())));
        }

        let Some(domain) = self.repos.domains.find_by_id(audit.domain_id).await? else {
            audits.fail(audit_id, "Domain not found".into()).await?;
            return Ok(JobOutcome::Failed("Domain not found".into()));
        };

        audits.mark_running(audit_id).await?;

        for category in AuditCategory::ALL {
            if audit.step(category).is_some() {
                continue;
            }

            let result = match category {
                AuditCategory::OnPage => self
                    .provider
                    .on_page_summary(&domain.host)
                    .await
                    .map(StepResult::OnPage),
                AuditCategory::Serp if audit.keywords.is_empty() => continue,
                AuditCategory::Serp => self
                    .provider
                    .serp_positions(&domain.host, audit.keywords.clone())
                    .await
                    .map(StepResult::Serp),
                AuditCategory::Backlinks => match self.backlinks.refresh(&domain).await {
                    Ok(profile) => Ok(StepResult::Backlinks(profile.summary)),
                    Err(RefreshError::Provider(e)) => Err(e),
                    Err(RefreshError::Store(e)) => return Err(e.into()),
                },
                AuditCategory::Business => self
                    .provider
                    .business_listing(domain.listing_name(), domain.city.clone())
                    .await
                    .map(StepResult::Business),
            };

            match result {
                Ok(step) => {
                    if !audits.record_step(audit_id, step).await? {
                        return Ok(JobOutcome::Skipped(format!("audit {audit_id} is no longer running")));
                    }
                }
                Err(e) => return self.fail_audit(audit_id, category, e).await,
            }
        }

        audits.complete(audit_id).await?;
        Ok(JobOutcome::Completed)
    }

    async fn fail_audit(
        &self,
        audit_id: Uuid,
        category: AuditCategory,
        err: ProviderError,
    ) -> Result<JobOutcome, JobError> {
        warn!("Audit {} step {} failed: {}", audit_id, category.as_str(), err);
        let message = err.to_string();
        self.repos.audits.fail(audit_id, message.clone()).await?;
        Ok(JobOutcome::Failed(message))
    }

    async fn run_site_scan(&self, scan_id: Uuid) -> Result<JobOutcome, JobError> {
        let scans = &self.repos.scans;
        let Some(scan) = scans.find_by_id(scan_id).await? else {
            return Ok(JobOutcome::Skipped(format!("scan {scan_id} not found")));
        };
        if scan.status.is_terminal() {
            return Ok(JobOutcome::Skipped(format!("scan {scan_id} already {}", scan.status.as_str())));
        }

        let Some(domain) = self.repos.domains.find_by_id(scan.domain_id).await? else {
            scans.fail(scan_id, "Domain not found".into()).await?;
            return Ok(JobOutcome::Failed("Domain not found".into()));
        };

        // A retried invocation resumes polling the crawl it already started.
        let task_id = match (scan.status, scan.external_task_id) {
            (ScanStatus::Crawling, Some(task_id)) => task_id,
            _ => {
                let max_pages = scan.max_pages.max(1) as u32;
                match self.provider.start_crawl(&domain.host, max_pages).await {
                    Ok(task_id) => {
                        scans.mark_crawling(scan_id, task_id.clone()).await?;
                        task_id
                    }
                    Err(e) => return self.fail_scan(scan_id, e.to_string()).await,
                }
            }
        };

        let mut finished = false;
        for poll in 0..self.polling.max_polls {
            if poll > 0 {
                tokio::time::sleep(self.polling.interval).await;
            }
            let status = match self.provider.crawl_status(&task_id).await {
                Ok(status) => status,
                Err(e) => return self.fail_scan(scan_id, e.to_string()).await,
            };
            scans.update_progress(scan_id, status.progress()).await?;
            if status.finished {
                finished = true;
                break;
            }
        }

        if !finished {
            let message = format!("Crawl did not finish after {} status checks", self.polling.max_polls);
            return self.fail_scan(scan_id, message).await;
        }

        let pages = match self.provider.crawl_pages(&task_id, scan.max_pages.max(1) as u32).await {
            Ok(pages) => pages,
            Err(e) => return self.fail_scan(scan_id, e.to_string()).await,
        };

        // Duplicate URLs collapse on insert; report what the listing will show.
        let stored = scans.insert_pages(scan_id, pages).await?;
        scans.complete(scan_id, stored as i32).await?;
        Ok(JobOutcome::Completed)
    }

    async fn fail_scan(&self, scan_id: Uuid, message: String) -> Result<JobOutcome, JobError> {
        self.repos.scans.fail(scan_id, message.clone()).await?;
        Ok(JobOutcome::Failed(message))
    }

    async fn run_grid_scan(&self, grid_scan_id: Uuid) -> Result<JobOutcome, JobError> {
        let campaigns = &self.repos.campaigns;
        let Some(grid_scan) = campaigns.find_grid_scan(grid_scan_id).await? else {
            return Ok(JobOutcome::Skipped(format!("grid scan {grid_scan_id} not found")));
        };
        if grid_scan.status.is_terminal() {
            return Ok(JobOutcome::Skipped(format!("grid scan {grid_scan_id} already finished")));
        }

        let campaign = campaigns.find_by_id(grid_scan.campaign_id).await?;
        let domain = match &campaign {
            Some(c) => self.repos.domains.find_by_id(c.domain_id).await?,
            None => None,
        };
        let (Some(campaign), Some(domain)) = (campaign, domain) else {
            campaigns.fail_grid_scan(grid_scan_id, "Campaign not found".into()).await?;
            return Ok(JobOutcome::Failed("Campaign not found".into()));
        };

        let points = campaign.grid_points();
        let mut results = Vec::with_capacity(campaign.keywords.len());
        for keyword in &campaign.keywords {
            let mut ranks = Vec::with_capacity(points.len());
            for point in &points {
                let rank = match self
                    .provider
                    .local_rank(keyword, *point, &domain.host, domain.listing_name())
                    .await
                {
                    Ok(rank) => rank,
                    Err(e) => {
                        let message = e.to_string();
                        campaigns.fail_grid_scan(grid_scan_id, message.clone()).await?;
                        return Ok(JobOutcome::Failed(message));
                    }
                };
                ranks.push(GridPointRank {
                    row: point.row,
                    col: point.col,
                    lat: point.lat,
                    lng: point.lng,
                    rank,
                });
            }
            results.push(GridKeywordResult::new(keyword.clone(), ranks));
        }

        campaigns.complete_grid_scan(grid_scan_id, results).await?;
        Ok(JobOutcome::Completed)
    }

    async fn refresh_backlinks(&self, domain_id: Uuid) -> Result<JobOutcome, JobError> {
        let Some(domain) = self.repos.domains.find_by_id(domain_id).await? else {
            return Ok(JobOutcome::Skipped(format!("domain {domain_id} not found")));
        };

        match self.backlinks.refresh(&domain).await {
            Ok(_) => Ok(JobOutcome::Completed),
            Err(RefreshError::Provider(e)) => Ok(JobOutcome::Failed(e.to_string())),
            Err(RefreshError::Store(e)) => Err(e.into()),
        }
    }

    async fn check_keywords(&self, schedule_id: Uuid) -> Result<JobOutcome, JobError> {
        let keywords = &self.repos.keywords;
        let Some(schedule) = keywords.find_by_id(schedule_id).await? else {
            return Ok(JobOutcome::Skipped(format!("schedule {schedule_id} not found")));
        };

        let now = Utc::now();
        if !schedule.is_active || schedule.next_run_at > now {
            return Ok(JobOutcome::Skipped(format!("schedule {schedule_id} is not due")));
        }

        let Some(domain) = self.repos.domains.find_by_id(schedule.domain_id).await? else {
            return Ok(JobOutcome::Skipped(format!("domain {} not found", schedule.domain_id)));
        };

        let serp = match self
            .provider
            .serp_positions(&domain.host, schedule.keywords.clone())
            .await
        {
            Ok(serp) => serp,
            Err(e) => {
                warn!("Keyword check {} failed: {}", schedule_id, e);
                return Ok(JobOutcome::Failed(e.to_string()));
            }
        };

        let rankings = serp
            .positions
            .into_iter()
            .map(|p| KeywordRanking {
                keyword: p.keyword,
                position: p.position.map(|pos| pos as i32),
                url: p.url,
                checked_at: now,
            })
            .collect();

        let next_run_at = schedule.spec().next_run_after(now);
        if !keywords.record_run(schedule_id, rankings, now, next_run_at).await? {
            return Ok(JobOutcome::Skipped(format!("schedule {schedule_id} was already checked")));
        }
        Ok(JobOutcome::Completed)
    }

    async fn dispatch_keyword_checks(&self) -> Result<JobOutcome, JobError> {
        let due = self.repos.keywords.due(Utc::now(), DUE_SCHEDULE_BATCH).await?;
        for schedule in &due {
            self.queue
                .enqueue(JobEvent::KeywordCheckRequested {
                    schedule_id: schedule.id,
                })
                .await?;
        }
        if !due.is_empty() {
            info!("Dispatched {} keyword checks", due.len());
        }
        Ok(JobOutcome::Dispatched(due.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use crate::repositories::{
        MockAuditRepository, MockCampaignRepository, MockDomainRepository, MockKeywordRepository,
        MockProfileRepository, MockScanRepository,
    };
    use crate::services::job_queue::MockJobQueue;
    use crate::services::seo_provider::{CrawlStatus, MockSeoDataProvider};
    use chrono::{Duration as ChronoDuration, NaiveTime};
    use mockall::predicate::eq;

    #[derive(Default)]
    struct Mocks {
        domains: MockDomainRepository,
        audits: MockAuditRepository,
        scans: MockScanRepository,
        campaigns: MockCampaignRepository,
        keywords: MockKeywordRepository,
        profiles: MockProfileRepository,
        provider: MockSeoDataProvider,
        queue: MockJobQueue,
    }

    impl Mocks {
        fn executor(self) -> JobExecutor {
            let provider: Arc<dyn SeoDataProvider> = Arc::new(self.provider);
            let profiles = Arc::new(self.profiles);
            let repos = Repositories {
                domains: Arc::new(self.domains),
                audits: Arc::new(self.audits),
                scans: Arc::new(self.scans),
                campaigns: Arc::new(self.campaigns),
                keywords: Arc::new(self.keywords),
                profiles: profiles.clone(),
            };
            let backlinks = Arc::new(BacklinkService::new(provider.clone(), profiles));
            JobExecutor::new(
                repos,
                provider,
                Arc::new(self.queue),
                backlinks,
                "seo-audit".into(),
                CrawlPolling {
                    interval: Duration::from_millis(0),
                    max_polls: 3,
                },
            )
        }
    }

    fn domain(id: Uuid) -> Domain {
        Domain {
            id,
            user_id: Uuid::new_v4(),
            name: "Acme Plumbing".into(),
            host: "acme.com".into(),
            business_name: None,
            city: Some("Austin".into()),
            state: None,
            status: DomainStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn audit(id: Uuid, domain_id: Uuid, status: AuditStatus) -> Audit {
        Audit {
            id,
            domain_id,
            status,
            keywords: vec!["plumber austin".into()],
            steps: vec![],
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    fn scan(id: Uuid, domain_id: Uuid) -> Scan {
        let now = Utc::now();
        Scan {
            id,
            domain_id,
            status: ScanStatus::Pending,
            progress: 0,
            external_task_id: None,
            max_pages: 50,
            pages_crawled: 0,
            error_message: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    fn schedule(id: Uuid, domain_id: Uuid, next_run_at: chrono::DateTime<Utc>) -> KeywordSchedule {
        KeywordSchedule {
            id,
            domain_id,
            keywords: vec!["plumber".into()],
            frequency: Frequency::Daily,
            day_of_week: None,
            day_of_month: None,
            time_of_day: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            next_run_at,
            last_run_at: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn event(event: JobEvent) -> InvocationEvent {
        serde_json::from_value(serde_json::to_value(event).unwrap()).unwrap()
    }

    fn on_page() -> OnPageSummary {
        OnPageSummary {
            score: 80.0,
            pages_crawled: 1,
            issues: 2,
            title: None,
            meta_description: None,
        }
    }

    #[test]
    fn test_function_lookup_accepts_slug() {
        assert_eq!(find_function("run-audit", "seo-audit").unwrap().kind, JobKind::RunAudit);
        assert_eq!(
            find_function("seo-audit-run-site-scan", "seo-audit").unwrap().kind,
            JobKind::RunSiteScan
        );
        assert!(find_function("seo-audit-unknown", "seo-audit").is_none());
    }

    #[test]
    fn test_manifest_lists_every_function() {
        let functions = manifest("seo-audit", "https://api.example.com/api/inngest");
        assert_eq!(functions.len(), FUNCTIONS.len());

        let cron = functions
            .iter()
            .find(|f| f.id == "seo-audit-dispatch-keyword-checks")
            .unwrap();
        assert_eq!(
            serde_json::to_value(&cron.triggers).unwrap(),
            json!([{ "cron": "*/15 * * * *" }])
        );
        assert_eq!(
            cron.steps["step"].runtime.url,
            "https://api.example.com/api/inngest?fnId=seo-audit-dispatch-keyword-checks&stepId=step"
        );
    }

    #[tokio::test]
    async fn test_audit_runs_every_step_in_order() {
        let (audit_id, domain_id) = (Uuid::new_v4(), Uuid::new_v4());
        let mut m = Mocks::default();
        m.audits
            .expect_find_by_id()
            .returning(move |id| Ok(Some(audit(id, domain_id, AuditStatus::Pending))));
        m.domains.expect_find_by_id().returning(|id| Ok(Some(domain(id))));
        m.audits.expect_mark_running().times(1).returning(|_| Ok(true));
        m.provider.expect_on_page_summary().returning(|_| Ok(on_page()));
        m.provider
            .expect_serp_positions()
            .returning(|_, _| Ok(SerpSummary { positions: vec![] }));
        m.provider.expect_backlink_profile().returning(|_| {
            Ok(crate::services::seo_provider::BacklinkData {
                summary: BacklinkSummary::default(),
                backlinks: vec![],
            })
        });
        m.profiles.expect_save_backlink_profile().returning(|_| Ok(()));
        m.provider
            .expect_business_listing()
            .withf(|name, city| name == "Acme Plumbing" && city.as_deref() == Some("Austin"))
            .returning(|_, _| {
                Ok(BusinessSummary {
                    found: false,
                    place_id: None,
                    rating: None,
                    review_count: 0,
                    categories: vec![],
                })
            });

        let mut seq = mockall::Sequence::new();
        for category in AuditCategory::ALL {
            m.audits
                .expect_record_step()
                .withf(move |_, step| step.category() == category)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _| Ok(true));
        }
        m.audits.expect_complete().with(eq(audit_id)).times(1).returning(|_| Ok(true));

        let outcome = m
            .executor()
            .invoke("run-audit", event(JobEvent::AuditRequested { audit_id }))
            .await
            .unwrap();
        assert_eq!(outcome, JobOutcome::Completed);
    }

    #[tokio::test]
    async fn test_redelivered_terminal_audit_is_noop() {
        let mut m = Mocks::default();
        m.audits
            .expect_find_by_id()
            .returning(|id| Ok(Some(audit(id, Uuid::new_v4(), AuditStatus::Complete))));
        m.audits.expect_mark_running().never();
        m.provider.expect_on_page_summary().never();

        let outcome = m
            .executor()
            .invoke("run-audit", event(JobEvent::AuditRequested { audit_id: Uuid::new_v4() }))
            .await
            .unwrap();
        assert!(matches!(outcome, JobOutcome::Skipped(_)));
    }

    #[tokio::test]
    async fn test_provider_failure_fails_audit_with_message() {
        let audit_id = Uuid::new_v4();
        let mut m = Mocks::default();
        m.audits
            .expect_find_by_id()
            .returning(|id| Ok(Some(audit(id, Uuid::new_v4(), AuditStatus::Pending))));
        m.domains.expect_find_by_id().returning(|id| Ok(Some(domain(id))));
        m.audits.expect_mark_running().returning(|_| Ok(true));
        m.provider.expect_on_page_summary().returning(|_| Ok(on_page()));
        m.audits.expect_record_step().times(1).returning(|_, _| Ok(true));
        m.provider.expect_serp_positions().returning(|_, _| {
            Err(ProviderError::Api {
                code: 40501,
                message: "Invalid Field".into(),
            })
        });
        m.audits
            .expect_fail()
            .with(eq(audit_id), eq("Invalid Field (40501)".to_string()))
            .times(1)
            .returning(|_, _| Ok(true));
        m.audits.expect_complete().never();

        let outcome = m
            .executor()
            .invoke("run-audit", event(JobEvent::AuditRequested { audit_id }))
            .await
            .unwrap();
        assert_eq!(outcome, JobOutcome::Failed("Invalid Field (40501)".into()));
    }

    #[tokio::test]
    async fn test_store_failure_is_retried_by_runner() {
        let mut m = Mocks::default();
        m.audits
            .expect_find_by_id()
            .returning(|_| Err(StoreError::Database("pool timed out".into())));

        let result = m
            .executor()
            .invoke("run-audit", event(JobEvent::AuditRequested { audit_id: Uuid::new_v4() }))
            .await;
        assert!(matches!(result, Err(JobError::Store(_))));
    }

    #[tokio::test]
    async fn test_site_scan_crawls_and_stores_pages() {
        let scan_id = Uuid::new_v4();
        let mut m = Mocks::default();
        m.scans
            .expect_find_by_id()
            .returning(|id| Ok(Some(scan(id, Uuid::new_v4()))));
        m.domains.expect_find_by_id().returning(|id| Ok(Some(domain(id))));
        m.provider
            .expect_start_crawl()
            .withf(|host, max| host == "acme.com" && *max == 50)
            .returning(|_, _| Ok("task-7".into()));
        m.scans
            .expect_mark_crawling()
            .with(eq(scan_id), eq("task-7".to_string()))
            .returning(|_, _| Ok(true));

        let mut polls = 0;
        m.provider.expect_crawl_status().times(2).returning(move |_| {
            polls += 1;
            Ok(CrawlStatus {
                finished: polls == 2,
                pages_crawled: 25 * polls,
                max_pages: 50,
            })
        });
        m.scans.expect_update_progress().times(2).returning(|_, _| Ok(()));
        m.provider.expect_crawl_pages().returning(|_, _| {
            Ok(vec![NewScanPage {
                url: "https://acme.com/".into(),
                status_code: 200,
                onpage_score: 90.0,
                issue_count: 0,
                title: None,
            }])
        });
        m.scans.expect_insert_pages().returning(|_, pages| Ok(pages.len() as u64));
        m.scans
            .expect_complete()
            .with(eq(scan_id), eq(1))
            .times(1)
            .returning(|_, _| Ok(true));

        let outcome = m
            .executor()
            .invoke("run-site-scan", event(JobEvent::ScanRequested { scan_id }))
            .await
            .unwrap();
        assert_eq!(outcome, JobOutcome::Completed);
    }

    #[tokio::test]
    async fn test_site_scan_counts_stored_pages() {
        let scan_id = Uuid::new_v4();
        let mut m = Mocks::default();
        m.scans
            .expect_find_by_id()
            .returning(|id| Ok(Some(scan(id, Uuid::new_v4()))));
        m.domains.expect_find_by_id().returning(|id| Ok(Some(domain(id))));
        m.provider.expect_start_crawl().returning(|_, _| Ok("task-8".into()));
        m.scans.expect_mark_crawling().returning(|_, _| Ok(true));
        m.provider.expect_crawl_status().returning(|_| {
            Ok(CrawlStatus {
                finished: true,
                pages_crawled: 2,
                max_pages: 50,
            })
        });
        m.scans.expect_update_progress().returning(|_, _| Ok(()));
        m.provider.expect_crawl_pages().returning(|_, _| {
            let page = NewScanPage {
                url: "https://acme.com/".into(),
                status_code: 200,
                onpage_score: 90.0,
                issue_count: 0,
                title: None,
            };
            Ok(vec![page.clone(), page])
        });
        // the repeated URL is dropped by the store
        m.scans.expect_insert_pages().returning(|_, _| Ok(1));
        m.scans
            .expect_complete()
            .with(eq(scan_id), eq(1))
            .times(1)
            .returning(|_, _| Ok(true));

        let outcome = m
            .executor()
            .invoke("run-site-scan", event(JobEvent::ScanRequested { scan_id }))
            .await
            .unwrap();
        assert_eq!(outcome, JobOutcome::Completed);
    }

    #[tokio::test]
    async fn test_site_scan_records_provider_message() {
        let mut m = Mocks::default();
        m.scans
            .expect_find_by_id()
            .returning(|id| Ok(Some(scan(id, Uuid::new_v4()))));
        m.domains.expect_find_by_id().returning(|id| Ok(Some(domain(id))));
        m.provider.expect_start_crawl().returning(|_, _| {
            Err(ProviderError::Api {
                code: 40200,
                message: "Payment Required.".into(),
            })
        });
        m.scans
            .expect_fail()
            .withf(|_, msg| msg == "Payment Required. (40200)")
            .times(1)
            .returning(|_, _| Ok(true));

        let outcome = m
            .executor()
            .invoke("run-site-scan", event(JobEvent::ScanRequested { scan_id: Uuid::new_v4() }))
            .await
            .unwrap();
        assert!(matches!(outcome, JobOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_unfinished_crawl_fails_after_max_polls() {
        let mut m = Mocks::default();
        m.scans.expect_find_by_id().returning(|id| {
            let mut s = scan(id, Uuid::new_v4());
            s.status = ScanStatus::Crawling;
            s.external_task_id = Some("task-1".into());
            Ok(Some(s))
        });
        m.domains.expect_find_by_id().returning(|id| Ok(Some(domain(id))));
        m.provider.expect_start_crawl().never();
        m.provider.expect_crawl_status().times(3).returning(|_| {
            Ok(CrawlStatus {
                finished: false,
                pages_crawled: 1,
                max_pages: 50,
            })
        });
        m.scans.expect_update_progress().returning(|_, _| Ok(()));
        m.scans.expect_fail().times(1).returning(|_, _| Ok(true));

        let outcome = m
            .executor()
            .invoke("run-site-scan", event(JobEvent::ScanRequested { scan_id: Uuid::new_v4() }))
            .await
            .unwrap();
        assert!(matches!(outcome, JobOutcome::Failed(msg) if msg.contains("3 status checks")));
    }

    #[tokio::test]
    async fn test_grid_scan_ranks_every_point() {
        let (grid_id, campaign_id) = (Uuid::new_v4(), Uuid::new_v4());
        let mut m = Mocks::default();
        m.campaigns.expect_find_grid_scan().returning(move |id| {
            Ok(Some(GridScan {
                id,
                campaign_id,
                status: ScanStatus::Pending,
                results: vec![],
                error_message: None,
                created_at: Utc::now(),
                completed_at: None,
            }))
        });
        m.campaigns.expect_find_by_id().returning(|id| {
            Ok(Some(LocalCampaign {
                id,
                domain_id: Uuid::new_v4(),
                name: "Austin".into(),
                center_lat: 30.0,
                center_lng: -97.0,
                grid_size: 3,
                radius_km: 2.0,
                keywords: vec!["plumber".into(), "drain cleaning".into()],
                frequency: Frequency::Weekly,
                created_at: Utc::now(),
            }))
        });
        m.domains.expect_find_by_id().returning(|id| Ok(Some(domain(id))));
        m.provider
            .expect_local_rank()
            .times(18)
            .returning(|_, point, _, _| Ok((point.row == 1).then_some(3)));
        m.campaigns
            .expect_complete_grid_scan()
            .withf(|_, results| {
                results.len() == 2
                    && results.iter().all(|r| r.points.len() == 9 && r.average_rank == Some(3.0))
            })
            .times(1)
            .returning(|_, _| Ok(true));

        let outcome = m
            .executor()
            .invoke("run-grid-scan", event(JobEvent::GridScanRequested { grid_scan_id: grid_id }))
            .await
            .unwrap();
        assert_eq!(outcome, JobOutcome::Completed);
    }

    #[tokio::test]
    async fn test_keyword_check_skips_when_not_due() {
        let mut m = Mocks::default();
        m.keywords.expect_find_by_id().returning(|id| {
            Ok(Some(schedule(id, Uuid::new_v4(), Utc::now() + ChronoDuration::hours(2))))
        });
        m.provider.expect_serp_positions().never();

        let outcome = m
            .executor()
            .invoke(
                "check-keywords",
                event(JobEvent::KeywordCheckRequested { schedule_id: Uuid::new_v4() }),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, JobOutcome::Skipped(_)));
    }

    #[tokio::test]
    async fn test_keyword_check_records_run_and_advances() {
        let mut m = Mocks::default();
        m.keywords.expect_find_by_id().returning(|id| {
            Ok(Some(schedule(id, Uuid::new_v4(), Utc::now() - ChronoDuration::minutes(1))))
        });
        m.domains.expect_find_by_id().returning(|id| Ok(Some(domain(id))));
        m.provider.expect_serp_positions().returning(|_, keywords| {
            Ok(SerpSummary {
                positions: keywords
                    .into_iter()
                    .map(|keyword| KeywordPosition {
                        keyword,
                        position: Some(4),
                        url: None,
                    })
                    .collect(),
            })
        });
        m.keywords
            .expect_record_run()
            .withf(|_, rankings, ran_at, next| {
                rankings.len() == 1 && rankings[0].position == Some(4) && next > ran_at
            })
            .times(1)
            .returning(|_, _, _, _| Ok(true));

        let outcome = m
            .executor()
            .invoke(
                "check-keywords",
                event(JobEvent::KeywordCheckRequested { schedule_id: Uuid::new_v4() }),
            )
            .await
            .unwrap();
        assert_eq!(outcome, JobOutcome::Completed);
    }

    #[tokio::test]
    async fn test_keyword_check_skips_when_run_already_recorded() {
        let mut m = Mocks::default();
        m.keywords.expect_find_by_id().returning(|id| {
            Ok(Some(schedule(id, Uuid::new_v4(), Utc::now() - ChronoDuration::minutes(1))))
        });
        m.domains.expect_find_by_id().returning(|id| Ok(Some(domain(id))));
        m.provider
            .expect_serp_positions()
            .returning(|_, _| Ok(SerpSummary { positions: vec![] }));
        m.keywords
            .expect_record_run()
            .times(1)
            .returning(|_, _, _, _| Ok(false));

        let outcome = m
            .executor()
            .invoke(
                "check-keywords",
                event(JobEvent::KeywordCheckRequested { schedule_id: Uuid::new_v4() }),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, JobOutcome::Skipped(_)));
    }

    #[tokio::test]
    async fn test_dispatch_enqueues_due_schedules() {
        let mut m = Mocks::default();
        m.keywords.expect_due().returning(|now, _| {
            Ok(vec![
                schedule(Uuid::new_v4(), Uuid::new_v4(), now),
                schedule(Uuid::new_v4(), Uuid::new_v4(), now),
            ])
        });
        m.queue
            .expect_enqueue()
            .withf(|e| e.name() == JobEvent::KEYWORD_CHECK_REQUESTED)
            .times(2)
            .returning(|_| Ok(()));

        let cron = InvocationEvent {
            name: "inngest/scheduled.timer".into(),
            data: json!({}),
        };
        let outcome = m.executor().invoke("dispatch-keyword-checks", cron).await.unwrap();
        assert_eq!(outcome, JobOutcome::Dispatched(2));
    }

    #[tokio::test]
    async fn test_unknown_function_and_mismatched_event() {
        let executor = Mocks::default().executor();

        let err = executor
            .invoke("nope", event(JobEvent::AuditRequested { audit_id: Uuid::new_v4() }))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::UnknownFunction(_)));

        let err = executor
            .invoke("run-audit", event(JobEvent::ScanRequested { scan_id: Uuid::new_v4() }))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidEvent(_)));
    }
}
