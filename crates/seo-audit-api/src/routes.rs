use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::warn;

use crate::handlers;
use crate::state::AppState;

const MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    let api = Router::new()
        // Public
        .route("/health", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::readiness_check))
        .route(
            "/inngest",
            get(handlers::inngest::introspect)
                .put(handlers::inngest::register)
                .post(handlers::inngest::invoke),
        )
        // Domains
        .route(
            "/domains",
            get(handlers::domains::list_domains).post(handlers::domains::create_domain),
        )
        .route(
            "/domains/{id}",
            get(handlers::domains::get_domain).delete(handlers::domains::deactivate_domain),
        )
        .route("/domains/{id}/tool-counts", get(handlers::domains::tool_counts))
        // Audits
        .route(
            "/audits",
            get(handlers::audits::list_audits).post(handlers::audits::start_audit),
        )
        .route("/audits/{id}", get(handlers::audits::get_audit))
        // Backlinks & business profile
        .route("/backlinks/profile", get(handlers::backlinks::get_profile))
        .route("/backlinks/refresh", post(handlers::backlinks::refresh_profile))
        .route(
            "/gbp/profile",
            get(handlers::gbp::get_profile).post(handlers::gbp::save_profile),
        )
        // Site audit
        .route("/site-audit/scans", post(handlers::site_audit::start_scan))
        .route(
            "/site-audit/scans/{scan_id}/status",
            get(handlers::site_audit::scan_status),
        )
        .route(
            "/site-audit/scans/{scan_id}/pages",
            get(handlers::site_audit::scan_pages),
        )
        // Local grid
        .route(
            "/local-campaigns",
            get(handlers::campaigns::list_campaigns).post(handlers::campaigns::create_campaign),
        )
        .route("/local-campaigns/{id}", get(handlers::campaigns::get_campaign))
        .route(
            "/local-campaigns/{id}/scans",
            post(handlers::campaigns::start_grid_scan),
        )
        // Keyword tracking
        .route(
            "/keywords/schedules",
            get(handlers::keywords::list_schedules).post(handlers::keywords::create_schedule),
        )
        .route(
            "/keywords/schedules/{id}/rankings",
            get(handlers::keywords::latest_rankings),
        );

    Router::new()
        .nest("/api", api)
        .with_state(state)
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

/// Permissive when no origins are configured.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtManager;
    use crate::config::JobsConfig;
    use crate::database::HealthCheck;
    use crate::models::*;
    use crate::repositories::*;
    use crate::security::{OwnershipGuard, WebhookVerifier};
    use crate::services::job_queue::{JobQueueError, MockJobQueue};
    use crate::services::jobs::{CrawlPolling, ENQUEUE_FAILED_MESSAGE};
    use crate::services::seo_provider::MockSeoDataProvider;
    use crate::services::{BacklinkService, JobExecutor, SeoDataProvider};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use chrono::Utc;
    use mockall::predicate::eq;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;
    use uuid::Uuid;

    const SECRET: &str = "router-test-secret";

    struct Database(bool);

    #[async_trait]
    impl HealthCheck for Database {
        async fn ping(&self) -> bool {
            self.0
        }
    }

    #[derive(Default)]
    struct Harness {
        domains: MockDomainRepository,
        audits: MockAuditRepository,
        scans: MockScanRepository,
        campaigns: MockCampaignRepository,
        keywords: MockKeywordRepository,
        profiles: MockProfileRepository,
        queue: MockJobQueue,
        database_down: bool,
    }

    impl Harness {
        fn router(self) -> Router {
            let repos = Repositories {
                domains: Arc::new(self.domains),
                audits: Arc::new(self.audits),
                scans: Arc::new(self.scans),
                campaigns: Arc::new(self.campaigns),
                keywords: Arc::new(self.keywords),
                profiles: Arc::new(self.profiles),
            };
            let provider: Arc<dyn SeoDataProvider> = Arc::new(MockSeoDataProvider::new());
            let queue: Arc<dyn crate::services::JobQueue> = Arc::new(self.queue);
            let backlinks = Arc::new(BacklinkService::new(provider.clone(), repos.profiles.clone()));
            let jobs = JobsConfig {
                app_id: "seo-audit".into(),
                base_url: "http://runner.local".into(),
                event_key: "evt".into(),
                signing_key: Some("signkey-test-00ff".into()),
                serve_url: "http://api.local/api/inngest".into(),
                dev_mode: false,
                signature_tolerance_seconds: 300,
                timeout_seconds: 5,
            };
            let executor = Arc::new(JobExecutor::new(
                repos.clone(),
                provider,
                queue.clone(),
                backlinks.clone(),
                jobs.app_id.clone(),
                CrawlPolling {
                    interval: Duration::from_millis(0),
                    max_polls: 1,
                },
            ));

            let state = AppState {
                guard: Arc::new(OwnershipGuard::new(&repos)),
                repos,
                sessions: Arc::new(JwtManager::new(SECRET, "session")),
                queue,
                backlinks,
                executor,
                verifier: Arc::new(WebhookVerifier::new(
                    jobs.signing_key.clone(),
                    jobs.signature_tolerance_seconds,
                    jobs.dev_mode,
                )),
                health: Arc::new(Database(!self.database_down)),
                jobs,
            };
            build_router(state, &[])
        }
    }

    fn bearer(user_id: Uuid) -> String {
        let token = JwtManager::new(SECRET, "session")
            .generate_token(user_id, 3600)
            .unwrap();
        format!("Bearer {token}")
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get(uri: &str, user_id: Uuid) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, bearer(user_id))
            .body(Body::empty())
            .unwrap()
    }

    fn post_json(uri: &str, user_id: Uuid, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, bearer(user_id))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn domain(id: Uuid, user_id: Uuid) -> Domain {
        Domain {
            id,
            user_id,
            name: "Acme Plumbing".into(),
            host: "acme.com".into(),
            business_name: None,
            city: None,
            state: None,
            status: DomainStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn scan(id: Uuid, status: ScanStatus, error_message: Option<&str>) -> Scan {
        let now = Utc::now();
        Scan {
            id,
            domain_id: Uuid::new_v4(),
            status,
            progress: 40,
            external_task_id: Some("task-1".into()),
            max_pages: 100,
            pages_crawled: 0,
            error_message: error_message.map(str::to_string),
            created_at: now,
            started_at: Some(now),
            completed_at: None,
            updated_at: now,
        }
    }

    fn campaign(id: Uuid, domain_id: Uuid) -> LocalCampaign {
        LocalCampaign {
            id,
            domain_id,
            name: "Austin core".into(),
            center_lat: 30.2672,
            center_lng: -97.7431,
            grid_size: 5,
            radius_km: 2.0,
            keywords: vec!["plumber".into()],
            frequency: Frequency::Weekly,
            created_at: Utc::now(),
        }
    }

    fn owned_domains(harness: &mut Harness) {
        harness
            .domains
            .expect_find_owned()
            .returning(|id, user| Ok(Some(domain(id, user))));
    }

    #[tokio::test]
    async fn test_liveness_needs_no_session() {
        let (status, body) = send(
            Harness::default().router(),
            Request::builder().uri("/api/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_readiness_reports_database_down() {
        let harness = Harness {
            database_down: true,
            ..Default::default()
        };
        let response = harness
            .router()
            .oneshot(Request::builder().uri("/api/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_missing_session_is_401_without_data() {
        let id = Uuid::new_v4();
        let routes = [
            (Method::GET, "/api/domains".to_string()),
            (Method::POST, "/api/domains".to_string()),
            (Method::GET, format!("/api/domains/{id}")),
            (Method::DELETE, format!("/api/domains/{id}")),
            (Method::GET, format!("/api/domains/{id}/tool-counts")),
            (Method::GET, format!("/api/audits?domainId={id}")),
            (Method::POST, "/api/audits".to_string()),
            (Method::GET, format!("/api/audits/{id}")),
            (Method::GET, format!("/api/backlinks/profile?domainId={id}")),
            (Method::POST, "/api/backlinks/refresh".to_string()),
            (Method::GET, format!("/api/gbp/profile?domainId={id}")),
            (Method::POST, "/api/gbp/profile".to_string()),
            (Method::POST, "/api/site-audit/scans".to_string()),
            (Method::GET, format!("/api/site-audit/scans/{id}/status")),
            (Method::GET, format!("/api/site-audit/scans/{id}/pages")),
            (Method::GET, format!("/api/local-campaigns?domainId={id}")),
            (Method::POST, "/api/local-campaigns".to_string()),
            (Method::GET, format!("/api/local-campaigns/{id}")),
            (Method::POST, format!("/api/local-campaigns/{id}/scans")),
            (Method::GET, format!("/api/keywords/schedules?domainId={id}")),
            (Method::POST, "/api/keywords/schedules".to_string()),
            (Method::GET, format!("/api/keywords/schedules/{id}/rankings")),
        ];

        // no expectations: any repository call would panic the mock
        let router = Harness::default().router();
        for (method, uri) in routes {
            let request = Request::builder()
                .method(method.clone())
                .uri(&uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap();
            let (status, body) = send(router.clone(), request).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
            assert_eq!(body["success"], false, "{method} {uri}");
            assert_eq!(body["error"], "Authentication required", "{method} {uri}");
            assert!(body.get("data").is_none(), "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn test_foreign_and_missing_domains_look_the_same() {
        let user = Uuid::new_v4();
        let mut harness = Harness::default();
        // find_owned filters by caller, so another tenant's domain is absent too
        harness.domains.expect_find_owned().returning(|_, _| Ok(None));
        let router = harness.router();

        let foreign = send(router.clone(), get(&format!("/api/domains/{}", Uuid::new_v4()), user)).await;
        let missing = send(router.clone(), get(&format!("/api/domains/{}", Uuid::new_v4()), user)).await;
        let garbage = send(router, get("/api/domains/not-a-uuid", user)).await;

        assert_eq!(foreign.0, StatusCode::NOT_FOUND);
        assert_eq!(foreign, missing);
        assert_eq!(foreign, garbage);
        assert_eq!(foreign.1, json!({ "success": false, "error": "Domain not found" }));
    }

    #[tokio::test]
    async fn test_duplicate_domain_name_is_409() {
        let user = Uuid::new_v4();
        let mut harness = Harness::default();
        harness
            .domains
            .expect_name_exists()
            .withf(move |user_id, name| *user_id == user && name == "Acme Plumbing")
            .returning(|_, _| Ok(true));
        harness.domains.expect_create().never();

        let (status, body) = send(
            harness.router(),
            post_json("/api/domains", user, json!({ "name": " Acme Plumbing ", "host": "acme.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_create_domain_validation_details() {
        let (status, body) = send(
            Harness::default().router(),
            post_json("/api/domains", Uuid::new_v4(), json!({ "name": "", "host": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Validation failed");
        assert!(body["details"]["name"].is_array());
        assert!(body["details"]["host"].is_array());
    }

    #[tokio::test]
    async fn test_blank_domain_name_is_rejected() {
        let mut harness = Harness::default();
        harness.domains.expect_name_exists().never();
        harness.domains.expect_create().never();

        let (status, body) = send(
            harness.router(),
            post_json("/api/domains", Uuid::new_v4(), json!({ "name": "   ", "host": "acme.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["details"]["name"].is_array());
        assert!(body["details"].get("host").is_none());
    }

    #[tokio::test]
    async fn test_missing_profiles_are_404_with_their_own_message() {
        let (user, domain_id) = (Uuid::new_v4(), Uuid::new_v4());
        let mut harness = Harness::default();
        owned_domains(&mut harness);
        harness.profiles.expect_backlink_profile().returning(|_| Ok(None));
        harness.profiles.expect_business_profile().returning(|_| Ok(None));
        let router = harness.router();

        let (status, body) = send(
            router.clone(),
            get(&format!("/api/backlinks/profile?domainId={domain_id}"), user),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Backlink profile not found");

        let (status, body) = send(router, get(&format!("/api/gbp/profile?domainId={domain_id}"), user)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Business profile not found");
    }

    #[tokio::test]
    async fn test_include_details_must_be_boolean() {
        let mut harness = Harness::default();
        harness.domains.expect_find_owned().never();

        let (status, body) = send(
            harness.router(),
            get(
                &format!("/api/backlinks/profile?domainId={}&includeDetails=maybe", Uuid::new_v4()),
                Uuid::new_v4(),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["details"]["includeDetails"].is_array());
    }

    #[tokio::test]
    async fn test_business_profile_save_on_foreign_domain_is_404() {
        let mut harness = Harness::default();
        harness.domains.expect_find_owned().returning(|_, _| Ok(None));
        harness.profiles.expect_save_business_profile().never();

        let (status, body) = send(
            harness.router(),
            post_json(
                "/api/gbp/profile",
                Uuid::new_v4(),
                json!({ "domainId": Uuid::new_v4(), "businessName": "Acme Plumbing" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Domain not found");
    }

    #[tokio::test]
    async fn test_grid_scan_enqueue_failure_marks_scan_failed() {
        let (user, campaign_id, grid_scan_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut harness = Harness::default();
        owned_domains(&mut harness);
        harness
            .campaigns
            .expect_find_owned()
            .returning(|id, _| Ok(Some(campaign(id, Uuid::new_v4()))));
        harness.campaigns.expect_create_grid_scan().returning(move |campaign_id| {
            Ok(GridScan {
                id: grid_scan_id,
                campaign_id,
                status: ScanStatus::Pending,
                results: vec![],
                error_message: None,
                created_at: Utc::now(),
                completed_at: None,
            })
        });
        harness
            .queue
            .expect_enqueue()
            .returning(|_| Err(JobQueueError::Http("connection refused".into())));
        harness
            .campaigns
            .expect_fail_grid_scan()
            .with(eq(grid_scan_id), eq(ENQUEUE_FAILED_MESSAGE.to_string()))
            .times(1)
            .returning(|_, _| Ok(true));

        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/local-campaigns/{campaign_id}/scans"))
            .header(header::AUTHORIZATION, bearer(user))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(harness.router(), request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_campaign_detail_includes_latest_scan() {
        let campaign_id = Uuid::new_v4();
        let mut harness = Harness::default();
        harness
            .campaigns
            .expect_find_owned()
            .returning(|id, _| Ok(Some(campaign(id, Uuid::new_v4()))));
        harness.campaigns.expect_latest_grid_scan().returning(|_| Ok(None));

        let (status, body) = send(
            harness.router(),
            get(&format!("/api/local-campaigns/{campaign_id}"), Uuid::new_v4()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["id"], campaign_id.to_string());
        assert_eq!(body["data"]["gridSize"], 5);
        assert!(body["data"]["latestScan"].is_null());
    }

    #[tokio::test]
    async fn test_weekly_schedule_needs_day_of_week() {
        let mut harness = Harness::default();
        harness.domains.expect_find_owned().never();
        harness.keywords.expect_create().never();

        let (status, body) = send(
            harness.router(),
            post_json(
                "/api/keywords/schedules",
                Uuid::new_v4(),
                json!({
                    "domainId": Uuid::new_v4(),
                    "keywords": ["plumber"],
                    "frequency": "weekly",
                    "timeOfDay": "09:00"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["details"]["dayOfWeek"].is_array());
    }

    #[tokio::test]
    async fn test_blank_keywords_are_rejected() {
        let mut harness = Harness::default();
        harness.domains.expect_find_owned().never();
        harness.keywords.expect_create().never();

        let (status, body) = send(
            harness.router(),
            post_json(
                "/api/keywords/schedules",
                Uuid::new_v4(),
                json!({
                    "domainId": Uuid::new_v4(),
                    "keywords": ["  ", ""],
                    "frequency": "daily",
                    "timeOfDay": "09:00"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["details"]["keywords"].is_array());
    }

    #[tokio::test]
    async fn test_schedule_created_with_next_run() {
        let user = Uuid::new_v4();
        let mut harness = Harness::default();
        owned_domains(&mut harness);
        harness
            .keywords
            .expect_create()
            .withf(|new| new.keywords == vec!["plumber".to_string()] && new.spec.frequency == Frequency::Daily)
            .times(1)
            .returning(|new| {
                Ok(KeywordSchedule {
                    id: Uuid::new_v4(),
                    domain_id: new.domain_id,
                    keywords: new.keywords.clone(),
                    frequency: new.spec.frequency,
                    day_of_week: new.spec.day_of_week.map(|d| d as i16),
                    day_of_month: new.spec.day_of_month.map(|d| d as i16),
                    time_of_day: new.spec.time_of_day,
                    is_active: true,
                    last_run_at: None,
                    next_run_at: new.next_run_at,
                    created_at: Utc::now(),
                })
            });

        let (status, body) = send(
            harness.router(),
            post_json(
                "/api/keywords/schedules",
                user,
                json!({
                    "domainId": Uuid::new_v4(),
                    "keywords": [" Plumber ", "plumber"],
                    "frequency": "daily",
                    "timeOfDay": "09:00"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["keywords"], json!(["plumber"]));
    }

    #[tokio::test]
    async fn test_limit_above_100_is_rejected() {
        let (user, scan_id) = (Uuid::new_v4(), Uuid::new_v4());
        let mut harness = Harness::default();
        harness
            .scans
            .expect_find_owned()
            .returning(|id, _| Ok(Some(scan(id, ScanStatus::Complete, None))));
        harness.scans.expect_list_pages().never();

        let (status, body) = send(
            harness.router(),
            get(&format!("/api/site-audit/scans/{scan_id}/pages?limit=101"), user),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["details"]["limit"].is_array());
    }

    #[tokio::test]
    async fn test_ownership_is_checked_before_query() {
        let mut harness = Harness::default();
        harness.scans.expect_find_owned().returning(|_, _| Ok(None));

        let (status, body) = send(
            harness.router(),
            get(
                &format!("/api/site-audit/scans/{}/pages?limit=500&filter=bogus", Uuid::new_v4()),
                Uuid::new_v4(),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_empty_scan_lists_no_pages() {
        let mut harness = Harness::default();
        harness
            .scans
            .expect_find_owned()
            .returning(|id, _| Ok(Some(scan(id, ScanStatus::Complete, None))));
        harness
            .scans
            .expect_list_pages()
            .returning(|_, _| Ok((vec![], 0)));

        let (status, body) = send(
            harness.router(),
            get(&format!("/api/site-audit/scans/{}/pages", Uuid::new_v4()), Uuid::new_v4()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["pages"], json!([]));
        assert_eq!(body["data"]["pagination"]["total"], 0);
        assert_eq!(body["data"]["pagination"]["hasMore"], false);
    }

    #[tokio::test]
    async fn test_failed_scan_status_returns_message() {
        let mut harness = Harness::default();
        harness.scans.expect_find_owned().returning(|id, _| {
            Ok(Some(scan(id, ScanStatus::Failed, Some("Crawler quota exceeded (40200)"))))
        });

        let (status, body) = send(
            harness.router(),
            get(&format!("/api/site-audit/scans/{}/status", Uuid::new_v4()), Uuid::new_v4()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "FAILED");
        assert_eq!(body["data"]["errorMessage"], "Crawler quota exceeded (40200)");
    }

    #[tokio::test]
    async fn test_enqueue_failure_marks_audit_failed() {
        let (user, domain_id, audit_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut harness = Harness::default();
        harness
            .domains
            .expect_find_owned()
            .returning(|id, user| Ok(Some(domain(id, user))));
        harness.audits.expect_create_pending().returning(move |domain_id, keywords| {
            Ok(Audit {
                id: audit_id,
                domain_id,
                status: AuditStatus::Pending,
                keywords,
                steps: vec![],
                error_message: None,
                created_at: Utc::now(),
                started_at: None,
                completed_at: None,
            })
        });
        harness.queue.expect_enqueue().returning(|_| {
            Err(JobQueueError::Http("connection refused".into()))
        });
        harness
            .audits
            .expect_fail()
            .with(eq(audit_id), eq(ENQUEUE_FAILED_MESSAGE.to_string()))
            .times(1)
            .returning(|_, _| Ok(true));

        let (status, body) = send(
            harness.router(),
            post_json("/api/audits", user, json!({ "domainId": domain_id, "keywords": ["plumber"] })),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_inactive_domain_accepts_no_new_scans() {
        let mut harness = Harness::default();
        harness.domains.expect_find_owned().returning(|id, user| {
            let mut d = domain(id, user);
            d.status = DomainStatus::Inactive;
            Ok(Some(d))
        });
        harness.scans.expect_create_pending().never();

        let (status, _) = send(
            harness.router(),
            post_json(
                "/api/site-audit/scans",
                Uuid::new_v4(),
                json!({ "domainId": Uuid::new_v4() }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_webhook_requires_signature() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/inngest?fnId=seo-audit-run-audit")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "event": { "name": "audit/requested", "data": { "auditId": Uuid::new_v4() } } })
                    .to_string(),
            ))
            .unwrap();

        let (status, _) = send(Harness::default().router(), request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_signed_webhook_runs_job() {
        let mut harness = Harness::default();
        harness.audits.expect_find_by_id().returning(|_| Ok(None));

        let body = json!({ "event": { "name": "audit/requested", "data": { "auditId": Uuid::new_v4() } } })
            .to_string();
        let signature = WebhookVerifier::new(Some("signkey-test-00ff".into()), 300, false)
            .sign(body.as_bytes(), Utc::now().timestamp())
            .unwrap();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/inngest?fnId=seo-audit-run-audit")
            .header("X-Inngest-Signature", signature)
            .body(Body::from(body))
            .unwrap();

        let (status, body) = send(harness.router(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "skipped");
    }

    #[tokio::test]
    async fn test_webhook_introspection() {
        let (status, body) = send(
            Harness::default().router(),
            Request::builder().uri("/api/inngest").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["functionCount"], 6);
        assert_eq!(body["mode"], "cloud");
        assert_eq!(body["hasSigningKey"], true);
    }
}
