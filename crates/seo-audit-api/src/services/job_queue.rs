//! Outbound side of the background job runner (Inngest).
//!
//! Handlers only ever enqueue named events; the runner later calls back into
//! `/api/inngest` to execute the matching function.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::JobsConfig;

pub const SDK_VERSION: &str = "rust:v0.1.0";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum JobQueueError {
    #[error("Job runner unreachable: {0}")]
    Http(String),

    #[error("Job runner rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

impl From<reqwest::Error> for JobQueueError {
    fn from(err: reqwest::Error) -> Self {
        JobQueueError::Http(err.to_string())
    }
}

/// Events this service emits, serialized as `{"name": .., "data": {..}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "data")]
pub enum JobEvent {
    #[serde(rename = "audit/requested", rename_all = "camelCase")]
    AuditRequested { audit_id: Uuid },

    #[serde(rename = "site-audit/scan.requested", rename_all = "camelCase")]
    ScanRequested { scan_id: Uuid },

    #[serde(rename = "local-grid/scan.requested", rename_all = "camelCase")]
    GridScanRequested { grid_scan_id: Uuid },

    #[serde(rename = "backlinks/refresh.requested", rename_all = "camelCase")]
    BacklinksRefreshRequested { domain_id: Uuid },

    #[serde(rename = "keywords/check.requested", rename_all = "camelCase")]
    KeywordCheckRequested { schedule_id: Uuid },
}

impl JobEvent {
    pub const AUDIT_REQUESTED: &'static str = "audit/requested";
    pub const SCAN_REQUESTED: &'static str = "site-audit/scan.requested";
    pub const GRID_SCAN_REQUESTED: &'static str = "local-grid/scan.requested";
    pub const BACKLINKS_REFRESH_REQUESTED: &'static str = "backlinks/refresh.requested";
    pub const KEYWORD_CHECK_REQUESTED: &'static str = "keywords/check.requested";

    pub fn name(&self) -> &'static str {
        match self {
            JobEvent::AuditRequested { .. } => Self::AUDIT_REQUESTED,
            JobEvent::ScanRequested { .. } => Self::SCAN_REQUESTED,
            JobEvent::GridScanRequested { .. } => Self::GRID_SCAN_REQUESTED,
            JobEvent::BacklinksRefreshRequested { .. } => Self::BACKLINKS_REFRESH_REQUESTED,
            JobEvent::KeywordCheckRequested { .. } => Self::KEYWORD_CHECK_REQUESTED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TriggerManifest {
    Event { event: String },
    Cron { cron: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRuntime {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepManifest {
    pub id: String,
    pub name: String,
    pub runtime: StepRuntime,
}

/// One function entry of the registration payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionManifest {
    pub id: String,
    pub name: String,
    pub triggers: Vec<TriggerManifest>,
    pub steps: BTreeMap<String, StepManifest>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, event: JobEvent) -> Result<(), JobQueueError>;

    /// Publish the function manifest so the runner knows what to call.
    async fn register(&self, functions: Vec<FunctionManifest>) -> Result<(), JobQueueError>;
}

pub struct InngestClient {
    client: Client,
    config: JobsConfig,
}

impl InngestClient {
    pub fn new(config: JobsConfig) -> Result<Self, JobQueueError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { client, config })
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// The runner authenticates SDK calls with `signkey-<env>-<sha256(key)>`.
    fn hashed_signing_key(&self) -> Option<String> {
        let key = self.config.signing_key.as_deref()?.trim();
        let (prefix, raw) = match key.strip_prefix("signkey-") {
            Some(rest) => match rest.split_once('-') {
                Some((env, raw)) => (format!("signkey-{env}-"), raw),
                None => (String::new(), key),
            },
            None => (String::new(), key),
        };
        let bytes = hex::decode(raw).unwrap_or_else(|_| raw.as_bytes().to_vec());
        Some(format!("{}{}", prefix, hex::encode(Sha256::digest(&bytes))))
    }

    async fn check(response: reqwest::Response) -> Result<(), JobQueueError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(JobQueueError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl JobQueue for InngestClient {
    async fn enqueue(&self, event: JobEvent) -> Result<(), JobQueueError> {
        let url = format!("{}/e/{}", self.base_url(), self.config.event_key);
        debug!("Enqueueing {}", event.name());

        let response = self.client.post(&url).json(&event).send().await?;
        if let Err(e) = Self::check(response).await {
            warn!("Failed to enqueue {}: {}", event.name(), e);
            return Err(e);
        }
        Ok(())
    }

    async fn register(&self, functions: Vec<FunctionManifest>) -> Result<(), JobQueueError> {
        let url = format!("{}/fn/register", self.base_url());
        let count = functions.len();
        let body = json!({
            "url": self.config.serve_url,
            "v": "0.1",
            "deployType": "ping",
            "sdk": SDK_VERSION,
            "framework": "axum",
            "appName": self.config.app_id,
            "functions": functions,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = self.hashed_signing_key() {
            request = request.bearer_auth(key);
        }

        Self::check(request.send().await?).await?;
        info!("Registered {} job functions with {}", count, self.base_url());
        Ok(())
    }
}
