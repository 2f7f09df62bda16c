//! Multi-step audit runs and their typed step results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::backlink::BacklinkSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Pending => "pending",
            AuditStatus::Running => "running",
            AuditStatus::Complete => "complete",
            AuditStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AuditStatus::Complete | AuditStatus::Failed)
    }
}

impl FromStr for AuditStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AuditStatus::Pending),
            "running" => Ok(AuditStatus::Running),
            "complete" => Ok(AuditStatus::Complete),
            "failed" => Ok(AuditStatus::Failed),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    OnPage,
    Serp,
    Backlinks,
    Business,
}

impl AuditCategory {
    /// Pipeline order.
    pub const ALL: [AuditCategory; 4] = [
        AuditCategory::OnPage,
        AuditCategory::Serp,
        AuditCategory::Backlinks,
        AuditCategory::Business,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditCategory::OnPage => "on_page",
            AuditCategory::Serp => "serp",
            AuditCategory::Backlinks => "backlinks",
            AuditCategory::Business => "business",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnPageSummary {
    pub score: f64,
    pub pages_crawled: u32,
    pub issues: u32,
    pub title: Option<String>,
    pub meta_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordPosition {
    pub keyword: String,
    pub position: Option<u32>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerpSummary {
    pub positions: Vec<KeywordPosition>,
}

impl SerpSummary {
    pub fn top_ten(&self) -> usize {
        self.positions
            .iter()
            .filter(|p| matches!(p.position, Some(pos) if pos <= 10))
            .count()
    }

    pub fn average_position(&self) -> Option<f64> {
        let ranked: Vec<u32> = self.positions.iter().filter_map(|p| p.position).collect();
        if ranked.is_empty() {
            return None;
        }
        Some(ranked.iter().map(|&p| p as f64).sum::<f64>() / ranked.len() as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessSummary {
    pub found: bool,
    pub place_id: Option<String>,
    pub rating: Option<f64>,
    pub review_count: u32,
    pub categories: Vec<String>,
}

/// One completed pipeline step, keyed by category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", content = "result", rename_all = "snake_case")]
pub enum StepResult {
    OnPage(OnPageSummary),
    Serp(SerpSummary),
    Backlinks(BacklinkSummary),
    Business(BusinessSummary),
}

impl StepResult {
    pub fn category(&self) -> AuditCategory {
        match self {
            StepResult::OnPage(_) => AuditCategory::OnPage,
            StepResult::Serp(_) => AuditCategory::Serp,
            StepResult::Backlinks(_) => AuditCategory::Backlinks,
            StepResult::Business(_) => AuditCategory::Business,
        }
    }

    /// Score in 0..=100.
    pub fn score(&self) -> f64 {
        let raw = match self {
            StepResult::OnPage(s) => s.score,
            StepResult::Serp(s) if s.positions.is_empty() => 0.0,
            StepResult::Serp(s) => s.top_ten() as f64 / s.positions.len() as f64 * 100.0,
            StepResult::Backlinks(s) => s.domain_rank as f64,
            StepResult::Business(s) if s.found => s.rating.unwrap_or(0.0) / 5.0 * 100.0,
            StepResult::Business(_) => 0.0,
        };
        raw.clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    pub id: Uuid,
    pub domain_id: Uuid,
    pub status: AuditStatus,
    pub keywords: Vec<String>,
    pub steps: Vec<StepResult>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Audit {
    pub fn step(&self, category: AuditCategory) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.category() == category)
    }

    pub fn overall_score(&self) -> Option<u8> {
        if self.steps.is_empty() {
            return None;
        }
        let total: f64 = self.steps.iter().map(StepResult::score).sum();
        Some((total / self.steps.len() as f64).round() as u8)
    }
}

/// Audit as returned to the dashboard.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditView {
    #[serde(flatten)]
    pub audit: Audit,
    pub overall_score: Option<u8>,
}

impl From<Audit> for AuditView {
    fn from(audit: Audit) -> Self {
        let overall_score = audit.overall_score();
        Self {
            audit,
            overall_score,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartAuditRequest {
    pub domain_id: Uuid,

    #[serde(default)]
    #[validate(length(max = 20, message = "at most 20 keywords"))]
    pub keywords: Vec<String>,
}
