//! Crawl-based technical scans and their per-page results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use crate::utils::validation::{coerce, FieldErrors, QueryParams};

pub const DEFAULT_PAGE_LIMIT: u32 = 50;
pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    Pending,
    Crawling,
    Complete,
    Failed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "PENDING",
            ScanStatus::Crawling => "CRAWLING",
            ScanStatus::Complete => "COMPLETE",
            ScanStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Complete | ScanStatus::Failed)
    }
}

impl FromStr for ScanStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ScanStatus::Pending),
            "CRAWLING" => Ok(ScanStatus::Crawling),
            "COMPLETE" => Ok(ScanStatus::Complete),
            "FAILED" => Ok(ScanStatus::Failed),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scan {
    pub id: Uuid,
    pub domain_id: Uuid,
    pub status: ScanStatus,
    pub progress: i32,
    pub external_task_id: Option<String>,
    pub max_pages: i32,
    pub pages_crawled: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Minimal projection served to the polling client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStatusView {
    pub id: Uuid,
    pub status: ScanStatus,
    pub progress: i32,
    pub external_task_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<Scan> for ScanStatusView {
    fn from(scan: Scan) -> Self {
        let error_message = match scan.status {
            ScanStatus::Failed => scan.error_message,
            _ => None,
        };
        Self {
            id: scan.id,
            status: scan.status,
            progress: scan.progress,
            external_task_id: scan.external_task_id,
            created_at: scan.created_at,
            started_at: scan.started_at,
            completed_at: scan.completed_at,
            error_message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanPage {
    pub id: i64,
    pub url: String,
    pub status_code: i32,
    pub onpage_score: f64,
    pub issue_count: i32,
    pub title: Option<String>,
}

/// Crawled page about to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewScanPage {
    pub url: String,
    pub status_code: i32,
    pub onpage_score: f64,
    pub issue_count: i32,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFilter {
    All,
    Error,
    Warning,
}

impl PageFilter {
    pub const CHOICES: [&'static str; 3] = ["all", "error", "warning"];

    /// SQL predicate over the `scan_pages` columns.
    pub fn predicate(&self) -> &'static str {
        match self {
            PageFilter::All => "TRUE",
            PageFilter::Error => "status_code >= 400",
            PageFilter::Warning => "status_code < 400 AND issue_count > 0",
        }
    }
}

impl FromStr for PageFilter {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(PageFilter::All),
            "error" => Ok(PageFilter::Error),
            "warning" => Ok(PageFilter::Warning),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSortKey {
    Url,
    StatusCode,
    OnpageScore,
    IssueCount,
}

impl PageSortKey {
    pub const CHOICES: [&'static str; 4] = ["url", "statusCode", "onpageScore", "issueCount"];

    /// Column name; only ever one of these fixed identifiers.
    pub fn column(&self) -> &'static str {
        match self {
            PageSortKey::Url => "url",
            PageSortKey::StatusCode => "status_code",
            PageSortKey::OnpageScore => "onpage_score",
            PageSortKey::IssueCount => "issue_count",
        }
    }
}

impl FromStr for PageSortKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "url" => Ok(PageSortKey::Url),
            "statusCode" => Ok(PageSortKey::StatusCode),
            "onpageScore" => Ok(PageSortKey::OnpageScore),
            "issueCount" => Ok(PageSortKey::IssueCount),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub const CHOICES: [&'static str; 2] = ["asc", "desc"];

    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(()),
        }
    }
}

/// Raw `?limit=&offset=&filter=&sortBy=&sortOrder=` text.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQueryParams {
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub filter: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Validate)]
pub struct PageQuery {
    #[validate(range(min = 1, max = 100, message = "must be between 1 and 100"))]
    pub limit: u32,
    pub offset: u32,
    pub filter: PageFilter,
    pub sort_by: PageSortKey,
    pub sort_order: SortOrder,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
            filter: PageFilter::All,
            sort_by: PageSortKey::Url,
            sort_order: SortOrder::Asc,
        }
    }
}

impl QueryParams for PageQueryParams {
    type Output = PageQuery;

    fn coerce(self, errors: &mut FieldErrors) -> Option<PageQuery> {
        Some(PageQuery {
            limit: coerce::number(errors, "limit", self.limit.as_deref(), DEFAULT_PAGE_LIMIT),
            offset: coerce::number(errors, "offset", self.offset.as_deref(), 0),
            filter: coerce::choice(
                errors,
                "filter",
                self.filter.as_deref(),
                PageFilter::All,
                &PageFilter::CHOICES,
            ),
            sort_by: coerce::choice(
                errors,
                "sortBy",
                self.sort_by.as_deref(),
                PageSortKey::Url,
                &PageSortKey::CHOICES,
            ),
            sort_order: coerce::choice(
                errors,
                "sortOrder",
                self.sort_order.as_deref(),
                SortOrder::Asc,
                &SortOrder::CHOICES,
            ),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub limit: u32,
    pub offset: u32,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageListing {
    pub pages: Vec<ScanPage>,
    pub pagination: Pagination,
}

impl PageListing {
    pub fn new(pages: Vec<ScanPage>, total: i64, query: &PageQuery) -> Self {
        let has_more = (query.offset as i64 + pages.len() as i64) < total;
        Self {
            pages,
            pagination: Pagination {
                total,
                limit: query.limit,
                offset: query.offset,
                has_more,
            },
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartScanRequest {
    pub domain_id: Uuid,

    #[validate(range(min = 1, max = 10000, message = "must be between 1 and 10000"))]
    pub max_pages: Option<u32>,
}

impl StartScanRequest {
    pub const DEFAULT_MAX_PAGES: u32 = 100;

    pub fn max_pages(&self) -> u32 {
        self.max_pages.unwrap_or(Self::DEFAULT_MAX_PAGES)
    }
}
