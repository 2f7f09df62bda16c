//! SEO data provider client.
//!
//! Speaks the DataForSEO v3 REST dialect: HTTP basic auth, a JSON array of
//! task objects per request, and responses wrapped as
//! `{status_code, tasks: [{status_code, status_message, id, result: [..]}]}`.
//! Codes `20000` (ok) and `20100` (task created) are success; anything else
//! becomes [`ProviderError::Api`].

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::models::{
    Backlink, BacklinkSummary, BusinessSummary, GridPoint, KeywordPosition, NewScanPage,
    OnPageSummary, SerpSummary,
};

const STATUS_OK: i64 = 20000;
const STATUS_TASK_CREATED: i64 = 20100;
const SERP_DEPTH: u32 = 100;
const BACKLINK_DETAIL_LIMIT: u32 = 100;
const CRAWL_PAGE_BATCH: u32 = 1000;
const MAPS_ZOOM: u32 = 15;

/// Crawl checks that count as an issue when true.
const PROBLEM_CHECKS: [&str; 12] = [
    "no_title",
    "no_description",
    "no_h1_tag",
    "title_too_long",
    "title_too_short",
    "duplicate_title_tag",
    "duplicate_description",
    "no_image_alt",
    "is_broken",
    "is_4xx_code",
    "is_5xx_code",
    "high_loading_time",
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("{message} ({code})")]
    Api { code: i64, message: String },

    #[error("Provider request failed: {0}")]
    Http(String),

    #[error("Unexpected provider response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Http(err.to_string())
    }
}

/// Backlink summary plus the most relevant individual links.
#[derive(Debug, Clone, PartialEq)]
pub struct BacklinkData {
    pub summary: BacklinkSummary,
    pub backlinks: Vec<Backlink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlStatus {
    pub finished: bool,
    pub pages_crawled: u32,
    pub max_pages: u32,
}

impl CrawlStatus {
    /// Percent complete in 0..=100; only a finished crawl reports 100.
    pub fn progress(&self) -> i32 {
        if self.finished {
            return 100;
        }
        if self.max_pages == 0 {
            return 0;
        }
        let pct = (self.pages_crawled as f64 / self.max_pages as f64 * 100.0).floor() as i32;
        pct.clamp(0, 99)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SeoDataProvider: Send + Sync {
    /// Single-page on-page analysis of the site's home page.
    async fn on_page_summary(&self, host: &str) -> Result<OnPageSummary, ProviderError>;

    /// Organic position of `host` for each keyword.
    async fn serp_positions(
        &self,
        host: &str,
        keywords: Vec<String>,
    ) -> Result<SerpSummary, ProviderError>;

    async fn backlink_profile(&self, host: &str) -> Result<BacklinkData, ProviderError>;

    async fn business_listing(
        &self,
        name: &str,
        city: Option<String>,
    ) -> Result<BusinessSummary, ProviderError>;

    /// Queue a site crawl; returns the provider's task id.
    async fn start_crawl(&self, host: &str, max_pages: u32) -> Result<String, ProviderError>;

    async fn crawl_status(&self, task_id: &str) -> Result<CrawlStatus, ProviderError>;

    async fn crawl_pages(&self, task_id: &str, limit: u32) -> Result<Vec<NewScanPage>, ProviderError>;

    /// Maps-pack rank of the business when searching from `point`.
    async fn local_rank(
        &self,
        keyword: &str,
        point: GridPoint,
        host: &str,
        business_name: &str,
    ) -> Result<Option<u32>, ProviderError>;
}

// ----------------------------------------------------------------------------
// Wire types
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status_code: i64,
    #[serde(default)]
    status_message: String,
    #[serde(default = "Vec::new")]
    tasks: Vec<Task<T>>,
}

#[derive(Debug, Deserialize)]
struct Task<T> {
    #[serde(default)]
    id: Option<String>,
    status_code: i64,
    #[serde(default)]
    status_message: String,
    #[serde(default = "Option::default")]
    result: Option<Vec<T>>,
}

#[derive(Debug, Deserialize)]
struct ItemsResult<T> {
    #[serde(default = "Option::default")]
    items: Option<Vec<T>>,
}

#[derive(Debug, Default, Deserialize)]
struct PageMeta {
    title: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageItem {
    url: Option<String>,
    status_code: Option<i32>,
    onpage_score: Option<f64>,
    #[serde(default)]
    meta: Option<PageMeta>,
    #[serde(default)]
    checks: HashMap<String, Value>,
}

impl PageItem {
    fn issue_count(&self) -> u32 {
        PROBLEM_CHECKS
            .iter()
            .filter(|key| matches!(self.checks.get(**key), Some(Value::Bool(true))))
            .count() as u32
    }
}

#[derive(Debug, Deserialize)]
struct SerpItem {
    #[serde(rename = "type")]
    kind: Option<String>,
    rank_group: Option<u32>,
    url: Option<String>,
    domain: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LinkAttributes {
    #[serde(default)]
    nofollow: u64,
}

#[derive(Debug, Deserialize)]
struct BacklinkSummaryResult {
    #[serde(default)]
    backlinks: u64,
    #[serde(default)]
    referring_domains: u64,
    #[serde(default)]
    rank: u32,
    #[serde(default)]
    referring_links_attributes: Option<LinkAttributes>,
}

#[derive(Debug, Deserialize)]
struct BacklinkItem {
    url_from: String,
    url_to: String,
    anchor: Option<String>,
    #[serde(default)]
    dofollow: bool,
    domain_from_rank: Option<u32>,
    first_seen: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Rating {
    value: Option<f64>,
    votes_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ListingItem {
    place_id: Option<String>,
    category: Option<String>,
    #[serde(default)]
    additional_categories: Option<Vec<String>>,
    rating: Option<Rating>,
}

#[derive(Debug, Deserialize)]
struct CrawlCounters {
    #[serde(default)]
    max_crawl_pages: u32,
    #[serde(default)]
    pages_crawled: u32,
}

#[derive(Debug, Deserialize)]
struct CrawlSummaryResult {
    crawl_progress: Option<String>,
    crawl_status: Option<CrawlCounters>,
}

// ----------------------------------------------------------------------------
// Client
// ----------------------------------------------------------------------------

pub struct DataForSeoClient {
    client: Client,
    config: ProviderConfig,
}

impl DataForSeoClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v3/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post_task<T: DeserializeOwned>(
        &self,
        path: &str,
        task: Value,
    ) -> Result<Task<T>, ProviderError> {
        debug!("Provider POST {}", path);
        let response = self
            .client
            .post(self.url(path))
            .basic_auth(&self.config.login, Some(&self.config.password))
            .json(&json!([task]))
            .send()
            .await?;
        Self::first_task(response).await
    }

    async fn get_task<T: DeserializeOwned>(&self, path: &str) -> Result<Task<T>, ProviderError> {
        debug!("Provider GET {}", path);
        let response = self
            .client
            .get(self.url(path))
            .basic_auth(&self.config.login, Some(&self.config.password))
            .send()
            .await?;
        Self::first_task(response).await
    }

    async fn first_task<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<Task<T>, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http(format!("{} - {}", status, body)));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        if envelope.status_code != STATUS_OK {
            return Err(ProviderError::Api {
                code: envelope.status_code,
                message: envelope.status_message,
            });
        }

        let task = envelope
            .tasks
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Decode("response contained no tasks".into()))?;

        if task.status_code != STATUS_OK && task.status_code != STATUS_TASK_CREATED {
            warn!("Provider task failed: {} {}", task.status_code, task.status_message);
            return Err(ProviderError::Api {
                code: task.status_code,
                message: task.status_message,
            });
        }
        Ok(task)
    }

    fn first_result<T>(task: Task<T>) -> Option<T> {
        task.result.and_then(|r| r.into_iter().next())
    }

    fn items<T>(task: Task<ItemsResult<T>>) -> Vec<T> {
        Self::first_result(task)
            .and_then(|r| r.items)
            .unwrap_or_default()
    }

    async fn serp_position(&self, host: &str, keyword: &str) -> Result<KeywordPosition, ProviderError> {
        let task = self
            .post_task::<ItemsResult<SerpItem>>(
                "serp/google/organic/live/regular",
                json!({
                    "keyword": keyword,
                    "location_code": self.config.location_code,
                    "language_code": self.config.language_code,
                    "depth": SERP_DEPTH,
                }),
            )
            .await?;

        let hit = Self::items(task).into_iter().find(|item| {
            item.kind.as_deref() == Some("organic")
                && item.domain.as_deref().is_some_and(|d| host_matches(d, host))
        });

        Ok(KeywordPosition {
            keyword: keyword.to_string(),
            position: hit.as_ref().and_then(|h| h.rank_group),
            url: hit.and_then(|h| h.url),
        })
    }
}

#[async_trait]
impl SeoDataProvider for DataForSeoClient {
    async fn on_page_summary(&self, host: &str) -> Result<OnPageSummary, ProviderError> {
        let task = self
            .post_task::<ItemsResult<PageItem>>(
                "on_page/instant_pages",
                json!({ "url": format!("https://{host}/") }),
            )
            .await?;

        let page = Self::items(task)
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Decode(format!("no on-page result for {host}")))?;

        let issues = page.issue_count();
        let meta = page.meta.unwrap_or_default();
        Ok(OnPageSummary {
            score: page.onpage_score.unwrap_or(0.0),
            pages_crawled: 1,
            issues,
            title: meta.title,
            meta_description: meta.description,
        })
    }

    async fn serp_positions(
        &self,
        host: &str,
        keywords: Vec<String>,
    ) -> Result<SerpSummary, ProviderError> {
        // Live SERP endpoints take one task per call.
        let mut positions = Vec::with_capacity(keywords.len());
        for keyword in &keywords {
            positions.push(self.serp_position(host, keyword).await?);
        }
        Ok(SerpSummary { positions })
    }

    async fn backlink_profile(&self, host: &str) -> Result<BacklinkData, ProviderError> {
        let summary_task = self
            .post_task::<BacklinkSummaryResult>(
                "backlinks/summary/live",
                json!({ "target": host, "include_subdomains": true }),
            )
            .await?;
        let raw = Self::first_result(summary_task)
            .ok_or_else(|| ProviderError::Decode(format!("no backlink summary for {host}")))?;

        let nofollow = raw.referring_links_attributes.map(|a| a.nofollow).unwrap_or(0);
        let summary = BacklinkSummary {
            total_backlinks: raw.backlinks,
            referring_domains: raw.referring_domains,
            domain_rank: raw.rank,
            dofollow: raw.backlinks.saturating_sub(nofollow),
            nofollow,
        };

        let links_task = self
            .post_task::<ItemsResult<BacklinkItem>>(
                "backlinks/backlinks/live",
                json!({
                    "target": host,
                    "mode": "one_per_domain",
                    "limit": BACKLINK_DETAIL_LIMIT,
                }),
            )
            .await?;

        let backlinks = Self::items(links_task)
            .into_iter()
            .map(|item| Backlink {
                source_url: item.url_from,
                target_url: item.url_to,
                anchor: item.anchor,
                dofollow: item.dofollow,
                domain_rank: item.domain_from_rank,
                first_seen: item.first_seen.as_deref().and_then(parse_provider_time),
            })
            .collect();

        Ok(BacklinkData { summary, backlinks })
    }

    async fn business_listing(
        &self,
        name: &str,
        city: Option<String>,
    ) -> Result<BusinessSummary, ProviderError> {
        let keyword = match city {
            Some(city) => format!("{name} {city}"),
            None => name.to_string(),
        };

        let task = self
            .post_task::<ItemsResult<ListingItem>>(
                "business_data/google/my_business_info/live",
                json!({
                    "keyword": keyword,
                    "location_code": self.config.location_code,
                    "language_code": self.config.language_code,
                }),
            )
            .await?;

        let summary = match Self::items(task).into_iter().next() {
            Some(listing) => {
                let mut categories: Vec<String> = listing.category.into_iter().collect();
                categories.extend(listing.additional_categories.unwrap_or_default());
                BusinessSummary {
                    found: true,
                    place_id: listing.place_id,
                    rating: listing.rating.as_ref().and_then(|r| r.value),
                    review_count: listing.rating.and_then(|r| r.votes_count).unwrap_or(0),
                    categories,
                }
            }
            None => BusinessSummary {
                found: false,
                place_id: None,
                rating: None,
                review_count: 0,
                categories: vec![],
            },
        };
        Ok(summary)
    }

    async fn start_crawl(&self, host: &str, max_pages: u32) -> Result<String, ProviderError> {
        let task = self
            .post_task::<Value>(
                "on_page/task_post",
                json!({ "target": host, "max_crawl_pages": max_pages }),
            )
            .await?;

        task.id
            .ok_or_else(|| ProviderError::Decode("crawl task has no id".into()))
    }

    async fn crawl_status(&self, task_id: &str) -> Result<CrawlStatus, ProviderError> {
        let task = self
            .get_task::<CrawlSummaryResult>(&format!("on_page/summary/{task_id}"))
            .await?;

        let summary = Self::first_result(task)
            .ok_or_else(|| ProviderError::Decode(format!("no crawl summary for {task_id}")))?;
        let counters = summary.crawl_status.unwrap_or(CrawlCounters {
            max_crawl_pages: 0,
            pages_crawled: 0,
        });

        Ok(CrawlStatus {
            finished: summary.crawl_progress.as_deref() == Some("finished"),
            pages_crawled: counters.pages_crawled,
            max_pages: counters.max_crawl_pages,
        })
    }

    async fn crawl_pages(&self, task_id: &str, limit: u32) -> Result<Vec<NewScanPage>, ProviderError> {
        let mut pages = Vec::new();
        let mut offset = 0u32;

        while offset < limit {
            let batch = CRAWL_PAGE_BATCH.min(limit - offset);
            let task = self
                .post_task::<ItemsResult<PageItem>>(
                    "on_page/pages",
                    json!({ "id": task_id, "limit": batch, "offset": offset }),
                )
                .await?;

            let items = Self::items(task);
            let received = items.len() as u32;
            pages.extend(items.into_iter().filter_map(|item| {
                let issue_count = item.issue_count() as i32;
                Some(NewScanPage {
                    url: item.url?,
                    status_code: item.status_code.unwrap_or(0),
                    onpage_score: item.onpage_score.unwrap_or(0.0),
                    issue_count,
                    title: item.meta.and_then(|m| m.title),
                })
            }));

            if received < batch {
                break;
            }
            offset += received;
        }

        Ok(pages)
    }

    async fn local_rank(
        &self,
        keyword: &str,
        point: GridPoint,
        host: &str,
        business_name: &str,
    ) -> Result<Option<u32>, ProviderError> {
        let task = self
            .post_task::<ItemsResult<SerpItem>>(
                "serp/google/maps/live/advanced",
                json!({
                    "keyword": keyword,
                    "location_coordinate": format!("{:.7},{:.7},{}z", point.lat, point.lng, MAPS_ZOOM),
                    "language_code": self.config.language_code,
                }),
            )
            .await?;

        let name = business_name.to_lowercase();
        let rank = Self::items(task)
            .into_iter()
            .find(|item| {
                item.domain.as_deref().is_some_and(|d| host_matches(d, host))
                    || item.title.as_deref().is_some_and(|t| t.to_lowercase() == name)
            })
            .and_then(|item| item.rank_group);
        Ok(rank)
    }
}

/// `www.acme.com` and `shop.acme.com` both belong to `acme.com`.
fn host_matches(domain: &str, host: &str) -> bool {
    let domain = domain.trim().to_ascii_lowercase();
    let domain = domain.strip_prefix("www.").unwrap_or(&domain);
    domain == host || domain.ends_with(&format!(".{host}"))
}

/// Provider timestamps look like `2023-01-15 10:32:11 +00:00`.
fn parse_provider_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %:z")
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|t| t.and_utc())
        })
}
