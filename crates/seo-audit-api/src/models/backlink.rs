use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::utils::validation::{coerce, FieldErrors, QueryParams};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacklinkSummary {
    pub total_backlinks: u64,
    pub referring_domains: u64,
    pub domain_rank: u32,
    pub dofollow: u64,
    pub nofollow: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backlink {
    pub source_url: String,
    pub target_url: String,
    pub anchor: Option<String>,
    pub dofollow: bool,
    pub domain_rank: Option<u32>,
    pub first_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacklinkProfile {
    pub domain_id: Uuid,
    pub summary: BacklinkSummary,
    pub backlinks: Vec<Backlink>,
    pub fetched_at: DateTime<Utc>,
}

/// Profile as returned by the profile route; details are opt-in.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacklinkProfileView {
    pub domain_id: Uuid,
    pub summary: BacklinkSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backlinks: Option<Vec<Backlink>>,
    pub fetched_at: DateTime<Utc>,
}

impl BacklinkProfileView {
    pub fn new(profile: BacklinkProfile, include_details: bool) -> Self {
        Self {
            domain_id: profile.domain_id,
            summary: profile.summary,
            backlinks: include_details.then_some(profile.backlinks),
            fetched_at: profile.fetched_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacklinkProfileParams {
    pub domain_id: Option<String>,
    pub include_details: Option<String>,
}

#[derive(Debug, Validate)]
pub struct BacklinkProfileQuery {
    pub domain_id: Uuid,
    pub include_details: bool,
}

impl QueryParams for BacklinkProfileParams {
    type Output = BacklinkProfileQuery;

    fn coerce(self, errors: &mut FieldErrors) -> Option<BacklinkProfileQuery> {
        let include_details =
            coerce::boolean(errors, "includeDetails", self.include_details.as_deref(), false);
        let domain_id = coerce::required_uuid(errors, "domainId", self.domain_id.as_deref())?;
        Some(BacklinkProfileQuery {
            domain_id,
            include_details,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshBacklinksRequest {
    pub domain_id: Uuid,
}
