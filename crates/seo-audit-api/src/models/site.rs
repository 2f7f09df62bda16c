//! Registered domains (tenant-owned websites/businesses).

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::utils::validation::{coerce, not_blank, FieldErrors, QueryParams};

static HOST_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}$")
        .expect("host pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainStatus {
    Active,
    Inactive,
}

impl DomainStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainStatus::Active => "active",
            DomainStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for DomainStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(DomainStatus::Active),
            "inactive" => Ok(DomainStatus::Inactive),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub host: String,
    pub business_name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub status: DomainStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Domain {
    pub fn is_active(&self) -> bool {
        self.status == DomainStatus::Active
    }

    /// Name used when searching for the business listing.
    pub fn listing_name(&self) -> &str {
        self.business_name.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDomainRequest {
    #[validate(
        length(min = 1, max = 100, message = "must be between 1 and 100 characters"),
        custom(function = "not_blank")
    )]
    pub name: String,

    #[validate(custom(function = "validate_host"))]
    pub host: String,

    #[validate(
        length(min = 1, max = 200, message = "must be between 1 and 200 characters"),
        custom(function = "not_blank")
    )]
    pub business_name: Option<String>,

    #[validate(
        length(min = 1, max = 100, message = "must be between 1 and 100 characters"),
        custom(function = "not_blank")
    )]
    pub city: Option<String>,

    #[validate(
        length(min = 1, max = 100, message = "must be between 1 and 100 characters"),
        custom(function = "not_blank")
    )]
    pub state: Option<String>,
}

/// Insert payload, produced from a validated request.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDomain {
    pub user_id: Uuid,
    pub name: String,
    pub host: String,
    pub business_name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

impl NewDomain {
    pub fn from_request(user_id: Uuid, request: CreateDomainRequest) -> Self {
        Self {
            user_id,
            name: request.name.trim().to_string(),
            host: normalize_host(&request.host),
            business_name: request.business_name.map(|v| v.trim().to_string()),
            city: request.city.map(|v| v.trim().to_string()),
            state: request.state.map(|v| v.trim().to_string()),
        }
    }
}

/// Badge counts shown next to each tool in the sidebar.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCounts {
    pub audits: i64,
    pub site_audit_scans: i64,
    pub local_campaigns: i64,
    pub keyword_schedules: i64,
    pub has_backlink_profile: bool,
    pub has_business_profile: bool,
}

/// `?includeInactive=` on the domain list.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainListParams {
    pub include_inactive: Option<String>,
}

#[derive(Debug, Validate)]
pub struct DomainListQuery {
    pub include_inactive: bool,
}

impl QueryParams for DomainListParams {
    type Output = DomainListQuery;

    fn coerce(self, errors: &mut FieldErrors) -> Option<DomainListQuery> {
        Some(DomainListQuery {
            include_inactive: coerce::boolean(
                errors,
                "includeInactive",
                self.include_inactive.as_deref(),
                false,
            ),
        })
    }
}

/// `?domainId=` on the per-domain list routes.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainScopeParams {
    pub domain_id: Option<String>,
}

#[derive(Debug, Validate)]
pub struct DomainScope {
    pub domain_id: Uuid,
}

impl QueryParams for DomainScopeParams {
    type Output = DomainScope;

    fn coerce(self, errors: &mut FieldErrors) -> Option<DomainScope> {
        let domain_id = coerce::required_uuid(errors, "domainId", self.domain_id.as_deref())?;
        Some(DomainScope { domain_id })
    }
}

/// Strip scheme, path, port and a leading `www.`, then lowercase.
pub fn normalize_host(raw: &str) -> String {
    let trimmed = raw.trim().to_ascii_lowercase();
    let without_scheme = trimmed
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(&trimmed);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host = host.split(':').next().unwrap_or_default();
    host.strip_prefix("www.").unwrap_or(host).to_string()
}

fn validate_host(raw: &str) -> Result<(), ValidationError> {
    if HOST_PATTERN.is_match(&normalize_host(raw)) {
        Ok(())
    } else {
        let mut err = ValidationError::new("host");
        err.message = Some("must be a valid host name".into());
        Err(err)
    }
}
