//! Google Business Profile data stored per domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::utils::validation::{coerce, not_blank, FieldErrors, QueryParams};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessProfile {
    pub domain_id: Uuid,
    pub business_name: String,
    pub primary_category: Option<String>,
    pub categories: Vec<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub review_count: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaveBusinessProfileRequest {
    pub domain_id: Uuid,

    #[validate(
        length(min = 1, max = 200, message = "must be between 1 and 200 characters"),
        custom(function = "not_blank")
    )]
    pub business_name: String,

    #[validate(
        length(min = 1, max = 100, message = "must be between 1 and 100 characters"),
        custom(function = "not_blank")
    )]
    pub primary_category: Option<String>,

    #[serde(default)]
    #[validate(length(max = 10, message = "at most 10 categories"))]
    pub categories: Vec<String>,

    #[validate(length(min = 5, max = 30, message = "must be between 5 and 30 characters"))]
    pub phone: Option<String>,

    #[validate(url(message = "must be a valid URL"))]
    pub website: Option<String>,

    #[validate(length(max = 300, message = "at most 300 characters"))]
    pub address: Option<String>,

    #[validate(length(max = 750, message = "at most 750 characters"))]
    pub description: Option<String>,

    #[validate(range(min = 0.0, max = 5.0, message = "must be between 0 and 5"))]
    pub rating: Option<f64>,

    #[serde(default)]
    #[validate(range(min = 0, message = "must not be negative"))]
    pub review_count: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessProfileParams {
    pub domain_id: Option<String>,
}

#[derive(Debug, Validate)]
pub struct BusinessProfileQuery {
    pub domain_id: Uuid,
}

impl QueryParams for BusinessProfileParams {
    type Output = BusinessProfileQuery;

    fn coerce(self, errors: &mut FieldErrors) -> Option<BusinessProfileQuery> {
        let domain_id = coerce::required_uuid(errors, "domainId", self.domain_id.as_deref())?;
        Some(BusinessProfileQuery { domain_id })
    }
}
