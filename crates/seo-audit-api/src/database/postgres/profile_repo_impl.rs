// PostgreSQL backlink / business profile repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use super::db_error;
use crate::models::{
    Backlink, BacklinkProfile, BacklinkSummary, BusinessProfile, SaveBusinessProfileRequest,
};
use crate::repositories::{ProfileRepository, StoreError};

const BUSINESS_COLUMNS: &str = "domain_id, business_name, primary_category, categories, phone, website, \
     address, description, rating, review_count, updated_at";

pub struct PgProfileRepository {
    pool: PgPool,
}

impl PgProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct BacklinkProfileRow {
    domain_id: Uuid,
    summary: Json<BacklinkSummary>,
    backlinks: Json<Vec<Backlink>>,
    fetched_at: DateTime<Utc>,
}

impl From<BacklinkProfileRow> for BacklinkProfile {
    fn from(row: BacklinkProfileRow) -> Self {
        BacklinkProfile {
            domain_id: row.domain_id,
            summary: row.summary.0,
            backlinks: row.backlinks.0,
            fetched_at: row.fetched_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct BusinessProfileRow {
    domain_id: Uuid,
    business_name: String,
    primary_category: Option<String>,
    categories: Vec<String>,
    phone: Option<String>,
    website: Option<String>,
    address: Option<String>,
    description: Option<String>,
    rating: Option<f64>,
    review_count: i32,
    updated_at: DateTime<Utc>,
}

impl From<BusinessProfileRow> for BusinessProfile {
    fn from(row: BusinessProfileRow) -> Self {
        BusinessProfile {
            domain_id: row.domain_id,
            business_name: row.business_name,
            primary_category: row.primary_category,
            categories: row.categories,
            phone: row.phone,
            website: row.website,
            address: row.address,
            description: row.description,
            rating: row.rating,
            review_count: row.review_count,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl ProfileRepository for PgProfileRepository {
    async fn backlink_profile(&self, domain_id: Uuid) -> Result<Option<BacklinkProfile>, StoreError> {
        let row: Option<BacklinkProfileRow> = sqlx::query_as(
            "SELECT domain_id, summary, backlinks, fetched_at FROM backlink_profiles WHERE domain_id = $1",
        )
        .bind(domain_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("loading backlink profile"))?;

        Ok(row.map(Into::into))
    }

    async fn save_backlink_profile(&self, profile: &BacklinkProfile) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO backlink_profiles (domain_id, summary, backlinks, fetched_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (domain_id) DO UPDATE
            SET summary = EXCLUDED.summary,
                backlinks = EXCLUDED.backlinks,
                fetched_at = EXCLUDED.fetched_at
            "#,
        )
        .bind(profile.domain_id)
        .bind(Json(&profile.summary))
        .bind(Json(&profile.backlinks))
        .bind(profile.fetched_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("saving backlink profile"))?;

        info!(
            "Backlink profile saved for domain {} ({} links)",
            profile.domain_id,
            profile.backlinks.len()
        );
        Ok(())
    }

    async fn business_profile(&self, domain_id: Uuid) -> Result<Option<BusinessProfile>, StoreError> {
        let sql = format!("SELECT {BUSINESS_COLUMNS} FROM business_profiles WHERE domain_id = $1");
        let row: Option<BusinessProfileRow> = sqlx::query_as(&sql)
            .bind(domain_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("loading business profile"))?;

        Ok(row.map(Into::into))
    }

    async fn save_business_profile(
        &self,
        request: &SaveBusinessProfileRequest,
    ) -> Result<BusinessProfile, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO business_profiles
                (domain_id, business_name, primary_category, categories, phone, website,
                 address, description, rating, review_count, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
            ON CONFLICT (domain_id) DO UPDATE
            SET business_name = EXCLUDED.business_name,
                primary_category = EXCLUDED.primary_category,
                categories = EXCLUDED.categories,
                phone = EXCLUDED.phone,
                website = EXCLUDED.website,
                address = EXCLUDED.address,
                description = EXCLUDED.description,
                rating = EXCLUDED.rating,
                review_count = EXCLUDED.review_count,
                updated_at = NOW()
            RETURNING {BUSINESS_COLUMNS}
            "#
        );
        let row: BusinessProfileRow = sqlx::query_as(&sql)
            .bind(request.domain_id)
            .bind(request.business_name.trim())
            .bind(&request.primary_category)
            .bind(&request.categories)
            .bind(&request.phone)
            .bind(&request.website)
            .bind(&request.address)
            .bind(&request.description)
            .bind(request.rating)
            .bind(request.review_count)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("saving business profile"))?;

        info!("Business profile saved for domain {}", request.domain_id);
        Ok(row.into())
    }
}
