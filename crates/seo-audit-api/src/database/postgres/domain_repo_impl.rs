// PostgreSQL domain repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use super::{db_error, is_unique_violation};
use crate::models::{Domain, DomainStatus, NewDomain, ToolCounts};
use crate::repositories::{DomainRepository, StoreError};

const DOMAIN_COLUMNS: &str =
    "id, user_id, name, host, business_name, city, state, status, created_at, updated_at";

pub struct PgDomainRepository {
    pool: PgPool,
}

impl PgDomainRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct DomainRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    host: String,
    business_name: Option<String>,
    city: Option<String>,
    state: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DomainRow> for Domain {
    fn from(row: DomainRow) -> Self {
        Domain {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            host: row.host,
            business_name: row.business_name,
            city: row.city,
            state: row.state,
            status: row.status.parse().unwrap_or(DomainStatus::Inactive),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ToolCountsRow {
    audits: i64,
    site_audit_scans: i64,
    local_campaigns: i64,
    keyword_schedules: i64,
    has_backlink_profile: bool,
    has_business_profile: bool,
}

#[async_trait]
impl DomainRepository for PgDomainRepository {
    async fn list_for_user(
        &self,
        user_id: Uuid,
        include_inactive: bool,
    ) -> Result<Vec<Domain>, StoreError> {
        let sql = format!(
            "SELECT {DOMAIN_COLUMNS} FROM domains
             WHERE user_id = $1 AND ($2 OR status = 'active')
             ORDER BY created_at DESC"
        );
        let rows: Vec<DomainRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(include_inactive)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("listing domains"))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_owned(&self, id: Uuid, user_id: Uuid) -> Result<Option<Domain>, StoreError> {
        let sql = format!("SELECT {DOMAIN_COLUMNS} FROM domains WHERE id = $1 AND user_id = $2");
        let row: Option<DomainRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("finding owned domain"))?;

        Ok(row.map(Into::into))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Domain>, StoreError> {
        let sql = format!("SELECT {DOMAIN_COLUMNS} FROM domains WHERE id = $1");
        let row: Option<DomainRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("finding domain by id"))?;

        Ok(row.map(Into::into))
    }

    async fn name_exists(&self, user_id: Uuid, name: &str) -> Result<bool, StoreError> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM domains WHERE user_id = $1 AND LOWER(name) = LOWER($2))",
        )
        .bind(user_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("checking domain name"))?;

        Ok(exists.0)
    }

    async fn create(&self, domain: &NewDomain) -> Result<Domain, StoreError> {
        let sql = format!(
            "INSERT INTO domains (user_id, name, host, business_name, city, state)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {DOMAIN_COLUMNS}"
        );
        let row: DomainRow = sqlx::query_as(&sql)
            .bind(domain.user_id)
            .bind(&domain.name)
            .bind(&domain.host)
            .bind(&domain.business_name)
            .bind(&domain.city)
            .bind(&domain.state)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict(format!("A domain named '{}' already exists", domain.name))
                } else {
                    db_error("creating domain")(e)
                }
            })?;

        info!("Domain created: {} ({})", row.name, row.id);
        Ok(row.into())
    }

    async fn deactivate(&self, id: Uuid) -> Result<Domain, StoreError> {
        let sql = format!(
            "UPDATE domains SET status = 'inactive', updated_at = NOW()
             WHERE id = $1
             RETURNING {DOMAIN_COLUMNS}"
        );
        let row: DomainRow = sqlx::query_as(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("deactivating domain"))?;

        info!("Domain deactivated: {}", id);
        Ok(row.into())
    }

    async fn tool_counts(&self, id: Uuid) -> Result<ToolCounts, StoreError> {
        let row: ToolCountsRow = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM audits WHERE domain_id = $1) AS audits,
                (SELECT COUNT(*) FROM site_audit_scans WHERE domain_id = $1) AS site_audit_scans,
                (SELECT COUNT(*) FROM local_campaigns WHERE domain_id = $1) AS local_campaigns,
                (SELECT COUNT(*) FROM keyword_schedules WHERE domain_id = $1 AND is_active) AS keyword_schedules,
                EXISTS(SELECT 1 FROM backlink_profiles WHERE domain_id = $1) AS has_backlink_profile,
                EXISTS(SELECT 1 FROM business_profiles WHERE domain_id = $1) AS has_business_profile
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("counting domain tools"))?;

        Ok(ToolCounts {
            audits: row.audits,
            site_audit_scans: row.site_audit_scans,
            local_campaigns: row.local_campaigns,
            keyword_schedules: row.keyword_schedules,
            has_backlink_profile: row.has_backlink_profile,
            has_business_profile: row.has_business_profile,
        })
    }
}
