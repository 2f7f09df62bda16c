// PostgreSQL local campaign repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use super::db_error;
use crate::models::{
    normalize_keywords, CreateCampaignRequest, Frequency, GridKeywordResult, GridScan,
    LocalCampaign, ScanStatus,
};
use crate::repositories::{CampaignRepository, StoreError};

const CAMPAIGN_COLUMNS: &str = "c.id, c.domain_id, c.name, c.center_lat, c.center_lng, c.grid_size, \
     c.radius_km, c.keywords, c.frequency, c.created_at";

const GRID_SCAN_COLUMNS: &str =
    "g.id, g.campaign_id, g.status, g.results, g.error_message, g.created_at, g.completed_at";

pub struct PgCampaignRepository {
    pool: PgPool,
}

impl PgCampaignRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct CampaignRow {
    id: Uuid,
    domain_id: Uuid,
    name: String,
    center_lat: f64,
    center_lng: f64,
    grid_size: i32,
    radius_km: f64,
    keywords: Vec<String>,
    frequency: String,
    created_at: DateTime<Utc>,
}

impl From<CampaignRow> for LocalCampaign {
    fn from(row: CampaignRow) -> Self {
        LocalCampaign {
            id: row.id,
            domain_id: row.domain_id,
            name: row.name,
            center_lat: row.center_lat,
            center_lng: row.center_lng,
            grid_size: row.grid_size,
            radius_km: row.radius_km,
            keywords: row.keywords,
            frequency: row.frequency.parse().unwrap_or(Frequency::Weekly),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct GridScanRow {
    id: Uuid,
    campaign_id: Uuid,
    status: String,
    results: Json<Vec<GridKeywordResult>>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl From<GridScanRow> for GridScan {
    fn from(row: GridScanRow) -> Self {
        GridScan {
            id: row.id,
            campaign_id: row.campaign_id,
            status: row.status.parse().unwrap_or(ScanStatus::Failed),
            results: row.results.0,
            error_message: row.error_message,
            created_at: row.created_at,
            completed_at: row.completed_at,
        }
    }
}

#[async_trait]
impl CampaignRepository for PgCampaignRepository {
    async fn create(&self, request: &CreateCampaignRequest) -> Result<LocalCampaign, StoreError> {
        let sql = format!(
            "INSERT INTO local_campaigns AS c
                (domain_id, name, center_lat, center_lng, grid_size, radius_km, keywords, frequency)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {CAMPAIGN_COLUMNS}"
        );
        let row: CampaignRow = sqlx::query_as(&sql)
            .bind(request.domain_id)
            .bind(request.name.trim())
            .bind(request.center_lat)
            .bind(request.center_lng)
            .bind(request.grid_size as i32)
            .bind(request.radius_km)
            .bind(normalize_keywords(&request.keywords))
            .bind(request.frequency.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("creating campaign"))?;

        info!("Local campaign created: {} ({})", row.name, row.id);
        Ok(row.into())
    }

    async fn list_for_domain(&self, domain_id: Uuid) -> Result<Vec<LocalCampaign>, StoreError> {
        let sql = format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM local_campaigns c
             WHERE c.domain_id = $1
             ORDER BY c.created_at DESC"
        );
        let rows: Vec<CampaignRow> = sqlx::query_as(&sql)
            .bind(domain_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("listing campaigns"))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_owned(&self, id: Uuid, user_id: Uuid) -> Result<Option<LocalCampaign>, StoreError> {
        let sql = format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM local_campaigns c
             JOIN domains d ON d.id = c.domain_id
             WHERE c.id = $1 AND d.user_id = $2"
        );
        let row: Option<CampaignRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("finding owned campaign"))?;

        Ok(row.map(Into::into))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<LocalCampaign>, StoreError> {
        let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM local_campaigns c WHERE c.id = $1");
        let row: Option<CampaignRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("finding campaign by id"))?;

        Ok(row.map(Into::into))
    }

    async fn create_grid_scan(&self, campaign_id: Uuid) -> Result<GridScan, StoreError> {
        let sql = format!(
            "INSERT INTO local_grid_scans AS g (campaign_id) VALUES ($1) RETURNING {GRID_SCAN_COLUMNS}"
        );
        let row: GridScanRow = sqlx::query_as(&sql)
            .bind(campaign_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("creating grid scan"))?;

        Ok(row.into())
    }

    async fn find_grid_scan(&self, id: Uuid) -> Result<Option<GridScan>, StoreError> {
        let sql = format!("SELECT {GRID_SCAN_COLUMNS} FROM local_grid_scans g WHERE g.id = $1");
        let row: Option<GridScanRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("finding grid scan"))?;

        Ok(row.map(Into::into))
    }

    async fn latest_grid_scan(&self, campaign_id: Uuid) -> Result<Option<GridScan>, StoreError> {
        let sql = format!(
            "SELECT {GRID_SCAN_COLUMNS} FROM local_grid_scans g
             WHERE g.campaign_id = $1
             ORDER BY g.created_at DESC
             LIMIT 1"
        );
        let row: Option<GridScanRow> = sqlx::query_as(&sql)
            .bind(campaign_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("finding latest grid scan"))?;

        Ok(row.map(Into::into))
    }

    async fn complete_grid_scan(
        &self,
        id: Uuid,
        results: Vec<GridKeywordResult>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE local_grid_scans SET status = 'COMPLETE', results = $2, completed_at = NOW()
             WHERE id = $1 AND status IN ('PENDING', 'CRAWLING')",
        )
        .bind(id)
        .bind(Json(&results))
        .execute(&self.pool)
        .await
        .map_err(db_error("completing grid scan"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn fail_grid_scan(&self, id: Uuid, message: String) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE local_grid_scans SET status = 'FAILED', error_message = $2, completed_at = NOW()
             WHERE id = $1 AND status IN ('PENDING', 'CRAWLING')",
        )
        .bind(id)
        .bind(&message)
        .execute(&self.pool)
        .await
        .map_err(db_error("failing grid scan"))?;

        if result.rows_affected() == 1 {
            warn!("Grid scan {} failed: {}", id, message);
        }
        Ok(result.rows_affected() == 1)
    }
}
