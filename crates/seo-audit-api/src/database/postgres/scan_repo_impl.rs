// PostgreSQL site-audit scan repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use super::db_error;
use crate::models::{NewScanPage, PageQuery, Scan, ScanPage, ScanStatus};
use crate::repositories::{ScanRepository, StoreError};

const SCAN_COLUMNS: &str = "s.id, s.domain_id, s.status, s.progress, s.external_task_id, s.max_pages, \
     s.pages_crawled, s.error_message, s.created_at, s.started_at, s.completed_at, s.updated_at";

pub struct PgScanRepository {
    pool: PgPool,
}

impl PgScanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ScanRow {
    id: Uuid,
    domain_id: Uuid,
    status: String,
    progress: i32,
    external_task_id: Option<String>,
    max_pages: i32,
    pages_crawled: i32,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl From<ScanRow> for Scan {
    fn from(row: ScanRow) -> Self {
        let status = row.status.parse().unwrap_or_else(|_| {
            warn!("Scan {} has unknown status '{}'", row.id, row.status);
            ScanStatus::Failed
        });
        Scan {
            id: row.id,
            domain_id: row.domain_id,
            status,
            progress: row.progress,
            external_task_id: row.external_task_id,
            max_pages: row.max_pages,
            pages_crawled: row.pages_crawled,
            error_message: row.error_message,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            updated_at: row.updated_at,
        }
    }
}

/// One listing row: the filtered total plus, unless the window is empty,
/// one page.
#[derive(Debug, FromRow)]
struct PageWindowRow {
    total: i64,
    id: Option<i64>,
    url: Option<String>,
    status_code: Option<i32>,
    onpage_score: Option<f64>,
    issue_count: Option<i32>,
    title: Option<String>,
}

impl PageWindowRow {
    fn into_page(self) -> Option<ScanPage> {
        Some(ScanPage {
            id: self.id?,
            url: self.url?,
            status_code: self.status_code?,
            onpage_score: self.onpage_score?,
            issue_count: self.issue_count?,
            title: self.title,
        })
    }
}

#[async_trait]
impl ScanRepository for PgScanRepository {
    async fn create_pending(&self, domain_id: Uuid, max_pages: u32) -> Result<Scan, StoreError> {
        let sql = format!(
            "INSERT INTO site_audit_scans AS s (domain_id, max_pages) VALUES ($1, $2) RETURNING {SCAN_COLUMNS}"
        );
        let row: ScanRow = sqlx::query_as(&sql)
            .bind(domain_id)
            .bind(max_pages as i32)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("creating scan"))?;

        info!("Site audit scan created: {} for domain {}", row.id, domain_id);
        Ok(row.into())
    }

    async fn find_owned(&self, id: Uuid, user_id: Uuid) -> Result<Option<Scan>, StoreError> {
        let sql = format!(
            "SELECT {SCAN_COLUMNS} FROM site_audit_scans s
             JOIN domains d ON d.id = s.domain_id
             WHERE s.id = $1 AND d.user_id = $2"
        );
        let row: Option<ScanRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("finding owned scan"))?;

        Ok(row.map(Into::into))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Scan>, StoreError> {
        let sql = format!("SELECT {SCAN_COLUMNS} FROM site_audit_scans s WHERE s.id = $1");
        let row: Option<ScanRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("finding scan by id"))?;

        Ok(row.map(Into::into))
    }

    async fn list_pages(
        &self,
        scan_id: Uuid,
        query: &PageQuery,
    ) -> Result<(Vec<ScanPage>, i64), StoreError> {
        // Predicate, column and direction come from closed enums, never
        // from request text.
        let sql = format!(
            r#"
            WITH filtered AS (
                SELECT id, url, status_code, onpage_score, issue_count, title
                FROM scan_pages
                WHERE scan_id = $1 AND ({predicate})
            ),
            counted AS (SELECT COUNT(*) AS total FROM filtered)
            SELECT c.total, p.id, p.url, p.status_code, p.onpage_score, p.issue_count, p.title
            FROM counted c
            LEFT JOIN LATERAL (
                SELECT * FROM filtered
                ORDER BY {column} {direction}, id ASC
                LIMIT $2 OFFSET $3
            ) p ON TRUE
            "#,
            predicate = query.filter.predicate(),
            column = query.sort_by.column(),
            direction = query.sort_order.keyword(),
        );

        let rows: Vec<PageWindowRow> = sqlx::query_as(&sql)
            .bind(scan_id)
            .bind(query.limit as i64)
            .bind(query.offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("listing scan pages"))?;

        let total = rows.first().map(|r| r.total).unwrap_or(0);
        let pages = rows.into_iter().filter_map(PageWindowRow::into_page).collect();
        Ok((pages, total))
    }

    async fn mark_crawling(&self, id: Uuid, external_task_id: String) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE site_audit_scans
             SET status = 'CRAWLING', external_task_id = $2,
                 started_at = COALESCE(started_at, NOW()), updated_at = NOW()
             WHERE id = $1 AND status = 'PENDING'",
        )
        .bind(id)
        .bind(&external_task_id)
        .execute(&self.pool)
        .await
        .map_err(db_error("marking scan crawling"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_progress(&self, id: Uuid, progress: i32) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE site_audit_scans
             SET progress = GREATEST(progress, LEAST($2, 100)), updated_at = NOW()
             WHERE id = $1 AND status IN ('PENDING', 'CRAWLING')",
        )
        .bind(id)
        .bind(progress)
        .execute(&self.pool)
        .await
        .map_err(db_error("updating scan progress"))?;

        Ok(())
    }

    async fn insert_pages(&self, scan_id: Uuid, pages: Vec<NewScanPage>) -> Result<u64, StoreError> {
        if pages.is_empty() {
            return Ok(0);
        }

        let mut urls = Vec::with_capacity(pages.len());
        let mut status_codes = Vec::with_capacity(pages.len());
        let mut scores = Vec::with_capacity(pages.len());
        let mut issue_counts = Vec::with_capacity(pages.len());
        let mut titles = Vec::with_capacity(pages.len());
        for page in pages {
            urls.push(page.url);
            status_codes.push(page.status_code);
            scores.push(page.onpage_score);
            issue_counts.push(page.issue_count);
            titles.push(page.title);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO scan_pages (scan_id, url, status_code, onpage_score, issue_count, title)
            SELECT $1, * FROM UNNEST($2::text[], $3::int4[], $4::float8[], $5::int4[], $6::text[])
            ON CONFLICT (scan_id, url) DO NOTHING
            "#,
        )
        .bind(scan_id)
        .bind(&urls)
        .bind(&status_codes)
        .bind(&scores)
        .bind(&issue_counts)
        .bind(&titles)
        .execute(&self.pool)
        .await
        .map_err(db_error("inserting scan pages"))?;

        Ok(result.rows_affected())
    }

    async fn complete(&self, id: Uuid, pages_crawled: i32) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE site_audit_scans
             SET status = 'COMPLETE', progress = 100, pages_crawled = $2,
                 completed_at = NOW(), updated_at = NOW()
             WHERE id = $1 AND status IN ('PENDING', 'CRAWLING')",
        )
        .bind(id)
        .bind(pages_crawled)
        .execute(&self.pool)
        .await
        .map_err(db_error("completing scan"))?;

        if result.rows_affected() == 1 {
            info!("Site audit scan {} complete with {} pages", id, pages_crawled);
        }
        Ok(result.rows_affected() == 1)
    }

    async fn fail(&self, id: Uuid, message: String) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE site_audit_scans
             SET status = 'FAILED', error_message = $2, completed_at = NOW(), updated_at = NOW()
             WHERE id = $1 AND status IN ('PENDING', 'CRAWLING')",
        )
        .bind(id)
        .bind(&message)
        .execute(&self.pool)
        .await
        .map_err(db_error("failing scan"))?;

        if result.rows_affected() == 1 {
            warn!("Site audit scan {} failed: {}", id, message);
        }
        Ok(result.rows_affected() == 1)
    }
}
