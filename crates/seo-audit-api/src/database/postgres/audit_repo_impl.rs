// PostgreSQL audit repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use super::db_error;
use crate::models::{Audit, AuditStatus, StepResult};
use crate::repositories::{AuditRepository, StoreError};

const AUDIT_COLUMNS: &str =
    "a.id, a.domain_id, a.status, a.keywords, a.steps, a.error_message, a.created_at, a.started_at, a.completed_at";

pub struct PgAuditRepository {
    pool: PgPool,
}

impl PgAuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditRow {
    id: Uuid,
    domain_id: Uuid,
    status: String,
    keywords: Vec<String>,
    steps: Json<Vec<StepResult>>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl From<AuditRow> for Audit {
    fn from(row: AuditRow) -> Self {
        let status = row.status.parse().unwrap_or_else(|_| {
            warn!("Audit {} has unknown status '{}'", row.id, row.status);
            AuditStatus::Failed
        });
        Audit {
            id: row.id,
            domain_id: row.domain_id,
            status,
            keywords: row.keywords,
            steps: row.steps.0,
            error_message: row.error_message,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        }
    }
}

#[async_trait]
impl AuditRepository for PgAuditRepository {
    async fn create_pending(&self, domain_id: Uuid, keywords: Vec<String>) -> Result<Audit, StoreError> {
        let sql = format!(
            "INSERT INTO audits AS a (domain_id, keywords) VALUES ($1, $2) RETURNING {AUDIT_COLUMNS}"
        );
        let row: AuditRow = sqlx::query_as(&sql)
            .bind(domain_id)
            .bind(&keywords)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("creating audit"))?;

        info!("Audit created: {} for domain {}", row.id, domain_id);
        Ok(row.into())
    }

    async fn find_owned(&self, id: Uuid, user_id: Uuid) -> Result<Option<Audit>, StoreError> {
        let sql = format!(
            "SELECT {AUDIT_COLUMNS} FROM audits a
             JOIN domains d ON d.id = a.domain_id
             WHERE a.id = $1 AND d.user_id = $2"
        );
        let row: Option<AuditRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("finding owned audit"))?;

        Ok(row.map(Into::into))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Audit>, StoreError> {
        let sql = format!("SELECT {AUDIT_COLUMNS} FROM audits a WHERE a.id = $1");
        let row: Option<AuditRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("finding audit by id"))?;

        Ok(row.map(Into::into))
    }

    async fn list_for_domain(&self, domain_id: Uuid, limit: i64) -> Result<Vec<Audit>, StoreError> {
        let sql = format!(
            "SELECT {AUDIT_COLUMNS} FROM audits a
             WHERE a.domain_id = $1
             ORDER BY a.created_at DESC
             LIMIT $2"
        );
        let rows: Vec<AuditRow> = sqlx::query_as(&sql)
            .bind(domain_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("listing audits"))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn mark_running(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE audits SET status = 'running', started_at = COALESCE(started_at, NOW())
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_error("marking audit running"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_step(&self, id: Uuid, step: StepResult) -> Result<bool, StoreError> {
        let category = step.category().as_str();

        // Replaces an earlier result for the same category so retried steps
        // never duplicate.
        let result = sqlx::query(
            r#"
            UPDATE audits SET steps = (
                SELECT COALESCE(jsonb_agg(s), '[]'::jsonb)
                FROM jsonb_array_elements(steps) AS s
                WHERE s->>'category' <> $3
            ) || jsonb_build_array($2::jsonb)
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(id)
        .bind(Json(&step))
        .bind(category)
        .execute(&self.pool)
        .await
        .map_err(db_error("recording audit step"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn complete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE audits SET status = 'complete', completed_at = NOW()
             WHERE id = $1 AND status IN ('pending', 'running')",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_error("completing audit"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn fail(&self, id: Uuid, message: String) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE audits SET status = 'failed', error_message = $2, completed_at = NOW()
             WHERE id = $1 AND status IN ('pending', 'running')",
        )
        .bind(id)
        .bind(&message)
        .execute(&self.pool)
        .await
        .map_err(db_error("failing audit"))?;

        if result.rows_affected() == 1 {
            warn!("Audit {} failed: {}", id, message);
        }
        Ok(result.rows_affected() == 1)
    }
}
