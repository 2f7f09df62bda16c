// PostgreSQL keyword schedule repository

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use super::db_error;
use crate::models::{Frequency, KeywordRanking, KeywordSchedule, NewKeywordSchedule};
use crate::repositories::{KeywordRepository, StoreError};

const SCHEDULE_COLUMNS: &str = "k.id, k.domain_id, k.keywords, k.frequency, k.day_of_week, k.day_of_month, \
     k.time_of_day, k.next_run_at, k.last_run_at, k.is_active, k.created_at";

pub struct PgKeywordRepository {
    pool: PgPool,
}

impl PgKeywordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ScheduleRow {
    id: Uuid,
    domain_id: Uuid,
    keywords: Vec<String>,
    frequency: String,
    day_of_week: Option<i16>,
    day_of_month: Option<i16>,
    time_of_day: NaiveTime,
    next_run_at: DateTime<Utc>,
    last_run_at: Option<DateTime<Utc>>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<ScheduleRow> for KeywordSchedule {
    fn from(row: ScheduleRow) -> Self {
        KeywordSchedule {
            id: row.id,
            domain_id: row.domain_id,
            keywords: row.keywords,
            frequency: row.frequency.parse().unwrap_or(Frequency::Weekly),
            day_of_week: row.day_of_week,
            day_of_month: row.day_of_month,
            time_of_day: row.time_of_day,
            next_run_at: row.next_run_at,
            last_run_at: row.last_run_at,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct RankingRow {
    keyword: String,
    position: Option<i32>,
    url: Option<String>,
    checked_at: DateTime<Utc>,
}

impl From<RankingRow> for KeywordRanking {
    fn from(row: RankingRow) -> Self {
        KeywordRanking {
            keyword: row.keyword,
            position: row.position,
            url: row.url,
            checked_at: row.checked_at,
        }
    }
}

#[async_trait]
impl KeywordRepository for PgKeywordRepository {
    async fn create(&self, schedule: &NewKeywordSchedule) -> Result<KeywordSchedule, StoreError> {
        let sql = format!(
            "INSERT INTO keyword_schedules AS k
                (domain_id, keywords, frequency, day_of_week, day_of_month, time_of_day, next_run_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {SCHEDULE_COLUMNS}"
        );
        let spec = &schedule.spec;
        let row: ScheduleRow = sqlx::query_as(&sql)
            .bind(schedule.domain_id)
            .bind(&schedule.keywords)
            .bind(spec.frequency.as_str())
            .bind(spec.day_of_week.map(|d| d as i16))
            .bind(spec.day_of_month.map(|d| d as i16))
            .bind(spec.time_of_day)
            .bind(schedule.next_run_at)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("creating keyword schedule"))?;

        info!("Keyword schedule created: {} next run {}", row.id, row.next_run_at);
        Ok(row.into())
    }

    async fn list_for_domain(&self, domain_id: Uuid) -> Result<Vec<KeywordSchedule>, StoreError> {
        let sql = format!(
            "SELECT {SCHEDULE_COLUMNS} FROM keyword_schedules k
             WHERE k.domain_id = $1
             ORDER BY k.created_at DESC"
        );
        let rows: Vec<ScheduleRow> = sqlx::query_as(&sql)
            .bind(domain_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("listing keyword schedules"))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_owned(&self, id: Uuid, user_id: Uuid) -> Result<Option<KeywordSchedule>, StoreError> {
        let sql = format!(
            "SELECT {SCHEDULE_COLUMNS} FROM keyword_schedules k
             JOIN domains d ON d.id = k.domain_id
             WHERE k.id = $1 AND d.user_id = $2"
        );
        let row: Option<ScheduleRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("finding owned keyword schedule"))?;

        Ok(row.map(Into::into))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<KeywordSchedule>, StoreError> {
        let sql = format!("SELECT {SCHEDULE_COLUMNS} FROM keyword_schedules k WHERE k.id = $1");
        let row: Option<ScheduleRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("finding keyword schedule"))?;

        Ok(row.map(Into::into))
    }

    async fn due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<KeywordSchedule>, StoreError> {
        let sql = format!(
            "SELECT {SCHEDULE_COLUMNS} FROM keyword_schedules k
             JOIN domains d ON d.id = k.domain_id
             WHERE k.is_active AND d.status = 'active' AND k.next_run_at <= $1
             ORDER BY k.next_run_at ASC
             LIMIT $2"
        );
        let rows: Vec<ScheduleRow> = sqlx::query_as(&sql)
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("finding due keyword schedules"))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn record_run(
        &self,
        id: Uuid,
        rankings: Vec<KeywordRanking>,
        ran_at: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error("starting transaction"))?;

        // Overlapping deliveries serialize on the row lock; the later one matches no row.
        let advanced = sqlx::query(
            r#"
            UPDATE keyword_schedules
            SET last_run_at = $2, next_run_at = $3
            WHERE id = $1 AND next_run_at <= $2
            "#,
        )
        .bind(id)
        .bind(ran_at)
        .bind(next_run_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error("advancing keyword schedule"))?;

        if advanced.rows_affected() == 0 {
            tx.rollback().await.map_err(db_error("rolling back keyword run"))?;
            warn!("Keyword schedule {} was already advanced, dropping duplicate run", id);
            return Ok(false);
        }

        let mut keywords = Vec::with_capacity(rankings.len());
        let mut positions = Vec::with_capacity(rankings.len());
        let mut urls = Vec::with_capacity(rankings.len());
        for ranking in rankings {
            keywords.push(ranking.keyword);
            positions.push(ranking.position);
            urls.push(ranking.url);
        }

        sqlx::query(
            r#"
            INSERT INTO keyword_rankings (schedule_id, keyword, position, url, checked_at)
            SELECT $1, r.keyword, r.position, r.url, $5
            FROM UNNEST($2::text[], $3::int4[], $4::text[]) AS r(keyword, position, url)
            "#,
        )
        .bind(id)
        .bind(&keywords)
        .bind(&positions)
        .bind(&urls)
        .bind(ran_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error("inserting keyword rankings"))?;

        tx.commit().await.map_err(db_error("committing keyword run"))?;
        Ok(true)
    }

    async fn latest_rankings(&self, schedule_id: Uuid) -> Result<Vec<KeywordRanking>, StoreError> {
        let rows: Vec<RankingRow> = sqlx::query_as(
            r#"
            SELECT keyword, position, url, checked_at
            FROM keyword_rankings
            WHERE schedule_id = $1
              AND checked_at = (SELECT MAX(checked_at) FROM keyword_rankings WHERE schedule_id = $1)
            ORDER BY position ASC NULLS LAST, keyword ASC
            "#,
        )
        .bind(schedule_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("loading keyword rankings"))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
