//! Keyword schedule repository trait (port)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::StoreError;
use crate::models::{KeywordRanking, KeywordSchedule, NewKeywordSchedule};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeywordRepository: Send + Sync {
    async fn create(&self, schedule: &NewKeywordSchedule) -> Result<KeywordSchedule, StoreError>;
    async fn list_for_domain(&self, domain_id: Uuid) -> Result<Vec<KeywordSchedule>, StoreError>;
    async fn find_owned(&self, id: Uuid, user_id: Uuid) -> Result<Option<KeywordSchedule>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<KeywordSchedule>, StoreError>;

    /// Active schedules whose `next_run_at` is at or before `now`.
    async fn due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<KeywordSchedule>, StoreError>;

    /// Store one run's rankings and advance the schedule, only while it is
    /// still due at `ran_at`. Returns `false` when another run got there first.
    async fn record_run(
        &self,
        id: Uuid,
        rankings: Vec<KeywordRanking>,
        ran_at: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Rankings from the most recent run.
    async fn latest_rankings(&self, schedule_id: Uuid) -> Result<Vec<KeywordRanking>, StoreError>;
}
