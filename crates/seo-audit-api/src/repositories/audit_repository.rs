//! Audit repository trait (port)

use async_trait::async_trait;
use uuid::Uuid;

use super::StoreError;
use crate::models::{Audit, StepResult};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn create_pending(&self, domain_id: Uuid, keywords: Vec<String>) -> Result<Audit, StoreError>;
    async fn find_owned(&self, id: Uuid, user_id: Uuid) -> Result<Option<Audit>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Audit>, StoreError>;
    async fn list_for_domain(&self, domain_id: Uuid, limit: i64) -> Result<Vec<Audit>, StoreError>;

    // Transitions below return false when the audit was not in a state
    // that allows them (terminal audits never change).
    async fn mark_running(&self, id: Uuid) -> Result<bool, StoreError>;
    async fn record_step(&self, id: Uuid, step: StepResult) -> Result<bool, StoreError>;
    async fn complete(&self, id: Uuid) -> Result<bool, StoreError>;
    async fn fail(&self, id: Uuid, message: String) -> Result<bool, StoreError>;
}
