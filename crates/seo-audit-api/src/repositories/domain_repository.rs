//! Domain repository trait (port)

use async_trait::async_trait;
use uuid::Uuid;

use super::StoreError;
use crate::models::{Domain, NewDomain, ToolCounts};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DomainRepository: Send + Sync {
    async fn list_for_user(
        &self,
        user_id: Uuid,
        include_inactive: bool,
    ) -> Result<Vec<Domain>, StoreError>;
    async fn find_owned(&self, id: Uuid, user_id: Uuid) -> Result<Option<Domain>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Domain>, StoreError>;
    async fn name_exists(&self, user_id: Uuid, name: &str) -> Result<bool, StoreError>;
    /// Fails with `StoreError::Conflict` when the name is already taken.
    async fn create(&self, domain: &NewDomain) -> Result<Domain, StoreError>;
    async fn deactivate(&self, id: Uuid) -> Result<Domain, StoreError>;
    async fn tool_counts(&self, id: Uuid) -> Result<ToolCounts, StoreError>;
}
