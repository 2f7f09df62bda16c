//! Site-audit scan repository trait (port)

use async_trait::async_trait;
use uuid::Uuid;

use super::StoreError;
use crate::models::{NewScanPage, PageQuery, Scan, ScanPage};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScanRepository: Send + Sync {
    async fn create_pending(&self, domain_id: Uuid, max_pages: u32) -> Result<Scan, StoreError>;
    async fn find_owned(&self, id: Uuid, user_id: Uuid) -> Result<Option<Scan>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Scan>, StoreError>;

    /// One page of results plus the filtered total.
    async fn list_pages(
        &self,
        scan_id: Uuid,
        query: &PageQuery,
    ) -> Result<(Vec<ScanPage>, i64), StoreError>;

    async fn mark_crawling(&self, id: Uuid, external_task_id: String) -> Result<bool, StoreError>;
    async fn update_progress(&self, id: Uuid, progress: i32) -> Result<(), StoreError>;
    async fn insert_pages(&self, scan_id: Uuid, pages: Vec<NewScanPage>) -> Result<u64, StoreError>;
    async fn complete(&self, id: Uuid, pages_crawled: i32) -> Result<bool, StoreError>;
    async fn fail(&self, id: Uuid, message: String) -> Result<bool, StoreError>;
}
