//! Persistence accessors (ports).
//!
//! Each trait is a narrow set of reads and writes over one aggregate. None of
//! them checks ownership; `find_owned` variants filter by the caller so the
//! guard can use them, everything else assumes the guard already ran.

pub mod audit_repository;
pub mod campaign_repository;
pub mod domain_repository;
pub mod keyword_repository;
pub mod profile_repository;
pub mod scan_repository;

pub use audit_repository::AuditRepository;
pub use campaign_repository::CampaignRepository;
pub use domain_repository::DomainRepository;
pub use keyword_repository::KeywordRepository;
pub use profile_repository::ProfileRepository;
pub use scan_repository::ScanRepository;

#[cfg(test)]
pub use audit_repository::MockAuditRepository;
#[cfg(test)]
pub use campaign_repository::MockCampaignRepository;
#[cfg(test)]
pub use domain_repository::MockDomainRepository;
#[cfg(test)]
pub use keyword_repository::MockKeywordRepository;
#[cfg(test)]
pub use profile_repository::MockProfileRepository;
#[cfg(test)]
pub use scan_repository::MockScanRepository;

use std::sync::Arc;
use thiserror::Error;

/// Shared handles to every repository.
#[derive(Clone)]
pub struct Repositories {
    pub domains: Arc<dyn DomainRepository>,
    pub audits: Arc<dyn AuditRepository>,
    pub scans: Arc<dyn ScanRepository>,
    pub campaigns: Arc<dyn CampaignRepository>,
    pub keywords: Arc<dyn KeywordRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}
