//! PostgreSQL repository implementations

pub mod audit_repo_impl;
pub mod campaign_repo_impl;
pub mod domain_repo_impl;
pub mod keyword_repo_impl;
pub mod profile_repo_impl;
pub mod scan_repo_impl;

pub use audit_repo_impl::PgAuditRepository;
pub use campaign_repo_impl::PgCampaignRepository;
pub use domain_repo_impl::PgDomainRepository;
pub use keyword_repo_impl::PgKeywordRepository;
pub use profile_repo_impl::PgProfileRepository;
pub use scan_repo_impl::PgScanRepository;

use crate::repositories::StoreError;
use tracing::error;

/// Log a failed statement and convert it to a `StoreError`.
pub(crate) fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e: sqlx::Error| {
        error!("Database error {}: {}", context, e);
        StoreError::Database(e.to_string())
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
