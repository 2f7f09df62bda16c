pub mod audits;
pub mod backlinks;
pub mod campaigns;
pub mod domains;
pub mod gbp;
pub mod health;
pub mod inngest;
pub mod keywords;
pub mod site_audit;

use crate::models::Domain;
use crate::utils::ApiError;

/// Retired domains keep their history but accept no new work.
pub(crate) fn require_active(domain: &Domain) -> Result<(), ApiError> {
    if domain.is_active() {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("Domain '{}' is inactive", domain.name)))
    }
}
