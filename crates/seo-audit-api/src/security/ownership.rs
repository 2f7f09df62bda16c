//! Ownership guard.
//!
//! Every route that touches a tenant's data resolves it through here first.
//! A record that does not exist and a record that belongs to someone else
//! produce the same `NotFound`, so callers cannot probe for other tenants'
//! ids.

use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::models::{Audit, Domain, KeywordSchedule, LocalCampaign, Scan};
use crate::repositories::{
    AuditRepository, CampaignRepository, DomainRepository, KeywordRepository, Repositories,
    ScanRepository,
};
use crate::utils::error::ApiError;

pub const DOMAIN_NOT_FOUND: &str = "Domain not found";
pub const AUDIT_NOT_FOUND: &str = "Audit not found";
pub const SCAN_NOT_FOUND: &str = "Scan not found";
pub const CAMPAIGN_NOT_FOUND: &str = "Campaign not found";
pub const SCHEDULE_NOT_FOUND: &str = "Schedule not found";

pub struct OwnershipGuard {
    domains: Arc<dyn DomainRepository>,
    audits: Arc<dyn AuditRepository>,
    scans: Arc<dyn ScanRepository>,
    campaigns: Arc<dyn CampaignRepository>,
    schedules: Arc<dyn KeywordRepository>,
}

impl OwnershipGuard {
    pub fn new(repos: &Repositories) -> Self {
        Self {
            domains: repos.domains.clone(),
            audits: repos.audits.clone(),
            scans: repos.scans.clone(),
            campaigns: repos.campaigns.clone(),
            schedules: repos.keywords.clone(),
        }
    }

    /// Path segments that are not ids cannot name an owned record.
    pub fn path_id(raw: &str, not_found: &'static str) -> Result<Uuid, ApiError> {
        Uuid::parse_str(raw.trim()).map_err(|_| ApiError::NotFound(not_found.to_string()))
    }

    pub async fn require_domain(&self, user_id: Uuid, domain_id: Uuid) -> Result<Domain, ApiError> {
        let domain = self.domains.find_owned(domain_id, user_id).await?;
        Self::found(domain, "domain", domain_id, user_id, DOMAIN_NOT_FOUND)
    }

    pub async fn require_audit(&self, user_id: Uuid, audit_id: Uuid) -> Result<Audit, ApiError> {
        let audit = self.audits.find_owned(audit_id, user_id).await?;
        Self::found(audit, "audit", audit_id, user_id, AUDIT_NOT_FOUND)
    }

    pub async fn require_scan(&self, user_id: Uuid, scan_id: Uuid) -> Result<Scan, ApiError> {
        let scan = self.scans.find_owned(scan_id, user_id).await?;
        Self::found(scan, "scan", scan_id, user_id, SCAN_NOT_FOUND)
    }

    pub async fn require_campaign(
        &self,
        user_id: Uuid,
        campaign_id: Uuid,
    ) -> Result<LocalCampaign, ApiError> {
        let campaign = self.campaigns.find_owned(campaign_id, user_id).await?;
        Self::found(campaign, "campaign", campaign_id, user_id, CAMPAIGN_NOT_FOUND)
    }

    pub async fn require_schedule(
        &self,
        user_id: Uuid,
        schedule_id: Uuid,
    ) -> Result<KeywordSchedule, ApiError> {
        let schedule = self.schedules.find_owned(schedule_id, user_id).await?;
        Self::found(schedule, "schedule", schedule_id, user_id, SCHEDULE_NOT_FOUND)
    }

    fn found<T>(
        record: Option<T>,
        kind: &str,
        id: Uuid,
        user_id: Uuid,
        not_found: &'static str,
    ) -> Result<T, ApiError> {
        record.ok_or_else(|| {
            debug!("User {} has no {} {}", user_id, kind, id);
            ApiError::NotFound(not_found.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DomainStatus;
    use crate::repositories::{
        MockAuditRepository, MockCampaignRepository, MockDomainRepository, MockKeywordRepository,
        MockProfileRepository, MockScanRepository, StoreError,
    };
    use chrono::Utc;
    use mockall::predicate::eq;

    fn guard(domains: MockDomainRepository) -> OwnershipGuard {
        OwnershipGuard::new(&Repositories {
            domains: Arc::new(domains),
            audits: Arc::new(MockAuditRepository::new()),
            scans: Arc::new(MockScanRepository::new()),
            campaigns: Arc::new(MockCampaignRepository::new()),
            keywords: Arc::new(MockKeywordRepository::new()),
            profiles: Arc::new(MockProfileRepository::new()),
        })
    }

    fn domain(id: Uuid, user_id: Uuid) -> Domain {
        Domain {
            id,
            user_id,
            name: "Acme".into(),
            host: "acme.com".into(),
            business_name: None,
            city: None,
            state: None,
            status: DomainStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_owner_gets_record() {
        let (id, owner) = (Uuid::new_v4(), Uuid::new_v4());
        let mut repo = MockDomainRepository::new();
        repo.expect_find_owned()
            .with(eq(id), eq(owner))
            .returning(move |id, user| Ok(Some(domain(id, user))));

        let found = guard(repo).require_domain(owner, id).await.unwrap();
        assert_eq!(found.id, id);
    }

    #[tokio::test]
    async fn test_not_owned_and_missing_are_indistinguishable() {
        let mut repo = MockDomainRepository::new();
        repo.expect_find_owned().returning(|_, _| Ok(None));
        let guard = guard(repo);

        let foreign = guard.require_domain(Uuid::new_v4(), Uuid::new_v4()).await.unwrap_err();
        let missing = guard.require_domain(Uuid::new_v4(), Uuid::new_v4()).await.unwrap_err();
        assert_eq!(foreign.to_string(), missing.to_string());
        assert_eq!(foreign.status(), missing.status());
    }

    #[tokio::test]
    async fn test_store_failure_is_not_a_not_found() {
        let mut repo = MockDomainRepository::new();
        repo.expect_find_owned()
            .returning(|_, _| Err(StoreError::Database("connection reset".into())));

        let err = guard(repo).require_domain(Uuid::new_v4(), Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ApiError::Database(_)));
    }

    #[test]
    fn test_malformed_path_id_is_not_found() {
        let err = OwnershipGuard::path_id("123", SCAN_NOT_FOUND).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(msg) if msg == SCAN_NOT_FOUND));
    }
}
