//! Database module (PostgreSQL adapters)

pub mod pool;
pub mod postgres;

pub use pool::{DbPool, HealthCheck};
pub use postgres::{
    PgAuditRepository, PgCampaignRepository, PgDomainRepository, PgKeywordRepository,
    PgProfileRepository, PgScanRepository,
};
