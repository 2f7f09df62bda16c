pub mod extractor;
pub mod jwt;

pub use extractor::AuthUser;
pub use jwt::{Claims, JwtManager};

use axum::http::HeaderMap;
use uuid::Uuid;

/// Maps request credentials to the signed-in user.
pub trait SessionResolver: Send + Sync {
    /// `None` when no credential is present or it does not verify.
    fn resolve(&self, headers: &HeaderMap) -> Option<Uuid>;
}
