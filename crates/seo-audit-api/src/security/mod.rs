pub mod ownership;
pub mod webhook_signature;

pub use ownership::OwnershipGuard;
pub use webhook_signature::{SignatureError, WebhookVerifier};
