use axum::http::HeaderMap;
use chrono::Utc;
use hmac::{Hmac, Mac};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Inngest-Signature";

static KEY_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^signkey-\w+-").expect("signing key prefix pattern is valid"));

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Missing X-Inngest-Signature header")]
    Missing,

    #[error("Malformed signature header")]
    Malformed,

    #[error("Signature timestamp outside tolerance ({0}s)")]
    Expired(i64),

    #[error("Signature mismatch")]
    Mismatch,

    #[error("No signing key configured")]
    NotConfigured,
}

/// Verifies job-runner calls to the webhook.
///
/// Header format: `t=<unix seconds>&s=<hex HMAC-SHA256(key, body ++ t)>`,
/// where `key` is the signing key without its `signkey-<env>-` prefix.
#[derive(Debug, Clone)]
pub struct WebhookVerifier {
    signing_key: Option<String>,
    tolerance_seconds: i64,
    dev_mode: bool,
}

impl WebhookVerifier {
    pub fn new(signing_key: Option<String>, tolerance_seconds: i64, dev_mode: bool) -> Self {
        let signing_key = signing_key
            .map(|key| KEY_PREFIX.replace(key.trim(), "").into_owned())
            .filter(|key| !key.is_empty());
        Self {
            signing_key,
            tolerance_seconds,
            dev_mode,
        }
    }

    pub fn has_signing_key(&self) -> bool {
        self.signing_key.is_some()
    }

    pub fn is_dev_mode(&self) -> bool {
        self.dev_mode
    }

    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), SignatureError> {
        self.verify_at(headers, body, Utc::now().timestamp())
    }

    pub fn verify_at(&self, headers: &HeaderMap, body: &[u8], now: i64) -> Result<(), SignatureError> {
        if self.dev_mode {
            debug!("Dev mode: skipping webhook signature check");
            return Ok(());
        }

        let key = self.signing_key.as_deref().ok_or(SignatureError::NotConfigured)?;

        let raw = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(SignatureError::Missing)?;

        let (timestamp, signature) = parse_header(raw).ok_or(SignatureError::Malformed)?;

        let drift = (now - timestamp).abs();
        if drift > self.tolerance_seconds {
            warn!("Webhook signature timestamp drift {}s", drift);
            return Err(SignatureError::Expired(self.tolerance_seconds));
        }

        let expected = hex::decode(signature).map_err(|_| SignatureError::Malformed)?;
        let mac = mac_for(key, body, timestamp).ok_or(SignatureError::NotConfigured)?;
        mac.verify_slice(&expected).map_err(|_| {
            warn!("Webhook signature mismatch");
            SignatureError::Mismatch
        })
    }

    /// Header value for `body` signed at `timestamp`.
    pub fn sign(&self, body: &[u8], timestamp: i64) -> Option<String> {
        let key = self.signing_key.as_deref()?;
        let mac = mac_for(key, body, timestamp)?;
        let signature = hex::encode(mac.finalize().into_bytes());
        Some(format!("t={}&s={}", timestamp, signature))
    }
}

fn mac_for(key: &str, body: &[u8], timestamp: i64) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).ok()?;
    mac.update(body);
    mac.update(timestamp.to_string().as_bytes());
    Some(mac)
}

fn parse_header(raw: &str) -> Option<(i64, &str)> {
    let mut timestamp = None;
    let mut signature = None;
    for pair in raw.split('&') {
        match pair.split_once('=') {
            Some(("t", value)) => timestamp = value.trim().parse::<i64>().ok(),
            Some(("s", value)) => signature = Some(value.trim()),
            _ => {}
        }
    }
    Some((timestamp?, signature.filter(|s| !s.is_empty())?))
}
