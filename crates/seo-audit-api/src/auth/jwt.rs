use anyhow::Result;
use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;
use uuid::Uuid;

use super::SessionResolver;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // User ID
    pub exp: usize,
    pub iat: usize,
}

pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_cookie: String,
}

impl JwtManager {
    pub fn new(secret: &str, session_cookie: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            session_cookie: session_cookie.to_string(),
        }
    }

    /// Sessions are issued by the auth service; this is used by tooling and tests.
    pub fn generate_token(&self, user_id: Uuid, ttl_seconds: u64) -> Result<String> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

        let claims = Claims {
            sub: user_id.to_string(),
            exp: now + ttl_seconds as usize,
            iat: now,
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)?;
        Ok(token)
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &Validation::default())?;
        Ok(token_data.claims)
    }

    fn bearer_token(headers: &HeaderMap) -> Option<&str> {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    fn cookie_token<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.session_cookie)
            .map(|(_, value)| value)
    }
}

impl SessionResolver for JwtManager {
    fn resolve(&self, headers: &HeaderMap) -> Option<Uuid> {
        let token = Self::bearer_token(headers).or_else(|| self.cookie_token(headers))?;

        match self.validate_token(token) {
            Ok(claims) => Uuid::parse_str(&claims.sub).ok(),
            Err(e) => {
                debug!("Rejected session token: {}", e);
                None
            }
        }
    }
}
