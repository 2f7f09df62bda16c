use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub jobs: JobsConfig,
    pub provider: ProviderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by CORS; empty means permissive.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_max_size: u32,
    pub pool_timeout_seconds: u64,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Cookie consulted when no Authorization header is present.
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct JobsConfig {
    pub app_id: String,
    /// Base URL of the event runner (dev server or cloud).
    pub base_url: String,
    pub event_key: String,
    #[serde(default)]
    pub signing_key: Option<String>,
    /// Public URL at which the runner reaches `/api/inngest`.
    pub serve_url: String,
    #[serde(default)]
    pub dev_mode: bool,
    #[serde(default = "default_signature_tolerance")]
    pub signature_tolerance_seconds: i64,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub login: String,
    pub password: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    pub location_code: u32,
    pub language_code: String,
    #[serde(default = "default_poll_interval")]
    pub crawl_poll_interval_seconds: u64,
    #[serde(default = "default_max_polls")]
    pub crawl_max_polls: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub directory: String,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: "logs".to_string(),
            file_prefix: "seo-audit-api".to_string(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_session_cookie() -> String {
    "session".to_string()
}

fn default_signature_tolerance() -> i64 {
    300
}

fn default_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    10
}

fn default_max_polls() -> u32 {
    90
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("config/settings").required(true))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }
}
