//! Configuration structures
//!
//! Loaded by `erpsync_infra::config::loader` from environment variables or a
//! JSON/TOML file. Every section except `erp` has defaults.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BASE_DELAY_MS, DEFAULT_BATCH_ITEM_INTERVAL_MS, DEFAULT_DB_POOL_SIZE,
    DEFAULT_MAX_DELAY_MS, DEFAULT_MAX_RETRIES, DEFAULT_REFRESH_HORIZON_SECS,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_USER_AGENT, MAX_REFRESH_HORIZON_SECS,
};
use crate::errors::{Result, SyncError};

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    pub erp: ErpConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub auth: TokenConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

impl Config {
    /// Reject configurations the sync layer cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.erp.api_base_url.trim().is_empty() {
            return Err(SyncError::Config("erp.api_base_url must not be empty".into()));
        }
        if self.erp.token_url.trim().is_empty() {
            return Err(SyncError::Config("erp.token_url must not be empty".into()));
        }
        if self.erp.client_id.trim().is_empty() {
            return Err(SyncError::Config("erp.client_id must not be empty".into()));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(SyncError::Config(format!(
                "retry.base_delay_ms ({}) cannot be greater than retry.max_delay_ms ({})",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }
        if !(0..=MAX_REFRESH_HORIZON_SECS).contains(&self.auth.refresh_horizon_secs) {
            return Err(SyncError::Config(format!(
                "auth.refresh_horizon_secs ({}) must be between 0 and {MAX_REFRESH_HORIZON_SECS}",
                self.auth.refresh_horizon_secs
            )));
        }
        if self.database.path.trim().is_empty() {
            return Err(SyncError::Config("database.path must not be empty".into()));
        }
        Ok(())
    }
}

/// Internal store location
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// SQLCipher key; plain SQLite when absent.
    #[serde(default)]
    pub encryption_key: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_db_path(), pool_size: default_pool_size(), encryption_key: None }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("path", &self.path)
            .field("pool_size", &self.pool_size)
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// ERP endpoint and OAuth client registration
#[derive(Clone, Serialize, Deserialize)]
pub struct ErpConfig {
    /// REST base, e.g. `https://api.erp.example/v3`
    pub api_base_url: String,
    /// OAuth2 token endpoint (authorization-code and refresh-token grants)
    pub token_url: String,
    /// OAuth2 consent page tenants are sent to when connecting
    #[serde(default)]
    pub authorize_url: Option<String>,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl std::fmt::Debug for ErpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErpConfig")
            .field("api_base_url", &self.api_base_url)
            .field("token_url", &self.token_url)
            .field("authorize_url", &self.authorize_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Retry/backoff budget for a single upstream call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

/// Batch pacing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_item_interval_ms")]
    pub item_interval_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { item_interval_ms: DEFAULT_BATCH_ITEM_INTERVAL_MS }
    }
}

/// Token lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Refresh when the access token expires within this many seconds.
    #[serde(default = "default_refresh_horizon_secs")]
    pub refresh_horizon_secs: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self { refresh_horizon_secs: DEFAULT_REFRESH_HORIZON_SECS }
    }
}

/// Extra read-after-write lag phrases, on top of the built-in allow-list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub extra_lag_phrases: Vec<String>,
}

fn default_db_path() -> String {
    "erpsync.db".to_string()
}

fn default_pool_size() -> u32 {
    DEFAULT_DB_POOL_SIZE
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}

fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

fn default_item_interval_ms() -> u64 {
    DEFAULT_BATCH_ITEM_INTERVAL_MS
}

fn default_refresh_horizon_secs() -> i64 {
    DEFAULT_REFRESH_HORIZON_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_TOML: &str = r#"
        [erp]
        api_base_url = "https://erp.test/Api/v3"
        token_url = "https://erp.test/Api/v3/oauth/token"
        client_id = "client"
        client_secret = "secret"
    "#;

    #[test]
    fn minimal_config_fills_defaults() {
        let config: Config = toml::from_str(MINIMAL_TOML).unwrap();

        assert_eq!(config.retry, RetryConfig::default());
        assert_eq!(config.batch.item_interval_ms, 350);
        assert_eq!(config.auth.refresh_horizon_secs, 300);
        assert_eq!(config.database.pool_size, DEFAULT_DB_POOL_SIZE);
        assert!(config.classifier.extra_lag_phrases.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn rejects_base_delay_above_max() {
        let mut config: Config = toml::from_str(MINIMAL_TOML).unwrap();
        config.retry.base_delay_ms = 60_000;

        assert!(matches!(config.validate(), Err(SyncError::Config(_))));
    }

    #[test]
    fn rejects_refresh_horizon_out_of_range() {
        let mut config: Config = toml::from_str(MINIMAL_TOML).unwrap();

        for secs in [-1, MAX_REFRESH_HORIZON_SECS + 1, i64::MAX] {
            config.auth.refresh_horizon_secs = secs;
            assert!(matches!(config.validate(), Err(SyncError::Config(_))), "{secs}");
        }

        config.auth.refresh_horizon_secs = MAX_REFRESH_HORIZON_SECS;
        config.validate().unwrap();
    }

    #[test]
    fn debug_hides_secrets() {
        let mut config: Config = toml::from_str(MINIMAL_TOML).unwrap();
        config.database.encryption_key = Some("db-key".into());
        let rendered = format!("{config:?}");

        assert!(!rendered.contains("secret\""));
        assert!(!rendered.contains("db-key"));
    }
}
