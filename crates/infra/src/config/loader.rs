//! Configuration loader
//!
//! Loads the sync layer configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If the required ERP variables are missing, falls back to a file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! Whatever the source, the result is checked with [`Config::validate`].
//!
//! ## Environment Variables
//! Required:
//! - `ERPSYNC_ERP_API_BASE_URL`, `ERPSYNC_ERP_TOKEN_URL`
//! - `ERPSYNC_ERP_CLIENT_ID`, `ERPSYNC_ERP_CLIENT_SECRET`
//!
//! Optional (defaults from `erpsync_domain::constants`):
//! - `ERPSYNC_ERP_AUTHORIZE_URL`, `ERPSYNC_ERP_REDIRECT_URI`
//! - `ERPSYNC_ERP_REQUEST_TIMEOUT_SECS`, `ERPSYNC_ERP_USER_AGENT`
//! - `ERPSYNC_DB_PATH`, `ERPSYNC_DB_POOL_SIZE`, `ERPSYNC_DB_ENCRYPTION_KEY`
//! - `ERPSYNC_RETRY_MAX_RETRIES`, `ERPSYNC_RETRY_BASE_DELAY_MS`,
//!   `ERPSYNC_RETRY_MAX_DELAY_MS`
//! - `ERPSYNC_BATCH_ITEM_INTERVAL_MS`
//! - `ERPSYNC_AUTH_REFRESH_HORIZON_SECS`
//! - `ERPSYNC_CLASSIFIER_EXTRA_LAG_PHRASES`: `;`-separated phrases
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.{json,toml}` and `./erpsync.{json,toml}` (current directory)
//! 2. `../config.{json,toml}`, `../../config.{json,toml}`
//! 3. The same names relative to the executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use erpsync_domain::{
    BatchConfig, ClassifierConfig, Config, DatabaseConfig, ErpConfig, Result, RetryConfig,
    SyncError, TokenConfig,
};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `SyncError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Validation fails
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `SyncError::Config` if required variables are missing or values
/// do not parse.
pub fn load_from_env() -> Result<Config> {
    let erp = ErpConfig {
        api_base_url: env_var("ERPSYNC_ERP_API_BASE_URL")?,
        token_url: env_var("ERPSYNC_ERP_TOKEN_URL")?,
        client_id: env_var("ERPSYNC_ERP_CLIENT_ID")?,
        client_secret: env_var("ERPSYNC_ERP_CLIENT_SECRET")?,
        authorize_url: env_opt("ERPSYNC_ERP_AUTHORIZE_URL"),
        redirect_uri: env_opt("ERPSYNC_ERP_REDIRECT_URI"),
        request_timeout_secs: env_parse(
            "ERPSYNC_ERP_REQUEST_TIMEOUT_SECS",
            erpsync_domain::constants::DEFAULT_REQUEST_TIMEOUT_SECS,
        )?,
        user_agent: env_opt("ERPSYNC_ERP_USER_AGENT")
            .unwrap_or_else(|| erpsync_domain::constants::DEFAULT_USER_AGENT.to_string()),
    };

    let database_defaults = DatabaseConfig::default();
    let database = DatabaseConfig {
        path: env_opt("ERPSYNC_DB_PATH").unwrap_or(database_defaults.path),
        pool_size: env_parse("ERPSYNC_DB_POOL_SIZE", database_defaults.pool_size)?,
        encryption_key: env_opt("ERPSYNC_DB_ENCRYPTION_KEY"),
    };

    let retry_defaults = RetryConfig::default();
    let retry = RetryConfig {
        max_retries: env_parse("ERPSYNC_RETRY_MAX_RETRIES", retry_defaults.max_retries)?,
        base_delay_ms: env_parse("ERPSYNC_RETRY_BASE_DELAY_MS", retry_defaults.base_delay_ms)?,
        max_delay_ms: env_parse("ERPSYNC_RETRY_MAX_DELAY_MS", retry_defaults.max_delay_ms)?,
    };

    let batch = BatchConfig {
        item_interval_ms: env_parse(
            "ERPSYNC_BATCH_ITEM_INTERVAL_MS",
            BatchConfig::default().item_interval_ms,
        )?,
    };

    let auth = TokenConfig {
        refresh_horizon_secs: env_parse(
            "ERPSYNC_AUTH_REFRESH_HORIZON_SECS",
            TokenConfig::default().refresh_horizon_secs,
        )?,
    };

    let classifier = ClassifierConfig {
        extra_lag_phrases: env_opt("ERPSYNC_CLASSIFIER_EXTRA_LAG_PHRASES")
            .map(|raw| {
                raw.split(';')
                    .map(str::trim)
                    .filter(|phrase| !phrase.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    };

    let config = Config { database, erp, retry, batch, auth, classifier };
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `SyncError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid or validation fails
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(SyncError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            SyncError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| SyncError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| SyncError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| SyncError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(SyncError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidate_files(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidate_files(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidate_files(dir: &Path) -> Vec<PathBuf> {
    vec![
        dir.join("config.json"),
        dir.join("config.toml"),
        dir.join("erpsync.json"),
        dir.join("erpsync.toml"),
        dir.join("../config.json"),
        dir.join("../config.toml"),
        dir.join("../../config.json"),
        dir.join("../../config.toml"),
    ]
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| SyncError::Config(format!("Missing required environment variable: {key}")))
}

/// Optional environment variable; blank counts as unset.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Parse an optional environment variable, falling back to `default`.
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| SyncError::Config(format!("Invalid value for {key}: {e}"))),
        None => Ok(default),
    }
}
