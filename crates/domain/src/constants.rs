//! Domain constants
//!
//! Defaults shared by configuration, the executor and the batch throttler.

// Retry defaults
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_BASE_DELAY_MS: u64 = 2_000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

// Token lifecycle
pub const DEFAULT_REFRESH_HORIZON_SECS: i64 = 300;

/// Largest accepted refresh horizon (one day)
pub const MAX_REFRESH_HORIZON_SECS: i64 = 86_400;

// Batch pacing: ~3 requests per second
pub const DEFAULT_BATCH_ITEM_INTERVAL_MS: u64 = 350;

// HTTP
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = concat!("erpsync/", env!("CARGO_PKG_VERSION"));
pub const RETRY_AFTER_HEADER: &str = "retry-after";

// Upstream error bodies are truncated to this many characters in warnings
pub const MAX_ERROR_MESSAGE_LENGTH: usize = 500;

// Database
pub const DEFAULT_DB_POOL_SIZE: u32 = 4;
