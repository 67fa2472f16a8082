//! Error types used throughout the sync layer

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rate-limit budget exhausted while retrying an upstream call.
///
/// Distinct from a plain pass-through of the last HTTP response: callers are
/// expected to surface a retryable "system busy" condition when they see it.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message} (retries attempted: {retries_attempted}, last status: {last_status})")]
pub struct RateLimitExhaustedError {
    pub message: String,
    pub retries_attempted: u32,
    pub last_status: u16,
    /// Last wait hint supplied by the upstream, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl RateLimitExhaustedError {
    pub fn new(context: &str, retries_attempted: u32, last_status: u16) -> Self {
        Self {
            message: format!("upstream rate limit exceeded for {context}"),
            retries_attempted,
            last_status,
            retry_after_ms: None,
        }
    }

    #[must_use]
    pub fn with_retry_after_ms(mut self, retry_after_ms: Option<u64>) -> Self {
        self.retry_after_ms = retry_after_ms;
        self
    }
}

/// Main error type for the sync layer
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum SyncError {
    #[error(transparent)]
    RateLimitExhausted(RateLimitExhaustedError),

    #[error("Connectivity error after {attempts} attempt(s): {message}")]
    Connectivity { attempts: u32, message: String },

    #[error("ERP integration not connected for tenant {0}")]
    NotConnected(String),

    #[error("Token refresh failed for tenant {tenant_id}: {reason}")]
    RefreshFailed { tenant_id: String, reason: String },

    #[error("Upstream returned HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Returns true if retrying the whole operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimitExhausted(_) | Self::Connectivity { .. } => true,
            Self::Upstream { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }

    /// Suggested wait before the caller retries, in seconds.
    pub fn retry_after_hint(&self) -> Option<u64> {
        match self {
            Self::RateLimitExhausted(err) => {
                Some(err.retry_after_ms.map_or(60, |ms| ms.div_ceil(1000).max(1)))
            }
            Self::Connectivity { .. } => Some(30),
            Self::Upstream { status, .. } if (500..=599).contains(status) => Some(60),
            _ => None,
        }
    }

    /// HTTP status a caller-facing surface should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::RateLimitExhausted(_) | Self::Connectivity { .. } => 503,
            Self::NotConnected(_) => 409,
            Self::RefreshFailed { .. } => 401,
            Self::Upstream { status, .. } => *status,
            Self::InvalidInput(_) => 400,
            Self::Cancelled => 499,
            Self::Store(_) | Self::Config(_) | Self::Internal(_) => 500,
        }
    }

    /// User-friendly message for this error.
    pub fn user_message(&self) -> String {
        match self {
            Self::RateLimitExhausted(_) => format!(
                "The ERP is busy right now. Please try again in {} seconds.",
                self.retry_after_hint().unwrap_or(60)
            ),
            Self::Connectivity { .. } => {
                "Could not reach the ERP. Please check connectivity and try again.".to_string()
            }
            Self::NotConnected(_) => "The ERP integration is not active.".to_string(),
            Self::RefreshFailed { .. } => {
                "The ERP authorization expired or was revoked. Please reconnect the integration."
                    .to_string()
            }
            Self::Upstream { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<RateLimitExhaustedError> for SyncError {
    fn from(err: RateLimitExhaustedError) -> Self {
        Self::RateLimitExhausted(err)
    }
}

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
