//! Retry diagnostics and batch synchronization reports

use serde::{Deserialize, Serialize};

use super::http::{HttpMethod, UpstreamResponse};

/// Outcome of classifying a failed upstream response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub transient: bool,
    pub is_rate_limit: bool,
}

impl Classification {
    pub const PERMANENT: Self = Self { transient: false, is_rate_limit: false };
    pub const TRANSIENT: Self = Self { transient: true, is_rate_limit: false };
    pub const RATE_LIMITED: Self = Self { transient: true, is_rate_limit: true };

    pub fn label(&self) -> &'static str {
        match (self.transient, self.is_rate_limit) {
            (true, true) => "rate_limited",
            (true, false) => "transient",
            _ => "permanent",
        }
    }
}

/// One retry decision; diagnostic only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryAttempt {
    pub index: u32,
    /// `None` when the attempt failed at the transport level.
    pub status: Option<u16>,
    pub classification: Classification,
    pub delay_ms: u64,
}

/// What the request executor hands back when it does not raise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub response: UpstreamResponse,
    pub retries_used: u32,
    pub had_rate_limit: bool,
    pub attempts: Vec<RetryAttempt>,
}

/// A remote entity update submitted to the batch throttler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncItem {
    pub id: String,
    pub method: HttpMethod,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl SyncItem {
    pub fn new(id: impl Into<String>, method: HttpMethod, url: impl Into<String>) -> Self {
        Self { id: id.into(), method, url: url.into(), body: None }
    }

    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Per-item result inside a batch report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncItemResult {
    pub id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncItemResult {
    pub fn ok(id: impl Into<String>) -> Self {
        Self { id: id.into(), success: true, error: None }
    }

    pub fn failed(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self { id: id.into(), success: false, error: Some(error.into()) }
    }
}

/// Aggregate of a batch run: one detail per submitted item, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncBatchReport {
    pub successes: usize,
    pub failures: usize,
    pub details: Vec<SyncItemResult>,
}

impl SyncBatchReport {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { successes: 0, failures: 0, details: Vec::with_capacity(capacity) }
    }

    pub fn push(&mut self, result: SyncItemResult) {
        if result.success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.details.push(result);
    }

    pub fn len(&self) -> usize {
        self.details.len()
    }

    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }
}
