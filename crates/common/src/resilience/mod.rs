//! Resilience patterns for upstream calls
//!
//! - **Backoff**: exponential delay with multiplicative jitter, or an
//!   upstream-supplied wait hint with additive jitter
//! - **Wait hints**: `Retry-After` parsing (delta-seconds or HTTP-date)
//!
//! Deciding *whether* to retry is left to callers; this module only answers
//! *how long* to wait.

pub mod backoff;
pub mod constants;
pub mod wait_hint;

pub use backoff::{BackoffScheduler, DelaySource, ScheduledDelay};
pub use wait_hint::parse_wait_hint;
