//! Reusable building blocks shared across ErpSync crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: OAuth token grant types
//! - `runtime`: backoff scheduling with jitter and wait-hint parsing

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod auth;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

// Re-export commonly used types for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use auth::{OAuthErrorBody, TokenGrant, TokenResponse};
#[cfg(feature = "runtime")]
pub use resilience::{parse_wait_hint, BackoffScheduler, DelaySource, ScheduledDelay};
