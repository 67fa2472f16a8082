//! # ErpSync Core
//!
//! Pure sync logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for the HTTP transport, credential
//!   store, token endpoint, entity store and ERP mirror
//! - The retry executor, token lifecycle, batch throttler and degraded-mode
//!   persister built on top of those ports
//!
//! ## Architecture Principles
//! - Only depends on `erpsync-domain` and `erpsync-common`
//! - No database or HTTP client code
//! - All external dependencies via traits

pub mod auth;
pub mod sync;

pub use auth::ports::{AccessTokenProvider, CredentialStore, TokenEndpoint, TokenEndpointError};
pub use auth::TokenLifecycleManager;
pub use sync::classifier::{describe_failure, extract_error_message, TransientErrorClassifier};
pub use sync::ports::{EntityRecord, EntityStore, HttpTransport, MirrorTarget};
pub use sync::{BatchThrottler, DegradedModePersister, RequestExecutor, RetryPolicy};
