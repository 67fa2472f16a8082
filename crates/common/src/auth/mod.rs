//! OAuth 2.0 token grant types
//!
//! Wire-level types for the authorization-code and refresh-token grants.
//! Persisting the resulting credential is the caller's concern.

pub mod types;

pub use types::{OAuthErrorBody, TokenGrant, TokenResponse};
