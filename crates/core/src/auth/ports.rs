//! Traits for credential storage and OAuth token operations
//!
//! These traits let the token lifecycle run against SQLite and the real ERP
//! token endpoint in production, and against in-memory mocks in tests.

use async_trait::async_trait;
use erpsync_common::TokenGrant;
use erpsync_domain::{Result, SyncCredential};
use thiserror::Error;

/// Trait for the per-tenant credential store
///
/// Writes are last-write-wins.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the tenant's credential, revoked or not.
    async fn load(&self, tenant_id: &str) -> Result<Option<SyncCredential>>;

    /// Insert or replace the tenant's credential.
    async fn save(&self, credential: &SyncCredential) -> Result<()>;

    /// Mark the tenant's credential revoked
    ///
    /// # Returns
    /// `true` if an active credential was revoked, `false` if there was
    /// nothing to revoke.
    async fn revoke(&self, tenant_id: &str) -> Result<bool>;
}

/// Errors returned by a [`TokenEndpoint`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenEndpointError {
    /// The endpoint answered with an OAuth error (`invalid_grant`, ...).
    #[error("token endpoint rejected the grant: {0}")]
    Rejected(String),

    /// No usable answer (network failure, timeout, 5xx).
    #[error("token endpoint unavailable: {0}")]
    Unavailable(String),

    /// 2xx but the body was not a token response.
    #[error("invalid token response: {0}")]
    InvalidResponse(String),
}

/// Trait for the ERP's OAuth token endpoint
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchange an authorization code for tokens
    ///
    /// # Arguments
    /// * `code` - Authorization code from the redirect callback
    /// * `redirect_uri` - Must match the one used in the authorization request
    ///
    /// # Errors
    /// Returns error if the exchange fails or the response cannot be parsed
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: Option<&str>,
    ) -> std::result::Result<TokenGrant, TokenEndpointError>;

    /// Obtain a new access token from a refresh token
    ///
    /// # Errors
    /// Returns error if the refresh token is invalid, expired or revoked, or
    /// the endpoint cannot be reached
    async fn refresh(
        &self,
        refresh_token: &str,
    ) -> std::result::Result<TokenGrant, TokenEndpointError>;
}

/// Source of valid access tokens for outbound calls
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Fails with `NotConnected` or `RefreshFailed`.
    async fn access_token(&self, tenant_id: &str) -> Result<String>;
}
