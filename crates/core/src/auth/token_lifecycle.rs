//! Token lifecycle management
//!
//! Hands out access tokens that are valid for at least the refresh horizon,
//! refreshing through the [`TokenEndpoint`] when needed. Refreshes are
//! serialised per tenant: concurrent callers for the same tenant wait on one
//! refresh instead of each spending the refresh token.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use erpsync_common::TokenGrant;
use erpsync_domain::constants::DEFAULT_REFRESH_HORIZON_SECS;
use erpsync_domain::{Result, SyncCredential, SyncError, TokenConfig};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::ports::{AccessTokenProvider, CredentialStore, TokenEndpoint, TokenEndpointError};

/// Manages per-tenant ERP credentials
pub struct TokenLifecycleManager {
    store: Arc<dyn CredentialStore>,
    endpoint: Arc<dyn TokenEndpoint>,
    refresh_horizon: Duration,
    refresh_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TokenLifecycleManager {
    pub fn new(store: Arc<dyn CredentialStore>, endpoint: Arc<dyn TokenEndpoint>) -> Self {
        Self {
            store,
            endpoint,
            refresh_horizon: Duration::seconds(DEFAULT_REFRESH_HORIZON_SECS),
            refresh_locks: DashMap::new(),
        }
    }

    pub fn from_config(
        store: Arc<dyn CredentialStore>,
        endpoint: Arc<dyn TokenEndpoint>,
        config: &TokenConfig,
    ) -> Self {
        // Out-of-range values are rejected by `Config::validate`.
        let horizon = Duration::try_seconds(config.refresh_horizon_secs)
            .filter(|horizon| *horizon >= Duration::zero())
            .unwrap_or_else(|| Duration::seconds(DEFAULT_REFRESH_HORIZON_SECS));
        Self::new(store, endpoint).with_refresh_horizon(horizon)
    }

    #[must_use]
    pub fn with_refresh_horizon(mut self, horizon: Duration) -> Self {
        self.refresh_horizon = horizon;
        self
    }

    pub fn refresh_horizon(&self) -> Duration {
        self.refresh_horizon
    }

    /// Return an access token valid for at least the refresh horizon
    ///
    /// # Errors
    /// - `NotConnected` if the tenant has no credential or it was revoked
    /// - `RefreshFailed` if a refresh was needed and the endpoint refused it
    pub async fn get_access_token(&self, tenant_id: &str) -> Result<String> {
        let credential = self.load_active(tenant_id).await?;
        if !credential.expires_within(self.refresh_horizon, Utc::now()) {
            return Ok(credential.access_token);
        }

        let lock = self.refresh_lock(tenant_id);
        let _guard = lock.lock().await;

        // Another caller may have refreshed while we waited for the lock.
        let credential = self.load_active(tenant_id).await?;
        if !credential.expires_within(self.refresh_horizon, Utc::now()) {
            debug!(tenant_id, "token refreshed by concurrent caller");
            return Ok(credential.access_token);
        }

        let refreshed = self.refresh(credential).await?;
        Ok(refreshed.access_token)
    }

    /// Refresh the tenant's token regardless of its expiry, e.g. after the
    /// ERP rejected it with 401.
    pub async fn force_refresh(&self, tenant_id: &str) -> Result<String> {
        let lock = self.refresh_lock(tenant_id);
        let _guard = lock.lock().await;

        let credential = self.load_active(tenant_id).await?;
        let refreshed = self.refresh(credential).await?;
        Ok(refreshed.access_token)
    }

    /// Complete the authorization-code flow and store the tenant's credential
    ///
    /// # Errors
    /// `RefreshFailed` if the code exchange was rejected, or the store error
    pub async fn connect(
        &self,
        tenant_id: &str,
        code: &str,
        redirect_uri: Option<&str>,
    ) -> Result<SyncCredential> {
        let grant = self.endpoint.exchange_code(code, redirect_uri).await.map_err(|err| {
            warn!(tenant_id, error = %err, "authorization code exchange failed");
            SyncError::RefreshFailed {
                tenant_id: tenant_id.to_string(),
                reason: format!("authorization code exchange failed: {err}"),
            }
        })?;

        let refresh_token = grant.refresh_token.clone().ok_or_else(|| {
            SyncError::RefreshFailed {
                tenant_id: tenant_id.to_string(),
                reason: "token endpoint issued no refresh token".to_string(),
            }
        })?;

        let now = Utc::now();
        let expires_at = grant_expiry(tenant_id, &grant, now)?;
        let mut credential =
            SyncCredential::new(tenant_id, grant.access_token.clone(), refresh_token, expires_at);
        credential.updated_at = now;
        self.store.save(&credential).await?;

        info!(tenant_id, expires_at = %credential.expires_at, "ERP integration connected");
        Ok(credential)
    }

    /// Revoke the tenant's credential; later token requests fail with
    /// `NotConnected`.
    pub async fn disconnect(&self, tenant_id: &str) -> Result<bool> {
        let revoked = self.store.revoke(tenant_id).await?;
        self.refresh_locks.remove(tenant_id);
        if revoked {
            info!(tenant_id, "ERP integration disconnected");
        }
        Ok(revoked)
    }

    /// Whether the tenant holds an active credential.
    pub async fn is_connected(&self, tenant_id: &str) -> Result<bool> {
        Ok(self.store.load(tenant_id).await?.is_some_and(|c| c.is_active()))
    }

    async fn load_active(&self, tenant_id: &str) -> Result<SyncCredential> {
        match self.store.load(tenant_id).await? {
            Some(credential) if credential.is_active() => Ok(credential),
            Some(_) => {
                debug!(tenant_id, "credential revoked");
                Err(SyncError::NotConnected(tenant_id.to_string()))
            }
            None => Err(SyncError::NotConnected(tenant_id.to_string())),
        }
    }

    async fn refresh(&self, credential: SyncCredential) -> Result<SyncCredential> {
        let tenant_id = credential.tenant_id.clone();
        let grant = self.endpoint.refresh(&credential.refresh_token).await.map_err(|err| {
            warn!(tenant_id = %tenant_id, error = %err, "token refresh failed");
            SyncError::RefreshFailed { tenant_id: tenant_id.clone(), reason: err.to_string() }
        })?;

        let updated = apply_grant(credential, grant)?;
        self.store.save(&updated).await?;

        info!(tenant_id = %tenant_id, expires_at = %updated.expires_at, "refreshed ERP access token");
        Ok(updated)
    }

    fn refresh_lock(&self, tenant_id: &str) -> Arc<Mutex<()>> {
        self.refresh_locks.entry(tenant_id.to_string()).or_default().clone()
    }
}

/// The endpoint may omit the refresh token; the old one stays valid then.
fn apply_grant(previous: SyncCredential, grant: TokenGrant) -> Result<SyncCredential> {
    let now = Utc::now();
    let expires_at = grant_expiry(&previous.tenant_id, &grant, now)?;
    Ok(SyncCredential {
        refresh_token: grant.refresh_token.unwrap_or(previous.refresh_token),
        access_token: grant.access_token,
        expires_at,
        revoked: false,
        updated_at: now,
        tenant_id: previous.tenant_id,
    })
}

fn grant_expiry(tenant_id: &str, grant: &TokenGrant, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    grant.expires_at(now).ok_or_else(|| {
        let err = TokenEndpointError::InvalidResponse(format!(
            "expires_in out of range: {}",
            grant.expires_in
        ));
        warn!(tenant_id, error = %err, "unusable token grant");
        SyncError::RefreshFailed { tenant_id: tenant_id.to_string(), reason: err.to_string() }
    })
}

#[async_trait]
impl AccessTokenProvider for TokenLifecycleManager {
    async fn access_token(&self, tenant_id: &str) -> Result<String> {
        self.get_access_token(tenant_id).await
    }
}
