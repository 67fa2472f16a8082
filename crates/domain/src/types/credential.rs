//! Per-tenant ERP credential

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// OAuth credential a tenant holds for the ERP integration.
///
/// Created on integration setup, mutated only by the token lifecycle manager
/// (refresh, disconnect), read before every outbound call. Writes are
/// last-write-wins.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncCredential {
    pub tenant_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub revoked: bool,
    pub updated_at: DateTime<Utc>,
}

impl SyncCredential {
    pub fn new(
        tenant_id: impl Into<String>,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
            revoked: false,
            updated_at: Utc::now(),
        }
    }

    /// True when the access token expires within `horizon` of `now`.
    pub fn expires_within(&self, horizon: Duration, now: DateTime<Utc>) -> bool {
        now + horizon >= self.expires_at
    }

    /// A credential is usable unless it was revoked.
    pub fn is_active(&self) -> bool {
        !self.revoked
    }
}

// Tokens stay out of logs.
impl std::fmt::Debug for SyncCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCredential")
            .field("tenant_id", &self.tenant_id)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("revoked", &self.revoked)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}
