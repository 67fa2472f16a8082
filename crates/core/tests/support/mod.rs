//! Shared test helpers for `erpsync-core` integration tests.
//!
//! In-memory implementations of every core port so the flows can be driven
//! end to end without SQLite or a network.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use erpsync_common::TokenGrant;
use erpsync_core::{
    CredentialStore, EntityRecord, EntityStore, HttpTransport, MirrorTarget, TokenEndpoint,
    TokenEndpointError,
};
use erpsync_domain::{
    EntityPayload, HttpMethod, OutboundRequest, Result, SyncCredential, SyncError, TransportError,
    UpstreamResponse,
};

/// In-memory mock for `CredentialStore`.
#[derive(Default)]
pub struct MockCredentialStore {
    rows: Mutex<HashMap<String, SyncCredential>>,
}

impl MockCredentialStore {
    pub fn with(credentials: impl IntoIterator<Item = SyncCredential>) -> Arc<Self> {
        let store = Self::default();
        {
            let mut rows = store.rows.lock().unwrap();
            for credential in credentials {
                rows.insert(credential.tenant_id.clone(), credential);
            }
        }
        Arc::new(store)
    }

    pub fn get(&self, tenant_id: &str) -> Option<SyncCredential> {
        self.rows.lock().unwrap().get(tenant_id).cloned()
    }
}

#[async_trait]
impl CredentialStore for MockCredentialStore {
    async fn load(&self, tenant_id: &str) -> Result<Option<SyncCredential>> {
        Ok(self.get(tenant_id))
    }

    async fn save(&self, credential: &SyncCredential) -> Result<()> {
        self.rows.lock().unwrap().insert(credential.tenant_id.clone(), credential.clone());
        Ok(())
    }

    async fn revoke(&self, tenant_id: &str) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        Ok(rows.get_mut(tenant_id).is_some_and(|c| !std::mem::replace(&mut c.revoked, true)))
    }
}

/// Token endpoint that issues `access-N` on the N-th refresh.
#[derive(Default)]
pub struct MockTokenEndpoint {
    refreshes: Mutex<u32>,
}

impl MockTokenEndpoint {
    pub fn refreshes(&self) -> u32 {
        *self.refreshes.lock().unwrap()
    }
}

#[async_trait]
impl TokenEndpoint for MockTokenEndpoint {
    async fn exchange_code(
        &self,
        code: &str,
        _redirect_uri: Option<&str>,
    ) -> std::result::Result<TokenGrant, TokenEndpointError> {
        Ok(TokenGrant::new(format!("access-{code}"), Some(format!("refresh-{code}")), 3_600))
    }

    async fn refresh(
        &self,
        refresh_token: &str,
    ) -> std::result::Result<TokenGrant, TokenEndpointError> {
        if refresh_token == "revoked" {
            return Err(TokenEndpointError::Rejected("invalid_grant".into()));
        }
        let mut refreshes = self.refreshes.lock().unwrap();
        *refreshes += 1;
        Ok(TokenGrant::new(format!("access-{refreshes}"), None, 3_600))
    }
}

/// Replays scripted responses and records every request it sees.
#[derive(Default)]
pub struct RecordingTransport {
    script: Mutex<VecDeque<std::result::Result<UpstreamResponse, TransportError>>>,
    fallback: Mutex<Option<UpstreamResponse>>,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, outcome: std::result::Result<UpstreamResponse, TransportError>) {
        self.script.lock().unwrap().push_back(outcome);
    }

    /// Answer used once the script is empty.
    pub fn otherwise(&self, response: UpstreamResponse) {
        *self.fallback.lock().unwrap() = Some(response);
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn send(
        &self,
        request: &OutboundRequest,
    ) -> std::result::Result<UpstreamResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(outcome) => outcome,
            None => Ok(self
                .fallback
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| UpstreamResponse::new(200, "{}"))),
        }
    }
}

/// Mirror that posts to `https://erp.test/{entity_type}` and reads `data.id`.
pub struct SimpleMirror;

impl MirrorTarget for SimpleMirror {
    fn build_request(&self, access_token: &str, payload: &EntityPayload) -> Result<OutboundRequest> {
        let (method, url) = match &payload.external_id {
            Some(id) => (HttpMethod::Put, format!("https://erp.test/{}/{id}", payload.entity_type)),
            None => (HttpMethod::Post, format!("https://erp.test/{}", payload.entity_type)),
        };
        Ok(OutboundRequest::new(method, url).bearer(access_token).json_body(&payload.data))
    }

    fn external_id(&self, payload: &EntityPayload, response: &UpstreamResponse) -> Result<String> {
        let body: serde_json::Value = response.json().unwrap_or_default();
        body["data"]["id"]
            .as_i64()
            .map(|id| id.to_string())
            .or_else(|| payload.external_id.clone())
            .ok_or_else(|| SyncError::Internal("response carried no id".into()))
    }
}

/// In-memory mock for `EntityStore`.
#[derive(Default)]
pub struct MockEntityStore {
    rows: Mutex<Vec<EntityRecord>>,
}

impl MockEntityStore {
    pub fn rows(&self) -> Vec<EntityRecord> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl EntityStore for MockEntityStore {
    async fn persist(&self, record: &EntityRecord) -> Result<String> {
        let mut rows = self.rows.lock().unwrap();
        rows.push(record.clone());
        Ok(format!("row-{}", rows.len()))
    }

    async fn find(&self, _tenant_id: &str, internal_id: &str) -> Result<Option<EntityRecord>> {
        let rows = self.rows.lock().unwrap();
        Ok(internal_id
            .strip_prefix("row-")
            .and_then(|n| n.parse::<usize>().ok())
            .and_then(|n| rows.get(n.wrapping_sub(1)).cloned()))
    }
}
