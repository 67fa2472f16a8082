//! Port interfaces for sync operations

use async_trait::async_trait;
use erpsync_domain::{
    EntityPayload, ExternalSyncState, OutboundRequest, Result, TransportError, UpstreamResponse,
};

/// Trait for sending one HTTP request to the ERP
///
/// Implementations never retry; the executor owns the retry budget.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send the request and return whatever the server answered.
    ///
    /// Non-2xx statuses are `Ok`; only failures to obtain a response
    /// (timeout, DNS, reset, unreadable body) are `Err`.
    async fn send(&self, request: &OutboundRequest)
        -> std::result::Result<UpstreamResponse, TransportError>;
}

/// Maps internal entities to ERP resources
pub trait MirrorTarget: Send + Sync {
    /// Build the create (no external id) or update request for a payload.
    fn build_request(&self, access_token: &str, payload: &EntityPayload) -> Result<OutboundRequest>;

    /// Pull the ERP id out of a successful create/update response.
    fn external_id(&self, payload: &EntityPayload, response: &UpstreamResponse) -> Result<String>;
}

/// Row handed to the internal store by the degraded-mode persister
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub payload: EntityPayload,
    /// ERP id to keep for this row, if any.
    pub external_id: Option<String>,
    pub external_state: ExternalSyncState,
    pub sync_warning: Option<String>,
}

/// Trait for the internal entity store
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Insert or update the row and return its internal id.
    async fn persist(&self, record: &EntityRecord) -> Result<String>;

    /// Fetch a row previously written by `persist`.
    async fn find(&self, tenant_id: &str, internal_id: &str) -> Result<Option<EntityRecord>>;
}
