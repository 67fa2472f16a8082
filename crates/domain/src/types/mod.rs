//! Domain types and models

pub mod credential;
pub mod entity;
pub mod http;
pub mod sync;

pub use credential::SyncCredential;
pub use entity::{EntityPayload, ExternalSyncState, PersistOutcome};
pub use http::{HttpMethod, OutboundRequest, TransportError, TransportErrorKind, UpstreamResponse};
pub use sync::{
    Classification, ExecutionOutcome, RetryAttempt, SyncBatchReport, SyncItem, SyncItemResult,
};
