//! Degraded-mode persistence
//!
//! Writes to the internal store always happen. Mirroring to the ERP is
//! best-effort: an inactive integration skips it, a failed mirror is reported
//! as a warning next to the stored row instead of failing the write.

use std::sync::Arc;

use erpsync_domain::{EntityPayload, ExternalSyncState, PersistOutcome, Result, SyncError};
use tracing::{info, instrument, warn};

use super::classifier::describe_failure;
use super::executor::{RequestExecutor, RetryPolicy};
use super::ports::{EntityRecord, EntityStore, MirrorTarget};
use crate::auth::ports::AccessTokenProvider;

const NOT_CONNECTED_NOTE: &str = "ERP integration not active; saved locally only";

struct MirrorResult {
    state: ExternalSyncState,
    external_id: Option<String>,
    warning: Option<String>,
    note: Option<String>,
}

impl MirrorResult {
    fn skipped() -> Self {
        Self {
            state: ExternalSyncState::Skipped,
            external_id: None,
            warning: None,
            note: Some(NOT_CONNECTED_NOTE.to_string()),
        }
    }

    fn succeeded(external_id: String) -> Self {
        Self {
            state: ExternalSyncState::Succeeded,
            external_id: Some(external_id),
            warning: None,
            note: None,
        }
    }

    fn failed(reason: impl std::fmt::Display) -> Self {
        Self {
            state: ExternalSyncState::Failed,
            external_id: None,
            warning: Some(format!("ERP sync failed, saved locally only: {reason}")),
            note: None,
        }
    }
}

/// Creates or updates entities internally, mirroring them to the ERP when
/// possible.
pub struct DegradedModePersister {
    tokens: Arc<dyn AccessTokenProvider>,
    executor: Arc<RequestExecutor>,
    mirror: Arc<dyn MirrorTarget>,
    store: Arc<dyn EntityStore>,
    policy: RetryPolicy,
}

impl DegradedModePersister {
    pub fn new(
        tokens: Arc<dyn AccessTokenProvider>,
        executor: Arc<RequestExecutor>,
        mirror: Arc<dyn MirrorTarget>,
        store: Arc<dyn EntityStore>,
        policy: RetryPolicy,
    ) -> Self {
        Self { tokens, executor, mirror, store, policy }
    }

    /// Persist `payload` internally and try to mirror it to the ERP
    ///
    /// # Errors
    /// Only internal failures (store, internal invariants). ERP problems
    /// are folded into [`PersistOutcome::external`] and `warning`.
    #[instrument(skip_all, fields(tenant_id = %payload.tenant_id, entity = %payload.entity_type))]
    pub async fn create_or_sync(&self, payload: &EntityPayload) -> Result<PersistOutcome> {
        let mirror = match self.tokens.access_token(&payload.tenant_id).await {
            Ok(token) => self.mirror_to_erp(&token, payload).await,
            Err(SyncError::NotConnected(_)) => MirrorResult::skipped(),
            Err(err @ (SyncError::Store(_) | SyncError::Internal(_))) => return Err(err),
            Err(err) => MirrorResult::failed(err.user_message()),
        };

        // A failed mirror keeps whatever ERP id the row already had.
        let stored_external_id =
            mirror.external_id.clone().or_else(|| payload.external_id.clone());
        let record = EntityRecord {
            payload: payload.clone(),
            external_id: stored_external_id,
            external_state: mirror.state,
            sync_warning: mirror.warning.clone(),
        };
        let internal_id = self.store.persist(&record).await?;

        match mirror.state {
            ExternalSyncState::Succeeded => {
                info!(internal_id = %internal_id, "entity saved and mirrored");
            }
            ExternalSyncState::Skipped => {
                info!(internal_id = %internal_id, "entity saved locally, integration inactive");
            }
            ExternalSyncState::Failed => warn!(
                internal_id = %internal_id,
                warning = mirror.warning.as_deref().unwrap_or_default(),
                "entity saved locally, ERP mirror failed"
            ),
        }

        Ok(PersistOutcome {
            internal_id,
            external_id: mirror.external_id,
            external: mirror.state,
            warning: mirror.warning,
            note: mirror.note,
        })
    }

    async fn mirror_to_erp(&self, token: &str, payload: &EntityPayload) -> MirrorResult {
        let request = match self.mirror.build_request(token, payload) {
            Ok(request) => request,
            Err(err) => return MirrorResult::failed(err),
        };

        let policy = self.policy.scoped(format!("{}.{}", self.policy.context, payload.entity_type));
        match self.executor.execute(&request, &policy).await {
            Ok(outcome) if outcome.response.is_success() => {
                match self.mirror.external_id(payload, &outcome.response) {
                    Ok(id) => MirrorResult::succeeded(id),
                    Err(err) => MirrorResult::failed(err),
                }
            }
            Ok(outcome) => MirrorResult::failed(describe_failure(&outcome.response)),
            Err(err) => MirrorResult::failed(err),
        }
    }
}
