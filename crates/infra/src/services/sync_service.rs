//! ERP sync facade.
//!
//! Wires the token lifecycle, request executor, batch throttler and
//! degraded-mode persister to the SQLite stores and the ERP adapters.
//!
//! # Example
//!
//! ```no_run
//! use erpsync_domain::EntityPayload;
//! use erpsync_infra::{config, ErpSyncService};
//!
//! # async fn example() -> erpsync_domain::Result<()> {
//! let service = ErpSyncService::from_config(&config::load()?)?;
//!
//! let outcome = service
//!     .create_or_sync(&EntityPayload::new("acme", "produtos", serde_json::json!({"nome": "Caneta"})))
//!     .await?;
//! if let Some(warning) = outcome.warning {
//!     tracing::warn!(%warning, "saved locally only");
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use erpsync_core::{
    BatchThrottler, DegradedModePersister, MirrorTarget, RequestExecutor, RetryPolicy,
    TokenLifecycleManager, TransientErrorClassifier,
};
use erpsync_domain::constants::DEFAULT_BATCH_ITEM_INTERVAL_MS;
use erpsync_domain::{
    Config, EntityPayload, ExecutionOutcome, ExternalSyncState, OutboundRequest, PersistOutcome,
    Result, SyncBatchReport, SyncCredential, SyncError, SyncItem, SyncItemResult,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::database::{DbManager, SqliteCredentialRepository, SqliteEntityRepository};
use crate::http::ReqwestTransport;
use crate::integrations::erp::{ErpMirror, ErpOAuthClient};

/// Entry point for everything that talks to the ERP.
pub struct ErpSyncService {
    tokens: Arc<TokenLifecycleManager>,
    executor: Arc<RequestExecutor>,
    mirror: Arc<dyn MirrorTarget>,
    entities: Arc<SqliteEntityRepository>,
    oauth: Option<ErpOAuthClient>,
    policy: RetryPolicy,
    item_interval: Duration,
}

impl ErpSyncService {
    /// Build the full stack from configuration: opens (and migrates) the
    /// database and creates the HTTP adapters.
    ///
    /// # Errors
    /// `Config` for invalid settings, `Store` if the database cannot be
    /// opened.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let db = Arc::new(DbManager::from_config(&config.database)?);
        db.run_migrations()?;

        let transport = ReqwestTransport::from_config(&config.erp)?;
        let oauth = ErpOAuthClient::with_client(&config.erp, transport.client().clone());
        let mirror = Arc::new(ErpMirror::new(&config.erp.api_base_url)?);

        let tokens = Arc::new(TokenLifecycleManager::from_config(
            Arc::new(SqliteCredentialRepository::new(Arc::clone(&db))),
            Arc::new(oauth.clone()),
            &config.auth,
        ));
        let executor = Arc::new(
            RequestExecutor::new(Arc::new(transport))
                .with_classifier(TransientErrorClassifier::from_config(&config.classifier)),
        );

        info!(
            api_base_url = %config.erp.api_base_url,
            max_retries = config.retry.max_retries,
            "ERP sync service ready"
        );

        Ok(Self::from_parts(tokens, executor, mirror, Arc::new(SqliteEntityRepository::new(db)))
            .with_oauth_client(oauth)
            .with_policy(RetryPolicy::from_config(&config.retry, "erp"))
            .with_item_interval(Duration::from_millis(config.batch.item_interval_ms)))
    }

    /// Assemble from already-built components, with default retry budget
    /// and batch pacing.
    pub fn from_parts(
        tokens: Arc<TokenLifecycleManager>,
        executor: Arc<RequestExecutor>,
        mirror: Arc<dyn MirrorTarget>,
        entities: Arc<SqliteEntityRepository>,
    ) -> Self {
        Self {
            tokens,
            executor,
            mirror,
            entities,
            oauth: None,
            policy: RetryPolicy::new("erp"),
            item_interval: Duration::from_millis(DEFAULT_BATCH_ITEM_INTERVAL_MS),
        }
    }

    #[must_use]
    pub fn with_oauth_client(mut self, oauth: ErpOAuthClient) -> Self {
        self.oauth = Some(oauth);
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_item_interval(mut self, interval: Duration) -> Self {
        self.item_interval = interval;
        self
    }

    /// Abort backoff waits and remaining batch items once `token` fires.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.policy = self.policy.with_cancellation(token);
        self
    }

    pub fn tokens(&self) -> &Arc<TokenLifecycleManager> {
        &self.tokens
    }

    /* ------------------------------------------------------------------ */
    /* Integration setup / teardown */
    /* ------------------------------------------------------------------ */

    /// Consent page URL for connecting a tenant.
    pub fn authorization_url(&self, state: &str) -> Result<String> {
        self.oauth
            .as_ref()
            .ok_or_else(|| SyncError::Config("no OAuth client configured".into()))?
            .authorization_url(state)
    }

    pub async fn connect(
        &self,
        tenant_id: &str,
        code: &str,
        redirect_uri: Option<&str>,
    ) -> Result<SyncCredential> {
        self.tokens.connect(tenant_id, code, redirect_uri).await
    }

    pub async fn disconnect(&self, tenant_id: &str) -> Result<bool> {
        self.tokens.disconnect(tenant_id).await
    }

    pub async fn is_connected(&self, tenant_id: &str) -> Result<bool> {
        self.tokens.is_connected(tenant_id).await
    }

    pub async fn get_access_token(&self, tenant_id: &str) -> Result<String> {
        self.tokens.get_access_token(tenant_id).await
    }

    /* ------------------------------------------------------------------ */
    /* Upstream calls */
    /* ------------------------------------------------------------------ */

    /// Run one request with the configured retry budget, logged under
    /// `context`.
    pub async fn execute(
        &self,
        request: &OutboundRequest,
        context: &str,
    ) -> Result<ExecutionOutcome> {
        self.executor.execute(request, &self.policy.scoped(context)).await
    }

    /// Create or update an entity, mirroring it to the ERP when possible.
    pub async fn create_or_sync(&self, payload: &EntityPayload) -> Result<PersistOutcome> {
        self.persister().create_or_sync(payload).await
    }

    /// Send `items` in order with an already-obtained token.
    pub async fn sync_many(&self, access_token: &str, items: &[SyncItem]) -> SyncBatchReport {
        self.throttler().sync_many(access_token, items).await
    }

    /// Send `items` for a tenant
    ///
    /// When no usable token can be obtained every item is reported failed
    /// with the token error, still one result per item.
    ///
    /// # Errors
    /// Only store or internal failures while reading the credential.
    #[instrument(skip_all, fields(tenant_id = %tenant_id, items = items.len()))]
    pub async fn sync_many_for_tenant(
        &self,
        tenant_id: &str,
        items: &[SyncItem],
    ) -> Result<SyncBatchReport> {
        match self.tokens.get_access_token(tenant_id).await {
            Ok(token) => Ok(self.sync_many(&token, items).await),
            Err(err @ (SyncError::Store(_) | SyncError::Internal(_))) => Err(err),
            Err(err) => {
                warn!(error = %err, "no ERP token, failing whole batch");
                let reason = err.to_string();
                let mut report = SyncBatchReport::with_capacity(items.len());
                for item in items {
                    report.push(SyncItemResult::failed(item.id.clone(), reason.clone()));
                }
                Ok(report)
            }
        }
    }

    /// Retry the ERP mirror for every row of the tenant whose last attempt
    /// failed, oldest first
    ///
    /// Returns one result per row, in order. A row that cannot be stored
    /// again does not stop the rest; rows already re-synced stay committed.
    ///
    /// # Errors
    /// Only when the failed rows cannot be listed.
    #[instrument(skip(self))]
    pub async fn resync_failed(&self, tenant_id: &str) -> Result<Vec<Result<PersistOutcome>>> {
        let pending = self.entities.list_by_state(tenant_id, ExternalSyncState::Failed).await?;
        let persister = self.persister();

        let mut outcomes = Vec::with_capacity(pending.len());
        for record in pending {
            let outcome = persister.create_or_sync(&record.payload).await;
            if let Err(err) = &outcome {
                warn!(
                    internal_id = record.payload.local_id.as_deref().unwrap_or_default(),
                    error = %err,
                    "failed row could not be re-synced"
                );
            }
            outcomes.push(outcome);
        }

        let recovered = outcomes
            .iter()
            .filter(|o| matches!(o, Ok(outcome) if outcome.external == ExternalSyncState::Succeeded))
            .count();
        info!(pending = outcomes.len(), recovered, "failed rows re-synced");
        Ok(outcomes)
    }

    fn persister(&self) -> DegradedModePersister {
        DegradedModePersister::new(
            Arc::clone(&self.tokens) as _,
            Arc::clone(&self.executor),
            Arc::clone(&self.mirror),
            Arc::clone(&self.entities) as _,
            self.policy.scoped(format!("{}.mirror", self.policy.context)),
        )
    }

    fn throttler(&self) -> BatchThrottler {
        BatchThrottler::new(
            Arc::clone(&self.executor),
            self.policy.scoped(format!("{}.batch", self.policy.context)),
        )
        .with_item_interval(self.item_interval)
    }
}
