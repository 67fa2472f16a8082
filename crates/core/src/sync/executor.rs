//! Retrying request executor
//!
//! Sends one logical request up to `max_retries + 1` times. Transient
//! responses (see [`TransientErrorClassifier`]) and transport failures are
//! retried after a [`BackoffScheduler`] delay; anything else is handed back to
//! the caller untouched. Only the current call is suspended while waiting.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use erpsync_common::BackoffScheduler;
use erpsync_domain::constants::{
    DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_DELAY_MS, DEFAULT_MAX_RETRIES, RETRY_AFTER_HEADER,
};
use erpsync_domain::{
    Classification, ExecutionOutcome, OutboundRequest, RateLimitExhaustedError, Result,
    RetryAttempt, RetryConfig, SyncError, TransportError, UpstreamResponse,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::classifier::TransientErrorClassifier;
use super::ports::HttpTransport;

/// Retry budget for one logical call
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Label used in logs and in the rate-limit error message.
    pub context: String,
    /// Aborts a pending backoff wait.
    pub cancel: Option<CancellationToken>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            context: "erp request".to_string(),
            cancel: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(context: impl Into<String>) -> Self {
        Self { context: context.into(), ..Self::default() }
    }

    pub fn from_config(config: &RetryConfig, context: impl Into<String>) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
            context: context.into(),
            cancel: None,
        }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_delays(mut self, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self.max_delay_ms = max_delay_ms;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Same budget under a different log context.
    #[must_use]
    pub fn scoped(&self, context: impl Into<String>) -> Self {
        Self { context: context.into(), ..self.clone() }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

/// Executes requests through an [`HttpTransport`] with bounded retries.
pub struct RequestExecutor {
    transport: Arc<dyn HttpTransport>,
    classifier: TransientErrorClassifier,
    scheduler: BackoffScheduler,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            classifier: TransientErrorClassifier::default(),
            scheduler: BackoffScheduler::default(),
        }
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: TransientErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn with_scheduler(mut self, scheduler: BackoffScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn classifier(&self) -> &TransientErrorClassifier {
        &self.classifier
    }

    /// Send `request`, retrying transient failures within `policy`.
    ///
    /// # Errors
    ///
    /// - [`SyncError::RateLimitExhausted`] when the budget ran out and any
    ///   attempt was rate limited.
    /// - [`SyncError::Connectivity`] when the budget ran out on a transport
    ///   failure.
    /// - [`SyncError::Cancelled`] when `policy.cancel` fired.
    ///
    /// A non-transient response, or the last transient one when no rate
    /// limit was seen, is returned as `Ok` whatever its status.
    pub async fn execute(
        &self,
        request: &OutboundRequest,
        policy: &RetryPolicy,
    ) -> Result<ExecutionOutcome> {
        let mut had_rate_limit = false;
        let mut attempts: Vec<RetryAttempt> = Vec::new();
        let mut last_response: Option<UpstreamResponse> = None;
        let mut last_transport_error: Option<TransportError> = None;
        let mut last_hint_ms: Option<u64> = None;

        for attempt in 0..=policy.max_retries {
            if policy.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let (classification, status, wait_hint) = match self.transport.send(request).await {
                Ok(response) => {
                    let classification = self.classifier.classify_response(&response);
                    if !classification.transient {
                        return Ok(ExecutionOutcome {
                            response,
                            retries_used: attempt,
                            had_rate_limit,
                            attempts,
                        });
                    }
                    had_rate_limit |= classification.is_rate_limit;

                    let status = response.status;
                    let hint = response.header(RETRY_AFTER_HEADER).map(str::to_owned);
                    last_response = Some(response);
                    last_transport_error = None;
                    (classification, Some(status), hint)
                }
                Err(err) => {
                    debug!(
                        context = %policy.context,
                        method = %request.method,
                        error = %err,
                        "transport failure"
                    );
                    last_transport_error = Some(err);
                    (Classification::TRANSIENT, None, None)
                }
            };

            if attempt == policy.max_retries {
                break;
            }

            let delay = self.scheduler.schedule(
                attempt,
                policy.base_delay_ms,
                policy.max_delay_ms,
                classification.is_rate_limit,
                wait_hint.as_deref(),
                Utc::now(),
            );
            if delay.hint_ms.is_some() {
                last_hint_ms = delay.hint_ms;
            }

            warn!(
                context = %policy.context,
                attempt = attempt + 1,
                max_retries = policy.max_retries,
                status = ?status,
                classification = classification.label(),
                delay_ms = delay.delay_ms,
                "retrying upstream call"
            );
            attempts.push(RetryAttempt {
                index: attempt,
                status,
                classification,
                delay_ms: delay.delay_ms,
            });

            wait(delay.delay_ms, policy).await?;
        }

        if had_rate_limit {
            let last_status = last_response.as_ref().map_or(429, |r| r.status);
            warn!(
                context = %policy.context,
                retries = policy.max_retries,
                last_status,
                "rate limit budget exhausted"
            );
            return Err(RateLimitExhaustedError::new(
                &policy.context,
                policy.max_retries,
                last_status,
            )
            .with_retry_after_ms(last_hint_ms)
            .into());
        }

        if let Some(err) = last_transport_error {
            warn!(context = %policy.context, error = %err, "upstream unreachable");
            return Err(SyncError::Connectivity {
                attempts: policy.max_retries.saturating_add(1),
                message: err.to_string(),
            });
        }

        match last_response {
            Some(response) => {
                warn!(
                    context = %policy.context,
                    status = response.status,
                    "retry budget exhausted, returning last response"
                );
                Ok(ExecutionOutcome {
                    response,
                    retries_used: policy.max_retries,
                    had_rate_limit,
                    attempts,
                })
            }
            None => Err(SyncError::Internal(format!(
                "{}: retry loop finished without an outcome",
                policy.context
            ))),
        }
    }
}

async fn wait(delay_ms: u64, policy: &RetryPolicy) -> Result<()> {
    let sleep = tokio::time::sleep(Duration::from_millis(delay_ms));
    match &policy.cancel {
        Some(token) => tokio::select! {
            () = token.cancelled() => Err(SyncError::Cancelled),
            () = sleep => Ok(()),
        },
        None => {
            sleep.await;
            Ok(())
        }
    }
}
