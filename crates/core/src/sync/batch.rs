//! Throttled batch synchronization
//!
//! Items are sent strictly one after another with a fixed pause between
//! them, keeping a batch under the ERP's per-second quota. Each item still
//! gets the full retry budget; one item failing never stops the batch.

use std::sync::Arc;
use std::time::Duration;

use erpsync_domain::constants::DEFAULT_BATCH_ITEM_INTERVAL_MS;
use erpsync_domain::{BatchConfig, OutboundRequest, SyncBatchReport, SyncItem, SyncItemResult};
use tracing::{debug, info, instrument, warn};

use super::classifier::describe_failure;
use super::executor::{RequestExecutor, RetryPolicy};

/// Sends batches of updates sequentially through a [`RequestExecutor`]
pub struct BatchThrottler {
    executor: Arc<RequestExecutor>,
    item_interval: Duration,
    policy: RetryPolicy,
}

impl BatchThrottler {
    pub fn new(executor: Arc<RequestExecutor>, policy: RetryPolicy) -> Self {
        Self {
            executor,
            item_interval: Duration::from_millis(DEFAULT_BATCH_ITEM_INTERVAL_MS),
            policy,
        }
    }

    pub fn from_config(
        executor: Arc<RequestExecutor>,
        policy: RetryPolicy,
        config: &BatchConfig,
    ) -> Self {
        Self::new(executor, policy).with_item_interval(Duration::from_millis(config.item_interval_ms))
    }

    #[must_use]
    pub fn with_item_interval(mut self, interval: Duration) -> Self {
        self.item_interval = interval;
        self
    }

    pub fn item_interval(&self) -> Duration {
        self.item_interval
    }

    /// Send every item with `access_token`, in order
    ///
    /// Always returns one detail per item. Once the policy's cancellation
    /// token fires, the remaining items are reported as failed.
    #[instrument(skip_all, fields(items = items.len(), context = %self.policy.context))]
    pub async fn sync_many(&self, access_token: &str, items: &[SyncItem]) -> SyncBatchReport {
        let mut report = SyncBatchReport::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            if index > 0 && !self.pause().await {
                for skipped in &items[index..] {
                    report.push(SyncItemResult::failed(skipped.id.clone(), "cancelled"));
                }
                break;
            }

            let result = self.sync_one(access_token, item).await;
            if let Some(error) = &result.error {
                warn!(item = %item.id, error = %error, "batch item failed");
            } else {
                debug!(item = %item.id, "batch item synced");
            }
            report.push(result);
        }

        info!(successes = report.successes, failures = report.failures, "batch sync finished");
        report
    }

    async fn sync_one(&self, access_token: &str, item: &SyncItem) -> SyncItemResult {
        let mut request = OutboundRequest::new(item.method, item.url.clone()).bearer(access_token);
        if let Some(body) = &item.body {
            request = request.json_body(body);
        }

        let policy = self.policy.scoped(format!("{}:{}", self.policy.context, item.id));
        match self.executor.execute(&request, &policy).await {
            Ok(outcome) if outcome.response.is_success() => SyncItemResult::ok(item.id.clone()),
            Ok(outcome) => SyncItemResult::failed(item.id.clone(), describe_failure(&outcome.response)),
            Err(err) => SyncItemResult::failed(item.id.clone(), err.to_string()),
        }
    }

    /// Returns false when cancelled during the pause.
    async fn pause(&self) -> bool {
        let sleep = tokio::time::sleep(self.item_interval);
        match &self.policy.cancel {
            Some(token) => tokio::select! {
                () = token.cancelled() => false,
                () = sleep => true,
            },
            None => {
                sleep.await;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use erpsync_domain::{HttpMethod, TransportError, TransportErrorKind, UpstreamResponse};
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::sync::ports::HttpTransport;

    /// Answers by URL suffix and records when each request arrived.
    struct RoutedTransport {
        failing_suffix: &'static str,
        failure: fn() -> std::result::Result<UpstreamResponse, TransportError>,
        seen: Mutex<Vec<(String, Instant, Option<String>)>>,
    }

    impl RoutedTransport {
        fn new(
            failing_suffix: &'static str,
            failure: fn() -> std::result::Result<UpstreamResponse, TransportError>,
        ) -> Arc<Self> {
            Arc::new(Self { failing_suffix, failure, seen: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl HttpTransport for RoutedTransport {
        async fn send(
            &self,
            request: &OutboundRequest,
        ) -> std::result::Result<UpstreamResponse, TransportError> {
            let auth = request
                .headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("authorization"))
                .map(|(_, v)| v.clone());
            self.seen.lock().unwrap().push((request.url.clone(), Instant::now(), auth));
            if request.url.ends_with(self.failing_suffix) {
                (self.failure)()
            } else {
                Ok(UpstreamResponse::new(200, "{}"))
            }
        }
    }

    fn items(n: usize) -> Vec<SyncItem> {
        (1..=n)
            .map(|i| {
                SyncItem::new(format!("item-{i}"), HttpMethod::Put, format!("https://erp.test/p/{i}"))
                    .with_body(serde_json::json!({ "estoque": i }))
            })
            .collect()
    }

    fn throttler(transport: Arc<RoutedTransport>, policy: RetryPolicy) -> BatchThrottler {
        BatchThrottler::new(Arc::new(RequestExecutor::new(transport)), policy)
    }

    #[tokio::test(start_paused = true)]
    async fn one_failing_item_does_not_stop_the_batch() {
        let transport = RoutedTransport::new("/p/3", || {
            Err(TransportError::new(TransportErrorKind::Connect, "connection reset"))
        });
        let policy = RetryPolicy::new("stock").with_max_retries(1);

        let report = throttler(transport.clone(), policy).sync_many("tok", &items(5)).await;

        assert_eq!(report.successes, 4);
        assert_eq!(report.failures, 1);
        assert_eq!(report.len(), 5);
        let failed: Vec<_> = report.details.iter().filter(|d| !d.success).collect();
        assert_eq!(failed[0].id, "item-3");
        assert!(failed[0].error.as_deref().unwrap().contains("connection reset"));
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_rejection_is_reported_with_upstream_message() {
        let transport = RoutedTransport::new("/p/2", || {
            Ok(UpstreamResponse::new(422, r#"{"error":{"message":"Estoque inválido"}}"#))
        });

        let report =
            throttler(transport, RetryPolicy::new("stock")).sync_many("tok", &items(3)).await;

        assert_eq!(report.successes, 2);
        assert_eq!(report.details[1].error.as_deref(), Some("HTTP 422: Estoque inválido"));
    }

    #[tokio::test(start_paused = true)]
    async fn items_are_spaced_by_the_interval() {
        let transport = RoutedTransport::new("never", || Ok(UpstreamResponse::new(500, "")));

        let report = throttler(transport.clone(), RetryPolicy::new("stock"))
            .sync_many("tok", &items(4))
            .await;
        assert_eq!(report.successes, 4);

        let seen = transport.seen.lock().unwrap();
        let urls: Vec<_> = seen.iter().map(|(url, _, _)| url.as_str()).collect();
        assert_eq!(
            urls,
            ["https://erp.test/p/1", "https://erp.test/p/2", "https://erp.test/p/3", "https://erp.test/p/4"]
        );
        for pair in seen.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= Duration::from_millis(350));
        }
        assert!(seen.iter().all(|(_, _, auth)| auth.as_deref() == Some("Bearer tok")));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_batch_is_empty_report() {
        let transport = RoutedTransport::new("never", || Ok(UpstreamResponse::new(500, "")));
        let report = throttler(transport, RetryPolicy::new("stock")).sync_many("tok", &[]).await;

        assert!(report.is_empty());
        assert_eq!(report.successes + report.failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_fails_remaining_items() {
        let transport = RoutedTransport::new("never", || Ok(UpstreamResponse::new(500, "")));
        let token = CancellationToken::new();
        let policy = RetryPolicy::new("stock").with_cancellation(token.clone());
        let throttler = throttler(transport, policy).with_item_interval(Duration::from_secs(10));

        let cancel = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(15)).await;
            token.cancel();
        });
        let report = throttler.sync_many("tok", &items(4)).await;
        cancel.await.unwrap();

        assert_eq!(report.successes, 2);
        assert_eq!(report.failures, 2);
        assert_eq!(report.len(), 4);
        assert!(report.details[2..].iter().all(|d| d.error.as_deref() == Some("cancelled")));
    }

    #[test]
    fn interval_from_config() {
        let transport = RoutedTransport::new("never", || Ok(UpstreamResponse::new(500, "")));
        let throttler = BatchThrottler::from_config(
            Arc::new(RequestExecutor::new(transport)),
            RetryPolicy::default(),
            &BatchConfig { item_interval_ms: 1_000 },
        );
        assert_eq!(throttler.item_interval(), Duration::from_secs(1));
    }
}
