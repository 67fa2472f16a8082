use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use erpsync_core::HttpTransport;
use erpsync_domain::constants::{DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use erpsync_domain::{
    ErpConfig, HttpMethod, OutboundRequest, SyncError, TransportError, TransportErrorKind,
    UpstreamResponse,
};
use reqwest::header::HeaderMap;
use reqwest::{Client as ReqwestClient, Method};
use tracing::debug;

use crate::errors::{transport_error, InfraError};

/// Single-shot HTTP transport backed by reqwest.
///
/// Never retries: the request executor owns the retry budget, so every call
/// here is exactly one attempt.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: ReqwestClient,
}

impl ReqwestTransport {
    /// Start building a new transport.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, SyncError> {
        Self::builder().build()
    }

    /// Transport using the ERP request timeout and user agent.
    pub fn from_config(config: &ErpConfig) -> Result<Self, SyncError> {
        Self::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
    }

    /// Underlying client, shared with adapters that talk to the same host.
    pub fn client(&self) -> &ReqwestClient {
        &self.client
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<UpstreamResponse, TransportError> {
        let mut builder = self.client.request(to_reqwest_method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        debug!(method = %request.method, url = %request.url, "sending HTTP request");

        let response = builder.send().await.map_err(|err| {
            debug!(method = %request.method, url = %request.url, error = %err, "HTTP request failed");
            transport_error(&err)
        })?;

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|err| TransportError::new(TransportErrorKind::Body, err.to_string()))?;

        debug!(method = %request.method, url = %request.url, status, "received HTTP response");
        Ok(UpstreamResponse { status, headers, body })
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Builder for [`ReqwestTransport`].
#[derive(Debug)]
pub struct ReqwestTransportBuilder {
    timeout: Duration,
    user_agent: String,
    default_headers: Option<HeaderMap>,
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            default_headers: None,
        }
    }
}

impl ReqwestTransportBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    pub fn build(self) -> Result<ReqwestTransport, SyncError> {
        let mut builder =
            ReqwestClient::builder().timeout(self.timeout).user_agent(self.user_agent).no_proxy();

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(|err| SyncError::from(InfraError::from(err)))?;
        Ok(ReqwestTransport { client })
    }
}
