//! OAuth2 token endpoint client for the ERP.
//!
//! Client credentials are sent with HTTP Basic authentication and grant
//! parameters as an `application/x-www-form-urlencoded` body.

use std::time::Duration;

use async_trait::async_trait;
use erpsync_common::{OAuthErrorBody, TokenGrant, TokenResponse};
use erpsync_core::{extract_error_message, TokenEndpoint, TokenEndpointError};
use erpsync_domain::{ErpConfig, Result, SyncError};
use reqwest::{Client as ReqwestClient, StatusCode};
use tracing::{debug, instrument};
use url::Url;

use crate::errors::{transport_error, InfraError};

/// Token endpoint adapter for the ERP's authorization server.
#[derive(Clone)]
pub struct ErpOAuthClient {
    client: ReqwestClient,
    token_url: String,
    authorize_url: Option<String>,
    client_id: String,
    client_secret: String,
    redirect_uri: Option<String>,
}

impl ErpOAuthClient {
    /// Build a client with its own connection pool.
    pub fn new(config: &ErpConfig) -> Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .no_proxy()
            .build()
            .map_err(|err| SyncError::from(InfraError::from(err)))?;
        Ok(Self::with_client(config, client))
    }

    /// Reuse an existing reqwest client (e.g. the transport's).
    pub fn with_client(config: &ErpConfig, client: ReqwestClient) -> Self {
        Self {
            client,
            token_url: config.token_url.clone(),
            authorize_url: config.authorize_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
        }
    }

    /// Consent page URL a tenant administrator is sent to when connecting.
    ///
    /// # Errors
    /// `Config` if no authorize URL is configured or it does not parse.
    pub fn authorization_url(&self, state: &str) -> Result<String> {
        let base = self
            .authorize_url
            .as_deref()
            .ok_or_else(|| SyncError::Config("erp.authorize_url is not configured".into()))?;

        let mut params: Vec<(&str, &str)> = vec![
            ("response_type", "code"),
            ("client_id", self.client_id.as_str()),
            ("state", state),
        ];
        if let Some(redirect_uri) = self.redirect_uri.as_deref() {
            params.push(("redirect_uri", redirect_uri));
        }

        let url = Url::parse_with_params(base, &params)
            .map_err(|err| SyncError::Config(format!("invalid erp.authorize_url: {err}")))?;
        Ok(url.into())
    }

    async fn request_grant(
        &self,
        params: &[(&str, &str)],
    ) -> std::result::Result<TokenGrant, TokenEndpointError> {
        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header("Accept", "application/json")
            .form(params)
            .send()
            .await
            .map_err(|err| TokenEndpointError::Unavailable(transport_error(&err).to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| TokenEndpointError::Unavailable(transport_error(&err).to_string()))?;
        debug!(status = status.as_u16(), "token endpoint responded");

        if status.is_success() {
            let token: TokenResponse = serde_json::from_str(&body)
                .map_err(|err| TokenEndpointError::InvalidResponse(err.to_string()))?;
            return Ok(token.into());
        }

        Err(classify_failure(status, &body))
    }
}

fn classify_failure(status: StatusCode, body: &str) -> TokenEndpointError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return TokenEndpointError::Unavailable(format!(
            "HTTP {}: {}",
            status.as_u16(),
            extract_error_message(body)
        ));
    }

    match serde_json::from_str::<OAuthErrorBody>(body) {
        Ok(oauth_error) => TokenEndpointError::Rejected(oauth_error.to_string()),
        Err(_) => TokenEndpointError::Rejected(format!(
            "HTTP {}: {}",
            status.as_u16(),
            extract_error_message(body)
        )),
    }
}

#[async_trait]
impl TokenEndpoint for ErpOAuthClient {
    #[instrument(skip_all)]
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: Option<&str>,
    ) -> std::result::Result<TokenGrant, TokenEndpointError> {
        let mut params = vec![("grant_type", "authorization_code"), ("code", code)];
        if let Some(uri) = redirect_uri.or(self.redirect_uri.as_deref()) {
            params.push(("redirect_uri", uri));
        }
        self.request_grant(&params).await
    }

    #[instrument(skip_all)]
    async fn refresh(
        &self,
        refresh_token: &str,
    ) -> std::result::Result<TokenGrant, TokenEndpointError> {
        self.request_grant(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)])
            .await
    }
}
