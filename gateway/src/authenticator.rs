//! Upstream credential exchange.

use crate::errors::{GatewayError, Result};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Token material returned by the upstream credential exchange.
#[derive(Debug, Clone)]
pub struct UpstreamToken {
    pub access_token: String,
    /// Token lifetime in seconds
    pub expires_in: u64,
    /// Tenant-specific base URL, when the platform returns one
    pub base_url: Option<Url>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeResponse {
    access_token: String,
    expires_in: u64,
    base_url: Option<Url>,
}

#[derive(Debug, Deserialize)]
struct ExchangeFailure {
    message: Option<String>,
}

/// Client for the upstream platform's credential-exchange endpoint.
///
/// One attempt per call: any non-success response or transport failure is
/// an authentication failure, and retrying is the caller's decision.
pub struct Authenticator {
    client: reqwest::Client,
    login_url: Url,
}

impl Authenticator {
    pub fn new(login_url: Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| GatewayError::Internal(error.to_string()))?;
        Ok(Self { client, login_url })
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> Result<UpstreamToken> {
        let response = self
            .client
            .post(self.login_url.clone())
            .json(&serde_json::json!({
                "username": username,
                "password": password,
            }))
            .send()
            .await
            .map_err(|error| GatewayError::AuthenticationFailed {
                details: Some(error.to_string()),
            })?;

        let status = response.status();
        if !status.is_success() {
            let details = response
                .json::<ExchangeFailure>()
                .await
                .ok()
                .and_then(|failure| failure.message)
                .or_else(|| status.canonical_reason().map(str::to_string));
            tracing::warn!(username, %status, "upstream credential exchange rejected");
            return Err(GatewayError::AuthenticationFailed { details });
        }

        let exchange: ExchangeResponse =
            response
                .json()
                .await
                .map_err(|error| GatewayError::AuthenticationFailed {
                    details: Some(format!("unexpected exchange response: {error}")),
                })?;

        Ok(UpstreamToken {
            access_token: exchange.access_token,
            expires_in: exchange.expires_in,
            base_url: exchange.base_url,
        })
    }
}
