//! HTTP transport over `reqwest`.

use crate::config::{ClientConfig, RetryConfig};
use crate::error::{ClientError, ClientResult};
use crate::transport::ApiTransport;
use async_trait::async_trait;
use homegate_protocol::{ApiRequest, ApiResponse};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Posts API requests to `{origin}/graphql`.
///
/// Retryable failures are retried according to the configured
/// `RetryConfig`; API-level errors in a well-formed response are returned
/// as-is.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
    retry: RetryConfig,
}

impl HttpTransport {
    /// Creates a transport for `config`.
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: config.api_url()?,
            timeout: config.request_timeout,
            retry: config.retry.clone(),
        })
    }

    /// Returns the endpoint URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn post_once(&self, body: Vec<u8>, authorization: &str) -> ClientResult<ApiResponse> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, authorization)
            .body(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;

        match ApiResponse::decode(&bytes) {
            Ok(decoded) => Ok(decoded),
            Err(_) if status.is_server_error() => Err(ClientError::transport_retryable(format!(
                "server returned {status}"
            ))),
            Err(_) if !status.is_success() => Err(ClientError::transport_fatal(format!(
                "server returned {status}"
            ))),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    async fn execute(&self, request: &ApiRequest, authorization: &str) -> ClientResult<ApiResponse> {
        let body = request.encode()?;
        let mut attempt = 0;

        loop {
            tokio::time::sleep(self.retry.delay_for_attempt(attempt)).await;
            attempt += 1;

            match self.post_once(body.clone(), authorization).await {
                Ok(response) => {
                    debug!(field = %request.field, ok = response.is_ok(), "api call completed");
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    warn!(field = %request.field, attempt, error = %e, "api call failed, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::Timeout
    } else if e.is_connect() || e.is_request() || e.is_body() {
        ClientError::transport_retryable(e.to_string())
    } else {
        ClientError::transport_fatal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_graphql() {
        let config = ClientConfig::new("https://home.example.com").unwrap();
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(transport.endpoint().as_str(), "https://home.example.com/graphql");
    }

    #[tokio::test]
    async fn unreachable_server_is_retryable() {
        // Port 9 (discard) on loopback is closed in test environments.
        let config = ClientConfig::new("http://127.0.0.1:9")
            .unwrap()
            .with_retry(RetryConfig::no_retry());
        let transport = HttpTransport::new(&config).unwrap();

        let err = transport
            .execute(&ApiRequest::query("isLoggedIn"), "")
            .await
            .unwrap_err();
        assert!(err.is_retryable(), "{err:?}");
    }
}
