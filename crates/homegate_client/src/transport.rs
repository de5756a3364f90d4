//! API transport abstraction.

use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use homegate_protocol::{ApiRequest, ApiResponse};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

/// Carries API requests to the server.
///
/// `authorization` is the session token or the empty string; the server
/// treats both an empty and an invalid value as unauthenticated.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    /// Executes one request.
    async fn execute(&self, request: &ApiRequest, authorization: &str) -> ClientResult<ApiResponse>;
}

/// A request recorded by `MockTransport`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    /// The request.
    pub request: ApiRequest,
    /// The `authorization` value it was sent with.
    pub authorization: String,
}

/// A scripted transport for testing.
///
/// Responses are returned in the order they were queued.
#[derive(Debug)]
pub struct MockTransport {
    connected: AtomicBool,
    responses: Mutex<VecDeque<ClientResult<ApiResponse>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queues a response.
    pub fn push_response(&self, response: ApiResponse) {
        self.responses.lock().push_back(Ok(response));
    }

    /// Queues a failure.
    pub fn push_error(&self, error: ClientError) {
        self.responses.lock().push_back(Err(error));
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Returns every request seen so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApiTransport for MockTransport {
    async fn execute(&self, request: &ApiRequest, authorization: &str) -> ClientResult<ApiResponse> {
        self.requests.lock().push(RecordedRequest {
            request: request.clone(),
            authorization: authorization.to_string(),
        });
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ClientError::transport_retryable("connection refused"));
        }
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::UnexpectedResponse("no mock response queued".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn mock_returns_in_order() {
        let transport = MockTransport::new();
        transport.push_response(ApiResponse::ok(json!(1)));
        transport.push_response(ApiResponse::ok(json!(2)));

        let request = ApiRequest::query("isLoggedIn");
        let first = transport.execute(&request, "").await.unwrap();
        let second = transport.execute(&request, "tok").await.unwrap();

        assert_eq!(first.data, Some(json!(1)));
        assert_eq!(second.data, Some(json!(2)));
        assert_eq!(transport.requests()[1].authorization, "tok");
    }

    #[tokio::test]
    async fn mock_disconnected() {
        let transport = MockTransport::new();
        transport.set_connected(false);

        let result = transport.execute(&ApiRequest::query("devices"), "").await;
        assert!(result.unwrap_err().is_retryable());
    }

    #[tokio::test]
    async fn mock_without_script() {
        let transport = MockTransport::new();
        let result = transport.execute(&ApiRequest::query("devices"), "").await;
        assert!(matches!(result, Err(ClientError::UnexpectedResponse(_))));
    }
}
