//! Main API server.

use crate::auth::{TokenClaims, TokenService};
use crate::config::ServerConfig;
use crate::context::{verify_token, RequestContext};
use crate::error::ServerResult;
use crate::gateway::DeviceGateway;
use crate::http;
use crate::push::PushHub;
use crate::resolvers::device_schema;
use crate::schema::Schema;
use homegate_protocol::{ApiRequest, ApiResponse};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// The device API server.
///
/// Owns the token service, the schema and the push hub. Transport code
/// (see `http`) calls `handle` for API requests and `verify_push_token`
/// for push channel handshakes, so both share one authorization check.
///
/// # Example
///
/// ```
/// use homegate_server::{ApiServer, AuthConfig, MemoryGateway, ServerConfig};
/// use homegate_protocol::ApiRequest;
/// use std::sync::Arc;
///
/// let auth = AuthConfig::new(b"secret".to_vec(), "password").unwrap();
/// let config = ServerConfig::new("127.0.0.1:0".parse().unwrap(), auth);
/// let server = ApiServer::new(config, Arc::new(MemoryGateway::new([])));
///
/// let response = server.handle(None, &ApiRequest::query("devices"));
/// assert!(!response.is_ok());
/// ```
pub struct ApiServer {
    config: ServerConfig,
    tokens: Arc<TokenService>,
    gateway: Arc<dyn DeviceGateway>,
    schema: Schema,
    hub: PushHub,
}

impl ApiServer {
    /// Creates a new server over `gateway`.
    pub fn new(config: ServerConfig, gateway: Arc<dyn DeviceGateway>) -> Self {
        let tokens = Arc::new(TokenService::new(config.auth.clone()));
        let schema = device_schema(Arc::clone(&tokens));
        let hub = PushHub::new(config.push_buffer);

        Self {
            config,
            tokens,
            gateway,
            schema,
            hub,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the token service.
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Returns the push hub.
    pub fn hub(&self) -> &PushHub {
        &self.hub
    }

    /// Builds the request context for an `authorization` header value.
    pub fn authenticate(&self, auth_header: Option<&str>) -> RequestContext {
        RequestContext::authenticate(&self.tokens, auth_header, Arc::clone(&self.gateway))
    }

    /// Handles one API request.
    pub fn handle(&self, auth_header: Option<&str>, request: &ApiRequest) -> ApiResponse {
        let ctx = self.authenticate(auth_header);
        self.schema.execute(&ctx, request)
    }

    /// Checks the `token` query parameter of a push handshake.
    pub fn verify_push_token(&self, token: Option<&str>) -> Option<TokenClaims> {
        verify_token(&self.tokens, token)
    }

    /// Binds the configured address and serves until the listener fails.
    pub async fn serve(self: Arc<Self>) -> ServerResult<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_on(listener).await
    }

    /// Serves on an already bound listener.
    pub async fn serve_on(self: Arc<Self>, listener: TcpListener) -> ServerResult<()> {
        let forwarder = self.hub.forward_from(self.gateway.as_ref());
        info!(addr = %listener.local_addr()?, "homegate API listening");

        let app = http::router(Arc::clone(&self));
        let result = axum::serve(listener, app).await;

        if let Some(task) = forwarder {
            task.abort();
        }
        Ok(result?)
    }
}
