//! Test fixtures and server helpers.

use homegate_protocol::{Device, DeviceKind, DeviceState};
use homegate_server::{
    ApiServer, AuthConfig, DeviceGateway, MemoryGateway, ServerConfig, TokenLifetime,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Shared secret used by test servers.
pub const TEST_SECRET: &[u8] = b"homegate-test-secret-0123456789";

/// Login password used by test servers.
pub const TEST_PASSWORD: &str = "correct horse battery staple";

/// Auth configuration with the test credentials.
pub fn auth_config() -> AuthConfig {
    AuthConfig::new(TEST_SECRET.to_vec(), TEST_PASSWORD).expect("test credentials are non-empty")
}

/// Auth configuration whose tokens expire `lifetime_ms` after issuance.
pub fn auth_config_with_lifetime(lifetime_ms: i64) -> AuthConfig {
    auth_config().with_lifetime(TokenLifetime::from_millis(lifetime_ms))
}

/// Server configuration bound to an ephemeral loopback port.
pub fn server_config() -> ServerConfig {
    ServerConfig::new(SocketAddr::from(([127, 0, 0, 1], 0)), auth_config())
}

/// A small fleet covering every device kind.
pub fn sample_fleet() -> Vec<Device> {
    vec![
        Device::new("lamp", "Lamp", DeviceKind::Light).with_state(
            DeviceState::new()
                .with_on(false)
                .with_light_level(50)
                .with_temperature(2700.0),
        ),
        Device::new("strip", "Light strip", DeviceKind::Light)
            .with_state(DeviceState::new().with_on(true).with_color(210.0, 0.8)),
        Device::new("plug", "Plug", DeviceKind::Plug).with_state(DeviceState::new().with_on(false)),
        Device::new("sensor", "Motion sensor", DeviceKind::Sensor),
        Device::new("speaker", "Speaker", DeviceKind::Speaker)
            .with_state(DeviceState::new().with_on(true)),
    ]
}

/// An in-memory gateway holding `sample_fleet`.
pub fn sample_gateway() -> Arc<MemoryGateway> {
    Arc::new(MemoryGateway::new(sample_fleet()))
}

/// An in-process server over `gateway`, not bound to any socket.
pub fn test_server(gateway: Arc<MemoryGateway>) -> ApiServer {
    ApiServer::new(server_config(), gateway)
}

/// A server listening on a loopback port, stopped on drop.
pub struct TestServer {
    /// The server.
    pub server: Arc<ApiServer>,
    /// The gateway behind it.
    pub gateway: Arc<MemoryGateway>,
    /// The bound address.
    pub addr: SocketAddr,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Binds `127.0.0.1:0` and serves `gateway` with the test credentials.
    pub async fn start(gateway: Arc<MemoryGateway>) -> Self {
        Self::start_with(server_config(), gateway).await
    }

    /// Binds `127.0.0.1:0` and serves `gateway` with `config`.
    pub async fn start_with(config: ServerConfig, gateway: Arc<MemoryGateway>) -> Self {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("Failed to bind loopback listener");
        let addr = listener.local_addr().expect("Failed to read local address");
        let shared: Arc<dyn DeviceGateway> = gateway.clone();
        let server = Arc::new(ApiServer::new(config, shared));

        let serving = Arc::clone(&server);
        let task = tokio::spawn(async move {
            let _ = serving.serve_on(listener).await;
        });

        Self {
            server,
            gateway,
            addr,
            task,
        }
    }

    /// The `http://` origin of the server.
    pub fn origin(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Issues a valid token without going through `login`.
    pub fn token(&self) -> String {
        self.server.tokens().issue().into_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homegate_protocol::ApiRequest;

    #[test]
    fn fleet_covers_every_kind() {
        let kinds: Vec<_> = sample_fleet().iter().map(|d| d.kind).collect();
        for kind in [
            DeviceKind::Light,
            DeviceKind::Plug,
            DeviceKind::Sensor,
            DeviceKind::Speaker,
        ] {
            assert!(kinds.contains(&kind));
        }
    }

    #[test]
    fn in_process_server_accepts_test_password() {
        let server = test_server(sample_gateway());
        let response = server.handle(
            None,
            &ApiRequest::mutation("login").with_argument("password", TEST_PASSWORD),
        );
        assert!(response.is_ok());
    }

    #[test]
    fn expired_lifetime_config() {
        let config = auth_config_with_lifetime(-1);
        assert_eq!(config.lifetime().as_millis(), -1);
    }
}
