//! Client side of the push channel.
//!
//! ```text
//!           no token
//!   Idle ◄──────────────── any state
//!    │ token
//!    ▼
//!   Connecting ──fail──► RetryWait ──delay──► Connecting
//!    │ ok
//!    ▼
//!   Connected ──drop──► Disconnected ──► RetryWait
//! ```
//!
//! A token change at any point drops the current connection and starts
//! over with the new token. Reconnects never give up while a token is
//! held; only the delay between them is bounded.

use crate::config::RetryConfig;
use crate::error::{ClientError, ClientResult};
use crate::store::DeviceStore;
use async_trait::async_trait;
use futures::StreamExt;
use homegate_protocol::PushEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

/// Builds the push channel URL for `origin`.
///
/// The scheme is swapped for its socket equivalent (`http` → `ws`,
/// `https` → `wss`), the path becomes `/ws` and the token is carried in
/// the `token` query parameter.
pub fn push_url(origin: &Url, token: &str) -> ClientResult<Url> {
    let scheme = match origin.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ClientError::InvalidOrigin(format!(
                "unsupported scheme `{other}`"
            )))
        }
    };

    let mut url = origin.clone();
    url.set_scheme(scheme)
        .map_err(|()| ClientError::InvalidOrigin(format!("cannot use scheme `{scheme}`")))?;
    url.set_path("/ws");
    url.set_fragment(None);
    url.query_pairs_mut().clear().append_pair("token", token);
    Ok(url)
}

/// State of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushState {
    /// No token is held; nothing is attempted.
    Idle,
    /// The connection dropped.
    Disconnected,
    /// A handshake is in progress.
    Connecting,
    /// Events are flowing.
    Connected,
    /// Waiting before the next attempt.
    RetryWait,
}

impl PushState {
    /// Returns true while a connection is open or being opened.
    pub fn is_active(&self) -> bool {
        matches!(self, PushState::Connecting | PushState::Connected)
    }
}

/// Opens push connections.
#[async_trait]
pub trait PushConnector: Send + Sync {
    /// Connects to `url`.
    async fn connect(&self, url: &Url) -> ClientResult<Box<dyn PushConnection>>;
}

/// One open push connection.
#[async_trait]
pub trait PushConnection: Send {
    /// Waits for the next event. `Ok(None)` means the server closed the
    /// connection.
    async fn next_event(&mut self) -> ClientResult<Option<PushEvent>>;
}

/// Keeps a push connection open for as long as a session token is held,
/// applying every event to the device store.
pub struct PushChannel {
    origin: Url,
    store: Arc<DeviceStore>,
    connector: Arc<dyn PushConnector>,
    backoff: RetryConfig,
    state: watch::Sender<PushState>,
    events: broadcast::Sender<PushEvent>,
    attempts: AtomicU64,
}

impl PushChannel {
    /// Creates a channel. Nothing happens until `run` or `spawn`.
    pub fn new(
        origin: Url,
        store: Arc<DeviceStore>,
        connector: Arc<dyn PushConnector>,
        backoff: RetryConfig,
    ) -> Self {
        let (state, _) = watch::channel(PushState::Idle);
        let (events, _) = broadcast::channel(64);
        Self {
            origin,
            store,
            connector,
            backoff,
            state,
            events,
            attempts: AtomicU64::new(0),
        }
    }

    /// Current state.
    pub fn state(&self) -> PushState {
        *self.state.borrow()
    }

    /// Watches state transitions.
    pub fn watch_state(&self) -> watch::Receiver<PushState> {
        self.state.subscribe()
    }

    /// Receives every event after it has been applied to the store.
    pub fn subscribe_events(&self) -> broadcast::Receiver<PushEvent> {
        self.events.subscribe()
    }

    /// Number of connection attempts made so far.
    pub fn connect_attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Runs the channel on a new task.
    pub fn spawn(self: Arc<Self>, token: watch::Receiver<Option<String>>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(token).await })
    }

    /// Follows `token` until its sender is dropped.
    pub async fn run(&self, mut token: watch::Receiver<Option<String>>) {
        loop {
            let current = token.borrow_and_update().clone();
            let Some(current) = current else {
                self.set_state(PushState::Idle);
                if token.changed().await.is_err() {
                    break;
                }
                continue;
            };

            let url = match push_url(&self.origin, &current) {
                Ok(url) => url,
                Err(e) => {
                    warn!(error = %e, "cannot build push channel URL");
                    self.set_state(PushState::Idle);
                    if token.changed().await.is_err() {
                        break;
                    }
                    continue;
                }
            };

            tokio::select! {
                changed = token.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    info!("session token changed, reopening push channel");
                }
                () = self.maintain(&url) => {}
            }
        }
        self.set_state(PushState::Idle);
        debug!("session closed, push channel stopped");
    }

    /// Connects, pumps events and reconnects, forever.
    async fn maintain(&self, url: &Url) {
        let mut attempt: u32 = 0;
        loop {
            let delay = self.backoff.delay_for_attempt(attempt);
            if !delay.is_zero() {
                self.set_state(PushState::RetryWait);
                debug!(?delay, attempt, "waiting before reconnect");
                tokio::time::sleep(delay).await;
            }

            self.set_state(PushState::Connecting);
            self.attempts.fetch_add(1, Ordering::SeqCst);

            match self.connector.connect(url).await {
                Ok(mut connection) => {
                    info!("push channel connected");
                    self.set_state(PushState::Connected);
                    self.pump(connection.as_mut()).await;
                    self.set_state(PushState::Disconnected);
                    attempt = 1;
                }
                Err(e) => {
                    warn!(error = %e, attempt, "push channel connect failed");
                    self.set_state(PushState::Disconnected);
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }

    async fn pump(&self, connection: &mut dyn PushConnection) {
        loop {
            match connection.next_event().await {
                Ok(Some(event)) => {
                    self.store.apply_push_event(&event);
                    let _ = self.events.send(event);
                }
                Ok(None) => {
                    info!("push channel closed by server");
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "push channel dropped");
                    return;
                }
            }
        }
    }

    fn set_state(&self, state: PushState) {
        self.state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }
}

/// Connects with `tokio-tungstenite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TungsteniteConnector;

#[async_trait]
impl PushConnector for TungsteniteConnector {
    async fn connect(&self, url: &Url) -> ClientResult<Box<dyn PushConnection>> {
        let (stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| ClientError::transport_retryable(e.to_string()))?;
        Ok(Box::new(TungsteniteConnection { stream }))
    }
}

struct TungsteniteConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl PushConnection for TungsteniteConnection {
    async fn next_event(&mut self) -> ClientResult<Option<PushEvent>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => match PushEvent::from_text(&text) {
                    Ok(event) => return Ok(Some(event)),
                    Err(e) => warn!(error = %e, "skipping undecodable push frame"),
                },
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(ClientError::transport_retryable(e.to_string())),
            }
        }
    }
}
