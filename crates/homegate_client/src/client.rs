//! Wiring of session, store, transport and push channel.

use crate::config::ClientConfig;
use crate::controller::DeviceController;
use crate::error::ClientResult;
use crate::http::HttpTransport;
use crate::push::{PushChannel, PushConnector, TungsteniteConnector};
use crate::session::Session;
use crate::store::DeviceStore;
use crate::transport::ApiTransport;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A ready-to-use client.
///
/// The push channel task starts immediately and follows the session: it
/// stays idle until `login` succeeds and reconnects after every token
/// change. Dropping the client stops it.
pub struct HomegateClient {
    controller: DeviceController,
    push: Arc<PushChannel>,
    push_task: JoinHandle<()>,
}

impl HomegateClient {
    /// Connects over HTTP and WebSocket. Must be called within a Tokio
    /// runtime.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self::with_parts(config, transport, Arc::new(TungsteniteConnector)))
    }

    /// Builds a client over custom transports. Must be called within a
    /// Tokio runtime.
    pub fn with_parts(
        config: ClientConfig,
        transport: Arc<dyn ApiTransport>,
        connector: Arc<dyn PushConnector>,
    ) -> Self {
        let session = Arc::new(Session::new());
        let store = Arc::new(DeviceStore::new());
        let push = Arc::new(PushChannel::new(
            config.origin.clone(),
            Arc::clone(&store),
            connector,
            config.reconnect.clone(),
        ));
        let push_task = Arc::clone(&push).spawn(session.subscribe());
        let controller = DeviceController::new(transport, session, store);

        Self {
            controller,
            push,
            push_task,
        }
    }

    /// Returns the controller.
    pub fn controller(&self) -> &DeviceController {
        &self.controller
    }

    /// Returns the device store.
    pub fn store(&self) -> &DeviceStore {
        self.controller.store()
    }

    /// Returns the push channel.
    pub fn push(&self) -> &PushChannel {
        &self.push
    }
}

impl Drop for HomegateClient {
    fn drop(&mut self) {
        self.push_task.abort();
    }
}
