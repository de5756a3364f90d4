//! Optimistic device control.

use crate::error::{ClientError, ClientResult};
use crate::session::Session;
use crate::store::{DeviceStore, SyncOutcome};
use crate::transport::ApiTransport;
use homegate_protocol::{ApiRequest, Device, DeviceState, PushEvent};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Drives user edits through the store and the API.
///
/// An edit is applied to the store's optimistic overlay first, then sent
/// as a `setDeviceState` mutation; the device returned by the server is
/// synced back with its revision, so a push that already delivered a newer
/// revision is not overridden by a slow response.
pub struct DeviceController {
    transport: Arc<dyn ApiTransport>,
    session: Arc<Session>,
    store: Arc<DeviceStore>,
}

impl DeviceController {
    /// Creates a controller.
    pub fn new(
        transport: Arc<dyn ApiTransport>,
        session: Arc<Session>,
        store: Arc<DeviceStore>,
    ) -> Self {
        Self {
            transport,
            session,
            store,
        }
    }

    /// Returns the device store.
    pub fn store(&self) -> &Arc<DeviceStore> {
        &self.store
    }

    /// Returns the session.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Exchanges the password for a session token.
    pub async fn login(&self, password: &str) -> ClientResult<()> {
        let request = ApiRequest::mutation("login").with_argument("password", password);
        let token: String = self.call(&request).await?;
        self.session.set_token(token);
        info!("logged in");
        Ok(())
    }

    /// Discards the token and everything learned under it.
    ///
    /// The token stays valid on the server until it expires.
    pub fn logout(&self) {
        self.session.clear();
        self.store.clear();
    }

    /// Asks the server whether the held token is accepted.
    pub async fn is_logged_in(&self) -> ClientResult<bool> {
        self.call(&ApiRequest::query("isLoggedIn")).await
    }

    /// Fetches every device and syncs it into the store.
    pub async fn refresh_devices(&self) -> ClientResult<Vec<Device>> {
        self.require_session()?;
        let devices: Vec<Device> = self.call(&ApiRequest::query("devices")).await?;
        for device in &devices {
            self.store.sync_device(device);
        }
        debug!(count = devices.len(), "devices refreshed");
        Ok(devices)
    }

    /// Fetches one device and syncs it into the store.
    pub async fn refresh_device(&self, device_id: &str) -> ClientResult<Device> {
        self.require_session()?;
        let request = ApiRequest::query("device").with_argument("id", device_id);
        let device: Device = self.call(&request).await?;
        self.store.sync_device(&device);
        Ok(device)
    }

    /// Applies `patch` optimistically, then sends it to the server.
    ///
    /// - No session token: fails with `NotLoggedIn` and leaves the store
    ///   untouched.
    /// - Success: the returned device is synced into the store.
    /// - The server rejects the edit: the optimistic values are discarded
    ///   and the API error is returned.
    /// - Transport failure: the optimistic values stay in place and the
    ///   error is returned; a later push or refresh reconciles them.
    pub async fn set_device_state(&self, device_id: &str, patch: DeviceState) -> ClientResult<Device> {
        self.require_session()?;
        self.store.apply_optimistic(device_id, &patch);

        let mut request = ApiRequest::mutation("setDeviceState").with_argument("id", device_id);
        if let Value::Object(fields) = serde_json::to_value(&patch)? {
            request.arguments.extend(fields);
        }

        match self.call::<Device>(&request).await {
            Ok(device) => {
                let outcome = self.store.sync_device(&device);
                // The edit is settled; newer server truth already replaced it.
                let superseded: Vec<_> = outcome
                    .stale
                    .into_iter()
                    .filter(|a| a.present_in(&patch))
                    .collect();
                if !superseded.is_empty() {
                    debug!(device_id, ?superseded, "response older than pushed state");
                    self.store.discard_attributes(device_id, &superseded);
                }
                Ok(device)
            }
            Err(ClientError::Api(error)) => {
                warn!(device_id, %error, "edit rejected, reverting");
                self.store.discard_optimistic(device_id, &patch);
                Err(ClientError::Api(error))
            }
            Err(e) => {
                warn!(device_id, error = %e, "edit not confirmed, keeping optimistic state");
                Err(e)
            }
        }
    }

    /// Turns a device on or off.
    pub async fn set_device_on(&self, device_id: &str, is_on: bool) -> ClientResult<Device> {
        self.set_device_state(device_id, DeviceState::new().with_on(is_on))
            .await
    }

    /// Sets a light's brightness.
    pub async fn set_light_level(&self, device_id: &str, level: u8) -> ClientResult<Device> {
        self.set_device_state(device_id, DeviceState::new().with_light_level(level))
            .await
    }

    /// Sets a light's color. Hue and saturation always travel together.
    pub async fn set_color(&self, device_id: &str, hue: f64, saturation: f64) -> ClientResult<Device> {
        self.set_device_state(device_id, DeviceState::new().with_color(hue, saturation))
            .await
    }

    /// Sets a light's color temperature.
    pub async fn set_temperature(&self, device_id: &str, kelvin: f64) -> ClientResult<Device> {
        self.set_device_state(device_id, DeviceState::new().with_temperature(kelvin))
            .await
    }

    /// Applies a push channel frame to the store.
    pub fn apply_push_event(&self, event: &PushEvent) -> SyncOutcome {
        self.store.apply_push_event(event)
    }

    fn require_session(&self) -> ClientResult<()> {
        if self.session.is_logged_in() {
            Ok(())
        } else {
            Err(ClientError::NotLoggedIn)
        }
    }

    async fn call<T: DeserializeOwned>(&self, request: &ApiRequest) -> ClientResult<T> {
        let response = self
            .transport
            .execute(request, &self.session.authorization())
            .await?;

        if let Some(error) = response.first_error() {
            return Err(ClientError::Api(error.clone()));
        }
        let data = response
            .data
            .ok_or_else(|| ClientError::UnexpectedResponse(format!("`{}` returned no data", request.field)))?;
        serde_json::from_value(data)
            .map_err(|e| ClientError::UnexpectedResponse(format!("`{}`: {e}", request.field)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use homegate_protocol::{ApiError, ApiResponse, DeviceKind, ErrorCode};
    use serde_json::json;

    fn logged_in() -> (DeviceController, Arc<MockTransport>) {
        let (controller, transport) = controller();
        controller.session().set_token("tok");
        (controller, transport)
    }

    fn controller() -> (DeviceController, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::new());
        let controller = DeviceController::new(
            Arc::clone(&transport) as Arc<dyn ApiTransport>,
            Arc::new(Session::new()),
            Arc::new(DeviceStore::new()),
        );
        (controller, transport)
    }

    fn lamp(revision: u64, state: DeviceState) -> Device {
        let mut device = Device::new("lamp", "Lamp", DeviceKind::Light).with_state(state);
        device.revision = revision;
        device
    }

    #[tokio::test]
    async fn login_stores_token_and_sends_it() {
        let (controller, transport) = controller();
        transport.push_response(ApiResponse::ok(json!("tok-123")));
        transport.push_response(ApiResponse::ok(json!(true)));

        controller.login("pw").await.unwrap();
        assert!(controller.is_logged_in().await.unwrap());

        let sent = transport.requests();
        assert_eq!(sent[0].authorization, "");
        assert_eq!(sent[0].request.string_argument("password").unwrap(), "pw");
        assert_eq!(sent[1].authorization, "tok-123");
    }

    #[tokio::test]
    async fn wrong_password() {
        let (controller, transport) = controller();
        transport.push_response(ApiResponse::error(ApiError::new(
            ErrorCode::Unauthenticated,
            "Invalid credentials",
        )));

        let err = controller.login("nope").await.unwrap_err();
        assert!(err.is_unauthenticated());
        assert!(!controller.session().is_logged_in());
    }

    #[tokio::test]
    async fn edit_is_optimistic_then_confirmed() {
        let (controller, transport) = logged_in();
        let confirmed = lamp(4, DeviceState::new().with_on(true).with_light_level(30));
        transport.push_response(ApiResponse::ok(serde_json::to_value(&confirmed).unwrap()));

        let device = controller.set_light_level("lamp", 30).await.unwrap();

        assert_eq!(device.revision, 4);
        assert_eq!(controller.store().light_level("lamp"), 30);
        assert!(controller.store().is_on("lamp"));
        assert!(controller.store().pending_attributes("lamp").is_empty());

        let sent = &transport.requests()[0].request;
        assert_eq!(sent.field, "setDeviceState");
        assert_eq!(sent.arguments.get("lightLevel"), Some(&json!(30)));
        assert!(sent.arguments.get("isOn").is_none());
    }

    #[tokio::test]
    async fn transport_failure_keeps_optimistic_value() {
        let (controller, transport) = logged_in();
        transport.set_connected(false);

        let err = controller.set_device_on("lamp", true).await.unwrap_err();

        assert!(err.is_retryable());
        assert!(controller.store().is_on("lamp"));
        assert!(controller.store().view("lamp").pending);
    }

    #[tokio::test]
    async fn rejected_edit_is_reverted() {
        let (controller, transport) = logged_in();
        controller
            .store()
            .sync_device_state("lamp", &DeviceState::new().with_light_level(10), Some(1));
        transport.push_response(ApiResponse::error(ApiError::new(
            ErrorCode::BadUserInput,
            "lightLevel out of range",
        )));

        let err = controller.set_light_level("lamp", 90).await.unwrap_err();

        assert!(!err.is_retryable());
        assert_eq!(controller.store().light_level("lamp"), 10);
        assert!(controller.store().pending_attributes("lamp").is_empty());
    }

    #[tokio::test]
    async fn gated_calls_need_a_session() {
        let (controller, transport) = controller();

        let err = controller.set_light_level("lamp", 90).await.unwrap_err();
        assert!(matches!(err, ClientError::NotLoggedIn));
        assert!(err.is_unauthenticated());
        assert!(controller.store().pending_attributes("lamp").is_empty());

        assert!(matches!(
            controller.refresh_devices().await,
            Err(ClientError::NotLoggedIn)
        ));
        assert!(matches!(
            controller.refresh_device("lamp").await,
            Err(ClientError::NotLoggedIn)
        ));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn slow_response_does_not_override_newer_push() {
        let (controller, transport) = logged_in();
        // The push for revision 6 lands while the mutation is in flight.
        controller.apply_push_event(&PushEvent::DeviceUpdated {
            device_id: "lamp".into(),
            revision: 6,
            state: DeviceState::new().with_light_level(75),
        });
        let stale = lamp(5, DeviceState::new().with_light_level(40));
        transport.push_response(ApiResponse::ok(serde_json::to_value(&stale).unwrap()));

        controller.set_light_level("lamp", 40).await.unwrap();

        assert_eq!(controller.store().light_level("lamp"), 75);
        assert!(controller.store().pending_attributes("lamp").is_empty());
    }

    #[tokio::test]
    async fn refresh_syncs_every_device() {
        let (controller, transport) = logged_in();
        let devices = vec![
            lamp(2, DeviceState::new().with_color(240.0, 1.0)),
            Device::new("plug", "Plug", DeviceKind::Plug).with_state(DeviceState::new().with_on(true)),
        ];
        transport.push_response(ApiResponse::ok(serde_json::to_value(&devices).unwrap()));

        let fetched = controller.refresh_devices().await.unwrap();

        assert_eq!(fetched.len(), 2);
        assert!(controller.store().is_on("plug"));
        assert_eq!(
            controller.store().current_color("lamp").map(|c| c.to_hex()),
            Some("#0000ff".to_string())
        );
    }

    #[tokio::test]
    async fn malformed_data() {
        let (controller, transport) = logged_in();
        transport.push_response(ApiResponse::ok(json!({"unexpected": true})));

        let err = controller.refresh_devices().await.unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedResponse(_)));
    }

    #[test]
    fn logout_clears_session_and_store() {
        let (controller, _) = controller();
        controller.session().set_token("tok");
        controller.store().set_device_on("lamp", true);

        controller.logout();

        assert!(!controller.session().is_logged_in());
        assert!(!controller.store().is_on("lamp"));
    }
}
