//! Push channel frames.

use crate::device::{Device, DeviceState};
use crate::error::ProtocolResult;
use serde::{Deserialize, Serialize};

/// A server-to-client notification sent as a text frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PushEvent {
    /// A device's state changed.
    #[serde(rename_all = "camelCase")]
    DeviceUpdated {
        /// Device identifier.
        device_id: String,
        /// Revision after the change.
        revision: u64,
        /// Attributes known after the change.
        state: DeviceState,
    },
    /// A device became reachable or unreachable.
    #[serde(rename_all = "camelCase")]
    Reachability {
        /// Device identifier.
        device_id: String,
        /// New reachability.
        reachable: bool,
    },
}

impl PushEvent {
    /// Builds a `DeviceUpdated` event from a device snapshot.
    pub fn device_updated(device: &Device) -> Self {
        PushEvent::DeviceUpdated {
            device_id: device.id.clone(),
            revision: device.revision,
            state: device.state.clone(),
        }
    }

    /// Returns the device this event concerns.
    pub fn device_id(&self) -> &str {
        match self {
            PushEvent::DeviceUpdated { device_id, .. } => device_id,
            PushEvent::Reachability { device_id, .. } => device_id,
        }
    }

    /// Encodes to a JSON text frame.
    pub fn to_text(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes from a JSON text frame.
    pub fn from_text(text: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceKind;

    #[test]
    fn device_updated_frame() {
        let device = Device::new("lamp", "Desk lamp", DeviceKind::Light)
            .with_state(DeviceState::new().with_on(true));
        let text = PushEvent::device_updated(&device).to_text().unwrap();

        assert!(text.contains(r#""type":"deviceUpdated""#));
        assert!(text.contains(r#""deviceId":"lamp""#));
        assert!(text.contains(r#""isOn":true"#));
    }

    #[test]
    fn decodes_reachability() {
        let event =
            PushEvent::from_text(r#"{"type":"reachability","deviceId":"plug","reachable":false}"#)
                .unwrap();
        assert_eq!(event.device_id(), "plug");
        assert!(matches!(event, PushEvent::Reachability { reachable: false, .. }));
    }

    #[test]
    fn rejects_unknown_frame() {
        assert!(PushEvent::from_text(r#"{"type":"bogus"}"#).is_err());
    }
}
