//! Device gateway seam.
//!
//! The gateway owns raw device I/O. The server never talks to devices
//! directly; resolvers reach the gateway only through an authenticated
//! `RequestContext`.

use homegate_protocol::{Device, DeviceState, LIGHT_LEVEL_MAX};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors reported by a device gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// No device with this id.
    #[error("unknown device: {0}")]
    UnknownDevice(String),

    /// The device does not accept this attribute.
    #[error("device {device_id} does not support {attribute}")]
    Unsupported {
        /// Device identifier.
        device_id: String,
        /// Offending attribute.
        attribute: String,
    },

    /// The device did not answer.
    #[error("device {0} is unreachable")]
    Unreachable(String),

    /// Vendor-side failure.
    #[error("gateway failure: {0}")]
    Backend(String),
}

/// Read, observe and command primitives over the device fleet.
pub trait DeviceGateway: Send + Sync {
    /// Lists every known device.
    fn devices(&self) -> GatewayResult<Vec<Device>>;

    /// Looks up one device.
    fn device(&self, id: &str) -> GatewayResult<Option<Device>>;

    /// Applies the attributes present in `patch` and returns the updated
    /// device with its new revision.
    fn command(&self, id: &str, patch: &DeviceState) -> GatewayResult<Device>;

    /// Subscribes to device changes, whatever their origin.
    ///
    /// Gateways that cannot observe devices return `None`.
    fn subscribe(&self) -> Option<broadcast::Receiver<Device>> {
        None
    }
}

/// An in-process gateway over a fixed fleet.
///
/// Every applied change bumps the device revision and is broadcast to
/// subscribers.
pub struct MemoryGateway {
    devices: RwLock<BTreeMap<String, Device>>,
    changes: broadcast::Sender<Device>,
}

impl MemoryGateway {
    /// Creates a gateway serving `devices`.
    pub fn new(devices: impl IntoIterator<Item = Device>) -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            devices: RwLock::new(devices.into_iter().map(|d| (d.id.clone(), d)).collect()),
            changes,
        }
    }

    /// Adds or replaces a device.
    pub fn insert(&self, device: Device) {
        self.devices.write().insert(device.id.clone(), device);
    }

    /// Applies a change that did not come through the API, e.g. a wall
    /// switch, and broadcasts it.
    pub fn simulate_external_change(&self, id: &str, patch: &DeviceState) -> GatewayResult<Device> {
        self.apply(id, patch)
    }

    /// Marks a device reachable or unreachable and broadcasts it.
    pub fn set_reachable(&self, id: &str, reachable: bool) -> GatewayResult<Device> {
        let device = {
            let mut devices = self.devices.write();
            let device = devices
                .get_mut(id)
                .ok_or_else(|| GatewayError::UnknownDevice(id.to_string()))?;
            device.reachable = reachable;
            device.revision += 1;
            device.clone()
        };
        let _ = self.changes.send(device.clone());
        Ok(device)
    }

    fn apply(&self, id: &str, patch: &DeviceState) -> GatewayResult<Device> {
        let device = {
            let mut devices = self.devices.write();
            let device = devices
                .get_mut(id)
                .ok_or_else(|| GatewayError::UnknownDevice(id.to_string()))?;

            if !device.reachable {
                return Err(GatewayError::Unreachable(id.to_string()));
            }
            check_supported(device, patch)?;

            let mut patch = patch.clone();
            patch.light_level = patch.light_level.map(|l| l.min(LIGHT_LEVEL_MAX));
            device.state.merge(&patch);
            device.revision += 1;
            device.clone()
        };

        debug!(device_id = %device.id, revision = device.revision, "device state changed");
        // No receivers is fine: nobody is watching yet.
        let _ = self.changes.send(device.clone());
        Ok(device)
    }
}

impl DeviceGateway for MemoryGateway {
    fn devices(&self) -> GatewayResult<Vec<Device>> {
        Ok(self.devices.read().values().cloned().collect())
    }

    fn device(&self, id: &str) -> GatewayResult<Option<Device>> {
        Ok(self.devices.read().get(id).cloned())
    }

    fn command(&self, id: &str, patch: &DeviceState) -> GatewayResult<Device> {
        self.apply(id, patch)
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<Device>> {
        Some(self.changes.subscribe())
    }
}

fn check_supported(device: &Device, patch: &DeviceState) -> GatewayResult<()> {
    let unsupported = |attribute: &str| GatewayError::Unsupported {
        device_id: device.id.clone(),
        attribute: attribute.to_string(),
    };

    if !device.kind.is_controllable() && !patch.is_empty() {
        return Err(unsupported("commands"));
    }
    if !device.kind.supports_color() {
        if patch.light_level.is_some() {
            return Err(unsupported("lightLevel"));
        }
        if patch.touches_color() {
            return Err(unsupported("color"));
        }
    }
    Ok(())
}
