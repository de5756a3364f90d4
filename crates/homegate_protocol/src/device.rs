//! Device records.

use serde::{Deserialize, Serialize};

/// Upper bound of `DeviceState::light_level`.
pub const LIGHT_LEVEL_MAX: u8 = 100;

/// The category of a device in the fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceKind {
    /// Dimmable and possibly colored light.
    Light,
    /// Switchable power plug.
    Plug,
    /// Read-only sensor.
    Sensor,
    /// Audio speaker.
    Speaker,
}

impl DeviceKind {
    /// Returns true if devices of this kind accept color attributes.
    pub fn supports_color(&self) -> bool {
        matches!(self, DeviceKind::Light)
    }

    /// Returns true if devices of this kind accept commands at all.
    pub fn is_controllable(&self) -> bool {
        !matches!(self, DeviceKind::Sensor)
    }
}

/// A partial device state.
///
/// Every attribute is optional: the same record describes a device's full
/// known state and a patch carrying only the attributes that changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    /// Power state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_on: Option<bool>,
    /// Brightness, 0 to `LIGHT_LEVEL_MAX`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light_level: Option<u8>,
    /// Hue in degrees, `[0, 360)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hue: Option<f64>,
    /// Saturation, `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturation: Option<f64>,
    /// Color temperature in Kelvin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl DeviceState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the power state.
    pub fn with_on(mut self, is_on: bool) -> Self {
        self.is_on = Some(is_on);
        self
    }

    /// Sets the light level.
    pub fn with_light_level(mut self, level: u8) -> Self {
        self.light_level = Some(level);
        self
    }

    /// Sets hue and saturation together.
    pub fn with_color(mut self, hue: f64, saturation: f64) -> Self {
        self.hue = Some(hue);
        self.saturation = Some(saturation);
        self
    }

    /// Sets the color temperature.
    pub fn with_temperature(mut self, kelvin: f64) -> Self {
        self.temperature = Some(kelvin);
        self
    }

    /// Returns true if no attribute is present.
    pub fn is_empty(&self) -> bool {
        self.is_on.is_none()
            && self.light_level.is_none()
            && self.hue.is_none()
            && self.saturation.is_none()
            && self.temperature.is_none()
    }

    /// Returns true if any color attribute is present.
    pub fn touches_color(&self) -> bool {
        self.hue.is_some() || self.saturation.is_some() || self.temperature.is_some()
    }

    /// Overwrites the attributes present in `patch`, leaving the rest alone.
    pub fn merge(&mut self, patch: &DeviceState) {
        if let Some(v) = patch.is_on {
            self.is_on = Some(v);
        }
        if let Some(v) = patch.light_level {
            self.light_level = Some(v);
        }
        if let Some(v) = patch.hue {
            self.hue = Some(v);
        }
        if let Some(v) = patch.saturation {
            self.saturation = Some(v);
        }
        if let Some(v) = patch.temperature {
            self.temperature = Some(v);
        }
    }
}

/// A device as exposed by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Stable device identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Device category.
    pub kind: DeviceKind,
    /// Whether the gateway can currently reach the device.
    pub reachable: bool,
    /// Monotonic per-device revision, bumped on every applied change.
    pub revision: u64,
    /// Last known state.
    pub state: DeviceState,
}

impl Device {
    /// Creates a reachable device at revision 0 with an empty state.
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            reachable: true,
            revision: 0,
            state: DeviceState::default(),
        }
    }

    /// Sets the initial state.
    pub fn with_state(mut self, state: DeviceState) -> Self {
        self.state = state;
        self
    }
}
