//! Per-device state reconciliation.
//!
//! Two maps back the store: an optimistic overlay holding the user's
//! unconfirmed edits, and a synced base holding the last server truth for
//! each attribute. Reads go through `layered` per attribute:
//! optimistic → synced → default.
//!
//! ## Write rules
//!
//! - Local setters overwrite one attribute of the overlay.
//! - Syncs overwrite only the attributes present in the incoming patch,
//!   and clear the overlay for exactly those attributes.
//! - A sync carrying a revision older than the one already recorded for an
//!   attribute is ignored for that attribute, so a late mutation response
//!   never overrides a newer push.

use crate::color::{calculate_device_color, Rgb};
use homegate_protocol::{Device, DeviceState, PushEvent};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// Default power state of a device nothing is known about.
pub const DEFAULT_IS_ON: bool = false;
/// Default light level of a device nothing is known about.
pub const DEFAULT_LIGHT_LEVEL: u8 = 0;

/// A tracked device attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// Power state.
    IsOn,
    /// Brightness.
    LightLevel,
    /// Hue.
    Hue,
    /// Saturation.
    Saturation,
    /// Color temperature.
    Temperature,
}

impl Attribute {
    /// All attributes, in declaration order.
    pub const ALL: [Attribute; 5] = [
        Attribute::IsOn,
        Attribute::LightLevel,
        Attribute::Hue,
        Attribute::Saturation,
        Attribute::Temperature,
    ];

    /// Returns true for hue, saturation and temperature.
    pub fn is_color(&self) -> bool {
        matches!(
            self,
            Attribute::Hue | Attribute::Saturation | Attribute::Temperature
        )
    }

    /// Returns true if `state` carries a value for this attribute.
    pub fn present_in(&self, state: &DeviceState) -> bool {
        match self {
            Attribute::IsOn => state.is_on.is_some(),
            Attribute::LightLevel => state.light_level.is_some(),
            Attribute::Hue => state.hue.is_some(),
            Attribute::Saturation => state.saturation.is_some(),
            Attribute::Temperature => state.temperature.is_some(),
        }
    }
}

/// Resolves one attribute: optimistic value if present, else synced
/// value, else `default`.
pub fn layered<T>(optimistic: Option<T>, synced: Option<T>, default: T) -> T {
    optimistic.or(synced).unwrap_or(default)
}

/// Which attributes a sync applied and which it ignored as stale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Attributes overwritten by the sync.
    pub applied: Vec<Attribute>,
    /// Attributes skipped because a newer revision was already recorded.
    pub stale: Vec<Attribute>,
}

/// The reconciled view of one device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceView {
    /// Power state.
    pub is_on: bool,
    /// Brightness.
    pub light_level: u8,
    /// Hue, if known.
    pub hue: Option<f64>,
    /// Saturation, if known.
    pub saturation: Option<f64>,
    /// Color temperature, if known.
    pub temperature: Option<f64>,
    /// Display color, if derivable.
    pub color: Option<Rgb>,
    /// Whether the gateway last reported the device reachable.
    pub reachable: bool,
    /// Whether any optimistic edit is still unconfirmed.
    pub pending: bool,
}

#[derive(Debug, Clone, Copy)]
struct Synced<T> {
    value: T,
    revision: Option<u64>,
}

#[derive(Debug, Clone, Default)]
struct SyncedRecord {
    is_on: Option<Synced<bool>>,
    light_level: Option<Synced<u8>>,
    hue: Option<Synced<f64>>,
    saturation: Option<Synced<f64>>,
    temperature: Option<Synced<f64>>,
    reachable: Option<bool>,
}

impl SyncedRecord {
    fn state(&self) -> DeviceState {
        DeviceState {
            is_on: self.is_on.map(|s| s.value),
            light_level: self.light_level.map(|s| s.value),
            hue: self.hue.map(|s| s.value),
            saturation: self.saturation.map(|s| s.value),
            temperature: self.temperature.map(|s| s.value),
        }
    }

    fn revision_of(&self, attribute: Attribute) -> Option<u64> {
        match attribute {
            Attribute::IsOn => self.is_on.and_then(|s| s.revision),
            Attribute::LightLevel => self.light_level.and_then(|s| s.revision),
            Attribute::Hue => self.hue.and_then(|s| s.revision),
            Attribute::Saturation => self.saturation.and_then(|s| s.revision),
            Attribute::Temperature => self.temperature.and_then(|s| s.revision),
        }
    }

    fn write(&mut self, attribute: Attribute, patch: &DeviceState, revision: Option<u64>) {
        match attribute {
            Attribute::IsOn => self.is_on = patch.is_on.map(|value| Synced { value, revision }),
            Attribute::LightLevel => {
                self.light_level = patch.light_level.map(|value| Synced { value, revision })
            }
            Attribute::Hue => self.hue = patch.hue.map(|value| Synced { value, revision }),
            Attribute::Saturation => {
                self.saturation = patch.saturation.map(|value| Synced { value, revision })
            }
            Attribute::Temperature => {
                self.temperature = patch.temperature.map(|value| Synced { value, revision })
            }
        }
    }
}

fn clear_attribute(state: &mut DeviceState, attribute: Attribute) {
    match attribute {
        Attribute::IsOn => state.is_on = None,
        Attribute::LightLevel => state.light_level = None,
        Attribute::Hue => state.hue = None,
        Attribute::Saturation => state.saturation = None,
        Attribute::Temperature => state.temperature = None,
    }
}

#[derive(Default)]
struct StoreInner {
    optimistic: HashMap<String, DeviceState>,
    synced: HashMap<String, SyncedRecord>,
}

impl StoreInner {
    fn resolved(&self, device_id: &str) -> (DeviceState, DeviceState) {
        let optimistic = self.optimistic.get(device_id).cloned().unwrap_or_default();
        let synced = self
            .synced
            .get(device_id)
            .map(SyncedRecord::state)
            .unwrap_or_default();
        (optimistic, synced)
    }
}

/// Reconciles optimistic edits, synced server state and defaults.
///
/// Every write is a single critical section, so a concurrent read sees an
/// attribute either before or after a write, never a mix.
#[derive(Default)]
pub struct DeviceStore {
    inner: RwLock<StoreInner>,
}

impl DeviceStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // ---- local (optimistic) setters ----

    /// Optimistically sets the power state.
    pub fn set_device_on(&self, device_id: &str, is_on: bool) {
        self.apply_optimistic(device_id, &DeviceState::new().with_on(is_on));
    }

    /// Optimistically sets the light level.
    pub fn set_device_light_level(&self, device_id: &str, level: u8) {
        self.apply_optimistic(device_id, &DeviceState::new().with_light_level(level));
    }

    /// Optimistically sets the hue.
    pub fn set_device_hue(&self, device_id: &str, hue: f64) {
        self.apply_optimistic(
            device_id,
            &DeviceState {
                hue: Some(hue),
                ..DeviceState::default()
            },
        );
    }

    /// Optimistically sets the saturation.
    pub fn set_device_saturation(&self, device_id: &str, saturation: f64) {
        self.apply_optimistic(
            device_id,
            &DeviceState {
                saturation: Some(saturation),
                ..DeviceState::default()
            },
        );
    }

    /// Optimistically sets the color temperature.
    pub fn set_device_temperature(&self, device_id: &str, kelvin: f64) {
        self.apply_optimistic(device_id, &DeviceState::new().with_temperature(kelvin));
    }

    /// Optimistically sets every attribute present in `patch`.
    pub fn apply_optimistic(&self, device_id: &str, patch: &DeviceState) {
        let mut inner = self.inner.write();
        inner
            .optimistic
            .entry(device_id.to_string())
            .or_default()
            .merge(patch);
    }

    /// Drops the optimistic overlay for the attributes present in `patch`.
    ///
    /// Used when the edit that produced them is known to have failed.
    pub fn discard_optimistic(&self, device_id: &str, patch: &DeviceState) {
        let attributes: Vec<Attribute> = Attribute::ALL
            .into_iter()
            .filter(|a| a.present_in(patch))
            .collect();
        self.discard_attributes(device_id, &attributes);
    }

    /// Drops the optimistic overlay for `attributes`.
    pub fn discard_attributes(&self, device_id: &str, attributes: &[Attribute]) {
        let mut inner = self.inner.write();
        if let Some(overlay) = inner.optimistic.get_mut(device_id) {
            for attribute in attributes {
                clear_attribute(overlay, *attribute);
            }
        }
    }

    // ---- syncs from the server ----

    /// Records server truth for the attributes present in `patch`.
    ///
    /// Absent attributes are left untouched. `revision` is the device
    /// revision the patch was observed at, if known.
    pub fn sync_device_state(
        &self,
        device_id: &str,
        patch: &DeviceState,
        revision: Option<u64>,
    ) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();
        let mut inner = self.inner.write();
        let StoreInner { optimistic, synced } = &mut *inner;
        let record = synced.entry(device_id.to_string()).or_default();

        for attribute in Attribute::ALL {
            if !attribute.present_in(patch) {
                continue;
            }
            let is_stale = matches!(
                (revision, record.revision_of(attribute)),
                (Some(incoming), Some(known)) if incoming < known
            );
            if is_stale {
                outcome.stale.push(attribute);
                continue;
            }

            record.write(attribute, patch, revision);
            if let Some(overlay) = optimistic.get_mut(device_id) {
                clear_attribute(overlay, attribute);
            }
            outcome.applied.push(attribute);
        }

        if !outcome.stale.is_empty() {
            debug!(device_id, ?revision, stale = ?outcome.stale, "ignored stale sync");
        }
        outcome
    }

    /// Records server truth for the color attributes present in `patch`.
    ///
    /// Non-color attributes in `patch` are ignored.
    pub fn sync_device_color(
        &self,
        device_id: &str,
        patch: &DeviceState,
        revision: Option<u64>,
    ) -> SyncOutcome {
        let color = DeviceState {
            hue: patch.hue,
            saturation: patch.saturation,
            temperature: patch.temperature,
            ..DeviceState::default()
        };
        self.sync_device_state(device_id, &color, revision)
    }

    /// Records a full device snapshot, including reachability.
    pub fn sync_device(&self, device: &Device) -> SyncOutcome {
        self.set_reachable(&device.id, device.reachable);
        self.sync_device_state(&device.id, &device.state, Some(device.revision))
    }

    /// Applies one push channel frame.
    pub fn apply_push_event(&self, event: &PushEvent) -> SyncOutcome {
        match event {
            PushEvent::DeviceUpdated {
                device_id,
                revision,
                state,
            } => self.sync_device_state(device_id, state, Some(*revision)),
            PushEvent::Reachability {
                device_id,
                reachable,
            } => {
                self.set_reachable(device_id, *reachable);
                SyncOutcome::default()
            }
        }
    }

    /// Records the gateway's reachability report.
    pub fn set_reachable(&self, device_id: &str, reachable: bool) {
        let mut inner = self.inner.write();
        inner
            .synced
            .entry(device_id.to_string())
            .or_default()
            .reachable = Some(reachable);
    }

    // ---- reads ----

    /// Current power state.
    pub fn is_on(&self, device_id: &str) -> bool {
        let (optimistic, synced) = self.inner.read().resolved(device_id);
        layered(optimistic.is_on, synced.is_on, DEFAULT_IS_ON)
    }

    /// Current light level.
    pub fn light_level(&self, device_id: &str) -> u8 {
        let (optimistic, synced) = self.inner.read().resolved(device_id);
        layered(optimistic.light_level, synced.light_level, DEFAULT_LIGHT_LEVEL)
    }

    /// Current hue, if known.
    pub fn hue(&self, device_id: &str) -> Option<f64> {
        let (optimistic, synced) = self.inner.read().resolved(device_id);
        optimistic.hue.or(synced.hue)
    }

    /// Current saturation, if known.
    pub fn saturation(&self, device_id: &str) -> Option<f64> {
        let (optimistic, synced) = self.inner.read().resolved(device_id);
        optimistic.saturation.or(synced.saturation)
    }

    /// Current color temperature, if known.
    pub fn temperature(&self, device_id: &str) -> Option<f64> {
        let (optimistic, synced) = self.inner.read().resolved(device_id);
        optimistic.temperature.or(synced.temperature)
    }

    /// Current display color, derived on every call.
    pub fn current_color(&self, device_id: &str) -> Option<Rgb> {
        self.view(device_id).color
    }

    /// The reconciled view of one device.
    pub fn view(&self, device_id: &str) -> DeviceView {
        let inner = self.inner.read();
        let (optimistic, synced) = inner.resolved(device_id);
        let reachable = inner
            .synced
            .get(device_id)
            .and_then(|r| r.reachable)
            .unwrap_or(true);
        drop(inner);

        let hue = optimistic.hue.or(synced.hue);
        let saturation = optimistic.saturation.or(synced.saturation);
        let temperature = optimistic.temperature.or(synced.temperature);

        DeviceView {
            is_on: layered(optimistic.is_on, synced.is_on, DEFAULT_IS_ON),
            light_level: layered(optimistic.light_level, synced.light_level, DEFAULT_LIGHT_LEVEL),
            hue,
            saturation,
            temperature,
            color: calculate_device_color(hue, saturation, temperature),
            reachable,
            pending: !optimistic.is_empty(),
        }
    }

    /// Attributes with an unconfirmed optimistic value.
    pub fn pending_attributes(&self, device_id: &str) -> Vec<Attribute> {
        let inner = self.inner.read();
        match inner.optimistic.get(device_id) {
            Some(overlay) => Attribute::ALL
                .into_iter()
                .filter(|a| a.present_in(overlay))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Ids of every device the store has seen.
    pub fn device_ids(&self) -> Vec<String> {
        let inner = self.inner.read();
        let mut ids: Vec<String> = inner
            .synced
            .keys()
            .chain(inner.optimistic.keys())
            .cloned()
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Forgets everything, e.g. on logout.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.optimistic.clear();
        inner.synced.clear();
    }
}
