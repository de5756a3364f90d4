//! Property-based test generators using proptest.
//!
//! Values stay inside the ranges the server accepts, so generated patches
//! can be sent through `setDeviceState` unchanged.

use homegate_protocol::{DeviceState, LIGHT_LEVEL_MAX};
use proptest::prelude::*;

/// Strategy for hues in degrees.
pub fn hue_strategy() -> impl Strategy<Value = f64> {
    0.0f64..360.0
}

/// Strategy for saturations.
pub fn saturation_strategy() -> impl Strategy<Value = f64> {
    0.0f64..=1.0
}

/// Strategy for color temperatures within the rendered range.
pub fn temperature_strategy() -> impl Strategy<Value = f64> {
    2202.0f64..=4000.0
}

/// Strategy for light levels.
pub fn light_level_strategy() -> impl Strategy<Value = u8> {
    0..=LIGHT_LEVEL_MAX
}

/// Strategy for device ids.
pub fn device_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9-]{0,15}").expect("Invalid regex")
}

/// Strategy for partial device states. Hue and saturation are generated
/// as a pair or not at all.
pub fn device_state_strategy() -> impl Strategy<Value = DeviceState> {
    (
        proptest::option::of(any::<bool>()),
        proptest::option::of(light_level_strategy()),
        proptest::option::of((hue_strategy(), saturation_strategy())),
        proptest::option::of(temperature_strategy()),
    )
        .prop_map(|(is_on, light_level, color, temperature)| DeviceState {
            is_on,
            light_level,
            hue: color.map(|(h, _)| h),
            saturation: color.map(|(_, s)| s),
            temperature,
        })
}

/// Strategy for non-empty partial device states.
pub fn device_patch_strategy() -> impl Strategy<Value = DeviceState> {
    device_state_strategy().prop_filter("patch must not be empty", |s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn color_is_paired(state in device_state_strategy()) {
            prop_assert_eq!(state.hue.is_some(), state.saturation.is_some());
        }

        #[test]
        fn patches_are_non_empty(patch in device_patch_strategy()) {
            prop_assert!(!patch.is_empty());
        }

        #[test]
        fn ids_are_slugs(id in device_id_strategy()) {
            prop_assert!(!id.is_empty());
            prop_assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        }
    }
}
