//! Device color math.
//!
//! Pure functions shared by optimistic updates and rendering, so a
//! predicted color and a confirmed one never differ for the same inputs.
//! Inputs are not range-checked here; callers clamp before calling.

use std::fmt;

/// Warmest supported color temperature, Kelvin.
pub const TEMPERATURE_MIN: f64 = 2202.0;
/// Coolest supported color temperature, Kelvin.
pub const TEMPERATURE_MAX: f64 = 4000.0;

const WARM: Rgb = Rgb::new(255, 165, 0);
const NEUTRAL: Rgb = Rgb::new(255, 255, 255);
const COOL: Rgb = Rgb::new(135, 206, 255);

/// An 8-bit-per-channel color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
}

impl Rgb {
    /// Creates a color from its channels.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Returns the `#rrggbb` form.
    pub fn to_hex(&self) -> String {
        self.to_string()
    }

    fn from_unit(r: f64, g: f64, b: f64) -> Self {
        Self::new(channel(r * 255.0), channel(g * 255.0), channel(b * 255.0))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Converts hue (degrees) and saturation (0–1) to RGB at full value.
pub fn hsv_to_rgb(hue: f64, saturation: f64) -> Rgb {
    let c = saturation;
    let sector = hue / 60.0;
    let x = c * (1.0 - (sector % 2.0 - 1.0).abs());
    let m = 1.0 - c;

    let (r, g, b) = if sector < 1.0 {
        (c, x, 0.0)
    } else if sector < 2.0 {
        (x, c, 0.0)
    } else if sector < 3.0 {
        (0.0, c, x)
    } else if sector < 4.0 {
        (0.0, x, c)
    } else if sector < 5.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    Rgb::from_unit(r + m, g + m, b + m)
}

/// Maps a color temperature onto the warm → white → cool gradient.
pub fn temperature_to_rgb(kelvin: f64) -> Rgb {
    let t = (kelvin - TEMPERATURE_MIN) / (TEMPERATURE_MAX - TEMPERATURE_MIN);
    if t < 0.5 {
        lerp(WARM, NEUTRAL, t / 0.5)
    } else {
        lerp(NEUTRAL, COOL, (t - 0.5) / 0.5)
    }
}

/// Derives the display color of a device.
///
/// Hue and saturation win whenever both are present, even if a
/// temperature is also known. Otherwise the temperature is used. With
/// neither, there is no derivable color and the caller renders a
/// placeholder.
pub fn calculate_device_color(
    hue: Option<f64>,
    saturation: Option<f64>,
    temperature: Option<f64>,
) -> Option<Rgb> {
    match (hue, saturation, temperature) {
        (Some(h), Some(s), _) => Some(hsv_to_rgb(h, s)),
        (_, _, Some(k)) => Some(temperature_to_rgb(k)),
        _ => None,
    }
}

fn lerp(from: Rgb, to: Rgb, t: f64) -> Rgb {
    let mix = |a: u8, b: u8| channel(f64::from(a) + (f64::from(b) - f64::from(a)) * t);
    Rgb::new(mix(from.r, to.r), mix(from.g, to.g), mix(from.b, to.b))
}

// `as` saturates and maps NaN to 0, so this never panics.
fn channel(value: f64) -> u8 {
    value.round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use homegate_testkit::generators::{hue_strategy, saturation_strategy, temperature_strategy};
    use proptest::prelude::*;

    #[test]
    fn primary_hues() {
        assert_eq!(hsv_to_rgb(0.0, 1.0).to_hex(), "#ff0000");
        assert_eq!(hsv_to_rgb(120.0, 1.0).to_hex(), "#00ff00");
        assert_eq!(hsv_to_rgb(240.0, 1.0).to_hex(), "#0000ff");
    }

    #[test]
    fn secondary_hues() {
        assert_eq!(hsv_to_rgb(60.0, 1.0).to_hex(), "#ffff00");
        assert_eq!(hsv_to_rgb(180.0, 1.0).to_hex(), "#00ffff");
        assert_eq!(hsv_to_rgb(300.0, 1.0).to_hex(), "#ff00ff");
    }

    #[test]
    fn half_saturation_rounds_each_channel() {
        assert_eq!(hsv_to_rgb(180.0, 0.5), Rgb::new(128, 255, 255));
        assert_eq!(hsv_to_rgb(30.0, 1.0), Rgb::new(255, 128, 0));
    }

    #[test]
    fn full_circle_wraps_to_red() {
        assert_eq!(hsv_to_rgb(360.0, 1.0).to_hex(), "#ff0000");
    }

    #[test]
    fn temperature_breakpoints() {
        assert_eq!(temperature_to_rgb(TEMPERATURE_MIN).to_hex(), "#ffa500");
        assert_eq!(temperature_to_rgb(3101.0).to_hex(), "#ffffff");
        assert_eq!(temperature_to_rgb(TEMPERATURE_MAX).to_hex(), "#87ceff");
    }

    #[test]
    fn color_wins_over_temperature() {
        assert_eq!(
            calculate_device_color(Some(180.0), Some(0.5), Some(2700.0)),
            Some(hsv_to_rgb(180.0, 0.5))
        );
    }

    #[test]
    fn temperature_only() {
        assert_eq!(
            calculate_device_color(None, None, Some(2202.0)).map(|c| c.to_hex()),
            Some("#ffa500".to_string())
        );
        assert_eq!(
            calculate_device_color(None, None, Some(4000.0)).map(|c| c.to_hex()),
            Some("#87ceff".to_string())
        );
    }

    #[test]
    fn half_pair_falls_back() {
        assert_eq!(calculate_device_color(Some(90.0), None, None), None);
        assert_eq!(
            calculate_device_color(None, Some(0.3), Some(4000.0)),
            Some(COOL)
        );
    }

    #[test]
    fn nothing_known() {
        assert_eq!(calculate_device_color(None, None, None), None);
    }

    #[test]
    fn out_of_range_does_not_panic() {
        let _ = hsv_to_rgb(-720.0, 7.0);
        let _ = hsv_to_rgb(f64::NAN, f64::INFINITY);
        let _ = temperature_to_rgb(-1.0);
        let _ = temperature_to_rgb(1e12);
    }

    proptest! {
        #[test]
        fn grey_axis_is_white(hue in hue_strategy()) {
            prop_assert_eq!(hsv_to_rgb(hue, 0.0).to_hex(), "#ffffff");
        }

        #[test]
        fn hex_shape(hue in hue_strategy(), sat in saturation_strategy()) {
            let hex = hsv_to_rgb(hue, sat).to_hex();
            prop_assert_eq!(hex.len(), 7);
            prop_assert!(hex.starts_with('#'));
            prop_assert!(hex[1..].chars().all(|c| c.is_ascii_hexdigit()));
        }

        #[test]
        fn color_wins_for_any_temperature(
            hue in hue_strategy(),
            sat in saturation_strategy(),
            k in temperature_strategy(),
        ) {
            prop_assert_eq!(
                calculate_device_color(Some(hue), Some(sat), Some(k)),
                calculate_device_color(Some(hue), Some(sat), None)
            );
        }

        #[test]
        fn temperature_channels_stay_on_gradient(k in temperature_strategy()) {
            let rgb = temperature_to_rgb(k);
            prop_assert!(rgb.r >= 135);
            prop_assert!(rgb.g >= 165);
        }
    }
}
