//! Gamma ramp synthesis.
//!
//! A ramp maps each of 256 input levels to a 16-bit output level per channel.
//! Synthesis is deterministic: identical inputs always produce a bit-identical
//! ramp, which is what makes memoizing ramps in the cache valid.

use crate::color::temperature::ColorTemperature;
use crate::common::constants::{
    DISPLAY_GAMMA, MAXIMUM_BRIGHTNESS, MAXIMUM_CONTRAST, MINIMUM_BRIGHTNESS, MINIMUM_CONTRAST,
    RAMP_SIZE,
};
use crate::error::ValidationError;

/// Three 256-entry channel tables. Never mutated after synthesis.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct GammaRamp {
    red: [u16; RAMP_SIZE],
    green: [u16; RAMP_SIZE],
    blue: [u16; RAMP_SIZE],
}

impl GammaRamp {
    pub fn from_channels(
        red: [u16; RAMP_SIZE],
        green: [u16; RAMP_SIZE],
        blue: [u16; RAMP_SIZE],
    ) -> Self {
        Self { red, green, blue }
    }

    /// Ramp that leaves colors untouched apart from gamma encoding.
    pub fn identity() -> Self {
        let mut table = [0u16; RAMP_SIZE];
        for (i, slot) in table.iter_mut().enumerate() {
            *slot = level(i, 1.0);
        }
        Self::from_channels(table, table, table)
    }

    pub fn red(&self) -> &[u16; RAMP_SIZE] {
        &self.red
    }

    pub fn green(&self) -> &[u16; RAMP_SIZE] {
        &self.green
    }

    pub fn blue(&self) -> &[u16; RAMP_SIZE] {
        &self.blue
    }

    /// Resample to `size` entries per channel and lay the channels out as
    /// consecutive native-endian `u16` planes (red, green, blue).
    ///
    /// This is the table layout compositors expect for gamma control.
    pub fn to_planar_bytes(&self, size: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(size * 3 * 2);
        for channel in [&self.red, &self.green, &self.blue] {
            for i in 0..size {
                let value = resample(channel, i, size);
                bytes.extend_from_slice(&value.to_ne_bytes());
            }
        }
        bytes
    }
}

impl std::fmt::Debug for GammaRamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let last = RAMP_SIZE - 1;
        f.debug_struct("GammaRamp")
            .field("red_max", &self.red[last])
            .field("green_max", &self.green[last])
            .field("blue_max", &self.blue[last])
            .finish()
    }
}

// Linear resampling of a 256-entry table onto `size` entries
fn resample(channel: &[u16; RAMP_SIZE], index: usize, size: usize) -> u16 {
    if size <= 1 {
        return channel[0];
    }
    let pos = index as f64 * (RAMP_SIZE - 1) as f64 / (size - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(RAMP_SIZE - 1);
    let frac = pos - lo as f64;
    let value = channel[lo] as f64 + (channel[hi] as f64 - channel[lo] as f64) * frac;
    value.round().clamp(0.0, u16::MAX as f64) as u16
}

fn level(index: usize, scale: f64) -> u16 {
    let v = index as f64 / (RAMP_SIZE - 1) as f64;
    let corrected = v.powf(1.0 / DISPLAY_GAMMA);
    ((corrected * scale).clamp(0.0, 1.0) * u16::MAX as f64).round() as u16
}

fn validate_adjustments(brightness: f32, contrast: f32) -> Result<(), ValidationError> {
    if !brightness.is_finite() || !(MINIMUM_BRIGHTNESS..=MAXIMUM_BRIGHTNESS).contains(&brightness) {
        return Err(ValidationError::InvalidBrightness(brightness));
    }
    if !contrast.is_finite() || !(MINIMUM_CONTRAST..=MAXIMUM_CONTRAST).contains(&contrast) {
        return Err(ValidationError::InvalidContrast(contrast));
    }
    Ok(())
}

/// Build the ramp for `kelvin` at the given brightness (`0..=1`) and contrast (`0..=2`).
///
/// Each level is gamma corrected (`v^(1/2.2)`), scaled by the channel's
/// white point multiplier, brightness and contrast, then clamped to 16 bits.
/// Out-of-range inputs are rejected rather than clamped.
pub fn synthesize(kelvin: u32, brightness: f32, contrast: f32) -> Result<GammaRamp, ValidationError> {
    let temperature = ColorTemperature::new(kelvin)?;
    validate_adjustments(brightness, contrast)?;
    Ok(synthesize_for(&temperature, brightness, contrast))
}

/// Synthesis for an already validated temperature.
pub fn synthesize_for(temperature: &ColorTemperature, brightness: f32, contrast: f32) -> GammaRamp {
    let rgb = temperature.rgb();
    let adjust = brightness as f64 * contrast as f64;

    let mut tables = [[0u16; RAMP_SIZE]; 3];
    for (table, multiplier) in tables.iter_mut().zip(rgb.as_array()) {
        let scale = multiplier * adjust;
        for (i, slot) in table.iter_mut().enumerate() {
            *slot = level(i, scale);
        }
    }

    let [red, green, blue] = tables;
    GammaRamp::from_channels(red, green, blue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::constants::{MAXIMUM_TEMP, MINIMUM_TEMP};

    #[test]
    fn test_deterministic() {
        let a = synthesize(4200, 0.9, 1.0).unwrap();
        let b = synthesize(4200, 0.9, 1.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_out_of_range_is_rejected_not_clamped() {
        assert!(matches!(
            synthesize(999, 1.0, 1.0),
            Err(ValidationError::OutOfRange { kelvin: 999, .. })
        ));
        assert!(matches!(
            synthesize(10_001, 1.0, 1.0),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert_eq!(
            synthesize(6500, 1.5, 1.0),
            Err(ValidationError::InvalidBrightness(1.5))
        );
        assert_eq!(
            synthesize(6500, 1.0, 2.5),
            Err(ValidationError::InvalidContrast(2.5))
        );
        assert!(synthesize(6500, f32::NAN, 1.0).is_err());
    }

    #[test]
    fn test_ramp_shape() {
        let ramp = synthesize(3300, 1.0, 1.0).unwrap();
        assert_eq!(ramp.red()[0], 0);
        assert_eq!(ramp.red()[255], u16::MAX);
        // Monotonic per channel
        for channel in [ramp.red(), ramp.green(), ramp.blue()] {
            assert!(channel.windows(2).all(|w| w[0] <= w[1]));
        }
        // Warm: blue below green below red at the top
        assert!(ramp.blue()[255] < ramp.green()[255]);
        assert!(ramp.green()[255] < ramp.red()[255]);
    }

    #[test]
    fn test_brightness_zero_is_black() {
        let ramp = synthesize(6500, 0.0, 1.0).unwrap();
        assert!(ramp.red().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_contrast_saturates() {
        let ramp = synthesize(6500, 1.0, 2.0).unwrap();
        assert_eq!(ramp.red()[128], u16::MAX);
    }

    #[test]
    fn test_distinct_temperatures_give_distinct_ramps() {
        // Red saturates at and below 6600K and blue bottoms out at 1900K, but
        // at full brightness some channel always moves by at least one step
        // per Kelvin, so neighbours never collapse across the whole range.
        let mut previous = synthesize(MINIMUM_TEMP, 1.0, 1.0).unwrap();
        for kelvin in (MINIMUM_TEMP + 1)..=MAXIMUM_TEMP {
            let ramp = synthesize(kelvin, 1.0, 1.0).unwrap();
            assert_ne!(ramp, previous, "{kelvin}K equals {}K", kelvin - 1);
            previous = ramp;
        }
    }

    #[test]
    fn test_planar_bytes_resample() {
        let ramp = GammaRamp::identity();
        let bytes = ramp.to_planar_bytes(1024);
        assert_eq!(bytes.len(), 1024 * 3 * 2);

        let first = u16::from_ne_bytes([bytes[0], bytes[1]]);
        let last = u16::from_ne_bytes([bytes[2046], bytes[2047]]);
        assert_eq!(first, 0);
        assert_eq!(last, u16::MAX);

        // Same size is a straight copy
        let same = ramp.to_planar_bytes(RAMP_SIZE);
        assert_eq!(u16::from_ne_bytes([same[20], same[21]]), ramp.red()[10]);
    }
}
