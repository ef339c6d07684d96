//! Kelvin to RGB white point conversion.

use serde::Serialize;

use crate::common::constants::{MAXIMUM_TEMP, MINIMUM_TEMP, NEUTRAL_TEMP};
use crate::error::ValidationError;

/// Per-channel multipliers in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rgb {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl Rgb {
    pub fn as_array(&self) -> [f64; 3] {
        [self.red, self.green, self.blue]
    }
}

/// A validated color temperature and its derived white point.
///
/// Equality and hashing consider only the Kelvin value.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ColorTemperature {
    kelvin: u32,
    rgb: Rgb,
}

impl ColorTemperature {
    /// Fails with `OutOfRange` outside 1000-10000K. Never clamps.
    pub fn new(kelvin: u32) -> Result<Self, ValidationError> {
        if !(MINIMUM_TEMP..=MAXIMUM_TEMP).contains(&kelvin) {
            return Err(ValidationError::OutOfRange {
                kelvin,
                min: MINIMUM_TEMP,
                max: MAXIMUM_TEMP,
            });
        }
        Ok(Self {
            kelvin,
            rgb: kelvin_to_rgb(kelvin),
        })
    }

    pub fn neutral() -> Self {
        Self {
            kelvin: NEUTRAL_TEMP,
            rgb: kelvin_to_rgb(NEUTRAL_TEMP),
        }
    }

    pub fn kelvin(&self) -> u32 {
        self.kelvin
    }

    pub fn rgb(&self) -> Rgb {
        self.rgb
    }
}

impl PartialEq for ColorTemperature {
    fn eq(&self, other: &Self) -> bool {
        self.kelvin == other.kelvin
    }
}

impl Eq for ColorTemperature {}

impl std::hash::Hash for ColorTemperature {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.kelvin.hash(state);
    }
}

impl std::fmt::Display for ColorTemperature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}K", self.kelvin)
    }
}

/// Tanner Helland's black body fit, kept continuous (no per-channel rounding
/// to 8 bits) so neighbouring temperatures stay distinguishable.
///
/// Red is saturated at and below 6600K and blue is zero at and below 1900K,
/// so those channels carry no information in those ranges.
pub fn kelvin_to_rgb(kelvin: u32) -> Rgb {
    let t = kelvin as f64 / 100.0;

    let (red, green, blue) = if t <= 66.0 {
        let green = 99.470_802_586_1 * t.ln() - 161.119_568_166_1;
        let blue = if t <= 19.0 {
            0.0
        } else {
            138.517_731_223_1 * (t - 10.0).ln() - 305.044_792_730_7
        };
        (255.0, green, blue)
    } else {
        let red = 329.698_727_446 * (t - 60.0).powf(-0.133_204_759_2);
        let green = 288.122_169_528_3 * (t - 60.0).powf(-0.075_514_849_2);
        (red, green, 255.0)
    };

    let norm = |c: f64| (c / 255.0).clamp(0.0, 1.0);
    Rgb {
        red: norm(red),
        green: norm(green),
        blue: norm(blue),
    }
}
