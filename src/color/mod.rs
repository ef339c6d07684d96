//! Color temperature model, gamma ramp synthesis and the ramp cache.

pub mod cache;
pub mod ramp;
pub mod temperature;

pub use cache::{CacheStats, GammaRampCache, RampKey};
pub use ramp::{GammaRamp, synthesize};
pub use temperature::{ColorTemperature, Rgb, kelvin_to_rgb};
