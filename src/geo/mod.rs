//! Geographic location and solar event calculations.
//!
//! - [`location`]: validated coordinates and timezone lookup
//! - [`solar`]: sunrise, sunset and solar noon for a date, with polar handling

pub mod location;
pub mod solar;

pub use location::Location;
pub use solar::{SolarCalculator, SolarTimes};
