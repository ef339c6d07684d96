//! TOML configuration for duskshift.
//!
//! The configuration lives in `$XDG_CONFIG_HOME/duskshift/duskshift.toml`
//! (or `<dir>/duskshift.toml` with `--config <dir>`). Every field is optional;
//! anything missing falls back to the defaults in `common::constants`.
//!
//! ```toml
//! [profile]
//! name = "default"          # Built-in ("default", "reading") or your own name
//! day_temp = 6500           # Color temperature during day (1000-10000) Kelvin
//! night_temp = 3300         # Color temperature during night (1000-10000) Kelvin
//! transition_duration = 45  # Sunrise/sunset window length in minutes (1-240)
//! curve = "sigmoid"         # "linear" or "sigmoid"
//! brightness = 1.0          # Output brightness (0.0-1.0)
//! contrast = 1.0            # Output contrast (0.0-2.0)
//!
//! [location]
//! latitude = 41.878100      # Geographic latitude (-90 to 90)
//! longitude = -87.629800    # Geographic longitude (-180 to 180)
//!
//! [engine]
//! cache_capacity = 200      # Gamma ramps kept in memory
//! health_check_interval = 60
//! ```
//!
//! A profile section that only names a built-in selects it unchanged. Any
//! other profile field turns it into an editable copy with that override.
//!
//! Values are range checked on load (`validation::validate_config`). The
//! softer consistency rules (day warmer than night) are left to the engine's
//! periodic health check, which repairs user profiles in place.

pub mod builder;
pub mod loading;
pub mod validation;
pub mod watcher;

#[cfg(test)]
mod tests;

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::common::constants::*;
use crate::core::{EngineSettings, RetryPolicy};
use crate::geo::Location;
use crate::profile::{ColorProfile, TransitionCurve};

pub use builder::create_default_config;
pub use loading::{get_config_path, get_custom_config_dir, load, load_from_path, set_config_dir};
pub use watcher::start_config_watcher;

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub profile: ProfileSection,
    #[serde(default)]
    pub location: LocationSection,
    #[serde(default)]
    pub engine: EngineSection,
}

/// `[profile]`: the active color profile.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct ProfileSection {
    pub name: Option<String>,
    pub day_temp: Option<u32>,
    pub night_temp: Option<u32>,
    /// Minutes.
    pub transition_duration: Option<u64>,
    pub curve: Option<TransitionCurve>,
    pub brightness: Option<f32>,
    pub contrast: Option<f32>,
}

impl ProfileSection {
    fn has_overrides(&self) -> bool {
        self.day_temp.is_some()
            || self.night_temp.is_some()
            || self.transition_duration.is_some()
            || self.curve.is_some()
            || self.brightness.is_some()
            || self.contrast.is_some()
    }
}

/// `[location]`: coordinates used for the solar schedule.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct LocationSection {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub city: Option<String>,
    pub country: Option<String>,
}

/// `[engine]`: runtime tunables. Changes take effect on restart.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct EngineSection {
    pub cache_capacity: Option<usize>,
    /// Seconds.
    pub cache_ttl: Option<u64>,
    /// 0 sizes the pool from the monitor count.
    pub pool_max: Option<usize>,
    /// Seconds.
    pub handle_timeout: Option<u64>,
    /// Milliseconds.
    pub acquire_timeout: Option<u64>,
    /// Milliseconds.
    pub write_timeout: Option<u64>,
    pub max_write_attempts: Option<u32>,
    /// Milliseconds, doubled on each retry.
    pub retry_delay: Option<u64>,
    /// Seconds.
    pub health_check_interval: Option<u64>,
    /// Seconds, fractional allowed.
    pub startup_duration: Option<f64>,
}

impl Config {
    /// The profile this configuration selects.
    pub fn to_profile(&self) -> ColorProfile {
        let section = &self.profile;
        let name = section.name.as_deref().unwrap_or("default");
        let base = ColorProfile::built_in(name).unwrap_or_default();
        if base.name == name && !section.has_overrides() {
            return base;
        }

        let mut profile = base.save_as(name);
        if let Some(day) = section.day_temp {
            profile.day_kelvin = day;
        }
        if let Some(night) = section.night_temp {
            profile.night_kelvin = night;
        }
        if let Some(minutes) = section.transition_duration {
            profile.transition = Duration::from_secs(minutes * 60);
        }
        if let Some(curve) = section.curve {
            profile.curve = curve;
        }
        if let Some(brightness) = section.brightness {
            profile.brightness = brightness;
        }
        if let Some(contrast) = section.contrast {
            profile.contrast = contrast;
        }

        // Overrides that merely restate the built-in keep it built-in
        if base.name == name && profile == base.save_as(name) {
            return base;
        }
        profile
    }

    pub fn to_location(&self) -> Result<Location> {
        let section = &self.location;
        let location = Location::new(
            section.latitude.unwrap_or(DEFAULT_LATITUDE),
            section.longitude.unwrap_or(DEFAULT_LONGITUDE),
        )?;
        Ok(location.with_labels(section.city.clone(), section.country.clone()))
    }

    pub fn to_engine_settings(&self) -> EngineSettings {
        let engine = &self.engine;
        let defaults = EngineSettings::default();
        EngineSettings {
            cache_capacity: engine.cache_capacity.unwrap_or(defaults.cache_capacity),
            cache_ttl: engine
                .cache_ttl
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            pool_max: engine.pool_max.filter(|max| *max > 0),
            handle_timeout: engine
                .handle_timeout
                .map(Duration::from_secs)
                .unwrap_or(defaults.handle_timeout),
            acquire_timeout: engine
                .acquire_timeout
                .map(Duration::from_millis)
                .unwrap_or(defaults.acquire_timeout),
            retry: RetryPolicy {
                max_attempts: engine
                    .max_write_attempts
                    .unwrap_or(defaults.retry.max_attempts),
                base_delay: engine
                    .retry_delay
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.retry.base_delay),
                write_timeout: engine
                    .write_timeout
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.retry.write_timeout),
            },
            health_check_interval: engine
                .health_check_interval
                .map(Duration::from_secs)
                .unwrap_or(defaults.health_check_interval),
            startup_duration: engine
                .startup_duration
                .map(Duration::from_secs_f64)
                .unwrap_or(defaults.startup_duration),
        }
    }

    /// Print the effective configuration.
    pub fn log_summary(&self) {
        let profile = self.to_profile();
        log_block_start!("Profile: {}", profile.name);
        log_indented!("Day temperature: {}K", profile.day_kelvin);
        log_indented!("Night temperature: {}K", profile.night_kelvin);
        log_indented!(
            "Transition: {} minutes, {} curve",
            profile.transition.as_secs() / 60,
            profile.curve
        );
        if profile.brightness != DEFAULT_BRIGHTNESS || profile.contrast != DEFAULT_CONTRAST {
            log_indented!(
                "Brightness {:.2}, contrast {:.2}",
                profile.brightness,
                profile.contrast
            );
        }
        match self.to_location() {
            Ok(location) => log_indented!("Location: {location}"),
            Err(e) => log_indented!("Location: invalid ({e})"),
        }
    }
}
