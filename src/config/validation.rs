//! Configuration validation and profile consistency checks.
//!
//! `validate_config` rejects values that are out of range outright. The
//! profile checks are softer: they describe inconsistencies the engine's
//! health check can repair (`auto_correct`) or, for built-in profiles, flag.

use anyhow::Result;
use std::fmt;
use std::time::Duration;

use super::Config;
use crate::common::constants::*;
use crate::profile::ColorProfile;

/// Reject configurations with out-of-range values.
pub fn validate_config(config: &Config) -> Result<()> {
    let profile = &config.profile;

    if let Some(name) = &profile.name
        && name.trim().is_empty()
    {
        anyhow::bail!("profile name must not be empty");
    }

    for (field, value) in [("day_temp", profile.day_temp), ("night_temp", profile.night_temp)] {
        if let Some(temp) = value
            && !(MINIMUM_TEMP..=MAXIMUM_TEMP).contains(&temp)
        {
            anyhow::bail!(
                "{} ({}) must be between {} and {} Kelvin",
                field,
                temp,
                MINIMUM_TEMP,
                MAXIMUM_TEMP
            );
        }
    }

    if let Some(minutes) = profile.transition_duration
        && !(MINIMUM_TRANSITION_MINUTES..=MAXIMUM_TRANSITION_MINUTES).contains(&minutes)
    {
        anyhow::bail!(
            "transition_duration ({} minutes) must be between {} and {} minutes",
            minutes,
            MINIMUM_TRANSITION_MINUTES,
            MAXIMUM_TRANSITION_MINUTES
        );
    }

    if let Some(brightness) = profile.brightness
        && !(MINIMUM_BRIGHTNESS..=MAXIMUM_BRIGHTNESS).contains(&brightness)
    {
        anyhow::bail!(
            "brightness ({}) must be between {} and {}",
            brightness,
            MINIMUM_BRIGHTNESS,
            MAXIMUM_BRIGHTNESS
        );
    }

    if let Some(contrast) = profile.contrast
        && !(MINIMUM_CONTRAST..=MAXIMUM_CONTRAST).contains(&contrast)
    {
        anyhow::bail!(
            "contrast ({}) must be between {} and {}",
            contrast,
            MINIMUM_CONTRAST,
            MAXIMUM_CONTRAST
        );
    }

    if let (Some(day), Some(night)) = (profile.day_temp, profile.night_temp)
        && day <= night
    {
        // Repaired by the health check, not fatal
        log_warning!(
            "day_temp ({day}K) should be higher than night_temp ({night}K)"
        );
    }

    if let Some(lat) = config.location.latitude
        && !(-90.0..=90.0).contains(&lat)
    {
        anyhow::bail!("latitude must be between -90 and 90 degrees (got {})", lat);
    }

    if let Some(lon) = config.location.longitude
        && !(-180.0..=180.0).contains(&lon)
    {
        anyhow::bail!(
            "longitude must be between -180 and 180 degrees (got {})",
            lon
        );
    }

    validate_engine(config)
}

fn validate_engine(config: &Config) -> Result<()> {
    let engine = &config.engine;

    if engine.cache_capacity == Some(0) {
        anyhow::bail!("cache_capacity must be at least 1");
    }
    if engine.cache_ttl == Some(0) {
        anyhow::bail!("cache_ttl must be at least 1 second");
    }

    if let Some(max) = engine.pool_max
        && max != 0
        && !(MINIMUM_POOL_SIZE..=MAXIMUM_POOL_SIZE).contains(&max)
    {
        anyhow::bail!(
            "pool_max ({}) must be 0 or between {} and {}",
            max,
            MINIMUM_POOL_SIZE,
            MAXIMUM_POOL_SIZE
        );
    }

    if engine.handle_timeout == Some(0) {
        anyhow::bail!("handle_timeout must be at least 1 second");
    }
    if engine.acquire_timeout == Some(0) {
        anyhow::bail!("acquire_timeout must be at least 1 millisecond");
    }
    if engine.write_timeout == Some(0) {
        anyhow::bail!("write_timeout must be at least 1 millisecond");
    }

    if let Some(attempts) = engine.max_write_attempts
        && !(1..=10).contains(&attempts)
    {
        anyhow::bail!("max_write_attempts ({}) must be between 1 and 10", attempts);
    }

    if let Some(interval) = engine.health_check_interval
        && !(MINIMUM_HEALTH_CHECK_INTERVAL_SECS..=MAXIMUM_HEALTH_CHECK_INTERVAL_SECS)
            .contains(&interval)
    {
        anyhow::bail!(
            "health_check_interval ({} seconds) must be between {} and {} seconds",
            interval,
            MINIMUM_HEALTH_CHECK_INTERVAL_SECS,
            MAXIMUM_HEALTH_CHECK_INTERVAL_SECS
        );
    }

    if let Some(secs) = engine.startup_duration
        && !(0.0..=MAXIMUM_STARTUP_DURATION_SECS).contains(&secs)
    {
        anyhow::bail!(
            "startup_duration ({} seconds) must be between 0 and {} seconds",
            secs,
            MAXIMUM_STARTUP_DURATION_SECS
        );
    }

    Ok(())
}

/// One inconsistency in a color profile.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileIssue {
    KelvinOutOfRange { field: &'static str, kelvin: u32 },
    DayNotAboveNight { day: u32, night: u32 },
    ZeroTransition,
    TransitionTooLong(Duration),
    BrightnessOutOfRange(f32),
    ContrastOutOfRange(f32),
}

impl fmt::Display for ProfileIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileIssue::KelvinOutOfRange { field, kelvin } => write!(
                f,
                "{field} {kelvin}K is outside {MINIMUM_TEMP}-{MAXIMUM_TEMP}K"
            ),
            ProfileIssue::DayNotAboveNight { day, night } => write!(
                f,
                "day temperature {day}K is not higher than night temperature {night}K"
            ),
            ProfileIssue::ZeroTransition => write!(f, "transition duration is zero"),
            ProfileIssue::TransitionTooLong(duration) => write!(
                f,
                "transition duration of {} minutes exceeds {MAXIMUM_TRANSITION_MINUTES}",
                duration.as_secs() / 60
            ),
            ProfileIssue::BrightnessOutOfRange(b) => write!(
                f,
                "brightness {b} is outside {MINIMUM_BRIGHTNESS}-{MAXIMUM_BRIGHTNESS}"
            ),
            ProfileIssue::ContrastOutOfRange(c) => write!(
                f,
                "contrast {c} is outside {MINIMUM_CONTRAST}-{MAXIMUM_CONTRAST}"
            ),
        }
    }
}

fn max_transition() -> Duration {
    Duration::from_secs(MAXIMUM_TRANSITION_MINUTES * 60)
}

/// Every consistency problem in `profile`, empty when it is sound.
pub fn check_profile(profile: &ColorProfile) -> Vec<ProfileIssue> {
    let mut issues = Vec::new();

    for (field, kelvin) in [
        ("day temperature", profile.day_kelvin),
        ("night temperature", profile.night_kelvin),
    ] {
        if !(MINIMUM_TEMP..=MAXIMUM_TEMP).contains(&kelvin) {
            issues.push(ProfileIssue::KelvinOutOfRange { field, kelvin });
        }
    }

    if profile.day_kelvin <= profile.night_kelvin {
        issues.push(ProfileIssue::DayNotAboveNight {
            day: profile.day_kelvin,
            night: profile.night_kelvin,
        });
    }

    if profile.transition.is_zero() {
        issues.push(ProfileIssue::ZeroTransition);
    } else if profile.transition > max_transition() {
        issues.push(ProfileIssue::TransitionTooLong(profile.transition));
    }

    if !profile.brightness.is_finite()
        || !(MINIMUM_BRIGHTNESS..=MAXIMUM_BRIGHTNESS).contains(&profile.brightness)
    {
        issues.push(ProfileIssue::BrightnessOutOfRange(profile.brightness));
    }
    if !profile.contrast.is_finite()
        || !(MINIMUM_CONTRAST..=MAXIMUM_CONTRAST).contains(&profile.contrast)
    {
        issues.push(ProfileIssue::ContrastOutOfRange(profile.contrast));
    }

    issues
}

/// Repair every issue `check_profile` reports.
///
/// Returns the corrected profile and the issues that were fixed. Out-of-range
/// values are clamped; swapped day and night temperatures are swapped back;
/// equal ones fall back to the defaults.
pub fn auto_correct(profile: &ColorProfile) -> (ColorProfile, Vec<ProfileIssue>) {
    let issues = check_profile(profile);
    let mut fixed = profile.clone();

    fixed.day_kelvin = fixed.day_kelvin.clamp(MINIMUM_TEMP, MAXIMUM_TEMP);
    fixed.night_kelvin = fixed.night_kelvin.clamp(MINIMUM_TEMP, MAXIMUM_TEMP);
    if fixed.day_kelvin < fixed.night_kelvin {
        std::mem::swap(&mut fixed.day_kelvin, &mut fixed.night_kelvin);
    } else if fixed.day_kelvin == fixed.night_kelvin {
        fixed.day_kelvin = DEFAULT_DAY_TEMP;
        fixed.night_kelvin = DEFAULT_NIGHT_TEMP;
    }

    if fixed.transition.is_zero() {
        fixed.transition = Duration::from_secs(DEFAULT_TRANSITION_MINUTES * 60);
    } else if fixed.transition > max_transition() {
        fixed.transition = max_transition();
    }

    fixed.brightness = if fixed.brightness.is_finite() {
        fixed.brightness.clamp(MINIMUM_BRIGHTNESS, MAXIMUM_BRIGHTNESS)
    } else {
        DEFAULT_BRIGHTNESS
    };
    fixed.contrast = if fixed.contrast.is_finite() {
        fixed.contrast.clamp(MINIMUM_CONTRAST, MAXIMUM_CONTRAST)
    } else {
        DEFAULT_CONTRAST
    };

    (fixed, issues)
}
