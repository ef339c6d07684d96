//! Print the solar schedule for one date and location.
//!
//! Times are shown in the timezone of the coordinates, which is not
//! necessarily the timezone of the machine running the command.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use std::time::Duration;

use crate::common::utils::format_duration;
use crate::config;
use crate::error::SolarError;
use crate::geo::{Location, SolarCalculator, SolarTimes};
use crate::profile::ColorProfile;

/// Resolve the date argument, defaulting to today at the location.
fn resolve_date(date: Option<&str>, tz: Tz) -> Result<NaiveDate> {
    match date {
        Some(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .with_context(|| format!("'{text}' is not a valid YYYY-MM-DD date")),
        None => Ok(Utc::now().with_timezone(&tz).date_naive()),
    }
}

fn log_window(label: &str, center: chrono::DateTime<Utc>, length: Duration, tz: Tz) {
    let half = chrono::Duration::from_std(length / 2).unwrap_or_default();
    log_indented!(
        "{label} transition: {} - {}",
        (center - half).with_timezone(&tz).format("%H:%M:%S"),
        (center + half).with_timezone(&tz).format("%H:%M:%S")
    );
}

fn log_times(times: &SolarTimes, profile: &ColorProfile, tz: Tz) {
    let fmt = |t: chrono::DateTime<Utc>| t.with_timezone(&tz).format("%H:%M:%S").to_string();
    log_indented!("Sunrise:    {}", fmt(times.sunrise));
    log_indented!("Solar noon: {}", fmt(times.solar_noon));
    log_indented!("Sunset:     {}", fmt(times.sunset));
    log_indented!("Day length: {}", format_duration(times.day_length()));
    log_block_start!(
        "Profile '{}' ({} minute windows)",
        profile.name,
        profile.transition.as_secs() / 60
    );
    log_window("Sunrise", times.sunrise, profile.transition, tz);
    log_window("Sunset", times.sunset, profile.transition, tz);
}

pub fn handle_solar_command(
    date: Option<String>,
    coordinates: Option<(f64, f64)>,
) -> Result<()> {
    log_version!();

    let profile;
    let location = match coordinates {
        Some((lat, lon)) => {
            profile = ColorProfile::default_profile();
            Location::new(lat, lon)?
        }
        None => {
            let config = config::load()?;
            profile = config.to_profile();
            config.to_location()?
        }
    };

    let tz = location.timezone();
    let date = resolve_date(date.as_deref(), tz)?;

    log_block_start!("Solar times for {date} at {location}");
    log_decorated!("Timezone: {tz}");

    match SolarCalculator::compute(&location, date) {
        Ok(times) => log_times(&times, &profile, tz),
        Err(SolarError::PolarDayOrNight(condition)) => {
            log_indented!("No sunrise or sunset: {condition}");
            log_indented!(
                "duskshift holds {}K all day",
                match condition {
                    crate::error::PolarCondition::PolarDay => profile.day_kelvin,
                    crate::error::PolarCondition::PolarNight => profile.night_kelvin,
                }
            );
        }
        Err(e) => return Err(e).context("Solar calculation failed"),
    }

    log_end!();
    Ok(())
}
