//! Sunrise, sunset and solar noon from the sunrise equation.
//!
//! Uses the low-precision solar position series (mean anomaly, equation of
//! center, ecliptic longitude) which is good to about a minute at mid
//! latitudes. Sunrise and sunset are the instants the sun's upper limb
//! touches the horizon, accounting for refraction (-0.833°).

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::error::{PolarCondition, SolarError, ValidationError};
use crate::geo::Location;

const J2000: f64 = 2_451_545.0;
const UNIX_EPOCH_JD: f64 = 2_440_587.5;
const SECONDS_PER_DAY: f64 = 86_400.0;
const EARTH_OBLIQUITY: f64 = 23.4397;
const HORIZON_ELEVATION: f64 = -0.833;
// Leap second and terrestrial time correction, in days
const TT_CORRECTION: f64 = 0.0008;

/// Solar events for one location on one calendar date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolarTimes {
    pub sunrise: DateTime<Utc>,
    pub solar_noon: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
    pub location: Location,
    pub date: NaiveDate,
}

impl SolarTimes {
    /// Assemble solar times, enforcing sunrise before sunset.
    pub fn new(
        sunrise: DateTime<Utc>,
        solar_noon: DateTime<Utc>,
        sunset: DateTime<Utc>,
        location: Location,
        date: NaiveDate,
    ) -> Result<Self, ValidationError> {
        if sunrise >= sunset {
            return Err(ValidationError::SunriseAfterSunset);
        }
        Ok(Self {
            sunrise,
            solar_noon,
            sunset,
            location,
            date,
        })
    }

    pub fn day_length(&self) -> Duration {
        (self.sunset - self.sunrise).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn night_length(&self) -> Duration {
        Duration::from_secs(86_400).saturating_sub(self.day_length())
    }
}

/// Stateless calculator; safe to share and call from any thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SolarCalculator;

impl SolarCalculator {
    /// Solar times for `location` on the local calendar `date`.
    ///
    /// Fails with `PolarDayOrNight` when the sun stays above or below the
    /// horizon all day. That is a property of the date, not a transient
    /// failure, so callers should substitute constant day or night.
    pub fn compute(location: &Location, date: NaiveDate) -> Result<SolarTimes, SolarError> {
        location.validate()?;

        let lat = location.latitude();
        let lon = location.longitude();

        let epoch = NaiveDate::from_ymd_opt(2000, 1, 1).ok_or(SolarError::DateOutOfRange(date))?;
        let n = (date - epoch).num_days() as f64;

        // Mean solar time at this longitude
        let j_star = n + TT_CORRECTION - lon / 360.0;

        let mean_anomaly = (357.5291 + 0.985_600_28 * j_star).rem_euclid(360.0);
        let m = mean_anomaly.to_radians();
        let center = 1.9148 * m.sin() + 0.0200 * (2.0 * m).sin() + 0.0003 * (3.0 * m).sin();

        // Ecliptic longitude, using the argument of perihelion 102.9372°
        let lambda = (mean_anomaly + center + 180.0 + 102.9372).rem_euclid(360.0);
        let l = lambda.to_radians();

        let transit = J2000 + j_star + 0.0053 * m.sin() - 0.0069 * (2.0 * l).sin();

        let sin_decl = l.sin() * EARTH_OBLIQUITY.to_radians().sin();
        let cos_decl = sin_decl.asin().cos();
        let phi = lat.to_radians();

        let cos_hour_angle = (HORIZON_ELEVATION.to_radians().sin() - phi.sin() * sin_decl)
            / (phi.cos() * cos_decl);

        if cos_hour_angle > 1.0 {
            return Err(SolarError::PolarDayOrNight(PolarCondition::PolarNight));
        }
        if cos_hour_angle < -1.0 || !cos_hour_angle.is_finite() {
            // Exactly at a pole cos(phi) is zero; the sign of the declination decides
            return Err(SolarError::PolarDayOrNight(
                if !cos_hour_angle.is_finite() && phi.sin() * sin_decl <= 0.0 {
                    PolarCondition::PolarNight
                } else {
                    PolarCondition::PolarDay
                },
            ));
        }

        let hour_angle = cos_hour_angle.acos().to_degrees();
        let rise = transit - hour_angle / 360.0;
        let set = transit + hour_angle / 360.0;

        let to_utc = |jd: f64| julian_to_utc(jd).ok_or(SolarError::DateOutOfRange(date));

        Ok(SolarTimes::new(
            to_utc(rise)?,
            to_utc(transit)?,
            to_utc(set)?,
            location.clone(),
            date,
        )?)
    }
}

fn julian_to_utc(jd: f64) -> Option<DateTime<Utc>> {
    let millis = ((jd - UNIX_EPOCH_JD) * SECONDS_PER_DAY * 1000.0).round();
    if !millis.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use chrono_tz::America::New_York;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn minutes_of_day<Tz: chrono::TimeZone>(t: DateTime<Tz>) -> i64 {
        t.hour() as i64 * 60 + t.minute() as i64
    }

    #[test]
    fn test_new_york_summer_solstice() {
        let nyc = Location::new(40.71, -74.01).unwrap();
        let times = SolarCalculator::compute(&nyc, date(2025, 6, 21)).unwrap();

        let sunrise = times.sunrise.with_timezone(&New_York);
        let sunset = times.sunset.with_timezone(&New_York);
        assert_eq!(sunrise.day(), 21);
        assert_eq!(sunset.day(), 21);

        // 05:25 and 20:31 EDT per published almanac tables
        assert!((minutes_of_day(sunrise) - (5 * 60 + 25)).abs() <= 4, "sunrise {sunrise}");
        assert!((minutes_of_day(sunset) - (20 * 60 + 31)).abs() <= 4, "sunset {sunset}");

        let noon = times.solar_noon.with_timezone(&New_York);
        assert!((minutes_of_day(noon) - (12 * 60 + 57)).abs() <= 3, "noon {noon}");
        assert!(times.sunrise < times.solar_noon && times.solar_noon < times.sunset);
    }

    #[test]
    fn test_day_length_follows_seasons() {
        let nyc = Location::new(40.71, -74.01).unwrap();
        let summer = SolarCalculator::compute(&nyc, date(2025, 6, 21)).unwrap();
        let winter = SolarCalculator::compute(&nyc, date(2025, 12, 21)).unwrap();
        assert!(summer.day_length() > winter.day_length());
        // Roughly 15h vs 9h15m
        assert!(summer.day_length().as_secs() > 14 * 3600);
        assert!(winter.day_length().as_secs() < 10 * 3600);
        assert_eq!(
            winter.day_length() + winter.night_length(),
            Duration::from_secs(86_400)
        );
    }

    #[test]
    fn test_southern_hemisphere_is_inverted() {
        let sydney = Location::new(-33.8688, 151.2093).unwrap();
        let june = SolarCalculator::compute(&sydney, date(2025, 6, 21)).unwrap();
        let december = SolarCalculator::compute(&sydney, date(2025, 12, 21)).unwrap();
        assert!(december.day_length() > june.day_length());
    }

    #[test]
    fn test_polar_day_and_night() {
        let tromso = Location::new(69.6492, 18.9553).unwrap();
        assert_eq!(
            SolarCalculator::compute(&tromso, date(2025, 6, 21)),
            Err(SolarError::PolarDayOrNight(PolarCondition::PolarDay))
        );
        assert_eq!(
            SolarCalculator::compute(&tromso, date(2025, 12, 21)),
            Err(SolarError::PolarDayOrNight(PolarCondition::PolarNight))
        );

        let north_pole = Location::new(90.0, 0.0).unwrap();
        assert!(matches!(
            SolarCalculator::compute(&north_pole, date(2025, 6, 21)),
            Err(SolarError::PolarDayOrNight(PolarCondition::PolarDay))
        ));
    }

    #[test]
    fn test_equator_has_twelve_hour_days() {
        let quito = Location::new(-0.18, -78.47).unwrap();
        for d in [date(2025, 3, 20), date(2025, 6, 21), date(2025, 12, 21)] {
            let times = SolarCalculator::compute(&quito, d).unwrap();
            let hours = times.day_length().as_secs_f64() / 3600.0;
            assert!((hours - 12.1).abs() < 0.2, "{d}: {hours}h");
        }
    }

    #[test]
    fn test_sunrise_after_sunset_rejected() {
        let loc = Location::new(0.0, 0.0).unwrap();
        let t = DateTime::from_timestamp(1_750_000_000, 0).unwrap();
        assert_eq!(
            SolarTimes::new(t, t, t, loc, date(2025, 6, 15)),
            Err(ValidationError::SunriseAfterSunset)
        );
    }
}
