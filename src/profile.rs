//! Color profiles and the day/night schedule.
//!
//! A profile names the day and night color temperatures and how the display
//! moves between them. Sunset and sunrise are windows of the profile's
//! transition duration centered on the solar event, not single instants.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::common::constants::*;
use crate::common::utils::{bezier_curve, interpolate_u32};
use crate::error::{PolarCondition, SolarError, ValidationError};
use crate::geo::SolarTimes;

/// Easing applied to transition progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionCurve {
    Linear,
    /// Cubic Bézier ease-in-out, slow at both ends.
    #[default]
    Sigmoid,
}

impl TransitionCurve {
    /// Map linear progress in `[0, 1]` to eased progress in `[0, 1]`.
    ///
    /// Both curves are monotonic and fix the endpoints.
    pub fn ease(&self, progress: f64) -> f64 {
        let progress = progress.clamp(0.0, 1.0);
        match self {
            TransitionCurve::Linear => progress,
            TransitionCurve::Sigmoid => {
                bezier_curve(progress, BEZIER_P1X, BEZIER_P1Y, BEZIER_P2X, BEZIER_P2Y)
            }
        }
    }
}

impl std::fmt::Display for TransitionCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionCurve::Linear => write!(f, "linear"),
            TransitionCurve::Sigmoid => write!(f, "sigmoid"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorProfile {
    pub name: String,
    pub day_kelvin: u32,
    pub night_kelvin: u32,
    pub transition: Duration,
    pub curve: TransitionCurve,
    pub brightness: f32,
    pub contrast: f32,
    /// Built-in profiles are never modified in place.
    pub built_in: bool,
}

impl ColorProfile {
    pub fn default_profile() -> Self {
        Self {
            name: "default".into(),
            day_kelvin: DEFAULT_DAY_TEMP,
            night_kelvin: DEFAULT_NIGHT_TEMP,
            transition: Duration::from_secs(DEFAULT_TRANSITION_MINUTES * 60),
            curve: TransitionCurve::Sigmoid,
            brightness: DEFAULT_BRIGHTNESS,
            contrast: DEFAULT_CONTRAST,
            built_in: true,
        }
    }

    pub fn reading() -> Self {
        Self {
            name: "reading".into(),
            day_kelvin: 5500,
            night_kelvin: 2700,
            transition: Duration::from_secs(30 * 60),
            curve: TransitionCurve::Linear,
            brightness: DEFAULT_BRIGHTNESS,
            contrast: DEFAULT_CONTRAST,
            built_in: true,
        }
    }

    pub fn built_ins() -> Vec<Self> {
        vec![Self::default_profile(), Self::reading()]
    }

    /// Look up a built-in profile by name.
    pub fn built_in(name: &str) -> Option<Self> {
        Self::built_ins().into_iter().find(|p| p.name == name)
    }

    /// Editable copy of this profile under a new name.
    pub fn save_as(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            built_in: false,
            ..self.clone()
        }
    }

    /// Reject values the engine cannot run with.
    ///
    /// The softer consistency rules (day warmer than night) are checked by
    /// the periodic health check instead.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for kelvin in [self.day_kelvin, self.night_kelvin] {
            if !(MINIMUM_TEMP..=MAXIMUM_TEMP).contains(&kelvin) {
                return Err(ValidationError::OutOfRange {
                    kelvin,
                    min: MINIMUM_TEMP,
                    max: MAXIMUM_TEMP,
                });
            }
        }
        if self.transition.is_zero() {
            return Err(ValidationError::ZeroDuration);
        }
        if !self.brightness.is_finite()
            || !(MINIMUM_BRIGHTNESS..=MAXIMUM_BRIGHTNESS).contains(&self.brightness)
        {
            return Err(ValidationError::InvalidBrightness(self.brightness));
        }
        if !self.contrast.is_finite()
            || !(MINIMUM_CONTRAST..=MAXIMUM_CONTRAST).contains(&self.contrast)
        {
            return Err(ValidationError::InvalidContrast(self.contrast));
        }
        Ok(())
    }

    /// Stable identifier over the fields that shape a synthesized ramp.
    pub fn signature(&self) -> u64 {
        let input = format!(
            "{}|{:.3}|{:.3}",
            self.name, self.brightness, self.contrast
        );
        let digest = sha256::digest(input);
        u64::from_str_radix(&digest[..16], 16).unwrap_or(0)
    }

    /// Where `now` falls in the day described by `schedule`.
    pub fn period_at(&self, now: DateTime<Utc>, schedule: &SolarSchedule) -> Period {
        let times = match schedule {
            SolarSchedule::Regular(times) => times,
            SolarSchedule::Polar(PolarCondition::PolarDay) => return Period::Day,
            SolarSchedule::Polar(PolarCondition::PolarNight) => return Period::Night,
        };

        let windows = TransitionWindows::new(times, self.transition);
        if let Some(progress) = windows.sunrise_progress(now) {
            Period::Sunrise { progress }
        } else if let Some(progress) = windows.sunset_progress(now) {
            Period::Sunset { progress }
        } else if now >= windows.sunrise_end && now < windows.sunset_start {
            Period::Day
        } else {
            Period::Night
        }
    }

    /// Target color temperature at `now`.
    pub fn temperature_for_time(&self, now: DateTime<Utc>, schedule: &SolarSchedule) -> u32 {
        self.temperature_for_period(self.period_at(now, schedule))
    }

    pub fn temperature_for_period(&self, period: Period) -> u32 {
        match period {
            Period::Day => self.day_kelvin,
            Period::Night => self.night_kelvin,
            Period::Sunset { progress } => {
                interpolate_u32(self.day_kelvin, self.night_kelvin, self.curve.ease(progress))
            }
            Period::Sunrise { progress } => {
                interpolate_u32(self.night_kelvin, self.day_kelvin, self.curve.ease(progress))
            }
        }
    }

    /// End of the transition window containing `now`, with the Kelvin reached there.
    pub fn window_end(&self, now: DateTime<Utc>, schedule: &SolarSchedule) -> Option<(DateTime<Utc>, u32)> {
        let SolarSchedule::Regular(times) = schedule else {
            return None;
        };
        let windows = TransitionWindows::new(times, self.transition);
        match self.period_at(now, schedule) {
            Period::Sunrise { .. } => Some((windows.sunrise_end, self.day_kelvin)),
            Period::Sunset { .. } => Some((windows.sunset_end, self.night_kelvin)),
            _ => None,
        }
    }

    /// Next window boundary after `now` on this date, if any.
    pub fn next_boundary(&self, now: DateTime<Utc>, schedule: &SolarSchedule) -> Option<DateTime<Utc>> {
        let SolarSchedule::Regular(times) = schedule else {
            return None;
        };
        let windows = TransitionWindows::new(times, self.transition);
        [
            windows.sunrise_start,
            windows.sunrise_end,
            windows.sunset_start,
            windows.sunset_end,
        ]
        .into_iter()
        .filter(|t| *t > now)
        .min()
    }
}

impl Default for ColorProfile {
    fn default() -> Self {
        Self::default_profile()
    }
}

/// Solar input for one local date: regular sunrise/sunset, or a polar day or night.
#[derive(Debug, Clone, PartialEq)]
pub enum SolarSchedule {
    Regular(SolarTimes),
    Polar(PolarCondition),
}

impl SolarSchedule {
    /// Polar conditions become a constant schedule; other errors pass through.
    pub fn from_result(result: Result<SolarTimes, SolarError>) -> Result<Self, SolarError> {
        match result {
            Ok(times) => Ok(SolarSchedule::Regular(times)),
            Err(SolarError::PolarDayOrNight(condition)) => Ok(SolarSchedule::Polar(condition)),
            Err(e) => Err(e),
        }
    }
}

/// Current phase of the day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "period", rename_all = "snake_case")]
pub enum Period {
    Day,
    Night,
    /// Day to night; progress 0.0 is day-like, 1.0 night-like.
    Sunset { progress: f64 },
    /// Night to day; progress 0.0 is night-like, 1.0 day-like.
    Sunrise { progress: f64 },
}

struct TransitionWindows {
    sunrise_start: DateTime<Utc>,
    sunrise_end: DateTime<Utc>,
    sunset_start: DateTime<Utc>,
    sunset_end: DateTime<Utc>,
}

impl TransitionWindows {
    fn new(times: &SolarTimes, duration: Duration) -> Self {
        let half = ChronoDuration::from_std(duration / 2).unwrap_or(ChronoDuration::zero());
        // Windows may not overlap on very short days
        let half = half.min((times.sunset - times.sunrise) / 2);
        Self {
            sunrise_start: times.sunrise - half,
            sunrise_end: times.sunrise + half,
            sunset_start: times.sunset - half,
            sunset_end: times.sunset + half,
        }
    }

    fn progress(now: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<f64> {
        if now < start || now >= end {
            return None;
        }
        let total = (end - start).num_milliseconds() as f64;
        if total <= 0.0 {
            return None;
        }
        Some(((now - start).num_milliseconds() as f64 / total).clamp(0.0, 1.0))
    }

    fn sunrise_progress(&self, now: DateTime<Utc>) -> Option<f64> {
        Self::progress(now, self.sunrise_start, self.sunrise_end)
    }

    fn sunset_progress(&self, now: DateTime<Utc>) -> Option<f64> {
        Self::progress(now, self.sunset_start, self.sunset_end)
    }
}
