//! Transition state machine.
//!
//! `Idle -> Running -> {Completed, Cancelled}`. The engine owns one
//! [`TransitionEngine`]; starting a transition supersedes the running one,
//! so at most one is ever active. This type does no I/O: it only turns the
//! current time into an interpolated Kelvin value.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::color::ColorTemperature;
use crate::common::utils::interpolate_u32;
use crate::error::ValidationError;
use crate::profile::TransitionCurve;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStatus {
    Running,
    Completed,
    Cancelled,
}

/// Why a transition was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    /// Catching up after start, resume or a profile change.
    Startup,
    Sunset,
    Sunrise,
    Manual,
}

impl std::fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransitionReason::Startup => "startup",
            TransitionReason::Sunset => "sunset",
            TransitionReason::Sunrise => "sunrise",
            TransitionReason::Manual => "manual",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionState {
    pub from: u32,
    pub to: u32,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub curve: TransitionCurve,
    pub reason: TransitionReason,
    /// Linear elapsed fraction at the last tick.
    pub progress: f64,
    pub status: TransitionStatus,
}

impl TransitionState {
    /// Elapsed fraction at `now`, clamped to `[0, 1]`.
    pub fn fraction_at(&self, now: DateTime<Utc>) -> f64 {
        let total = self.duration.as_secs_f64();
        if total <= 0.0 {
            return 1.0;
        }
        let elapsed = (now - self.started_at).num_milliseconds() as f64 / 1000.0;
        (elapsed / total).clamp(0.0, 1.0)
    }

    /// Interpolated Kelvin for a linear fraction, after easing.
    pub fn kelvin_at_fraction(&self, fraction: f64) -> u32 {
        interpolate_u32(self.from, self.to, self.curve.ease(fraction))
    }

    pub fn kelvin_at(&self, now: DateTime<Utc>) -> u32 {
        self.kelvin_at_fraction(self.fraction_at(now))
    }

    pub fn is_running(&self) -> bool {
        self.status == TransitionStatus::Running
    }
}

/// Output of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub kelvin: u32,
    pub progress: f64,
    /// Kelvin still to travel after this tick.
    pub remaining_delta: u32,
    pub completed: bool,
}

#[derive(Debug, Default)]
pub struct TransitionEngine {
    current: Option<TransitionState>,
}

impl TransitionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a transition, returning the one it superseded (now `Cancelled`).
    pub fn create(
        &mut self,
        from: u32,
        to: u32,
        duration: Duration,
        curve: TransitionCurve,
        reason: TransitionReason,
        now: DateTime<Utc>,
    ) -> Result<Option<TransitionState>, ValidationError> {
        ColorTemperature::new(from)?;
        ColorTemperature::new(to)?;
        if duration.is_zero() {
            return Err(ValidationError::ZeroDuration);
        }

        let superseded = self.stop(now);
        self.current = Some(TransitionState {
            from,
            to,
            started_at: now,
            duration,
            curve,
            reason,
            progress: 0.0,
            status: TransitionStatus::Running,
        });
        Ok(superseded)
    }

    /// Advance the running transition to `now`. `None` when nothing is running.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Tick> {
        let state = self.current.as_mut().filter(|s| s.is_running())?;

        let fraction = state.fraction_at(now);
        let kelvin = state.kelvin_at_fraction(fraction);
        state.progress = fraction;
        let completed = fraction >= 1.0;
        if completed {
            state.status = TransitionStatus::Completed;
        }

        Some(Tick {
            kelvin,
            progress: fraction,
            remaining_delta: kelvin.abs_diff(state.to),
            completed,
        })
    }

    /// Cancel the running transition, recording progress at `now`.
    ///
    /// Returns the cancelled state; its `kelvin_at(now)` is the temperature to hold.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Option<TransitionState> {
        let state = self.current.as_mut().filter(|s| s.is_running())?;
        state.progress = state.fraction_at(now);
        state.status = TransitionStatus::Cancelled;
        Some(state.clone())
    }

    /// Most recent transition, whatever its status.
    pub fn current(&self) -> Option<&TransitionState> {
        self.current.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.current.as_ref().is_some_and(|s| s.is_running())
    }
}
