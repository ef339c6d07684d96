//! The color engine and its background driver.
//!
//! [`ColorEngine`] is the single owning context for everything that changes
//! at runtime: the ramp cache, the device context pool, the health monitor,
//! the transition state machine and the active profile and location. It is
//! shared by reference with the [`scheduler::Scheduler`], which only decides
//! *when* to call it.
//!
//! Each tick flows through the same pipeline:
//!
//! 1. the transition engine turns `now` into a Kelvin value
//! 2. the ramp for that value comes from the cache, synthesized on a miss
//! 3. every monitor gets the ramp in parallel through a leased context,
//!    guarded by the health monitor's retries
//! 4. a `TemperatureChanged` event goes out
//!
//! Applies are serialized by `apply_lock`, so writes to any one monitor
//! happen strictly in tick order while monitors within one tick proceed
//! independently.

pub mod diagnostics;
pub mod events;
pub mod health;
pub mod interval;
pub mod scheduler;
pub mod transition;

pub use diagnostics::Diagnostics;
pub use events::{EngineEvent, EventSink};
pub use health::{HealthMonitor, RetryPolicy, Verification};
pub use interval::{WriteTimings, adaptive_interval};
pub use scheduler::{Scheduler, SchedulerCommand};
pub use transition::{Tick, TransitionEngine, TransitionReason, TransitionState, TransitionStatus};

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::color::cache::SweepReport;
use crate::color::{ColorTemperature, GammaRampCache, RampKey, synthesize};
use crate::common::constants::*;
use crate::common::utils::format_duration;
use crate::config::validation::{ProfileIssue, auto_correct, check_profile};
use crate::display::pool::{PoolSweepReport, default_pool_size};
use crate::display::{DeviceContextPool, DisplayDevice, MonitorId};
use crate::error::EngineError;
use crate::geo::{Location, SolarCalculator};
use crate::profile::{ColorProfile, Period, SolarSchedule};
use crate::time::Clock;

/// Runtime tunables, normally read from the `[engine]` config section.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub cache_capacity: usize,
    pub cache_ttl: Duration,
    /// Fixed pool size; `None` sizes the pool from the monitor count.
    pub pool_max: Option<usize>,
    pub handle_timeout: Duration,
    pub acquire_timeout: Duration,
    pub retry: RetryPolicy,
    pub health_check_interval: Duration,
    /// Length of the catch-up transition after start, resume or a profile change.
    pub startup_duration: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            pool_max: None,
            handle_timeout: Duration::from_secs(DEFAULT_HANDLE_TIMEOUT_SECS),
            acquire_timeout: Duration::from_millis(DEFAULT_ACQUIRE_TIMEOUT_MS),
            retry: RetryPolicy {
                max_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
                base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
                write_timeout: Duration::from_millis(DEFAULT_WRITE_TIMEOUT_MS),
            },
            health_check_interval: Duration::from_secs(DEFAULT_HEALTH_CHECK_INTERVAL_SECS),
            startup_duration: Duration::from_secs_f64(DEFAULT_STARTUP_DURATION_SECS),
        }
    }
}

impl EngineSettings {
    pub fn pool_size(&self, monitors: usize) -> usize {
        match self.pool_max {
            Some(max) => max.clamp(MINIMUM_POOL_SIZE, MAXIMUM_POOL_SIZE),
            None => default_pool_size(monitors),
        }
    }
}

/// What one periodic health check found and did.
#[derive(Debug, Default)]
pub struct HealthReport {
    pub profile_issues: Vec<ProfileIssue>,
    /// Issues were repaired in place rather than only flagged.
    pub corrected: bool,
    pub verified: Vec<(MonitorId, Verification)>,
    pub failed: Vec<(MonitorId, EngineError)>,
    pub pool: PoolSweepReport,
    pub cache: SweepReport,
}

struct EngineState {
    profile: ColorProfile,
    signature: u64,
    location: Location,
    timezone: Tz,
    // Solar schedule for one local date
    solar: Option<(NaiveDate, SolarSchedule)>,
    transitions: TransitionEngine,
    applied_kelvin: Option<u32>,
    // Manual override in effect; planning waits for resume
    held: bool,
    last_health_check: DateTime<Utc>,
}

enum Plan {
    Idle(Duration),
    Transition {
        from: u32,
        to: u32,
        duration: Duration,
        reason: TransitionReason,
    },
}

pub struct ColorEngine {
    clock: Arc<dyn Clock>,
    device: Arc<dyn DisplayDevice>,
    monitors: Vec<MonitorId>,
    cache: GammaRampCache,
    pool: DeviceContextPool,
    health: HealthMonitor,
    settings: EngineSettings,
    events: EventSink,
    state: Mutex<EngineState>,
    apply_lock: Mutex<()>,
}

impl ColorEngine {
    /// Build an engine for every monitor the device currently reports.
    ///
    /// Returns the engine together with the receiving end of its event channel.
    pub fn new(
        device: Arc<dyn DisplayDevice>,
        clock: Arc<dyn Clock>,
        profile: ColorProfile,
        location: Location,
        settings: EngineSettings,
    ) -> Result<(Self, Receiver<EngineEvent>), EngineError> {
        profile.validate()?;
        location.validate()?;

        let monitors = device.monitors();
        if monitors.is_empty() {
            return Err(EngineError::Critical(format!(
                "{} reported no monitors",
                device.name()
            )));
        }

        let (events, receiver) = EventSink::new();
        let cache = GammaRampCache::new(settings.cache_capacity, settings.cache_ttl, clock.clone());
        let pool = DeviceContextPool::new(
            device.clone(),
            clock.clone(),
            settings.pool_size(monitors.len()),
            settings.handle_timeout,
            settings.acquire_timeout,
        );
        let health = HealthMonitor::new(device.clone(), clock.clone(), settings.retry, events.clone());

        log_debug!(
            "Engine on {} with {} monitor(s), pool max {}, cache {} entries",
            device.name(),
            monitors.len(),
            pool.max(),
            settings.cache_capacity
        );

        let state = EngineState {
            signature: profile.signature(),
            profile,
            timezone: location.timezone(),
            location,
            solar: None,
            transitions: TransitionEngine::new(),
            applied_kelvin: None,
            held: false,
            last_health_check: clock.now(),
        };

        let engine = Self {
            clock,
            device,
            monitors,
            cache,
            pool,
            health,
            settings,
            events,
            state: Mutex::new(state),
            apply_lock: Mutex::new(()),
        };
        Ok((engine, receiver))
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_apply(&self) -> MutexGuard<'_, ()> {
        self.apply_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a transition with the active profile's curve, superseding any running one.
    pub fn create_transition(
        &self,
        from: u32,
        to: u32,
        duration: Duration,
        reason: TransitionReason,
    ) -> Result<(), EngineError> {
        let now = self.clock.now();
        let superseded = {
            let mut state = self.lock_state();
            let curve = state.profile.curve;
            state.transitions.create(from, to, duration, curve, reason, now)?
        };

        if let Some(old) = superseded {
            self.events.emit(EngineEvent::TransitionCancelled { state: old });
        }
        log_decorated!(
            "Transitioning {from}K -> {to}K over {} ({reason})",
            format_duration(duration)
        );
        self.events.emit(EngineEvent::TransitionStarted {
            from,
            to,
            duration_ms: duration.as_millis() as u64,
            reason,
        });
        Ok(())
    }

    /// Advance the running transition and apply its current temperature.
    ///
    /// Returns the adaptive delay before the next tick, or `None` when no
    /// transition is running.
    pub fn tick(&self) -> Result<Option<Duration>, EngineError> {
        let _apply = self.lock_apply();
        let now = self.clock.now();

        let (tick, duration, applied) = {
            let mut state = self.lock_state();
            let Some(tick) = state.transitions.tick(now) else {
                return Ok(None);
            };
            let duration = state
                .transitions
                .current()
                .map(|t| t.duration)
                .unwrap_or_default();
            (tick, duration, state.applied_kelvin)
        };

        if applied != Some(tick.kelvin) {
            self.apply_kelvin(tick.kelvin)?;
        }

        if tick.completed {
            let finished = self.lock_state().transitions.current().cloned();
            if let Some(finished) = finished {
                log_decorated!("Transition complete at {}K", finished.to);
                self.events
                    .emit(EngineEvent::TransitionCompleted { state: finished });
            }
        }

        Ok(Some(adaptive_interval(
            tick.remaining_delta,
            duration,
            self.monitors.len(),
            self.health.average_write_ms(),
        )))
    }

    /// Cancel the running transition and hold its current temperature.
    ///
    /// Automatic planning stays paused until [`ColorEngine::resume`] or a
    /// profile or location update. Stopping while idle changes nothing.
    pub fn stop_transition(&self) -> Result<Option<TransitionState>, EngineError> {
        let _apply = self.lock_apply();
        let now = self.clock.now();
        let stopped = {
            let mut state = self.lock_state();
            let stopped = state.transitions.stop(now);
            if stopped.is_some() {
                state.held = true;
            }
            stopped
        };

        let Some(stopped) = stopped else {
            return Ok(None);
        };
        let kelvin = stopped.kelvin_at(now);
        log_block_start!("Transition stopped at {kelvin}K");
        self.events.emit(EngineEvent::TransitionCancelled {
            state: stopped.clone(),
        });
        self.apply_kelvin(kelvin)?;
        Ok(Some(stopped))
    }

    /// Apply `kelvin` immediately, cancelling any transition and holding the value.
    pub fn apply_temperature(&self, kelvin: u32) -> Result<(), EngineError> {
        ColorTemperature::new(kelvin)?;

        let _apply = self.lock_apply();
        let now = self.clock.now();
        let cancelled = {
            let mut state = self.lock_state();
            state.held = true;
            state.transitions.stop(now)
        };
        if let Some(cancelled) = cancelled {
            self.events
                .emit(EngineEvent::TransitionCancelled { state: cancelled });
        }
        self.apply_kelvin(kelvin)
    }

    // Caller holds apply_lock
    fn apply_kelvin(&self, kelvin: u32) -> Result<(), EngineError> {
        if self.health.is_safe_mode() {
            return Err(EngineError::SafeMode);
        }

        let key = {
            let state = self.lock_state();
            RampKey::new(
                kelvin,
                state.profile.brightness,
                state.profile.contrast,
                state.signature,
            )
        };

        let results: Vec<Result<(), EngineError>> = match self.monitors.as_slice() {
            [only] => vec![self.write_monitor(*only, key)],
            monitors => thread::scope(|scope| {
                let workers: Vec<_> = monitors
                    .iter()
                    .map(|&monitor| scope.spawn(move || self.write_monitor(monitor, key)))
                    .collect();
                workers
                    .into_iter()
                    .map(|worker| {
                        worker.join().unwrap_or_else(|_| {
                            Err(EngineError::Critical("monitor writer panicked".into()))
                        })
                    })
                    .collect()
            }),
        };

        if let Some(error) = results.into_iter().find_map(Result::err) {
            return Err(error);
        }

        self.lock_state().applied_kelvin = Some(kelvin);
        self.events.emit(EngineEvent::TemperatureChanged { kelvin });
        Ok(())
    }

    fn write_monitor(&self, monitor: MonitorId, key: RampKey) -> Result<(), EngineError> {
        let ramp = self.cache.get_or_compute(key, || {
            synthesize(key.kelvin, key.brightness(), key.contrast())
        })?;
        self.health.write(&self.pool, monitor, &ramp)
    }

    /// One scheduler step. Returns how long to wait before the next one.
    pub fn run_cycle(&self) -> Duration {
        let idle = Duration::from_secs(MAXIMUM_IDLE_SLEEP_SECS);
        let retry = Duration::from_millis(MAXIMUM_TICK_INTERVAL_MS);

        if self.health.is_safe_mode() {
            return idle;
        }

        if self.lock_state().transitions.is_running() {
            return match self.tick() {
                Ok(Some(next)) => next,
                Ok(None) => Duration::from_millis(MINIMUM_TICK_INTERVAL_MS),
                Err(e) => {
                    log_error!("Transition tick failed: {e}");
                    retry
                }
            };
        }

        let plan = self.plan(self.clock.now());
        let result = match plan {
            Plan::Idle(wait) => return wait,
            Plan::Transition { to, duration, .. } if duration.is_zero() => {
                let _apply = self.lock_apply();
                self.apply_kelvin(to)
                    .map(|_| Duration::from_millis(MINIMUM_TICK_INTERVAL_MS))
            }
            Plan::Transition {
                from,
                to,
                duration,
                reason,
            } => self
                .create_transition(from, to, duration, reason)
                .and_then(|_| self.tick())
                .map(|next| next.unwrap_or(Duration::from_millis(MINIMUM_TICK_INTERVAL_MS))),
        };

        result.unwrap_or_else(|e| {
            log_error!("Applying scheduled temperature failed: {e}");
            retry
        })
    }

    fn plan(&self, now: DateTime<Utc>) -> Plan {
        let idle = Duration::from_secs(MAXIMUM_IDLE_SLEEP_SECS);
        let mut state = self.lock_state();
        if state.held {
            return Plan::Idle(idle);
        }
        let Some(schedule) = self.schedule_for(&mut state, now) else {
            return Plan::Idle(idle);
        };

        let profile = &state.profile;
        let period = profile.period_at(now, &schedule);
        let target = profile.temperature_for_period(period);

        match (state.applied_kelvin, profile.window_end(now, &schedule)) {
            // Inside a sunrise or sunset window: ride it to the end
            (Some(applied), Some((end, end_kelvin))) if applied != end_kelvin => {
                let reason = match period {
                    Period::Sunrise { .. } => TransitionReason::Sunrise,
                    _ => TransitionReason::Sunset,
                };
                Plan::Transition {
                    from: applied,
                    to: end_kelvin,
                    duration: (end - now).to_std().unwrap_or(Duration::ZERO),
                    reason,
                }
            }
            (Some(applied), _) if applied.abs_diff(target) <= KELVIN_TOLERANCE => {
                let wait = profile
                    .next_boundary(now, &schedule)
                    .and_then(|boundary| (boundary - now).to_std().ok())
                    .unwrap_or(idle)
                    .clamp(Duration::from_millis(MINIMUM_TICK_INTERVAL_MS), idle);
                Plan::Idle(wait)
            }
            (applied, _) => Plan::Transition {
                from: applied.unwrap_or(NEUTRAL_TEMP),
                to: target,
                duration: self.settings.startup_duration,
                reason: TransitionReason::Startup,
            },
        }
    }

    // Solar schedule for the local date at `now`, recomputed when the date changes
    fn schedule_for(&self, state: &mut EngineState, now: DateTime<Utc>) -> Option<SolarSchedule> {
        let date = now.with_timezone(&state.timezone).date_naive();
        if let Some((cached, schedule)) = &state.solar
            && *cached == date
        {
            return Some(schedule.clone());
        }

        match SolarSchedule::from_result(SolarCalculator::compute(&state.location, date)) {
            Ok(schedule) => {
                match &schedule {
                    SolarSchedule::Regular(times) => {
                        let tz = state.timezone;
                        log_block_start!("Solar times for {date} at {}", state.location);
                        log_indented!("Sunrise: {}", times.sunrise.with_timezone(&tz).format("%H:%M:%S"));
                        log_indented!("Sunset: {}", times.sunset.with_timezone(&tz).format("%H:%M:%S"));
                    }
                    SolarSchedule::Polar(condition) => {
                        log_block_start!(
                            "No sunrise or sunset at {} on {date} ({condition})",
                            state.location
                        );
                    }
                }
                state.solar = Some((date, schedule.clone()));
                Some(schedule)
            }
            Err(e) => {
                log_error!("Solar calculation for {date} failed: {e}");
                None
            }
        }
    }

    /// Whether the periodic health check interval has elapsed.
    pub fn health_check_due(&self) -> bool {
        let now = self.clock.now();
        let last = self.lock_state().last_health_check;
        (now - last)
            .to_std()
            .is_ok_and(|elapsed| elapsed >= self.settings.health_check_interval)
    }

    /// Validate the profile, verify every monitor and run the maintenance sweeps.
    pub fn health_check(&self) -> HealthReport {
        let mut report = HealthReport::default();

        let corrected = {
            let mut state = self.lock_state();
            state.last_health_check = self.clock.now();
            let issues = check_profile(&state.profile);
            if issues.is_empty() {
                None
            } else if state.profile.built_in {
                for issue in &issues {
                    log_warning!("Built-in profile '{}': {issue}", state.profile.name);
                }
                report.profile_issues = issues;
                None
            } else {
                let (fixed, issues) = auto_correct(&state.profile);
                state.signature = fixed.signature();
                state.profile = fixed;
                Some((state.profile.name.clone(), issues))
            }
        };

        if let Some((name, issues)) = corrected {
            for issue in &issues {
                log_warning!("Corrected profile '{name}': {issue}");
            }
            self.events.emit(EngineEvent::ProfileCorrected {
                profile: name,
                issues: issues.iter().map(ToString::to_string).collect(),
            });
            report.profile_issues = issues;
            report.corrected = true;
        }

        if !self.health.is_safe_mode() {
            let _apply = self.lock_apply();
            for &monitor in &self.monitors {
                match self.health.verify(&self.pool, monitor) {
                    Ok(verification) => report.verified.push((monitor, verification)),
                    Err(e) => {
                        log_error!("Health check of monitor {monitor} failed: {e}");
                        report.failed.push((monitor, e));
                    }
                }
            }
        }

        report.pool = self.pool.sweep();
        report.cache = self.cache.sweep();
        log_debug!(
            "Health check: {} verified, {} failed, {} profile issue(s)",
            report.verified.len(),
            report.failed.len(),
            report.profile_issues.len()
        );
        report
    }

    /// Leave safe mode and drop any manual hold.
    pub fn resume(&self) {
        self.health.resume();
        self.lock_state().held = false;
        log_block_start!("Resuming automatic adjustment");
    }

    /// Replace the active profile. A running transition is cancelled, any
    /// manual hold is dropped and the next cycle eases toward the new target.
    pub fn update_profile(&self, profile: ColorProfile) -> Result<(), EngineError> {
        profile.validate()?;
        let now = self.clock.now();
        let cancelled = {
            let mut state = self.lock_state();
            state.signature = profile.signature();
            log_block_start!("Profile '{}' active", profile.name);
            state.profile = profile;
            state.held = false;
            state.transitions.stop(now)
        };
        if let Some(cancelled) = cancelled {
            self.events
                .emit(EngineEvent::TransitionCancelled { state: cancelled });
        }
        Ok(())
    }

    pub fn update_location(&self, location: Location) -> Result<(), EngineError> {
        location.validate()?;
        let now = self.clock.now();
        let timezone = location.timezone();
        let cancelled = {
            let mut state = self.lock_state();
            log_block_start!("Location changed to {location}");
            state.location = location;
            state.timezone = timezone;
            state.solar = None;
            state.held = false;
            state.transitions.stop(now)
        };
        if let Some(cancelled) = cancelled {
            self.events
                .emit(EngineEvent::TransitionCancelled { state: cancelled });
        }
        Ok(())
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let (applied_kelvin, transition, held, profile) = {
            let state = self.lock_state();
            (
                state.applied_kelvin,
                state.transitions.current().cloned(),
                state.held,
                state.profile.name.clone(),
            )
        };
        let safe_mode_reason = self.health.safe_mode_reason();
        Diagnostics {
            pool: self.pool.stats(),
            cache: self.cache.stats(),
            applied_kelvin,
            transition,
            safe_mode: safe_mode_reason.is_some(),
            safe_mode_reason,
            held,
            average_write_ms: self.health.average_write_ms(),
            failed_write_attempts: self.health.failed_attempts(),
            monitors: self.monitors.len(),
            profile,
        }
    }

    /// Cancel any transition and close every device context.
    pub fn shutdown(&self) {
        let _apply = self.lock_apply();
        let cancelled = self.lock_state().transitions.stop(self.clock.now());
        if let Some(cancelled) = cancelled {
            self.events
                .emit(EngineEvent::TransitionCancelled { state: cancelled });
        }
        self.pool.shutdown();
        log_debug!("Engine on {} shut down", self.device.name());
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn monitors(&self) -> &[MonitorId] {
        &self.monitors
    }

    pub fn cache(&self) -> &GammaRampCache {
        &self.cache
    }

    pub fn pool(&self) -> &DeviceContextPool {
        &self.pool
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn profile(&self) -> ColorProfile {
        self.lock_state().profile.clone()
    }

    pub fn location(&self) -> Location {
        self.lock_state().location.clone()
    }

    pub fn applied_kelvin(&self) -> Option<u32> {
        self.lock_state().applied_kelvin
    }

    pub fn transition(&self) -> Option<TransitionState> {
        self.lock_state().transitions.current().cloned()
    }

    pub fn is_safe_mode(&self) -> bool {
        self.health.is_safe_mode()
    }

    pub fn is_held(&self) -> bool {
        self.lock_state().held
    }

    /// Period of the day at `now`, if the solar schedule is available.
    pub fn period_at(&self, now: DateTime<Utc>) -> Option<Period> {
        let mut state = self.lock_state();
        let schedule = self.schedule_for(&mut state, now)?;
        Some(state.profile.period_at(now, &schedule))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::SimulatedDisplay;
    use crate::time::ManualClock;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn nyc() -> Location {
        Location::new(40.71, -74.01).unwrap()
    }

    fn engine_at(
        time: DateTime<Utc>,
        monitors: u32,
    ) -> (
        ColorEngine,
        Receiver<EngineEvent>,
        Arc<ManualClock>,
        Arc<SimulatedDisplay>,
    ) {
        let clock = Arc::new(ManualClock::new(time));
        let display = Arc::new(SimulatedDisplay::new(monitors, clock.clone()));
        let (engine, rx) = ColorEngine::new(
            display.clone(),
            clock.clone(),
            ColorProfile::default_profile(),
            nyc(),
            EngineSettings::default(),
        )
        .unwrap();
        (engine, rx, clock, display)
    }

    // Local noon in New York, well clear of both windows
    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 21, 16, 0, 0).unwrap()
    }

    #[test]
    fn test_rejects_invalid_inputs() {
        let clock = Arc::new(ManualClock::new(noon()));
        let display = Arc::new(SimulatedDisplay::new(1, clock.clone()));
        let mut profile = ColorProfile::default_profile();
        profile.day_kelvin = 500;
        let result = ColorEngine::new(
            display.clone(),
            clock.clone(),
            profile,
            nyc(),
            EngineSettings::default(),
        );
        assert!(matches!(result, Err(EngineError::Validation(_))));

        let empty = Arc::new(SimulatedDisplay::new(0, clock.clone()));
        let result = ColorEngine::new(
            empty,
            clock,
            ColorProfile::default_profile(),
            nyc(),
            EngineSettings::default(),
        );
        assert!(matches!(result, Err(EngineError::Critical(_))));
    }

    #[test]
    fn test_startup_eases_to_day() {
        let (engine, rx, clock, display) = engine_at(noon(), 2);
        engine.run_cycle();
        assert!(engine.transition().is_some_and(|t| t.is_running()));

        clock.advance(Duration::from_secs(3));
        engine.run_cycle();
        assert_eq!(engine.applied_kelvin(), Some(6500));
        assert_eq!(
            display.applied_ramp(MonitorId(1)),
            Some(crate::color::synthesize(6500, 1.0, 1.0).unwrap())
        );

        let events: Vec<_> = rx.try_iter().collect();
        assert!(matches!(
            events.first(),
            Some(EngineEvent::TransitionStarted {
                reason: TransitionReason::Startup,
                ..
            })
        ));
        assert!(
            events
                .iter()
                .any(|e| matches!(e, EngineEvent::TransitionCompleted { .. }))
        );

        // Stable day: idle until the sunset window opens
        let wait = engine.run_cycle();
        assert_eq!(wait, Duration::from_secs(MAXIMUM_IDLE_SLEEP_SECS));
    }

    #[test]
    fn test_apply_temperature_holds() {
        let (engine, rx, _clock, display) = engine_at(noon(), 1);
        engine.apply_temperature(4000).unwrap();
        assert_eq!(engine.applied_kelvin(), Some(4000));
        assert!(engine.is_held());
        assert_eq!(display.successful_writes(), 1);

        // Held: planning does not override the manual value
        engine.run_cycle();
        assert_eq!(engine.applied_kelvin(), Some(4000));
        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![EngineEvent::TemperatureChanged { kelvin: 4000 }]
        );

        assert!(matches!(
            engine.apply_temperature(20_000),
            Err(EngineError::Validation(_))
        ));

        engine.resume();
        assert!(!engine.is_held());
        engine.run_cycle();
        assert!(engine.transition().is_some_and(|t| t.from == 4000 && t.to == 6500));
    }

    #[test]
    fn test_stop_applies_current_value() {
        let (engine, rx, clock, _display) = engine_at(noon(), 1);
        engine
            .create_transition(
                6500,
                2700,
                Duration::from_secs(1800),
                TransitionReason::Manual,
            )
            .unwrap();
        clock.advance(Duration::from_secs(600));
        let stopped = engine.stop_transition().unwrap().unwrap();
        assert_eq!(stopped.status, TransitionStatus::Cancelled);
        let held = engine.applied_kelvin().unwrap();
        assert!(held < 6500 && held > 2700);

        // No further ticks after a stop
        clock.advance(Duration::from_secs(60));
        engine.run_cycle();
        assert_eq!(engine.applied_kelvin(), Some(held));
        assert!(
            rx.try_iter()
                .any(|e| matches!(e, EngineEvent::TransitionCancelled { .. }))
        );
    }

    #[test]
    fn test_sunset_window_is_followed() {
        // 20:20 EDT, inside the 45 minute window around the 20:31 sunset
        let start = Utc.with_ymd_and_hms(2025, 6, 22, 0, 20, 0).unwrap();
        let (engine, _rx, clock, _display) = engine_at(start, 1);
        engine.run_cycle();
        clock.advance(Duration::from_secs(3));
        engine.run_cycle();

        // Startup catch-up finished, now riding the window toward night
        engine.run_cycle();
        let transition = engine.transition().unwrap();
        assert_eq!(transition.reason, TransitionReason::Sunset);
        assert_eq!(transition.to, 3300);

        clock.advance(Duration::from_secs(40 * 60));
        engine.run_cycle();
        assert_eq!(engine.applied_kelvin(), Some(3300));
    }

    #[test]
    fn test_health_check_corrects_custom_profile() {
        let (engine, rx, _clock, _display) = engine_at(noon(), 1);
        let mut custom = ColorProfile::default_profile().save_as("custom");
        custom.transition = Duration::from_secs(30 * 60);
        engine.update_profile(custom).unwrap();

        // Simulate persisted state going bad behind the engine's back
        engine.lock_state().profile.night_kelvin = 7000;
        let report = engine.health_check();
        assert!(report.corrected);
        assert!(!report.profile_issues.is_empty());
        let fixed = engine.profile();
        assert!(fixed.day_kelvin > fixed.night_kelvin);
        assert!(
            rx.try_iter()
                .any(|e| matches!(e, EngineEvent::ProfileCorrected { .. }))
        );
    }

    #[test]
    fn test_health_check_due_after_interval() {
        let (engine, _rx, clock, _display) = engine_at(noon(), 1);
        assert!(!engine.health_check_due());
        clock.advance(Duration::from_secs(DEFAULT_HEALTH_CHECK_INTERVAL_SECS));
        assert!(engine.health_check_due());
        engine.health_check();
        assert!(!engine.health_check_due());
    }

    #[test]
    fn test_location_change_recomputes_schedule() {
        let (engine, _rx, _clock, _display) = engine_at(noon(), 1);
        assert_eq!(engine.period_at(noon()), Some(Period::Day));
        // Noon in New York is after midnight in Tokyo
        engine
            .update_location(Location::new(35.68, 139.69).unwrap())
            .unwrap();
        assert_eq!(engine.period_at(noon()), Some(Period::Night));
        assert!(engine.period_at(noon() + ChronoDuration::hours(12)).is_some());
    }

    #[test]
    fn test_stop_while_idle_does_not_hold() {
        let (engine, _rx, clock, _display) = engine_at(noon(), 1);
        assert_eq!(engine.stop_transition(), Ok(None));
        assert!(!engine.is_held());

        engine.run_cycle();
        clock.advance(Duration::from_secs(3));
        engine.run_cycle();
        assert_eq!(engine.applied_kelvin(), Some(6500));
    }

    #[test]
    fn test_profile_update_releases_hold() {
        let (engine, _rx, clock, _display) = engine_at(noon(), 1);
        engine.apply_temperature(4000).unwrap();
        assert!(engine.is_held());

        engine.update_profile(ColorProfile::reading()).unwrap();
        assert!(!engine.is_held());
        engine.run_cycle();
        clock.advance(Duration::from_secs(3));
        engine.run_cycle();
        assert_eq!(engine.applied_kelvin(), Some(5500));
    }

    #[test]
    fn test_location_update_releases_hold() {
        let (engine, _rx, clock, _display) = engine_at(noon(), 1);
        engine.apply_temperature(4000).unwrap();

        // 01:00 in Tokyo, deep in the night
        engine
            .update_location(Location::new(35.68, 139.69).unwrap())
            .unwrap();
        assert!(!engine.is_held());
        engine.run_cycle();
        clock.advance(Duration::from_secs(3));
        engine.run_cycle();
        assert_eq!(engine.applied_kelvin(), Some(3300));
    }
}
