//! Hardware write supervision and safe mode.
//!
//! Every gamma write goes through [`HealthMonitor::write`]. A failed or
//! too-slow write is retried with doubling backoff. When the attempts run
//! out the last ramp known to have reached that monitor is written once
//! more; if that also fails the monitor enters safe mode, which blocks all
//! further writes until [`HealthMonitor::resume`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::color::GammaRamp;
use crate::core::events::{EngineEvent, EventSink};
use crate::core::interval::WriteTimings;
use crate::display::{DeviceContextPool, DisplayDevice, MonitorId};
use crate::error::{DisplayError, EngineError};
use crate::time::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Writes slower than this count as failed.
    pub write_timeout: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): base, 2x base, 4x base...
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor)
    }
}

/// Outcome of checking one monitor's applied state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Read-back matched the last known good ramp.
    Matches,
    /// Read-back differed and the last known good ramp was rewritten.
    Repaired,
    /// The device cannot read back; the last known good ramp was rewritten.
    Refreshed,
    /// Nothing has been written to this monitor yet.
    NothingApplied,
}

#[derive(Default)]
struct HealthState {
    last_good: HashMap<MonitorId, Arc<GammaRamp>>,
    safe_mode: Option<String>,
    timings: WriteTimings,
    failed_attempts: u64,
}

pub struct HealthMonitor {
    device: Arc<dyn DisplayDevice>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    events: EventSink,
    state: Mutex<HealthState>,
}

impl HealthMonitor {
    pub fn new(
        device: Arc<dyn DisplayDevice>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
        events: EventSink,
    ) -> Self {
        Self {
            device,
            clock,
            policy,
            events,
            state: Mutex::new(HealthState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HealthState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write `ramp` to `monitor` with bounded retries.
    ///
    /// Transient failures are retried internally and only surface once the
    /// attempts are exhausted, as a critical error. A closed pool is reported
    /// as transient without retrying or escalating.
    pub fn write(
        &self,
        pool: &DeviceContextPool,
        monitor: MonitorId,
        ramp: &Arc<GammaRamp>,
    ) -> Result<(), EngineError> {
        if self.is_safe_mode() {
            return Err(EngineError::SafeMode);
        }

        let max = self.policy.max_attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=max {
            match self.attempt(pool, monitor, ramp) {
                Ok(elapsed) => {
                    let mut state = self.lock();
                    state.timings.record(elapsed);
                    state.last_good.insert(monitor, Arc::clone(ramp));
                    return Ok(());
                }
                // Shutdown raced this write: nothing to recover
                Err(DisplayError::PoolClosed) => {
                    return Err(EngineError::Transient(DisplayError::PoolClosed));
                }
                Err(error) => {
                    self.lock().failed_attempts += 1;
                    log_warning!(
                        "Gamma write to monitor {monitor} failed (attempt {attempt}/{max}): {error}"
                    );
                    if !error.is_transient() {
                        last_error = Some(error);
                        break;
                    }
                    if attempt < max {
                        self.clock.sleep(self.policy.backoff(attempt));
                    }
                    last_error = Some(error);
                }
            }
        }

        let cause = last_error.unwrap_or(DisplayError::Refused("no attempt made".into()));
        Err(self.handle_critical(pool, monitor, cause))
    }

    // One acquire-write-release cycle, returning how long the write took
    fn attempt(
        &self,
        pool: &DeviceContextPool,
        monitor: MonitorId,
        ramp: &GammaRamp,
    ) -> Result<Duration, DisplayError> {
        let lease = pool.acquire(monitor)?;
        let started = self.clock.now();
        if let Err(error) = self.device.write_ramp(lease.raw(), ramp) {
            // A context that refused once is not worth reusing
            lease.discard();
            return Err(error);
        }
        let elapsed = (self.clock.now() - started).to_std().unwrap_or(Duration::ZERO);
        drop(lease);

        if elapsed > self.policy.write_timeout {
            return Err(DisplayError::WriteTimeout {
                elapsed_ms: elapsed.as_millis() as u64,
                limit_ms: self.policy.write_timeout.as_millis() as u64,
            });
        }
        Ok(elapsed)
    }

    fn handle_critical(
        &self,
        pool: &DeviceContextPool,
        monitor: MonitorId,
        cause: DisplayError,
    ) -> EngineError {
        log_critical!("Gamma writes to monitor {monitor} keep failing: {cause}");

        if let Some(good) = self.last_known_good(monitor) {
            match self.attempt(pool, monitor, &good) {
                Ok(_) => {
                    log_warning!("Restored last known good ramp on monitor {monitor}");
                    return EngineError::Critical(format!(
                        "monitor {monitor}: {cause} (last known good ramp restored)"
                    ));
                }
                Err(e) => {
                    self.lock().failed_attempts += 1;
                    log_critical!("Restoring last known good ramp on monitor {monitor} failed: {e}");
                }
            }
        }

        let reason = format!("monitor {monitor}: {cause}");
        self.enter_safe_mode(&reason);
        EngineError::Critical(reason)
    }

    /// Suspend all writes. Returns false if already in safe mode.
    pub fn enter_safe_mode(&self, reason: &str) -> bool {
        {
            let mut state = self.lock();
            if state.safe_mode.is_some() {
                return false;
            }
            state.safe_mode = Some(reason.to_string());
        }
        log_critical!("Entering safe mode, automatic adjustment suspended: {reason}");
        self.events.emit(EngineEvent::SafeModeEntered {
            reason: reason.to_string(),
        });
        true
    }

    /// Leave safe mode. Returns false if it was not active.
    pub fn resume(&self) -> bool {
        if self.lock().safe_mode.take().is_none() {
            return false;
        }
        log_info!("Leaving safe mode");
        self.events.emit(EngineEvent::SafeModeExited);
        true
    }

    pub fn is_safe_mode(&self) -> bool {
        self.lock().safe_mode.is_some()
    }

    pub fn safe_mode_reason(&self) -> Option<String> {
        self.lock().safe_mode.clone()
    }

    pub fn last_known_good(&self, monitor: MonitorId) -> Option<Arc<GammaRamp>> {
        self.lock().last_good.get(&monitor).cloned()
    }

    pub fn average_write_ms(&self) -> f64 {
        self.lock().timings.average_ms()
    }

    pub fn failed_attempts(&self) -> u64 {
        self.lock().failed_attempts
    }

    /// Compare the monitor's live ramp with the last known good one and repair drift.
    pub fn verify(
        &self,
        pool: &DeviceContextPool,
        monitor: MonitorId,
    ) -> Result<Verification, EngineError> {
        let Some(good) = self.last_known_good(monitor) else {
            return Ok(Verification::NothingApplied);
        };

        let read = pool
            .acquire(monitor)
            .and_then(|lease| self.device.read_ramp(lease.raw()));

        match read {
            Ok(live) if live == *good => Ok(Verification::Matches),
            Ok(_) => {
                log_warning!("Monitor {monitor} drifted from the applied ramp, rewriting");
                self.write(pool, monitor, &good).map(|_| Verification::Repaired)
            }
            Err(DisplayError::Unsupported(_)) => {
                self.write(pool, monitor, &good).map(|_| Verification::Refreshed)
            }
            Err(e) => {
                log_warning!("Reading back monitor {monitor} failed: {e}");
                self.write(pool, monitor, &good).map(|_| Verification::Repaired)
            }
        }
    }
}
