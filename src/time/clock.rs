//! Clock abstraction for real, simulated and manually driven time.
//!
//! Every time-dependent component of the engine (cache and pool timestamps,
//! transition progress, retry backoff, write timing) reads time through an
//! injected `Arc<dyn Clock>`. Swapping the clock is how the simulator runs a
//! whole night in seconds and how tests step time deterministically.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Sleep for `duration`, or advance simulated time by it.
    fn sleep(&self, duration: Duration);

    fn is_simulated(&self) -> bool;

    /// Whether a bounded simulation has reached its end. Always false for real time.
    fn is_ended(&self) -> bool {
        false
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn to_chrono(duration: Duration) -> ChronoDuration {
    ChronoDuration::from_std(duration).unwrap_or(ChronoDuration::MAX)
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn is_simulated(&self) -> bool {
        false
    }
}

/// Accelerated time between a fixed start and end.
///
/// With a positive multiplier simulated time flows continuously at
/// `multiplier` times real time. A multiplier of `0.0` selects fast-forward:
/// time stands still except when someone sleeps, and each sleep jumps time
/// forward by exactly the requested amount.
pub struct SimulatedClock {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    multiplier: f64,
    origin: Instant,
    // Only used in fast-forward mode
    current: Mutex<DateTime<Utc>>,
}

impl SimulatedClock {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, multiplier: f64) -> Self {
        let multiplier = if multiplier < 0.0 || !multiplier.is_finite() {
            3600.0
        } else {
            multiplier
        };
        Self {
            start,
            end,
            multiplier,
            origin: Instant::now(),
            current: Mutex::new(start),
        }
    }

    pub fn is_fast_forward(&self) -> bool {
        self.multiplier == 0.0
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> DateTime<Utc> {
        if self.is_fast_forward() {
            return *lock(&self.current);
        }
        let real = self.origin.elapsed().as_secs_f64();
        let simulated = Duration::from_secs_f64(real * self.multiplier);
        (self.start + to_chrono(simulated)).min(self.end)
    }

    fn sleep(&self, duration: Duration) {
        if self.is_fast_forward() {
            {
                let mut current = lock(&self.current);
                *current = (*current + to_chrono(duration)).min(self.end);
            }
            // Let other threads run between jumps
            std::thread::yield_now();
            return;
        }

        let remaining = (self.end - self.now()).to_std().unwrap_or(Duration::ZERO);
        let simulated = duration.min(remaining);
        if !simulated.is_zero() {
            std::thread::sleep(Duration::from_secs_f64(
                simulated.as_secs_f64() / self.multiplier,
            ));
        }
    }

    fn is_simulated(&self) -> bool {
        true
    }

    fn is_ended(&self) -> bool {
        self.now() >= self.end
    }
}

/// Test clock that only moves when told to.
///
/// `sleep` advances the clock instead of blocking, so retry backoff and
/// scheduler slices complete instantly while still being observable.
#[cfg(any(test, feature = "testing-support"))]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
    slept: Mutex<Vec<Duration>>,
}

#[cfg(any(test, feature = "testing-support"))]
impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
            slept: Mutex::new(Vec::new()),
        }
    }

    pub fn set(&self, time: DateTime<Utc>) {
        *lock(&self.current) = time;
    }

    pub fn advance(&self, duration: Duration) {
        let mut current = lock(&self.current);
        *current += to_chrono(duration);
    }

    /// Every duration passed to `sleep`, in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        lock(&self.slept).clone()
    }
}

#[cfg(any(test, feature = "testing-support"))]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.current)
    }

    fn sleep(&self, duration: Duration) {
        lock(&self.slept).push(duration);
        self.advance(duration);
    }

    fn is_simulated(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 21, h, m, 0).unwrap()
    }

    #[test]
    fn test_fast_forward_jumps_on_sleep() {
        let clock = SimulatedClock::new(at(18, 0), at(19, 0), 0.0);
        assert_eq!(clock.now(), at(18, 0));
        clock.sleep(Duration::from_secs(30 * 60));
        assert_eq!(clock.now(), at(18, 30));
        assert!(!clock.is_ended());
    }

    #[test]
    fn test_fast_forward_caps_at_end() {
        let clock = SimulatedClock::new(at(18, 0), at(19, 0), 0.0);
        clock.sleep(Duration::from_secs(5 * 3600));
        assert_eq!(clock.now(), at(19, 0));
        assert!(clock.is_ended());
    }

    #[test]
    fn test_accelerated_clock_moves_forward() {
        let clock = SimulatedClock::new(at(18, 0), at(23, 0), 3600.0);
        clock.sleep(Duration::from_secs(60));
        assert!(clock.now() > at(18, 0));
        assert!(clock.now() <= at(23, 0));
    }

    #[test]
    fn test_manual_clock_records_sleeps() {
        let clock = ManualClock::new(at(12, 0));
        clock.sleep(Duration::from_millis(50));
        clock.sleep(Duration::from_millis(100));
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(50), Duration::from_millis(100)]
        );
        assert_eq!(clock.now(), at(12, 0) + ChronoDuration::milliseconds(150));
    }
}
