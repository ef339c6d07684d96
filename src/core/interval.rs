//! Adaptive tick interval.
//!
//! Picks how long to wait before the next transition tick. Large remaining
//! deltas and short transitions want fine steps; many monitors and slow
//! hardware writes want coarse ones so the display is never driven at full
//! capacity. The result is always inside `[50ms, 500ms]`.
//!
//! Holding everything else fixed, more monitors or a higher average write
//! time never shorten the interval, and a larger remaining delta never
//! lengthens it.

use std::collections::VecDeque;
use std::time::Duration;

use crate::common::constants::{
    MAXIMUM_TICK_INTERVAL_MS, MINIMUM_TICK_INTERVAL_MS, WRITE_HISTORY_LEN,
};

// Remaining Kelvin at which the delta factor halves
const DELTA_HALF_POINT: f64 = 500.0;
// Transitions at least this long get the full duration factor
const LONG_TRANSITION_SECS: f64 = 1800.0;
const MINIMUM_DURATION_FACTOR: f64 = 0.1;
// Each extra monitor stretches the base interval by this fraction
const PER_MONITOR_FACTOR: f64 = 0.15;
// Headroom over measured write cost, so hardware is never saturated
const LOAD_HEADROOM: f64 = 1.5;
const LOAD_BUFFER_MS: f64 = 2.0;

/// Next tick interval for the given load.
pub fn adaptive_interval(
    remaining_delta: u32,
    duration: Duration,
    monitors: usize,
    avg_write_ms: f64,
) -> Duration {
    let min = MINIMUM_TICK_INTERVAL_MS as f64;
    let max = MAXIMUM_TICK_INTERVAL_MS as f64;

    let delta_factor = 1.0 / (1.0 + remaining_delta as f64 / DELTA_HALF_POINT);
    let duration_factor = (duration.as_secs_f64() / LONG_TRANSITION_SECS)
        .clamp(MINIMUM_DURATION_FACTOR, 1.0);
    let monitors = monitors.max(1) as f64;
    let monitor_factor = 1.0 + PER_MONITOR_FACTOR * (monitors - 1.0);

    let base = (min + (max - min) * delta_factor * duration_factor) * monitor_factor;

    let avg_write_ms = if avg_write_ms.is_finite() {
        avg_write_ms.max(0.0)
    } else {
        max
    };
    let load = avg_write_ms * monitors * LOAD_HEADROOM + LOAD_BUFFER_MS;

    let ms = base.max(load).clamp(min, max);
    Duration::from_micros((ms * 1000.0).round() as u64)
}

/// Rolling history of the most recent hardware write durations.
#[derive(Debug, Clone)]
pub struct WriteTimings {
    samples: VecDeque<Duration>,
    capacity: usize,
}

impl Default for WriteTimings {
    fn default() -> Self {
        Self::new(WRITE_HISTORY_LEN)
    }
}

impl WriteTimings {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, duration: Duration) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(duration);
    }

    /// Mean of the recorded samples in milliseconds, 0 when empty.
    pub fn average_ms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let total: f64 = self.samples.iter().map(|d| d.as_secs_f64() * 1000.0).sum();
        total / self.samples.len() as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
