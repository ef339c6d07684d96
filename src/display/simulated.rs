//! In-memory display for tests and the simulator.
//!
//! Tracks every context and write so tests can assert on hardware traffic,
//! and can be told to fail or slow down upcoming operations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::color::GammaRamp;
use crate::display::{DisplayDevice, MonitorId, RawContext};
use crate::error::DisplayError;
use crate::time::Clock;

#[derive(Default)]
struct SimState {
    contexts: HashMap<u64, MonitorId>,
    next_context: u64,
    applied: HashMap<MonitorId, GammaRamp>,
    write_order: Vec<MonitorId>,
    failing_writes: u32,
    failing_opens: u32,
    write_latency: Duration,
    write_attempts: u64,
    opened: u64,
    closed: u64,
    max_open: usize,
}

pub struct SimulatedDisplay {
    monitors: Vec<MonitorId>,
    clock: Arc<dyn Clock>,
    state: Mutex<SimState>,
}

impl SimulatedDisplay {
    /// `count` monitors numbered from 0, each starting at the identity ramp.
    pub fn new(count: u32, clock: Arc<dyn Clock>) -> Self {
        let monitors: Vec<MonitorId> = (0..count).map(MonitorId).collect();
        let state = SimState {
            applied: monitors
                .iter()
                .map(|&m| (m, GammaRamp::identity()))
                .collect(),
            next_context: 1,
            ..SimState::default()
        };
        Self {
            monitors,
            clock,
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fail the next `count` writes, whichever monitor they target.
    pub fn fail_next_writes(&self, count: u32) {
        self.lock().failing_writes = count;
    }

    pub fn fail_next_opens(&self, count: u32) {
        self.lock().failing_opens = count;
    }

    /// Each write advances the injected clock by `latency`.
    pub fn set_write_latency(&self, latency: Duration) {
        self.lock().write_latency = latency;
    }

    /// All write calls, failed ones included.
    pub fn write_attempts(&self) -> u64 {
        self.lock().write_attempts
    }

    pub fn successful_writes(&self) -> usize {
        self.lock().write_order.len()
    }

    /// Monitors in the order their successful writes landed.
    pub fn write_order(&self) -> Vec<MonitorId> {
        self.lock().write_order.clone()
    }

    pub fn applied_ramp(&self, monitor: MonitorId) -> Option<GammaRamp> {
        self.lock().applied.get(&monitor).cloned()
    }

    pub fn open_contexts(&self) -> usize {
        self.lock().contexts.len()
    }

    /// Highest number of contexts open at the same time.
    pub fn max_open_contexts(&self) -> usize {
        self.lock().max_open
    }

    pub fn opened(&self) -> u64 {
        self.lock().opened
    }

    pub fn closed(&self) -> u64 {
        self.lock().closed
    }
}

impl DisplayDevice for SimulatedDisplay {
    fn name(&self) -> &'static str {
        "Simulated"
    }

    fn monitors(&self) -> Vec<MonitorId> {
        self.monitors.clone()
    }

    fn open_context(&self, monitor: MonitorId) -> Result<RawContext, DisplayError> {
        if !self.monitors.contains(&monitor) {
            return Err(DisplayError::UnknownMonitor(monitor));
        }
        let mut state = self.lock();
        if state.failing_opens > 0 {
            state.failing_opens -= 1;
            return Err(DisplayError::Refused("simulated open failure".into()));
        }
        let id = state.next_context;
        state.next_context += 1;
        state.contexts.insert(id, monitor);
        state.opened += 1;
        state.max_open = state.max_open.max(state.contexts.len());
        Ok(RawContext(id))
    }

    fn close_context(&self, context: RawContext) {
        let mut state = self.lock();
        if state.contexts.remove(&context.0).is_some() {
            state.closed += 1;
        }
    }

    fn read_ramp(&self, context: RawContext) -> Result<GammaRamp, DisplayError> {
        let state = self.lock();
        let monitor = state
            .contexts
            .get(&context.0)
            .ok_or(DisplayError::UnknownContext(context.0))?;
        state
            .applied
            .get(monitor)
            .cloned()
            .ok_or(DisplayError::UnknownMonitor(*monitor))
    }

    fn write_ramp(&self, context: RawContext, ramp: &GammaRamp) -> Result<(), DisplayError> {
        let latency = {
            let mut state = self.lock();
            state.write_attempts += 1;
            if !state.contexts.contains_key(&context.0) {
                return Err(DisplayError::UnknownContext(context.0));
            }
            if state.failing_writes > 0 {
                state.failing_writes -= 1;
                return Err(DisplayError::Refused("simulated write failure".into()));
            }
            state.write_latency
        };

        // Outside the lock so parallel monitor writes overlap
        if !latency.is_zero() {
            self.clock.sleep(latency);
        }

        let mut state = self.lock();
        let monitor = *state
            .contexts
            .get(&context.0)
            .ok_or(DisplayError::UnknownContext(context.0))?;
        state.applied.insert(monitor, ramp.clone());
        state.write_order.push(monitor);
        Ok(())
    }
}
