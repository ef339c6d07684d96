//! Background driver for the color engine.
//!
//! One loop, one engine: drain inbound commands, run the health check when
//! it is due, let the engine take one step, then sleep for the interval the
//! engine asked for. Sleeps are cut into short slices so shutdown and new
//! commands are noticed promptly even during a long idle wait.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::sync::Arc;
use std::time::Duration;

use crate::common::constants::SCHEDULER_SLICE_MS;
use crate::core::ColorEngine;
use crate::geo::Location;
use crate::profile::ColorProfile;

/// Requests from front ends, the config watcher and signal handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerCommand {
    /// Apply a temperature now and hold it until `Resume`.
    ApplyTemperature(u32),
    StopTransition,
    /// Leave safe mode and drop any manual hold.
    Resume,
    UpdateProfile(ColorProfile),
    UpdateLocation(Location),
    HealthCheck,
    Shutdown,
}

pub struct Scheduler {
    engine: Arc<ColorEngine>,
    commands: Receiver<SchedulerCommand>,
    // Commands that arrived while sleeping
    pending: VecDeque<SchedulerCommand>,
    running: Arc<AtomicBool>,
}

impl Scheduler {
    /// Create a scheduler and the sender used to command it.
    ///
    /// Clearing `running` from anywhere stops the loop within one slice.
    pub fn new(
        engine: Arc<ColorEngine>,
        running: Arc<AtomicBool>,
    ) -> (Self, Sender<SchedulerCommand>) {
        let (tx, rx) = channel();
        let scheduler = Self {
            engine,
            commands: rx,
            pending: VecDeque::new(),
            running,
        };
        (scheduler, tx)
    }

    pub fn engine(&self) -> &Arc<ColorEngine> {
        &self.engine
    }

    fn keep_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.engine.clock().is_ended()
    }

    /// Drive the engine until shutdown or the clock ends.
    pub fn run(&mut self) {
        while self.keep_running() {
            if !self.drain_commands() {
                break;
            }

            if self.engine.health_check_due() {
                self.engine.health_check();
            }

            let wait = self.engine.run_cycle();
            self.sleep(wait);
        }
        log_debug!("Scheduler stopped");
    }

    /// Handle every queued command. Returns false on shutdown.
    fn drain_commands(&mut self) -> bool {
        loop {
            let command = match self.pending.pop_front() {
                Some(command) => command,
                None => match self.commands.try_recv() {
                    Ok(command) => command,
                    // Every sender dropped; keep running on our own schedule
                    Err(TryRecvError::Empty | TryRecvError::Disconnected) => return true,
                },
            };
            if !self.handle(command) {
                self.running.store(false, Ordering::SeqCst);
                return false;
            }
        }
    }

    fn handle(&self, command: SchedulerCommand) -> bool {
        log_debug!("Scheduler command: {command:?}");
        let result = match command {
            SchedulerCommand::ApplyTemperature(kelvin) => self.engine.apply_temperature(kelvin),
            SchedulerCommand::StopTransition => self.engine.stop_transition().map(|_| ()),
            SchedulerCommand::Resume => {
                self.engine.resume();
                Ok(())
            }
            SchedulerCommand::UpdateProfile(profile) => self.engine.update_profile(profile),
            SchedulerCommand::UpdateLocation(location) => self.engine.update_location(location),
            SchedulerCommand::HealthCheck => {
                self.engine.health_check();
                Ok(())
            }
            SchedulerCommand::Shutdown => return false,
        };
        if let Err(e) = result {
            log_error!("Command failed: {e}");
        }
        true
    }

    // Sleep in slices, waking early for commands or shutdown
    fn sleep(&mut self, total: Duration) {
        let slice = Duration::from_millis(SCHEDULER_SLICE_MS);
        let mut remaining = total;
        while !remaining.is_zero() && self.keep_running() {
            match self.commands.try_recv() {
                Ok(command) => {
                    self.pending.push_back(command);
                    return;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => {}
            }
            let step = remaining.min(slice);
            self.engine.clock().sleep(step);
            remaining -= step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EngineEvent, EngineSettings};
    use crate::display::{MonitorId, SimulatedDisplay};
    use crate::time::{Clock, SimulatedClock};
    use chrono::{TimeZone, Utc};

    fn simulated(
        hours: i64,
    ) -> (
        Arc<ColorEngine>,
        std::sync::mpsc::Receiver<EngineEvent>,
        Arc<SimulatedDisplay>,
    ) {
        // 18:00 EDT on the solstice, through sunset
        let start = Utc.with_ymd_and_hms(2025, 6, 21, 22, 0, 0).unwrap();
        let end = start + chrono::Duration::hours(hours);
        let clock: Arc<dyn Clock> = Arc::new(SimulatedClock::new(start, end, 0.0));
        let display = Arc::new(SimulatedDisplay::new(2, clock.clone()));
        let (engine, rx) = ColorEngine::new(
            display.clone(),
            clock,
            ColorProfile::default_profile(),
            Location::new(40.71, -74.01).unwrap(),
            EngineSettings::default(),
        )
        .unwrap();
        (Arc::new(engine), rx, display)
    }

    #[test]
    fn test_runs_through_sunset_until_clock_ends() {
        let (engine, rx, display) = simulated(4);
        let running = Arc::new(AtomicBool::new(true));
        let (mut scheduler, _tx) = Scheduler::new(engine.clone(), running);
        scheduler.run();

        assert_eq!(engine.applied_kelvin(), Some(3300));
        let events: Vec<_> = rx.try_iter().collect();
        assert!(events.iter().any(|e| matches!(
            e,
            EngineEvent::TransitionCompleted { state } if state.to == 3300
        )));

        for monitor in [MonitorId(0), MonitorId(1)] {
            assert!(display.applied_ramp(monitor).is_some());
        }
        assert!(display.max_open_contexts() <= engine.pool().max());
    }

    #[test]
    fn test_shutdown_command_stops_loop() {
        let (engine, _rx, _display) = simulated(24);
        let running = Arc::new(AtomicBool::new(true));
        let (mut scheduler, tx) = Scheduler::new(engine, running.clone());
        tx.send(SchedulerCommand::ApplyTemperature(4500)).unwrap();
        tx.send(SchedulerCommand::Shutdown).unwrap();
        scheduler.run();

        assert!(!running.load(Ordering::SeqCst));
        assert_eq!(scheduler.engine().applied_kelvin(), Some(4500));
        assert!(scheduler.engine().is_held());
    }

    #[test]
    fn test_invalid_command_is_logged_not_fatal() {
        let (engine, _rx, _display) = simulated(1);
        let running = Arc::new(AtomicBool::new(true));
        let (mut scheduler, tx) = Scheduler::new(engine, running);
        tx.send(SchedulerCommand::ApplyTemperature(50)).unwrap();
        scheduler.run();
        assert!(scheduler.engine().applied_kelvin().is_some());
    }
}
