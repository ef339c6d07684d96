//! The default command: follow the sun on every connected monitor.
//!
//! Wires the Wayland display, the system clock, the config watcher and the
//! signal handler to one engine and its scheduler, then blocks until a
//! shutdown signal arrives. On the way out the day temperature is restored.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::commands::spawn_event_logger;
use crate::config;
use crate::core::{ColorEngine, Scheduler};
use crate::display::{DisplayDevice, WaylandDisplay};
use crate::signals::setup_signal_handler;
use crate::time::{Clock, SystemClock};

pub fn handle_run_command(debug_enabled: bool) -> Result<()> {
    log_version!();
    if debug_enabled {
        log_pipe!();
        log_debug!("Debug mode enabled - showing engine internals");
    }

    let config_path = config::get_config_path()?;
    let config = config::load()?;
    config.log_summary();

    let profile = config.to_profile();
    let location = config.to_location()?;
    let settings = config.to_engine_settings();

    let device: Arc<dyn DisplayDevice> =
        Arc::new(WaylandDisplay::connect().context("Failed to connect to the display")?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let (engine, events) = ColorEngine::new(device, clock, profile, location, settings)
        .context("Failed to start the color engine")?;
    log_block_start!(
        "Managing {} monitor(s), pool of {} contexts",
        engine.monitors().len(),
        engine.pool().max()
    );
    spawn_event_logger(events, "Send SIGUSR1 to resume automatic adjustment");

    let engine = Arc::new(engine);
    let running = Arc::new(AtomicBool::new(true));
    let (mut scheduler, commands) = Scheduler::new(Arc::clone(&engine), Arc::clone(&running));

    setup_signal_handler(Arc::clone(&running), commands.clone())?;

    if let Err(e) = config::start_config_watcher(config_path, config, commands) {
        log_warning!("Hot reload disabled: {e:#}");
    }

    scheduler.run();

    // The profile may have changed through hot reload
    let day_kelvin = engine.profile().day_kelvin;
    log_block_start!("Restoring day temperature ({day_kelvin}K)");
    if let Err(e) = engine.apply_temperature(day_kelvin) {
        log_warning!("Could not restore day temperature: {e}");
    }
    engine.shutdown();

    log_end!();
    Ok(())
}
