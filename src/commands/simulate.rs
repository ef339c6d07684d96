//! Implementation of the simulate command for testing time-based behavior.
//!
//! Runs the real engine and scheduler against a [`SimulatedClock`] and
//! in-memory monitors, so a whole evening of sunset transitions plays out in
//! seconds. Times on the command line are read in the configured location's
//! timezone.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::commands::spawn_event_logger;
use crate::common::utils::format_duration;
use crate::config::{self, Config};
use crate::core::{ColorEngine, Scheduler};
use crate::display::{DisplayDevice, SimulatedDisplay};
use crate::logger::Log;
use crate::time::{Clock, SimulatedClock};

/// Options for one simulation run.
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub start_time: String,
    pub end_time: String,
    /// 0 = fast-forward
    pub multiplier: f64,
    pub monitors: u32,
    pub json: bool,
    pub log_to_file: bool,
    pub debug_enabled: bool,
}

/// Parse "YYYY-MM-DD HH:MM:SS" as wall time in `tz`.
pub fn parse_datetime_in_tz(input: &str, tz: Tz) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S")
        .with_context(|| format!("'{input}' is not YYYY-MM-DD HH:MM:SS"))?;
    let local = tz
        .from_local_datetime(&naive)
        .earliest()
        .with_context(|| format!("'{input}' does not exist in {tz}"))?;
    Ok(local.with_timezone(&Utc))
}

pub fn handle_simulate_command(options: SimulateOptions) -> Result<()> {
    let config = match config::load() {
        Ok(config) => config,
        Err(e) => {
            log_warning!("Using default configuration: {e:#}");
            Config::default()
        }
    };
    let location = config.to_location()?;
    let tz = location.timezone();

    let start = parse_datetime_in_tz(&options.start_time, tz).context("Invalid start time")?;
    let end = parse_datetime_in_tz(&options.end_time, tz).context("Invalid end time")?;
    if end <= start {
        anyhow::bail!("End time must be after start time");
    }

    // Install the clock BEFORE any logging so every line carries simulated time
    let sim_clock = Arc::new(SimulatedClock::new(start, end, options.multiplier));
    let clock: Arc<dyn Clock> = sim_clock.clone();
    Log::set_clock(Arc::clone(&clock));

    let _log_guard = if options.log_to_file {
        let log_filename = format!(
            "duskshift-simulation-{}.log",
            Local::now().format("%Y%m%d-%H%M%S")
        );
        println!("Writing simulation output to {log_filename}");
        Some(Log::start_file_logging(log_filename)?)
    } else {
        None
    };

    log_version!();
    if options.debug_enabled {
        log_pipe!();
        log_debug!("Simulated time source initialized");
    }
    log_block_start!("Simulation Mode");
    log_decorated!(
        "Simulating from {} to {} ({tz})",
        start.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S"),
        end.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S")
    );
    let span = (end - start).to_std().unwrap_or_default();
    log_indented!("Total simulated time: {}", format_duration(span));
    if sim_clock.is_fast_forward() {
        log_indented!("Time acceleration: fast-forward (instant execution)");
    } else {
        log_indented!(
            "Time acceleration: {}x (will complete in ~{:.1} seconds)",
            options.multiplier,
            span.as_secs_f64() / options.multiplier
        );
    }
    config.log_summary();

    let display = Arc::new(SimulatedDisplay::new(options.monitors, Arc::clone(&clock)));
    let device: Arc<dyn DisplayDevice> = display.clone();
    let (engine, events) = ColorEngine::new(
        device,
        clock,
        config.to_profile(),
        location,
        config.to_engine_settings(),
    )
    .context("Failed to start the color engine")?;
    spawn_event_logger(events, "Simulation continues without writes");

    let engine = Arc::new(engine);
    let running = Arc::new(AtomicBool::new(true));
    let (mut scheduler, _commands) = Scheduler::new(Arc::clone(&engine), running);
    scheduler.run();
    engine.shutdown();

    log_block_start!("Simulation complete");
    log_indented!(
        "{} gamma writes across {} monitor(s)",
        display.successful_writes(),
        options.monitors
    );
    if let Some(kelvin) = engine.applied_kelvin() {
        log_indented!("Final temperature: {kelvin}K");
    }

    let diagnostics = engine.diagnostics();
    if options.json {
        println!("{}", diagnostics.to_json());
    } else {
        diagnostics.log();
    }

    log_end!();
    Ok(())
}
