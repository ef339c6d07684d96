//! Signal handling for the daemon.
//!
//! - `SIGINT`, `SIGTERM`, `SIGHUP`: graceful shutdown
//! - `SIGUSR1`: resume automatic adjustment (leaves safe mode, drops a manual hold)
//! - `SIGUSR2`: run a health check now
//!
//! The handler thread only flips the shared running flag and forwards
//! commands to the scheduler; all real work happens on the scheduler thread.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR1, SIGUSR2},
    iterator::Signals,
};
use std::{
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    sync::mpsc::Sender,
    thread,
};

use crate::core::SchedulerCommand;

/// What a received signal asks the scheduler to do.
pub(crate) fn command_for_signal(signal: i32) -> Option<SchedulerCommand> {
    match signal {
        SIGINT | SIGTERM | SIGHUP => Some(SchedulerCommand::Shutdown),
        SIGUSR1 => Some(SchedulerCommand::Resume),
        SIGUSR2 => Some(SchedulerCommand::HealthCheck),
        _ => None,
    }
}

fn describe(signal: i32) -> &'static str {
    match signal {
        SIGINT => "SIGINT (interrupt)",
        SIGTERM => "SIGTERM (termination request)",
        SIGHUP => "SIGHUP (session logout)",
        SIGUSR1 => "SIGUSR1 (resume)",
        SIGUSR2 => "SIGUSR2 (health check)",
        _ => "unknown signal",
    }
}

/// Install the handler thread.
///
/// Shutdown signals clear `running` directly as well as sending
/// `Shutdown`, so the scheduler stops even if it is not draining commands.
pub fn setup_signal_handler(
    running: Arc<AtomicBool>,
    commands: Sender<SchedulerCommand>,
) -> Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGUSR1, SIGUSR2])
        .context("failed to register signal handlers")?;

    thread::spawn(move || {
        for sig in signals.forever() {
            log_debug!("Received {}", describe(sig));

            let Some(command) = command_for_signal(sig) else {
                continue;
            };

            let shutdown = command == SchedulerCommand::Shutdown;
            if shutdown {
                log_pipe!();
                log_info!("Received {}, shutting down...", describe(sig));
                running.store(false, Ordering::SeqCst);
            }

            if commands.send(command).is_err() || shutdown {
                break;
            }
        }
    });

    Ok(())
}
