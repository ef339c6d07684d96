//! File watching module for hot config reloading.
//!
//! Watches the directory holding `duskshift.toml` (editors often replace the
//! file rather than write it in place), waits for writes to settle, reloads
//! and validates the file, and forwards whatever changed to the scheduler.
//! An invalid edit is reported and the running configuration is kept.

use anyhow::{Context, Result};
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use super::{Config, load_from_path};
use crate::common::constants::CONFIG_DEBOUNCE_MS;
use crate::common::utils::private_path;
use crate::core::SchedulerCommand;

/// Whether a filesystem event touches the watched config file.
pub(crate) fn affects_config(event_paths: &[PathBuf], config_path: &Path) -> bool {
    let Some(config_name) = config_path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    event_paths.iter().any(|event_path| {
        event_path == config_path
            || (event_path.parent() == config_path.parent()
                && event_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    // Editor temp files such as duskshift.toml~ or duskshift.toml.swp
                    .is_some_and(|name| name.starts_with(config_name)))
    })
}

/// Commands needed to move the engine from `previous` to `current`.
pub(crate) fn reload_commands(previous: &Config, current: &Config) -> Vec<SchedulerCommand> {
    let mut commands = Vec::new();

    if previous.profile != current.profile {
        commands.push(SchedulerCommand::UpdateProfile(current.to_profile()));
    }

    if previous.location != current.location {
        match current.to_location() {
            Ok(location) => commands.push(SchedulerCommand::UpdateLocation(location)),
            Err(e) => log_warning!("Ignoring new location: {e}"),
        }
    }

    if previous.engine != current.engine {
        log_info!("Engine settings changed; restart duskshift to apply them");
    }

    commands
}

/// Start watching `config_path`, sending changes to `commands`.
///
/// `initial` is the configuration the engine is currently running with.
pub fn start_config_watcher(
    config_path: PathBuf,
    initial: Config,
    commands: Sender<SchedulerCommand>,
) -> Result<()> {
    let watch_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .context("Config path has no parent directory")?;

    let (tx, rx) = std::sync::mpsc::channel();
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res
                && matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                )
            {
                let _ = tx.send(event);
            }
        },
        NotifyConfig::default(),
    )
    .context("Failed to create file watcher")?;

    watcher
        .watch(&watch_dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch directory: {}", private_path(&watch_dir)))?;

    log_debug!("Watching {} for changes", private_path(&config_path));

    thread::spawn(move || {
        // Keep the watcher alive for the life of the thread
        let _watcher = watcher;
        let debounce = Duration::from_millis(CONFIG_DEBOUNCE_MS);
        let mut current = initial;

        while let Ok(event) = rx.recv() {
            if !affects_config(&event.paths, &config_path) {
                continue;
            }

            // Wait for the editor to finish writing
            loop {
                match rx.recv_timeout(debounce) {
                    Ok(_) => continue,
                    Err(RecvTimeoutError::Timeout) => break,
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            }

            if !config_path.exists() {
                log_warning!("Configuration file removed, keeping current settings");
                continue;
            }

            log_block_start!("Configuration change detected, reloading");
            let reloaded = match load_from_path(&config_path) {
                Ok(config) => config,
                Err(e) => {
                    log_warning!("Keeping current configuration: {e:#}");
                    continue;
                }
            };

            for command in reload_commands(&current, &reloaded) {
                if commands.send(command).is_err() {
                    log_debug!("Scheduler gone, stopping config watcher");
                    return;
                }
            }
            current = reloaded;
        }
    });

    Ok(())
}
