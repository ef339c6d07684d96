//! Command-line command handlers for duskshift.
//!
//! Each command is implemented in its own submodule.

pub mod run;
pub mod simulate;
pub mod solar;

use std::sync::mpsc::Receiver;
use std::thread;

use crate::core::EngineEvent;

/// Drain engine events on a background thread until the engine goes away.
///
/// The engine logs its own state changes; this adds the raw event stream
/// under `--debug` and tells the user how to get out of safe mode.
pub(crate) fn spawn_event_logger(events: Receiver<EngineEvent>, resume_hint: &'static str) {
    thread::spawn(move || {
        for event in events {
            log_debug!("Event: {}", event.to_json());
            if matches!(event, EngineEvent::SafeModeEntered { .. }) {
                log_indented!("{resume_hint}");
            }
        }
    });
}
