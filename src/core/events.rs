//! Outbound notifications.
//!
//! The engine pushes events onto a bounded mpsc channel and never waits for
//! anyone to read them. Front ends drain the receiver returned by
//! `ColorEngine::new` at their own pace; once the queue is full, new events
//! are dropped.

use serde::Serialize;
use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};

use crate::common::constants::EVENT_QUEUE_CAPACITY;
use crate::core::transition::{TransitionReason, TransitionState};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A new color temperature reached every monitor.
    TemperatureChanged { kelvin: u32 },

    TransitionStarted {
        from: u32,
        to: u32,
        duration_ms: u64,
        reason: TransitionReason,
    },

    TransitionCompleted { state: TransitionState },

    TransitionCancelled { state: TransitionState },

    /// Automatic adjustment is suspended until an explicit resume.
    SafeModeEntered { reason: String },

    SafeModeExited,

    /// The health check repaired an inconsistent profile.
    ProfileCorrected { profile: String, issues: Vec<String> },
}

impl EngineEvent {
    /// Single-line JSON rendering for logs and `--json` output.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
    }
}

/// Sending half of the event channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: SyncSender<EngineEvent>,
}

impl EventSink {
    pub fn new() -> (Self, Receiver<EngineEvent>) {
        Self::with_capacity(EVENT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, Receiver<EngineEvent>) {
        let (tx, rx) = sync_channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Fire and forget. A full queue or a dropped receiver is not an engine failure.
    pub fn emit(&self, event: EngineEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                log_debug!("Event dropped, queue full: {event:?}");
            }
            Err(TrySendError::Disconnected(event)) => {
                log_debug!("Event dropped, no listener: {event:?}");
            }
        }
    }
}
