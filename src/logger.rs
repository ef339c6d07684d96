//! Structured console logging with box-drawing layout.
//!
//! Every line the engine prints goes through the macros in this module so the
//! output keeps one visual grammar:
//!
//! ```text
//! ┏ duskshift v0.3.0 ━━╸
//! ┃
//! ┣ Connected to Wayland display (2 outputs)
//! ┃   cache: 200 entries, ttl 30m
//! ┣[WARNING] Reclaimed leaked device context #4 on monitor 1
//! ╹
//! ```
//!
//! ## Conventions
//!
//! - `log_block_start!` opens a new conceptual block (spacer pipe, then `┣ message`).
//! - `log_decorated!` continues a block with `┣ message`.
//! - `log_indented!` prints nested detail lines as `┃   message`.
//! - `log_pipe!` inserts a bare `┃` spacer, normally right before a leveled message.
//! - `log_info!`, `log_warning!`, `log_error!`, `log_critical!` and `log_debug!` carry
//!   a colored `[LEVEL]` tag. `log_debug!` only prints after `Log::set_debug(true)`.
//! - `log_version!` and `log_end!` frame a whole run.
//!
//! When the installed clock is simulated each line is prefixed with the simulated
//! wall time so accelerated runs stay readable.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, channel};
use std::sync::{Arc, OnceLock};

use once_cell::sync::OnceCell;

use crate::time::clock::Clock;

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);
static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

// Clock used for simulated timestamps; installed once by the simulate command.
static LOG_CLOCK: OnceCell<Arc<dyn Clock>> = OnceCell::new();

// Set when --log routes output to a file.
static LOG_CHANNEL: OnceLock<Sender<LogMessage>> = OnceLock::new();

enum LogMessage {
    Line(String),
    Shutdown,
}

/// Global switches for the logging macros.
pub struct Log;

impl Log {
    /// Enable or disable all output.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Enable or disable `log_debug!` output.
    pub fn set_debug(enabled: bool) {
        DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_debug() -> bool {
        DEBUG_ENABLED.load(Ordering::SeqCst)
    }

    /// Install the clock used for timestamp prefixes.
    ///
    /// Only the first call wins; later calls are ignored.
    pub fn set_clock(clock: Arc<dyn Clock>) {
        let _ = LOG_CLOCK.set(clock);
    }

    /// Route all further output into `file_path` until the guard is dropped.
    pub fn start_file_logging(file_path: String) -> anyhow::Result<LoggerGuard> {
        let (tx, rx) = channel();

        LOG_CHANNEL
            .set(tx.clone())
            .map_err(|_| anyhow::anyhow!("File logging already started"))?;

        let handle = std::thread::spawn(move || {
            let mut file = std::fs::File::create(&file_path)?;
            while let Ok(LogMessage::Line(text)) = rx.recv() {
                file.write_all(text.as_bytes())?;
            }
            file.flush()?;
            Ok::<(), anyhow::Error>(())
        });

        Ok(LoggerGuard {
            tx,
            handle: Some(handle),
        })
    }

    /// Prefix for the current line: `[HH:MM:SS] ` under a simulated clock, empty otherwise.
    pub fn timestamp_prefix() -> String {
        match LOG_CLOCK.get() {
            Some(clock) if clock.is_simulated() => {
                format!("[{}] ", clock.now().format("%H:%M:%S"))
            }
            _ => String::new(),
        }
    }
}

/// Flushes and joins the file logging thread on drop.
pub struct LoggerGuard {
    tx: Sender<LogMessage>,
    handle: Option<std::thread::JoinHandle<anyhow::Result<()>>>,
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(LogMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == 'm' {
                    break;
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Write one already formatted chunk to stdout or the log file.
pub fn write_output(text: &str) {
    if let Some(tx) = LOG_CHANNEL.get() {
        let _ = tx.send(LogMessage::Line(strip_ansi_codes(text)));
    } else {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }
}

/// Format `body` with the per-line prefix inserted before each of `marks`.
///
/// `marks` are the line openers, e.g. `["┃", "┣ "]` for a block start.
#[doc(hidden)]
pub fn emit(marks: &[&str], body: &str) {
    if !Log::is_enabled() {
        return;
    }
    let prefix = Log::timestamp_prefix();
    let mut out = String::with_capacity(body.len() + 16);
    let last = marks.len().saturating_sub(1);
    for (i, mark) in marks.iter().enumerate() {
        out.push_str(&prefix);
        out.push_str(mark);
        if i == last {
            out.push_str(body);
        }
        out.push('\n');
    }
    write_output(&out);
}

/// Continue a block with `┣ message`.
#[macro_export]
macro_rules! log_decorated {
    ($($arg:tt)+) => {
        $crate::logger::emit(&["┣ "], &format!($($arg)+))
    };
}

/// Nested detail line `┃   message`.
#[macro_export]
macro_rules! log_indented {
    ($($arg:tt)+) => {
        $crate::logger::emit(&["┃   "], &format!($($arg)+))
    };
}

/// Bare spacer pipe.
#[macro_export]
macro_rules! log_pipe {
    () => {
        $crate::logger::emit(&["┃"], "")
    };
}

/// Open a new block: spacer pipe followed by `┣ message`.
#[macro_export]
macro_rules! log_block_start {
    ($($arg:tt)+) => {
        $crate::logger::emit(&["┃", "┣ "], &format!($($arg)+))
    };
}

/// Startup header.
#[macro_export]
macro_rules! log_version {
    () => {
        $crate::logger::emit(
            &["┏ "],
            &format!("duskshift v{} ━━╸", env!("CARGO_PKG_VERSION")),
        )
    };
}

/// Final terminator.
#[macro_export]
macro_rules! log_end {
    () => {
        $crate::logger::emit(&["╹"], "")
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)+) => {
        $crate::logger::emit(&["┣[\x1b[32mINFO\x1b[0m] "], &format!($($arg)+))
    };
}

#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)+) => {
        $crate::logger::emit(&["┣[\x1b[33mWARNING\x1b[0m] "], &format!($($arg)+))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)+) => {
        $crate::logger::emit(&["┣[\x1b[31mERROR\x1b[0m] "], &format!($($arg)+))
    };
}

/// Error that ends the current flow: spacer pipe, then `┗[ERROR] message`.
#[macro_export]
macro_rules! log_error_exit {
    ($($arg:tt)+) => {
        $crate::logger::emit(&["┃", "┗[\x1b[31mERROR\x1b[0m] "], &format!($($arg)+))
    };
}

#[macro_export]
macro_rules! log_critical {
    ($($arg:tt)+) => {
        $crate::logger::emit(&["┣[\x1b[31mCRITICAL\x1b[0m] "], &format!($($arg)+))
    };
}

/// Only printed when debug output is switched on.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)+) => {
        if $crate::logger::Log::is_debug() {
            $crate::logger::emit(&["┣[\x1b[32mDEBUG\x1b[0m] "], &format!($($arg)+))
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_strip_ansi_codes() {
        assert_eq!(strip_ansi_codes("┣[\x1b[33mWARNING\x1b[0m] hi"), "┣[WARNING] hi");
        assert_eq!(strip_ansi_codes("plain"), "plain");
        assert_eq!(strip_ansi_codes("\x1b"), "\x1b");
    }

    #[test]
    #[serial]
    fn test_enable_toggle() {
        Log::set_enabled(false);
        assert!(!Log::is_enabled());
        // Must not panic while disabled
        log_block_start!("hidden {}", 1);
        Log::set_enabled(true);
        assert!(Log::is_enabled());
    }

    #[test]
    #[serial]
    fn test_debug_toggle() {
        Log::set_debug(true);
        assert!(Log::is_debug());
        Log::set_debug(false);
        assert!(!Log::is_debug());
    }

    #[test]
    fn test_no_prefix_without_simulated_clock() {
        // The clock is only installed by the simulate command
        if LOG_CLOCK.get().is_none() {
            assert_eq!(Log::timestamp_prefix(), "");
        }
    }
}
