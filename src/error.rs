//! Error taxonomy for the color engine.
//!
//! Library operations return these typed errors so callers can tell a
//! rejected input (never retried) from a hardware hiccup (retried with
//! backoff) from a critical failure (safe mode). The command layer wraps
//! them in `anyhow` for reporting.

use thiserror::Error;

use crate::display::MonitorId;

/// Which side of the poles the calculation fell on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolarCondition {
    /// The sun never sets on this date.
    PolarDay,
    /// The sun never rises on this date.
    PolarNight,
}

impl std::fmt::Display for PolarCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolarCondition::PolarDay => write!(f, "polar day"),
            PolarCondition::PolarNight => write!(f, "polar night"),
        }
    }
}

/// Input rejected at the boundary. Never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("color temperature {kelvin}K is outside {min}-{max}K")]
    OutOfRange { kelvin: u32, min: u32, max: u32 },

    #[error("latitude {0} is outside -90 to 90 degrees")]
    InvalidLatitude(f64),

    #[error("longitude {0} is outside -180 to 180 degrees")]
    InvalidLongitude(f64),

    #[error("brightness {0} is outside 0.0-1.0")]
    InvalidBrightness(f32),

    #[error("contrast {0} is outside 0.0-2.0")]
    InvalidContrast(f32),

    #[error("transition duration must be positive")]
    ZeroDuration,

    #[error("sunrise must come before sunset")]
    SunriseAfterSunset,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolarError {
    #[error(transparent)]
    InvalidLocation(#[from] ValidationError),

    /// No conventional sunrise/sunset on this date. Terminal, not retryable:
    /// substitute constant day or night instead.
    #[error("no sunrise or sunset on this date ({0})")]
    PolarDayOrNight(PolarCondition),

    #[error("date {0} is outside the supported range")]
    DateOutOfRange(chrono::NaiveDate),
}

/// Failure talking to the display subsystem or the context pool.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DisplayError {
    #[error("display refused the request: {0}")]
    Refused(String),

    #[error("{0} is not supported by this display")]
    Unsupported(&'static str),

    #[error("gamma write took {elapsed_ms}ms (limit {limit_ms}ms)")]
    WriteTimeout { elapsed_ms: u64, limit_ms: u64 },

    #[error("unknown monitor {0}")]
    UnknownMonitor(MonitorId),

    #[error("unknown device context {0}")]
    UnknownContext(u64),

    #[error("no device context available within {waited_ms}ms ({max} in use)")]
    PoolExhausted { waited_ms: u64, max: usize },

    #[error("device context pool is shut down")]
    PoolClosed,

    #[error("display connection failed: {0}")]
    Connection(String),
}

impl DisplayError {
    /// Whether retrying the same operation could succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            DisplayError::Unsupported(_) | DisplayError::UnknownMonitor(_) | DisplayError::PoolClosed
        )
    }
}

/// Coarse classification used for propagation decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Transient,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("transient display failure: {0}")]
    Transient(DisplayError),

    #[error("critical failure: {0}")]
    Critical(String),

    #[error("engine is in safe mode; explicit resume required")]
    SafeMode,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::Transient(_) => ErrorKind::Transient,
            EngineError::Critical(_) | EngineError::SafeMode => ErrorKind::Critical,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

impl From<DisplayError> for EngineError {
    fn from(error: DisplayError) -> Self {
        EngineError::Transient(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let validation: EngineError = ValidationError::ZeroDuration.into();
        assert_eq!(validation.kind(), ErrorKind::Validation);
        assert!(!validation.is_retryable());

        let transient: EngineError = DisplayError::Refused("busy".into()).into();
        assert_eq!(transient.kind(), ErrorKind::Transient);
        assert!(transient.is_retryable());

        assert_eq!(EngineError::SafeMode.kind(), ErrorKind::Critical);
        assert!(!EngineError::Critical("x".into()).is_retryable());
    }

    #[test]
    fn test_display_error_transience() {
        assert!(DisplayError::PoolExhausted { waited_ms: 100, max: 2 }.is_transient());
        assert!(DisplayError::WriteTimeout { elapsed_ms: 300, limit_ms: 250 }.is_transient());
        assert!(!DisplayError::Unsupported("read-back").is_transient());
        assert!(!DisplayError::PoolClosed.is_transient());
    }

    #[test]
    fn test_messages() {
        let err = ValidationError::OutOfRange { kelvin: 900, min: 1000, max: 10000 };
        assert_eq!(err.to_string(), "color temperature 900K is outside 1000-10000K");
        assert_eq!(
            SolarError::PolarDayOrNight(PolarCondition::PolarNight).to_string(),
            "no sunrise or sunset on this date (polar night)"
        );
    }
}
