//! Outbound display interface.
//!
//! The engine talks to display hardware only through [`DisplayDevice`]: open a
//! per-monitor device context, read or write a gamma ramp through it, close it.
//! Every operation can fail independently of the caller, so all of them return
//! `Result`. Device contexts are pooled by [`pool::DeviceContextPool`].
//!
//! Implementations:
//! - [`simulated::SimulatedDisplay`]: in-memory monitors with fault injection
//! - [`wayland::WaylandDisplay`]: wlr-gamma-control-unstable-v1 compositors

pub mod pool;
pub mod simulated;
pub mod wayland;

pub use pool::{ContextLease, DeviceContextPool, PoolStats};
pub use simulated::SimulatedDisplay;
pub use wayland::WaylandDisplay;

use serde::Serialize;

use crate::color::GammaRamp;
use crate::error::DisplayError;

/// Stable identifier of one output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MonitorId(pub u32);

impl std::fmt::Display for MonitorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque OS handle for one monitor's gamma control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawContext(pub u64);

#[cfg_attr(test, mockall::automock)]
pub trait DisplayDevice: Send + Sync {
    /// Human readable device name for logs.
    fn name(&self) -> &'static str;

    /// Currently connected monitors.
    fn monitors(&self) -> Vec<MonitorId>;

    fn open_context(&self, monitor: MonitorId) -> Result<RawContext, DisplayError>;

    /// Release the OS resource. Closing an unknown context is a no-op.
    fn close_context(&self, context: RawContext);

    /// Current ramp of the context's monitor.
    fn read_ramp(&self, context: RawContext) -> Result<GammaRamp, DisplayError>;

    fn write_ramp(&self, context: RawContext, ramp: &GammaRamp) -> Result<(), DisplayError>;
}
