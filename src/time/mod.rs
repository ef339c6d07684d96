//! Time sources used by the engine and the simulator.

pub mod clock;

pub use clock::{Clock, SimulatedClock, SystemClock};

#[cfg(any(test, feature = "testing-support"))]
pub use clock::ManualClock;
