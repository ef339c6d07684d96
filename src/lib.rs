//! # duskshift
//!
//! Display color temperature engine: follows the sun at a configured
//! location and eases every monitor between day and night white points.
//!
//! ## Architecture
//!
//! - **Entry points**: `args` parses the command line, `commands` implements
//!   `run`, `simulate` and `solar`
//! - **Engine**: `core` holds the [`core::ColorEngine`], its transition state
//!   machine, health monitor, scheduler and diagnostics
//! - **Color**: `color` converts Kelvin to RGB and synthesizes cached gamma ramps
//! - **Hardware**: `display` defines the device seam, the context pool and the
//!   Wayland and in-memory devices
//! - **Time and place**: `geo` computes solar times, `time` provides real,
//!   simulated and test clocks, `profile` maps both onto a temperature
//! - **Infrastructure**: `config` (TOML with hot reload), `logger`, `signals`,
//!   `error`

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod logger;

pub mod args;
pub mod color;
pub mod commands;
pub mod common;
pub mod config;
pub mod core;
pub mod display;
pub mod error;
pub mod geo;
pub mod profile;
pub mod signals;
pub mod time;

pub use crate::core::{ColorEngine, EngineSettings, Scheduler, SchedulerCommand};
pub use error::EngineError;
