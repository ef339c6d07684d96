//! Application constants, defaults and validation limits.

// ═══ Color Temperature ═══

pub const MINIMUM_TEMP: u32 = 1000; // Candlelight
pub const MAXIMUM_TEMP: u32 = 10000; // Clear blue sky
pub const NEUTRAL_TEMP: u32 = 6500; // Identity white point

pub const DEFAULT_DAY_TEMP: u32 = 6500;
pub const DEFAULT_NIGHT_TEMP: u32 = 3300;
pub const DEFAULT_TRANSITION_MINUTES: u64 = 45;
pub const MINIMUM_TRANSITION_MINUTES: u64 = 1;
pub const MAXIMUM_TRANSITION_MINUTES: u64 = 240;

pub const DEFAULT_BRIGHTNESS: f32 = 1.0;
pub const MINIMUM_BRIGHTNESS: f32 = 0.0;
pub const MAXIMUM_BRIGHTNESS: f32 = 1.0;
pub const DEFAULT_CONTRAST: f32 = 1.0;
pub const MINIMUM_CONTRAST: f32 = 0.0;
pub const MAXIMUM_CONTRAST: f32 = 2.0;

// ═══ Gamma Ramps ═══

pub const RAMP_SIZE: usize = 256;
pub const DISPLAY_GAMMA: f64 = 2.2;

// ═══ Gamma Ramp Cache ═══

pub const DEFAULT_CACHE_CAPACITY: usize = 200;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 30 * 60;

// ═══ Device Context Pool ═══

pub const MINIMUM_POOL_SIZE: usize = 2;
pub const MAXIMUM_POOL_SIZE: usize = 10;
pub const POOL_HANDLES_PER_MONITOR: usize = 2;
pub const DEFAULT_HANDLE_TIMEOUT_SECS: u64 = 5 * 60;
pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 100;

// ═══ Transitions and Adaptive Interval ═══

pub const MINIMUM_TICK_INTERVAL_MS: u64 = 50;
pub const MAXIMUM_TICK_INTERVAL_MS: u64 = 500;
pub const WRITE_HISTORY_LEN: usize = 100;
pub const DEFAULT_STARTUP_DURATION_SECS: f64 = 2.0;
pub const MAXIMUM_STARTUP_DURATION_SECS: f64 = 60.0;
/// Applied Kelvin within this distance of the target counts as on target.
pub const KELVIN_TOLERANCE: u32 = 5;

// Cubic Bézier control points for the sigmoidal curve.
// P0 = (0, 0) and P3 = (1, 1) are implicit.
pub const BEZIER_P1X: f64 = 0.25;
pub const BEZIER_P1Y: f64 = 0.0;
pub const BEZIER_P2X: f64 = 0.75;
pub const BEZIER_P2Y: f64 = 1.0;

// ═══ Health and Recovery ═══

pub const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 50;
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 250;
pub const DEFAULT_HEALTH_CHECK_INTERVAL_SECS: u64 = 60;
pub const MINIMUM_HEALTH_CHECK_INTERVAL_SECS: u64 = 5;
pub const MAXIMUM_HEALTH_CHECK_INTERVAL_SECS: u64 = 3600;

// ═══ Scheduler ═══

/// Longest single sleep slice, so commands and shutdown are seen promptly.
pub const SCHEDULER_SLICE_MS: u64 = 250;
/// Upper bound on sleeping while idle between solar events.
pub const MAXIMUM_IDLE_SLEEP_SECS: u64 = 60;
/// Undrained events beyond this are dropped rather than queued.
pub const EVENT_QUEUE_CAPACITY: usize = 1024;

// ═══ Config ═══

pub const CONFIG_DIR_NAME: &str = "duskshift";
pub const CONFIG_FILE_NAME: &str = "duskshift.toml";
pub const CONFIG_DEBOUNCE_MS: u64 = 500;

// Placeholder location (Chicago) written into fresh configs
pub const DEFAULT_LATITUDE: f64 = 41.8781;
pub const DEFAULT_LONGITUDE: f64 = -87.6298;

pub const EXIT_FAILURE: i32 = 1;
