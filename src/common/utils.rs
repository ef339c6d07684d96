//! Small numeric and formatting helpers shared across modules.

use std::path::Path;
use std::time::Duration;

/// Linear interpolation between two Kelvin values, rounded to the nearest Kelvin.
pub fn interpolate_u32(start: u32, end: u32, progress: f64) -> u32 {
    let progress = progress.clamp(0.0, 1.0);
    let value = start as f64 + (end as f64 - start as f64) * progress;
    value.round().max(0.0) as u32
}

/// Evaluate a cubic Bézier easing curve with P0 = (0,0) and P3 = (1,1).
///
/// `x` is the input progress; the curve is solved for the parameter `t` whose
/// x-coordinate equals `x` and the matching y-coordinate is returned. Control
/// point x-values must lie in `[0, 1]` so the curve stays monotonic.
pub fn bezier_curve(x: f64, p1x: f64, p1y: f64, p2x: f64, p2y: f64) -> f64 {
    let x = x.clamp(0.0, 1.0);
    if x == 0.0 || x == 1.0 {
        return x;
    }

    let coord = |t: f64, p1: f64, p2: f64| {
        let u = 1.0 - t;
        3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t
    };

    // Bisection: x(t) is monotonic for control x-values in [0, 1]
    let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
    let mut t = x;
    for _ in 0..64 {
        t = (lo + hi) / 2.0;
        let cx = coord(t, p1x, p2x);
        if (cx - x).abs() < 1e-9 {
            break;
        }
        if cx < x {
            lo = t;
        } else {
            hi = t;
        }
    }

    coord(t, p1y, p2y).clamp(0.0, 1.0)
}

/// Human readable duration, e.g. `45m`, `1h 30m`, `12s`, `250ms`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs == 0 {
        return format!("{}ms", duration.as_millis());
    }
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    match (h, m, s) {
        (0, 0, s) => format!("{s}s"),
        (0, m, 0) => format!("{m}m"),
        (0, m, s) => format!("{m}m {s}s"),
        (h, 0, _) => format!("{h}h"),
        (h, m, _) => format!("{h}h {m}m"),
    }
}

/// Replace the home directory prefix with `~` for display.
pub fn private_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(stripped) = path.strip_prefix(&home)
    {
        return format!("~/{}", stripped.display());
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::constants::*;

    #[test]
    fn test_interpolate_u32_bounds() {
        assert_eq!(interpolate_u32(6500, 2700, 0.0), 6500);
        assert_eq!(interpolate_u32(6500, 2700, 1.0), 2700);
        assert_eq!(interpolate_u32(6500, 2700, 0.5), 4600);
        assert_eq!(interpolate_u32(2700, 6500, 2.0), 6500);
    }

    #[test]
    fn test_bezier_endpoints_and_symmetry() {
        let ease = |x| bezier_curve(x, BEZIER_P1X, BEZIER_P1Y, BEZIER_P2X, BEZIER_P2Y);
        assert_eq!(ease(0.0), 0.0);
        assert_eq!(ease(1.0), 1.0);
        assert!((ease(0.5) - 0.5).abs() < 1e-6);
        // Slow start, slow finish
        assert!(ease(0.1) < 0.1);
        assert!(ease(0.9) > 0.9);
    }

    #[test]
    fn test_bezier_is_monotonic() {
        let mut last = 0.0;
        for i in 0..=1000 {
            let y = bezier_curve(i as f64 / 1000.0, BEZIER_P1X, BEZIER_P1Y, BEZIER_P2X, BEZIER_P2Y);
            assert!(y >= last - 1e-9, "curve decreased at step {i}");
            last = y;
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_secs(12)), "12s");
        assert_eq!(format_duration(Duration::from_secs(45 * 60)), "45m");
        assert_eq!(format_duration(Duration::from_secs(90 * 60)), "1h 30m");
        assert_eq!(format_duration(Duration::from_secs(61)), "1m 1s");
    }
}
