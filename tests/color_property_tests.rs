//! Property tests for Kelvin conversion, ramp synthesis and easing curves.

use proptest::prelude::*;

use duskshift::color::{kelvin_to_rgb, synthesize};
use duskshift::profile::TransitionCurve;

fn curve_strategy() -> impl Strategy<Value = TransitionCurve> {
    prop_oneof![Just(TransitionCurve::Linear), Just(TransitionCurve::Sigmoid)]
}

proptest! {
    #[test]
    fn test_rgb_multipliers_are_normalized(kelvin in 1000u32..=10_000) {
        let rgb = kelvin_to_rgb(kelvin);
        for channel in [rgb.red, rgb.green, rgb.blue] {
            prop_assert!((0.0..=1.0).contains(&channel), "{kelvin}K: {rgb:?}");
        }
    }

    #[test]
    fn test_ramps_never_decrease(
        kelvin in 1000u32..=10_000,
        brightness in 0.0f32..=1.0,
        contrast in 0.0f32..=2.0,
    ) {
        let ramp = synthesize(kelvin, brightness, contrast).unwrap();
        for channel in [ramp.red(), ramp.green(), ramp.blue()] {
            prop_assert!(channel.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_out_of_range_kelvin_is_rejected(
        kelvin in prop_oneof![0u32..1000, 10_001u32..100_000],
    ) {
        prop_assert!(synthesize(kelvin, 1.0, 1.0).is_err());
    }

    #[test]
    fn test_curves_are_monotonic(curve in curve_strategy(), a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(curve.ease(lo) <= curve.ease(hi) + 1e-9);
    }

    #[test]
    fn test_curves_stay_in_unit_range(curve in curve_strategy(), x in -1.0f64..=2.0) {
        let y = curve.ease(x);
        prop_assert!((0.0..=1.0).contains(&y));
    }
}
