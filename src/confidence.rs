//! Confidence boosting for under-confident learned classifiers.

/// Raw scores strictly inside this band are boosted
pub const BOOST_BAND: (f32, f32) = (0.05, 0.7);

const BOOST_BASE: f32 = 0.65;
const BOOST_OFFSET: f32 = 1.2;

/// Boost a raw classifier score with `0.65 + log2(raw + 1.2)` inside the
/// band, identity outside it.
///
/// The result is not clamped and may exceed 1.0; ranking inside the band is
/// preserved. Use [`clamp_unit`] before reporting a value.
pub fn normalize_confidence(raw: f32) -> f32 {
    let (low, high) = BOOST_BAND;
    if raw > low && raw < high {
        BOOST_BASE + (raw + BOOST_OFFSET).log2()
    } else {
        raw
    }
}

/// Clamp to [0, 1]; NaN maps to 0
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boost_inside_band() {
        let boosted = normalize_confidence(0.4);
        let expected = 0.65 + (1.6f32).ln() / (2.0f32).ln();
        assert!((boosted - expected).abs() < 1e-5);
        assert!((boosted - 1.328).abs() < 1e-3);
        assert_eq!(clamp_unit(boosted), 1.0);
    }

    #[test]
    fn test_identity_outside_band() {
        for raw in [0.0, 0.03, 0.05, 0.7, 0.9, 1.0] {
            assert_eq!(normalize_confidence(raw), raw);
        }
    }

    #[test]
    fn test_monotonic_inside_band() {
        let mut previous = normalize_confidence(0.051);
        let mut raw = 0.06;
        while raw < 0.7 {
            let current = normalize_confidence(raw);
            assert!(current > previous, "not increasing at {}", raw);
            previous = current;
            raw += 0.01;
        }
    }

    #[test]
    fn test_clamp_unit() {
        assert_eq!(clamp_unit(-0.5), 0.0);
        assert_eq!(clamp_unit(0.42), 0.42);
        assert_eq!(clamp_unit(7.0), 1.0);
        assert_eq!(clamp_unit(f32::NAN), 0.0);
    }
}
