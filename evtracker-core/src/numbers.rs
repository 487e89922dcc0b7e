//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Round a f64 half away from zero and clamp it to the i64 range, returning 0 for NaN.
#[must_use]
pub fn round_f64_to_i64(value: f64) -> i64 {
    if value.is_nan() {
        return 0;
    }
    let min = cast::<i64, f64>(i64::MIN).unwrap_or(f64::MIN);
    let max = cast::<i64, f64>(i64::MAX).unwrap_or(f64::MAX);
    let clamped = value.clamp(min, max).round();
    // i64::MAX is not exactly representable; the clamped bound rounds up past it.
    cast::<f64, i64>(clamped).unwrap_or(if clamped > 0.0 { i64::MAX } else { i64::MIN })
}

/// Floor a non-negative f64 into u64, returning 0 for negative or non-finite values.
#[must_use]
pub fn floor_f64_to_u64(value: f64) -> u64 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    let max = cast::<u64, f64>(u64::MAX).unwrap_or(f64::MAX);
    cast::<f64, u64>(value.min(max).floor()).unwrap_or(u64::MAX)
}

/// Round a non-negative f64 into u64, returning 0 for negative or non-finite values.
#[must_use]
pub fn round_f64_to_u64(value: f64) -> u64 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    let max = cast::<u64, f64>(u64::MAX).unwrap_or(f64::MAX);
    cast::<f64, u64>(value.min(max).round()).unwrap_or(u64::MAX)
}

/// Convert u64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn u64_to_f64(value: u64) -> f64 {
    cast::<u64, f64>(value).unwrap_or(0.0)
}

/// Convert i64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn i64_to_f64(value: i64) -> f64 {
    cast::<i64, f64>(value).unwrap_or(0.0)
}

/// Truncate toward negative infinity at the tenths digit.
#[must_use]
pub fn floor_tenths(value: f64) -> f64 {
    (value * 10.0).floor() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounders_cover_ranges() {
        assert_eq!(round_f64_to_i64(1.5), 2);
        assert_eq!(round_f64_to_i64(-1.5), -2);
        assert_eq!(round_f64_to_i64(f64::NAN), 0);
        assert_eq!(round_f64_to_i64(f64::MAX), i64::MAX);
    }

    #[test]
    fn unsigned_conversions_reject_negatives_and_nan() {
        assert_eq!(floor_f64_to_u64(12.9), 12);
        assert_eq!(floor_f64_to_u64(-3.0), 0);
        assert_eq!(floor_f64_to_u64(f64::INFINITY), 0);
        assert_eq!(round_f64_to_u64(2.5), 3);
        assert_eq!(round_f64_to_u64(f64::NAN), 0);
    }

    #[test]
    fn floor_tenths_truncates_instead_of_rounding() {
        assert!((floor_tenths(41.208) - 41.2).abs() < 1e-9);
        assert!((floor_tenths(18.99) - 18.9).abs() < 1e-9);
    }
}
