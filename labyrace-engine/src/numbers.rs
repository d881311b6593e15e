//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Convert a count to f64 while allowing precision loss in a single location.
#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(0.0)
}

/// Convert a budget counter to f64.
#[must_use]
pub fn u32_to_f64(value: u32) -> f64 {
    f64::from(value)
}

/// Convert a grid coordinate to f64.
#[must_use]
pub fn i32_to_f64(value: i32) -> f64 {
    f64::from(value)
}

/// Convert a grid index to a signed coordinate, saturating at `i32::MAX`.
#[must_use]
pub fn usize_to_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Convert a non-negative coordinate to an index, returning `None` when negative.
#[must_use]
pub fn i32_to_usize(value: i32) -> Option<usize> {
    usize::try_from(value).ok()
}

/// Floor a continuous coordinate to a cell coordinate, saturating on overflow.
#[must_use]
pub fn floor_to_i32(value: f64) -> i32 {
    if value.is_nan() {
        return 0;
    }
    cast::<f64, i32>(value.floor()).unwrap_or(if value < 0.0 { i32::MIN } else { i32::MAX })
}

/// Ceil a f64 and clamp it to the u64 range, returning 0 for non-finite or negative values.
#[must_use]
pub fn ceil_f64_to_u64(value: f64) -> u64 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    let max = cast::<u64, f64>(u64::MAX).unwrap_or(f64::MAX);
    cast::<f64, u64>(value.min(max).ceil()).unwrap_or(0)
}

/// Floor a unit-interval roll scaled by `span`, clamped to `0..span`.
#[must_use]
pub fn scale_roll(roll: f64, span: usize) -> usize {
    if span == 0 || !roll.is_finite() {
        return 0;
    }
    let scaled = (roll.clamp(0.0, 1.0) * usize_to_f64(span)).floor();
    cast::<f64, usize>(scaled).unwrap_or(0).min(span - 1)
}

/// Duration in fractional milliseconds for profiling summaries.
#[must_use]
pub fn duration_ms(duration: std::time::Duration) -> f64 {
    duration.as_secs_f64() * 1_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceil_clamps_and_handles_nan() {
        assert_eq!(ceil_f64_to_u64(1.2), 2);
        assert_eq!(ceil_f64_to_u64(f64::NAN), 0);
        assert_eq!(ceil_f64_to_u64(-4.0), 0);
    }

    #[test]
    fn scale_roll_stays_in_span() {
        assert_eq!(scale_roll(0.0, 5), 0);
        assert_eq!(scale_roll(0.999_999, 5), 4);
        assert_eq!(scale_roll(1.0, 5), 4);
        assert_eq!(scale_roll(0.5, 0), 0);
    }

    #[test]
    fn floor_handles_negative_coordinates() {
        assert_eq!(floor_to_i32(-0.2), -1);
        assert_eq!(floor_to_i32(20.99), 20);
        assert_eq!(floor_to_i32(f64::NAN), 0);
    }

    #[test]
    fn signed_index_conversions() {
        assert_eq!(i32_to_usize(-1), None);
        assert_eq!(i32_to_usize(20), Some(20));
        assert_eq!(usize_to_i32(7), 7);
    }
}
