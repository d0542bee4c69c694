//! Decibel and cents conversions.

/// Converts a level in decibels to a linear scale factor.
///
/// # Example
///
/// ```rust
/// use compas_core::db_to_scale;
///
/// assert!((db_to_scale(0.0) - 1.0).abs() < 1e-12);
/// assert!((db_to_scale(-6.0) - 0.501187).abs() < 1e-5);
/// ```
#[inline]
pub fn db_to_scale(db: f64) -> f64 {
    libm::pow(10.0, db / 20.0)
}

/// Converts a linear scale factor to decibels.
///
/// Returns negative infinity for non-positive input.
#[inline]
pub fn scale_to_db(scale: f64) -> f64 {
    if scale <= 0.0 {
        return f64::NEG_INFINITY;
    }
    20.0 * libm::log10(scale)
}

/// Converts a pitch offset in cents to a frequency ratio.
///
/// 1200 cents = one octave = ratio 2.
#[inline]
pub fn cents_to_ratio(cents: f64) -> f64 {
    libm::exp2(cents / 1200.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_round_trip() {
        for db in [-24.0, -6.0, 0.0, 6.0, 12.0] {
            let back = scale_to_db(db_to_scale(db));
            assert!((back - db).abs() < 1e-9, "round trip failed for {} dB", db);
        }
    }

    #[test]
    fn test_cents_octave() {
        assert!((cents_to_ratio(1200.0) - 2.0).abs() < 1e-12);
        assert!((cents_to_ratio(-1200.0) - 0.5).abs() < 1e-12);
        assert!((cents_to_ratio(0.0) - 1.0).abs() < 1e-12);
    }
}
