//! sv-core: Shared types for SyncView
//!
//! Foundational types used by the synchronized playback core and its hosts:
//! slot bindings, the stream handle contract, preferences and errors.

mod error;
mod preferences;
mod slot;
mod stream;
mod time;

pub use error::*;
pub use preferences::*;
pub use slot::*;
pub use stream::*;
pub use time::*;

/// `true` for a usable playback multiplier (finite and positive)
#[inline]
pub fn is_valid_rate(rate: f64) -> bool {
    rate.is_finite() && rate > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_rates() {
        for rate in RATE_PRESETS {
            assert!(is_valid_rate(rate));
        }
        assert!(is_valid_rate(3.0));
        assert!(!is_valid_rate(0.0));
        assert!(!is_valid_rate(-0.5));
        assert!(!is_valid_rate(f64::NAN));
        assert!(!is_valid_rate(f64::INFINITY));
    }
}
