//! Time helpers for timeline display

use std::fmt;
use std::time::{Duration, Instant};

/// Clock display (`m:ss`) for a timeline position in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClockTime {
    pub minutes: u64,
    pub seconds: u8,
}

impl ClockTime {
    /// Build from seconds. Negative and non-finite inputs display as `0:00`.
    pub fn from_seconds(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return Self::default();
        }
        let whole = secs.floor() as u64;
        Self {
            minutes: whole / 60,
            seconds: (whole % 60) as u8,
        }
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}", self.minutes, self.seconds)
    }
}

/// Format seconds as `m:ss`
pub fn format_clock(secs: f64) -> String {
    ClockTime::from_seconds(secs).to_string()
}

/// Seconds elapsed from `earlier` to `later`, zero if `later` precedes `earlier`
#[inline]
pub fn elapsed_secs(earlier: Instant, later: Instant) -> f64 {
    later.saturating_duration_since(earlier).as_secs_f64()
}

/// Duration from fractional seconds, clamping negatives and NaN to zero
#[inline]
pub fn duration_from_secs(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0.0), "0:00");
        assert_eq!(format_clock(5.9), "0:05");
        assert_eq!(format_clock(65.2), "1:05");
        assert_eq!(format_clock(600.0), "10:00");
    }

    #[test]
    fn test_format_clock_garbage() {
        assert_eq!(format_clock(f64::NAN), "0:00");
        assert_eq!(format_clock(-3.0), "0:00");
        assert_eq!(format_clock(f64::INFINITY), "0:00");
    }

    #[test]
    fn test_elapsed_saturates() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(300);
        assert!((elapsed_secs(t0, t1) - 0.3).abs() < 1e-9);
        assert_eq!(elapsed_secs(t1, t0), 0.0);
    }

    #[test]
    fn test_duration_from_secs() {
        assert_eq!(duration_from_secs(-1.0), Duration::ZERO);
        assert_eq!(duration_from_secs(f64::NAN), Duration::ZERO);
        assert_eq!(duration_from_secs(0.25), Duration::from_millis(250));
    }
}
