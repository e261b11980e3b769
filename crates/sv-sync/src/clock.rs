//! Virtual Clock
//!
//! Single authoritative timeline position for synchronized playback,
//! independent of any stream's native clock.
//!
//! While playing: `position = anchor_position + (now - anchor_wall) * rate`,
//! folded modulo the loop duration when looping. While paused: `anchor_position`.
//!
//! Every operation takes `now` explicitly so the clock itself stays a pure
//! state machine; the owner reads `now` from a [`WallClock`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sv_core::{duration_from_secs, elapsed_secs, is_valid_rate};

// ============ Wall Clock ============

/// Source of wall-clock instants
pub trait WallClock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Monotonic system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests and offline simulation
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    pub fn advance_secs(&self, secs: f64) {
        self.advance(duration_from_secs(secs));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl WallClock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

// ============ Clock Step ============

/// Result of evaluating the clock on a tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockStep {
    /// Paused, position unchanged
    Idle(f64),
    /// No positive loop window yet; the clock is held in place
    Stalled(f64),
    /// Advancing inside the loop window
    Running(f64),
    /// Crossed the loop end and wrapped (re-anchored at the wrapped position)
    Wrapped(f64),
    /// Reached the end with looping disabled; clock stopped at the end
    Ended(f64),
}

impl ClockStep {
    #[inline]
    pub fn position(&self) -> f64 {
        match *self {
            ClockStep::Idle(p)
            | ClockStep::Stalled(p)
            | ClockStep::Running(p)
            | ClockStep::Wrapped(p)
            | ClockStep::Ended(p) => p,
        }
    }
}

// ============ Virtual Clock ============

/// Virtual clock state
#[derive(Debug, Clone)]
pub struct VirtualClock {
    playing: bool,
    rate: f64,
    /// Wall instant the current run segment began (None while paused)
    anchor_wall: Option<Instant>,
    /// Timeline position at `anchor_wall`
    anchor_position: f64,
}

impl VirtualClock {
    pub fn new(rate: f64) -> Self {
        Self {
            playing: false,
            rate: if is_valid_rate(rate) { rate } else { 1.0 },
            anchor_wall: None,
            anchor_position: 0.0,
        }
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    #[inline]
    pub fn anchor_position(&self) -> f64 {
        self.anchor_position
    }

    #[inline]
    pub fn anchor_wall(&self) -> Option<Instant> {
        self.anchor_wall
    }

    /// Begin a run segment. Returns `false` if already playing.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.playing {
            return false;
        }
        self.playing = true;
        self.anchor_wall = Some(now);
        true
    }

    /// End the run segment, folding elapsed time into the anchor.
    /// Returns `false` if not playing.
    pub fn stop(&mut self, now: Instant, loop_duration: f64, looping: bool) -> bool {
        if !self.playing {
            return false;
        }
        self.anchor_position = fold(self.raw_position(now), loop_duration, looping);
        self.anchor_wall = None;
        self.playing = false;
        true
    }

    /// Jump to `position`; restarts elapsed-time accounting when playing
    pub fn seek_to(&mut self, position: f64, now: Instant) {
        self.anchor_position = position;
        if self.playing {
            self.anchor_wall = Some(now);
        }
    }

    /// Change the rate without a position discontinuity.
    /// Returns `false` (and leaves the clock untouched) for invalid rates.
    pub fn set_rate(&mut self, rate: f64, now: Instant, loop_duration: f64, looping: bool) -> bool {
        if !is_valid_rate(rate) {
            return false;
        }
        if self.playing {
            self.anchor_position = fold(self.raw_position(now), loop_duration, looping);
            self.anchor_wall = Some(now);
        }
        self.rate = rate;
        true
    }

    /// Unfolded position at `now`
    pub fn raw_position(&self, now: Instant) -> f64 {
        match (self.playing, self.anchor_wall) {
            (true, Some(anchor)) => self.anchor_position + elapsed_secs(anchor, now) * self.rate,
            _ => self.anchor_position,
        }
    }

    /// Pure read of the timeline position at `now`
    pub fn sample(&self, now: Instant, loop_duration: f64, looping: bool) -> f64 {
        fold(self.raw_position(now), loop_duration, looping)
    }

    /// Re-anchor at the current position without advancing
    pub fn hold(&mut self, now: Instant) {
        if self.playing {
            self.anchor_wall = Some(now);
        }
    }

    /// Evaluate wraparound / natural end for a tick at `now`
    pub fn resolve(&mut self, now: Instant, loop_duration: f64, looping: bool) -> ClockStep {
        if !self.playing {
            return ClockStep::Idle(self.anchor_position);
        }
        if loop_duration <= 0.0 {
            self.hold(now);
            return ClockStep::Stalled(self.anchor_position);
        }

        let raw = self.raw_position(now);
        if raw < loop_duration {
            return ClockStep::Running(raw);
        }

        if looping {
            let wrapped = raw.rem_euclid(loop_duration);
            // Re-anchor on every observed wrap so float error does not accumulate
            self.anchor_wall = Some(now);
            self.anchor_position = wrapped;
            ClockStep::Wrapped(wrapped)
        } else {
            self.playing = false;
            self.anchor_wall = None;
            self.anchor_position = loop_duration;
            ClockStep::Ended(loop_duration)
        }
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Fold a raw position into `[0, loop_duration]`
fn fold(raw: f64, loop_duration: f64, looping: bool) -> f64 {
    let raw = raw.max(0.0);
    if loop_duration <= 0.0 {
        raw
    } else if looping {
        raw.rem_euclid(loop_duration)
    } else {
        raw.min(loop_duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn test_paused_clock_holds_anchor() {
        let t0 = Instant::now();
        let mut clock = VirtualClock::default();
        clock.seek_to(3.0, t0);
        assert_eq!(clock.sample(t0 + secs(10.0), 5.0, true), 3.0);
        assert_eq!(clock.resolve(t0 + secs(10.0), 5.0, true), ClockStep::Idle(3.0));
    }

    #[test]
    fn test_start_stop_guards() {
        let t0 = Instant::now();
        let mut clock = VirtualClock::default();
        assert!(!clock.stop(t0, 5.0, true));
        assert!(clock.start(t0));
        assert!(!clock.start(t0 + secs(1.0)));
        assert_eq!(clock.anchor_wall(), Some(t0));
        assert!(clock.stop(t0 + secs(1.5), 5.0, true));
        assert_abs_diff_eq!(clock.anchor_position(), 1.5, epsilon = 1e-9);
        assert_eq!(clock.anchor_wall(), None);
    }

    #[test]
    fn test_stop_applies_wraparound() {
        let t0 = Instant::now();
        let mut clock = VirtualClock::default();
        clock.seek_to(4.0, t0);
        clock.start(t0);
        clock.stop(t0 + secs(2.0), 5.0, true);
        assert_abs_diff_eq!(clock.anchor_position(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_seek_while_playing_resets_anchor() {
        let t0 = Instant::now();
        let mut clock = VirtualClock::default();
        clock.start(t0);
        let t1 = t0 + secs(2.0);
        clock.seek_to(1.0, t1);
        assert_eq!(clock.anchor_wall(), Some(t1));
        assert_abs_diff_eq!(clock.sample(t1 + secs(0.5), 10.0, true), 1.5, epsilon = 1e-9);
    }

    #[test]
    fn test_rate_change_is_continuous() {
        let t0 = Instant::now();
        let mut clock = VirtualClock::default();
        clock.seek_to(10.0, t0);
        clock.start(t0);

        let t1 = t0 + secs(1.0);
        let before = clock.sample(t1, 60.0, true);
        assert!(clock.set_rate(0.5, t1, 60.0, true));
        let after = clock.sample(t1, 60.0, true);
        assert_abs_diff_eq!(before, after, epsilon = 1e-9);

        assert_abs_diff_eq!(clock.sample(t1 + secs(2.0), 60.0, true), 12.0, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_rate_ignored() {
        let t0 = Instant::now();
        let mut clock = VirtualClock::default();
        assert!(!clock.set_rate(0.0, t0, 5.0, true));
        assert!(!clock.set_rate(f64::NAN, t0, 5.0, true));
        assert_eq!(clock.rate(), 1.0);
        assert_eq!(VirtualClock::new(-2.0).rate(), 1.0);
    }

    #[test]
    fn test_wraparound_reanchors() {
        let t0 = Instant::now();
        let mut clock = VirtualClock::default();
        clock.seek_to(4.9, t0);
        clock.start(t0);

        let t1 = t0 + secs(0.3);
        let step = clock.resolve(t1, 5.0, true);
        match step {
            ClockStep::Wrapped(p) => assert_abs_diff_eq!(p, 0.2, epsilon = 1e-9),
            other => panic!("expected wrap, got {:?}", other),
        }
        assert_eq!(clock.anchor_wall(), Some(t1));
        assert_abs_diff_eq!(clock.anchor_position(), 0.2, epsilon = 1e-9);
        assert!(clock.is_playing());
    }

    #[test]
    fn test_many_wraps_stay_bounded() {
        let t0 = Instant::now();
        let mut clock = VirtualClock::default();
        clock.start(t0);
        let mut now = t0;
        for _ in 0..10_000 {
            now += Duration::from_millis(16);
            let pos = clock.resolve(now, 0.5, true).position();
            assert!((0.0..0.5).contains(&pos), "position {} escaped loop", pos);
        }
    }

    #[test]
    fn test_natural_end_clamps() {
        let t0 = Instant::now();
        let mut clock = VirtualClock::default();
        clock.seek_to(4.5, t0);
        clock.start(t0);
        let step = clock.resolve(t0 + secs(2.0), 5.0, false);
        assert_eq!(step, ClockStep::Ended(5.0));
        assert!(!clock.is_playing());
        assert_eq!(clock.anchor_position(), 5.0);
        assert_eq!(clock.sample(t0 + secs(9.0), 5.0, false), 5.0);
    }

    #[test]
    fn test_zero_loop_duration_stalls() {
        let t0 = Instant::now();
        let mut clock = VirtualClock::default();
        clock.seek_to(0.0, t0);
        clock.start(t0);
        let step = clock.resolve(t0 + secs(3.0), 0.0, true);
        assert_eq!(step, ClockStep::Stalled(0.0));
        // Held: elapsed time while stalled is not credited later
        assert_eq!(clock.resolve(t0 + secs(3.0), 5.0, true), ClockStep::Running(0.0));
    }

    #[test]
    fn test_manual_clock_advances() {
        let wall = ManualClock::new();
        let t0 = wall.now();
        wall.advance_secs(0.25);
        let other = wall.clone();
        assert_eq!(other.now() - t0, Duration::from_millis(250));
    }
}
