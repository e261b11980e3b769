//! Local Loop Fallback
//!
//! Per-stream looping used only while synchronization is disabled. Each stream
//! loops its own trim window from its native notifications; the virtual clock
//! is not involved.

use sv_core::{SlotBinding, StreamHandle};

/// What a local loop evaluation did to the stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoopAction {
    /// Inside the window, nothing to do
    None,
    /// Passed `trim_end` and was moved back to `trim_start + overshoot`
    Wrapped { from: f64, to: f64 },
    /// Native end reached; restarted at `trim_start`
    Restarted { at: f64 },
    /// Native end reached with looping off; the stream is left alone
    Stopped,
}

/// Independent-mode looping policy shared by all tiles
#[derive(Debug, Clone)]
pub struct LocalLoop {
    looping: bool,
    wraps: u64,
}

impl LocalLoop {
    pub fn new(looping: bool) -> Self {
        Self { looping, wraps: 0 }
    }

    #[inline]
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Total repositions performed so far
    pub fn wraps(&self) -> u64 {
        self.wraps
    }

    /// Native time-update notification. With looping off the stream plays
    /// on past `trim_end` untouched.
    pub fn on_time_update(&mut self, binding: &SlotBinding, handle: &mut dyn StreamHandle) -> LoopAction {
        if !self.looping {
            return LoopAction::None;
        }
        let window = binding.window();
        let Some(end) = window.resolved_end(handle.duration()) else {
            return LoopAction::None;
        };
        let length = end - window.start();
        let position = handle.position();
        if length <= 0.0 || position < end {
            return LoopAction::None;
        }

        let was_playing = !handle.is_paused();
        // Keep the sub-tick overshoot instead of snapping to trim_start
        let overshoot = (position - end).rem_euclid(length);
        let target = window.start() + overshoot;
        handle.set_position(target);
        if was_playing {
            if let Err(err) = handle.play() {
                log::warn!("Local loop resume rejected: {}", err);
            }
        }

        self.wraps += 1;
        log::debug!("Local loop {:.3}s -> {:.3}s", position, target);
        LoopAction::Wrapped {
            from: position,
            to: target,
        }
    }

    /// Native end-of-media notification
    pub fn on_ended(&mut self, binding: &SlotBinding, handle: &mut dyn StreamHandle) -> LoopAction {
        if !self.looping {
            return LoopAction::Stopped;
        }

        let start = binding.trim_start();
        handle.set_position(start);
        if let Err(err) = handle.play() {
            log::warn!("Local loop restart rejected: {}", err);
        }
        self.wraps += 1;
        LoopAction::Restarted { at: start }
    }
}

impl Default for LocalLoop {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::sim::SimulatedStream;
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;
    use sv_core::TrimWindow;

    fn setup(start: f64, end: Option<f64>, duration: f64) -> (SlotBinding, SimulatedStream) {
        let wall = ManualClock::new();
        let stream = SimulatedStream::new(Arc::new(wall), Some(duration));
        (SlotBinding::new(TrimWindow::new(start, end)), stream)
    }

    #[test]
    fn test_overshoot_preserved() {
        let (binding, mut stream) = setup(2.0, Some(8.0), 10.0);
        stream.play().unwrap();
        stream.set_position(8.05);

        let mut local = LocalLoop::new(true);
        match local.on_time_update(&binding, &mut stream) {
            LoopAction::Wrapped { to, .. } => assert_abs_diff_eq!(to, 2.05, epsilon = 1e-9),
            other => panic!("expected wrap, got {:?}", other),
        }
        assert_abs_diff_eq!(stream.position(), 2.05, epsilon = 1e-9);
        assert!(!stream.is_paused());
        assert_eq!(local.wraps(), 1);
    }

    #[test]
    fn test_large_overshoot_wraps_modulo_window() {
        let (binding, mut stream) = setup(2.0, Some(4.0), 10.0);
        stream.set_position(9.5);
        let mut local = LocalLoop::new(true);
        local.on_time_update(&binding, &mut stream);
        assert_abs_diff_eq!(stream.position(), 3.5, epsilon = 1e-9);
        // Was paused, stays paused
        assert!(stream.is_paused());
    }

    #[test]
    fn test_inside_window_untouched() {
        let (binding, mut stream) = setup(2.0, Some(8.0), 10.0);
        stream.set_position(7.9);
        let seeks = stream.seek_count();
        let mut local = LocalLoop::new(true);
        assert_eq!(local.on_time_update(&binding, &mut stream), LoopAction::None);
        assert_eq!(stream.seek_count(), seeks);
    }

    #[test]
    fn test_not_looping_plays_past_trim_end() {
        let (binding, mut stream) = setup(2.0, Some(8.0), 10.0);
        stream.play().unwrap();
        stream.set_position(8.05);
        let seeks = stream.seek_count();
        let mut local = LocalLoop::new(false);
        assert_eq!(local.on_time_update(&binding, &mut stream), LoopAction::None);
        assert!(!stream.is_paused());
        assert_abs_diff_eq!(stream.position(), 8.05, epsilon = 1e-9);
        assert_eq!(stream.seek_count(), seeks);
        assert_eq!(local.wraps(), 0);
    }

    #[test]
    fn test_native_end_uses_duration() {
        let (binding, mut stream) = setup(1.0, None, 6.0);
        stream.set_position(6.0);
        let mut local = LocalLoop::new(true);
        assert_eq!(
            local.on_ended(&binding, &mut stream),
            LoopAction::Restarted { at: 1.0 }
        );
        assert_eq!(stream.position(), 1.0);
        assert!(!stream.is_paused());

        local.set_looping(false);
        assert_eq!(local.on_ended(&binding, &mut stream), LoopAction::Stopped);
    }

    #[test]
    fn test_unknown_end_is_ignored() {
        let wall = ManualClock::new();
        let mut stream = SimulatedStream::new(Arc::new(wall), None);
        stream.set_position(100.0);
        let binding = SlotBinding::new(TrimWindow::FULL);
        let mut local = LocalLoop::default();
        assert_eq!(local.on_time_update(&binding, &mut stream), LoopAction::None);
    }
}
