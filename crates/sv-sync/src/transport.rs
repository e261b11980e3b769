//! Synchronized Transport
//!
//! Public operation surface for synchronized playback: play/pause, seek, rate,
//! loop toggle and per-slot offset. Operations mutate the [`VirtualClock`] and
//! fan out to every live stream on the [`SlotBoard`]. The recurring tick lives
//! here too; the scheduler only decides when to call it.

use std::sync::Arc;

use sv_core::{SvError, SvResult, SyncPreferences, is_valid_rate};

use crate::board::{PlayReport, SlotBoard};
use crate::clock::{ClockStep, VirtualClock, WallClock};
use crate::drift::{CorrectionReport, DriftCorrector, DriftStats};
use crate::observer::{SnapshotPublisher, TransportSnapshot};

/// What one tick did
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub step: ClockStep,
    pub correction: Option<CorrectionReport>,
    /// A throttled snapshot went out on this tick
    pub published: bool,
}

/// Virtual-clock driven transport for all bound slots
pub struct SyncTransport {
    clock: VirtualClock,
    looping: bool,
    corrector: DriftCorrector,
    publisher: SnapshotPublisher,
    wall: Arc<dyn WallClock>,
}

impl SyncTransport {
    pub fn new(
        wall: Arc<dyn WallClock>,
        prefs: &SyncPreferences,
        publisher: SnapshotPublisher,
    ) -> Self {
        Self {
            clock: VirtualClock::new(prefs.default_rate),
            looping: prefs.loop_enabled,
            corrector: DriftCorrector::with_threshold(prefs.correction_threshold_secs),
            publisher,
            wall,
        }
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    #[inline]
    pub fn rate(&self) -> f64 {
        self.clock.rate()
    }

    #[inline]
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    /// Correction totals over ticks only
    pub fn drift_stats(&self) -> DriftStats {
        self.corrector.stats()
    }

    /// Current timeline position
    pub fn position(&self, board: &SlotBoard) -> f64 {
        self.clock
            .sample(self.wall.now(), board.loop_duration(), self.looping)
    }

    pub fn snapshot(&self, board: &SlotBoard) -> TransportSnapshot {
        let loop_duration = board.loop_duration();
        let position = self
            .clock
            .sample(self.wall.now(), loop_duration, self.looping);
        self.snapshot_at(position, loop_duration)
    }

    fn snapshot_at(&self, position: f64, loop_duration: f64) -> TransportSnapshot {
        TransportSnapshot {
            is_playing: self.clock.is_playing(),
            current_position: position,
            duration: loop_duration,
            rate: self.clock.rate(),
            looping: self.looping,
            synchronized: true,
        }
    }

    fn publish_state(&self, board: &SlotBoard) {
        self.publisher.publish_now(self.snapshot(board));
    }

    // ============ Transport Operations ============

    /// Play when paused, pause when playing. Returns the play fan-out report
    /// when playback was started.
    pub fn toggle_play_pause(&mut self, board: &mut SlotBoard) -> Option<PlayReport> {
        if self.clock.is_playing() {
            self.pause(board);
            None
        } else {
            Some(self.play(board))
        }
    }

    /// Start the clock, then command every live stream to play. A rejected
    /// stream stays paused while its peers play; the clock keeps running.
    pub fn play(&mut self, board: &mut SlotBoard) -> PlayReport {
        if self.clock.is_playing() {
            return PlayReport::default();
        }

        let now = self.wall.now();
        let loop_duration = board.loop_duration();

        // Replaying after a natural end starts over
        if !self.looping && loop_duration > 0.0 && self.clock.anchor_position() >= loop_duration {
            self.clock.seek_to(0.0, now);
        }

        self.clock.start(now);
        board.set_rate_all(self.clock.rate());
        let position = self.clock.sample(now, loop_duration, self.looping);
        self.corrector.reconcile(board, position);

        let report = board.play_all();
        log::info!(
            "Sync play at {:.3}s ({} started, {} rejected)",
            position,
            report.started.len(),
            report.rejected.len()
        );

        self.publisher
            .publish_now(self.snapshot_at(position, loop_duration));
        report
    }

    /// Stop the clock, then pause every live stream
    pub fn pause(&mut self, board: &mut SlotBoard) {
        let now = self.wall.now();
        let loop_duration = board.loop_duration();
        self.clock.stop(now, loop_duration, self.looping);
        board.pause_all();

        let position = self.clock.anchor_position();
        self.corrector.reconcile(board, position);
        log::info!("Sync pause at {:.3}s", position);

        self.publisher
            .publish_now(self.snapshot_at(position, loop_duration));
    }

    /// Seek the shared timeline. Targets outside `[0, loop_duration]` are
    /// clamped silently; while looping, the end of the window is the same
    /// instant as its start. Streams are corrected immediately rather than on
    /// the next tick. Returns the position actually used.
    pub fn seek(&mut self, board: &mut SlotBoard, target: f64) -> f64 {
        let now = self.wall.now();
        let loop_duration = board.loop_duration();
        let mut position = if target.is_nan() {
            0.0
        } else {
            target.clamp(0.0, loop_duration)
        };
        if self.looping && loop_duration > 0.0 && position >= loop_duration {
            position = 0.0;
        }

        self.clock.seek_to(position, now);
        let correction = self.corrector.reconcile(board, position);
        log::debug!(
            "Sync seek {:.3}s -> {:.3}s ({} corrected)",
            target,
            position,
            correction.corrected
        );

        self.publisher
            .publish_now(self.snapshot_at(position, loop_duration));
        position
    }

    /// Change the playback multiplier for the clock and every stream.
    /// Any finite positive rate is accepted.
    pub fn set_rate(&mut self, board: &mut SlotBoard, rate: f64) -> SvResult<()> {
        if !is_valid_rate(rate) {
            log::warn!("Rejecting playback rate {}", rate);
            return Err(SvError::InvalidRate(rate));
        }

        let now = self.wall.now();
        let loop_duration = board.loop_duration();
        self.clock.set_rate(rate, now, loop_duration, self.looping);
        board.set_rate_all(rate);
        log::info!("Sync rate {}x", rate);

        self.publish_state(board);
        Ok(())
    }

    /// Flip looping; takes effect at the next wraparound evaluation.
    /// Returns the new state.
    pub fn toggle_loop(&mut self, board: &SlotBoard) -> bool {
        self.looping = !self.looping;
        log::info!("Sync loop {}", if self.looping { "on" } else { "off" });
        self.publish_state(board);
        self.looping
    }

    /// Shift one slot against the shared timeline. The stored offset changes
    /// and the live stream moves by the same delta right away.
    /// Returns the slot's new offset.
    pub fn adjust_offset(&mut self, board: &mut SlotBoard, slot: usize, delta: f64) -> SvResult<f64> {
        let offset = board.adjust_offset(slot, delta)?;
        if delta.is_finite() {
            if let Some(handle) = board.handle_mut(slot) {
                let position = handle.position();
                handle.set_position(position + delta);
            }
        }
        log::debug!("Slot {} offset {:+.3}s -> {:.3}s", slot, delta, offset);
        Ok(offset)
    }

    /// Bring one (newly bound) stream in line with the running session
    pub fn adopt(&mut self, board: &mut SlotBoard, slot: usize) {
        let rate = self.clock.rate();
        let playing = self.clock.is_playing();
        let position = self.position(board);
        let Some(binding) = board.binding(slot).copied() else {
            return;
        };
        let Some(handle) = board.handle_mut(slot) else {
            return;
        };

        handle.set_rate(rate);
        handle.set_position(binding.target_position(position));
        if playing {
            if let Err(err) = handle.play() {
                log::warn!("Slot {} play rejected on attach: {}", slot, err);
            }
        } else {
            handle.pause();
        }
    }

    /// Align every stream to the current position without touching the clock
    pub fn align(&mut self, board: &mut SlotBoard) -> CorrectionReport {
        let position = self.position(board);
        self.corrector.reconcile(board, position)
    }

    /// Tear down: stop the clock and pause every stream
    pub fn shutdown(&mut self, board: &mut SlotBoard) {
        let now = self.wall.now();
        self.clock.stop(now, board.loop_duration(), self.looping);
        board.pause_all();
    }

    // ============ Tick ============

    /// One scheduled frame: sample the clock once, correct every stream against
    /// that single sample, handle wrap / natural end, and publish at the
    /// throttled cadence.
    pub fn tick(&mut self, board: &mut SlotBoard) -> TickReport {
        let now = self.wall.now();
        let loop_duration = board.loop_duration();
        let step = self.clock.resolve(now, loop_duration, self.looping);

        match step {
            ClockStep::Idle(_) | ClockStep::Stalled(_) => TickReport {
                step,
                correction: None,
                published: false,
            },
            ClockStep::Running(position) | ClockStep::Wrapped(position) => {
                if let ClockStep::Wrapped(_) = step {
                    log::debug!("Sync loop wrapped to {:.3}s", position);
                }
                let correction = self.corrector.apply(board, position);
                let published = self
                    .publisher
                    .publish_throttled(now, self.snapshot_at(position, loop_duration));
                TickReport {
                    step,
                    correction: Some(correction),
                    published,
                }
            }
            ClockStep::Ended(position) => {
                let correction = self.corrector.apply(board, position);
                board.pause_all();
                log::info!("Sync reached end at {:.3}s", position);
                self.publisher
                    .publish_now(self.snapshot_at(position, loop_duration));
                TickReport {
                    step,
                    correction: Some(correction),
                    published: true,
                }
            }
        }
    }
}
