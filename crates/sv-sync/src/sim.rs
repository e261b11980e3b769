//! Simulated Stream
//!
//! A [`StreamHandle`] whose native clock advances with a [`WallClock`] at
//! `rate * (1 + drift)`. Used by the CLI and tests in place of a real media
//! element. Clones share state, so a test can keep watching a stream that
//! the board owns.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use sv_core::{StreamError, StreamHandle, elapsed_secs};

use crate::clock::WallClock;

struct SimState {
    anchor_wall: Instant,
    anchor_position: f64,
    playing: bool,
    rate: f64,
    /// Fractional native clock error (0.01 = runs 1% fast)
    drift: f64,
    duration: Option<f64>,
    reject_play: bool,
    attached: bool,
    muted: bool,
    seeks: u64,
    play_attempts: u64,
}

impl SimState {
    fn position_at(&self, now: Instant) -> f64 {
        let mut pos = self.anchor_position;
        if self.playing {
            pos += elapsed_secs(self.anchor_wall, now) * self.rate * (1.0 + self.drift);
        }
        match self.duration {
            Some(d) => pos.min(d),
            None => pos,
        }
    }

    fn reanchor(&mut self, now: Instant) {
        self.anchor_position = self.position_at(now);
        self.anchor_wall = now;
    }
}

/// Simulated media stream
#[derive(Clone)]
pub struct SimulatedStream {
    wall: Arc<dyn WallClock>,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedStream {
    pub fn new(wall: Arc<dyn WallClock>, duration: Option<f64>) -> Self {
        let now = wall.now();
        Self {
            wall,
            state: Arc::new(Mutex::new(SimState {
                anchor_wall: now,
                anchor_position: 0.0,
                playing: false,
                rate: 1.0,
                drift: 0.0,
                duration,
                reject_play: false,
                attached: true,
                muted: false,
                seeks: 0,
                play_attempts: 0,
            })),
        }
    }

    /// Builder: native clock error
    pub fn with_drift(self, drift: f64) -> Self {
        self.set_drift(drift);
        self
    }

    pub fn set_drift(&self, drift: f64) {
        let now = self.wall.now();
        let mut state = self.state.lock();
        state.reanchor(now);
        state.drift = drift;
    }

    pub fn set_duration(&self, duration: Option<f64>) {
        self.state.lock().duration = duration;
    }

    pub fn set_reject_play(&self, reject: bool) {
        self.state.lock().reject_play = reject;
    }

    pub fn set_attached(&self, attached: bool) {
        self.state.lock().attached = attached;
    }

    pub fn is_muted(&self) -> bool {
        self.state.lock().muted
    }

    /// Number of repositions issued to this stream
    pub fn seek_count(&self) -> u64 {
        self.state.lock().seeks
    }

    pub fn play_attempts(&self) -> u64 {
        self.state.lock().play_attempts
    }

    /// Native end of media reached
    pub fn at_end(&self) -> bool {
        let now = self.wall.now();
        let state = self.state.lock();
        state
            .duration
            .is_some_and(|d| state.position_at(now) >= d)
    }
}

impl StreamHandle for SimulatedStream {
    fn position(&self) -> f64 {
        let now = self.wall.now();
        self.state.lock().position_at(now)
    }

    fn set_position(&mut self, secs: f64) {
        let now = self.wall.now();
        let mut state = self.state.lock();
        let mut target = secs.max(0.0);
        if let Some(d) = state.duration {
            target = target.min(d);
        }
        state.anchor_position = target;
        state.anchor_wall = now;
        state.seeks += 1;
    }

    fn duration(&self) -> Option<f64> {
        self.state.lock().duration
    }

    fn rate(&self) -> f64 {
        self.state.lock().rate
    }

    fn set_rate(&mut self, rate: f64) {
        let now = self.wall.now();
        let mut state = self.state.lock();
        state.reanchor(now);
        state.rate = rate;
    }

    fn is_paused(&self) -> bool {
        !self.state.lock().playing
    }

    fn play(&mut self) -> Result<(), StreamError> {
        let now = self.wall.now();
        let mut state = self.state.lock();
        state.play_attempts += 1;
        if !state.attached {
            return Err(StreamError::Detached);
        }
        if state.reject_play {
            return Err(StreamError::PlayRejected("autoplay blocked".into()));
        }
        if !state.playing {
            state.anchor_wall = now;
            state.playing = true;
        }
        Ok(())
    }

    fn pause(&mut self) {
        let now = self.wall.now();
        let mut state = self.state.lock();
        if state.playing {
            state.reanchor(now);
            state.playing = false;
        }
    }

    fn set_muted(&mut self, muted: bool) {
        self.state.lock().muted = muted;
    }

    fn is_attached(&self) -> bool {
        self.state.lock().attached
    }
}
