//! Stream handle contract
//!
//! A stream handle is the controllable media playback object bound to one slot.
//! It is supplied by the host (a media element, a decoder, a simulator) and is
//! driven by the synchronization core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a single stream command
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    /// Platform refused to start playback (autoplay policy, decode error)
    #[error("Play rejected: {0}")]
    PlayRejected(String),

    /// The handle no longer refers to a live media object
    #[error("Stream detached")]
    Detached,
}

/// Native notifications a stream raises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamEvent {
    Play,
    Pause,
    /// Native position advanced
    TimeUpdate,
    /// Duration became known or changed
    DurationChange,
    RateChange,
    /// Native end of media reached
    Ended,
}

/// Controllable media playback object
pub trait StreamHandle: Send {
    /// Current native position in seconds
    fn position(&self) -> f64;

    /// Reposition the stream
    fn set_position(&mut self, secs: f64);

    /// Native duration, `None` until metadata is available
    fn duration(&self) -> Option<f64>;

    /// Native playback rate
    fn rate(&self) -> f64;

    fn set_rate(&mut self, rate: f64);

    fn is_paused(&self) -> bool;

    /// Begin native playback. Independently fallible per stream.
    fn play(&mut self) -> Result<(), StreamError>;

    fn pause(&mut self);

    fn set_muted(&mut self, _muted: bool) {}

    /// `false` once the underlying media object is gone
    fn is_attached(&self) -> bool {
        true
    }
}
