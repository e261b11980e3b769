//! Error types for SyncView

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum SvError {
    #[error("Invalid slot index: {0}")]
    InvalidSlot(usize),

    #[error("Slot {0} has no content")]
    EmptySlot(usize),

    #[error("Invalid playback rate: {0}")]
    InvalidRate(f64),

    #[error("Synchronized playback is not enabled")]
    SyncDisabled,

    #[error("Scheduler has stopped")]
    SchedulerStopped,

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SvError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias
pub type SvResult<T> = Result<T, SvError>;
