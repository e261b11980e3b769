//! SyncView Synchronized Playback
//!
//! Keeps up to four independently decoded streams playing in lock-step:
//! - Virtual clock as the single authoritative timeline
//! - Threshold-based drift correction against per-slot trim windows and offsets
//! - Loop / transport control (play, pause, seek, rate, loop, offset)
//! - Local per-stream looping while synchronization is off
//! - Throttled snapshot publishing for UI layers
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                    SYNCHRONIZED PLAYBACK                          │
//! ├───────────────────────────────────────────────────────────────────┤
//! │                                                                   │
//! │   UI Thread                          sv-tick Thread               │
//! │   ┌─────────────────┐               ┌──────────────────────────┐  │
//! │   │ SyncHandle      │               │ PlaybackSession          │  │
//! │   │ .toggle_play()  │───Command────▶│  ├── SlotBoard (4 slots) │  │
//! │   │ .seek()         │   Queue       │  └── SyncTransport       │  │
//! │   │ .set_rate()     │               │       ├── VirtualClock   │  │
//! │   │ .adjust_offset()│               │       └── DriftCorrector │  │
//! │   └─────────────────┘               └────────────┬─────────────┘  │
//! │           ▲                                      │ tick (16ms)    │
//! │           │        TransportSnapshot (≤ 4/s)     │                │
//! │           └────────── SnapshotPublisher ◀────────┘                │
//! │                                                                   │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use sv_core::{ClipAsset, SyncPreferences};
//! use sv_sync::{PlaybackSession, SimulatedStream, SystemClock, TickScheduler};
//!
//! let wall = Arc::new(SystemClock);
//! let mut session = PlaybackSession::new(SyncPreferences::default(), wall.clone());
//! let cam = SimulatedStream::new(wall, Some(12.0));
//! session.assign(0, ClipAsset::new("cam-a", "cam-a.mp4", 12.0), Some(Box::new(cam)))?;
//! session.toggle_sync();
//!
//! let scheduler = TickScheduler::spawn(session, Duration::from_millis(16));
//! let handle = scheduler.handle();
//! handle.toggle_play_pause()?;
//! ```

pub mod board;
pub mod clock;
pub mod drift;
pub mod local_loop;
pub mod observer;
pub mod scheduler;
pub mod session;
pub mod sim;
pub mod transport;

pub use board::{PlayReport, Slot, SlotBoard};
pub use clock::{ClockStep, ManualClock, SystemClock, VirtualClock, WallClock};
pub use drift::{CORRECTION_THRESHOLD, CorrectionReport, DriftCorrector, DriftStats};
pub use local_loop::{LocalLoop, LoopAction};
pub use observer::{SnapshotPublisher, TransportSnapshot};
pub use scheduler::{SchedulerStats, SyncCommand, SyncHandle, TickScheduler, TickTask};
pub use session::{PlaybackSession, SyncMode};
pub use sim::SimulatedStream;
pub use transport::{SyncTransport, TickReport};
