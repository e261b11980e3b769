//! Transport Snapshot Observer
//!
//! Single state-change notification surface for UI layers. Native media events
//! never reach subscribers directly; they only see [`TransportSnapshot`]s.
//! Tick-driven publishes are throttled, discrete transport changes are
//! published immediately.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sv_core::DEFAULT_PUBLISH_INTERVAL_MS;

// ============ Snapshot ============

/// Read-only aggregate transport state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransportSnapshot {
    pub is_playing: bool,
    /// Timeline position (seconds)
    pub current_position: f64,
    /// Loop duration (seconds)
    pub duration: f64,
    pub rate: f64,
    pub looping: bool,
    /// Synchronized mode active
    pub synchronized: bool,
}

impl Default for TransportSnapshot {
    fn default() -> Self {
        Self {
            is_playing: false,
            current_position: 0.0,
            duration: 0.0,
            rate: 1.0,
            looping: true,
            synchronized: false,
        }
    }
}

// ============ Publisher ============

struct PublisherInner {
    latest: TransportSnapshot,
    subscribers: Vec<Sender<TransportSnapshot>>,
    last_throttled: Option<Instant>,
    published: u64,
}

/// Cloneable snapshot publisher
#[derive(Clone)]
pub struct SnapshotPublisher {
    inner: Arc<RwLock<PublisherInner>>,
    min_interval: Duration,
}

impl SnapshotPublisher {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(PublisherInner {
                latest: TransportSnapshot::default(),
                subscribers: Vec::new(),
                last_throttled: None,
                published: 0,
            })),
            min_interval,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Receive every published snapshot from now on
    pub fn subscribe(&self) -> Receiver<TransportSnapshot> {
        let (tx, rx) = unbounded();
        let mut inner = self.inner.write();
        // Seed with current state so late subscribers are not blank
        let _ = tx.send(inner.latest);
        inner.subscribers.push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.read().subscribers.len()
    }

    /// Most recently published snapshot
    pub fn latest(&self) -> TransportSnapshot {
        self.inner.read().latest
    }

    /// Number of publishes so far
    pub fn published(&self) -> u64 {
        self.inner.read().published
    }

    /// Publish unconditionally
    pub fn publish_now(&self, snapshot: TransportSnapshot) {
        let mut inner = self.inner.write();
        Self::broadcast(&mut inner, snapshot);
    }

    /// Publish unless a throttled publish happened less than `min_interval` ago.
    /// Returns whether the snapshot went out.
    pub fn publish_throttled(&self, now: Instant, snapshot: TransportSnapshot) -> bool {
        let mut inner = self.inner.write();
        let due = match inner.last_throttled {
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
            None => true,
        };
        if !due {
            return false;
        }
        inner.last_throttled = Some(now);
        Self::broadcast(&mut inner, snapshot);
        true
    }

    fn broadcast(inner: &mut PublisherInner, snapshot: TransportSnapshot) {
        inner.latest = snapshot;
        inner.published += 1;
        let before = inner.subscribers.len();
        inner.subscribers.retain(|tx| tx.send(snapshot).is_ok());
        let dropped = before - inner.subscribers.len();
        if dropped > 0 {
            log::debug!("Pruned {} disconnected snapshot subscriber(s)", dropped);
        }
    }
}

impl Default for SnapshotPublisher {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_PUBLISH_INTERVAL_MS))
    }
}
