//! Tick Scheduler
//!
//! Runs a [`PlaybackSession`] on a dedicated thread. Commands and ticks arrive
//! on the same select loop, so a transport operation never interleaves with a
//! partially applied tick. The recurring tick is a single cancellable
//! [`TickTask`] that only exists while synchronized playback is running.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded, never, select, tick, unbounded};
use sv_core::{ClipAsset, StreamEvent, StreamHandle, SvError, SvResult};

use crate::board::PlayReport;
use crate::observer::{SnapshotPublisher, TransportSnapshot};
use crate::session::PlaybackSession;

// ============ Commands ============

/// Messages handled by the scheduler thread
pub enum SyncCommand {
    TogglePlayPause(Sender<SvResult<Option<PlayReport>>>),
    Seek(f64, Sender<SvResult<f64>>),
    SetRate(f64, Sender<SvResult<()>>),
    ToggleLoop(Sender<bool>),
    AdjustOffset {
        slot: usize,
        delta: f64,
        reply: Sender<SvResult<f64>>,
    },
    Step {
        slot: usize,
        delta: f64,
        reply: Sender<SvResult<f64>>,
    },
    ToggleSync(Sender<bool>),
    Assign {
        index: usize,
        asset: ClipAsset,
        handle: Option<Box<dyn StreamHandle>>,
        reply: Sender<SvResult<()>>,
    },
    Clear(usize, Sender<SvResult<Option<ClipAsset>>>),
    Detach(usize, Sender<SvResult<Option<Box<dyn StreamHandle>>>>),
    StreamEvent(usize, StreamEvent),
    SetActiveTile(Option<usize>),
    SetMuted(bool),
    Snapshot(Sender<TransportSnapshot>),
    Shutdown,
}

// ============ Tick Task ============

/// Tick task counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub scheduled: u64,
    pub cancelled: u64,
}

/// The single recurring tick. At most one ticker exists at a time.
pub struct TickTask {
    interval: Duration,
    ticker: Option<Receiver<Instant>>,
    stats: SchedulerStats,
}

impl TickTask {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ticker: None,
            stats: SchedulerStats::default(),
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Start ticking. Returns `false` if already scheduled.
    pub fn schedule(&mut self) -> bool {
        if self.ticker.is_some() {
            return false;
        }
        self.ticker = Some(tick(self.interval));
        self.stats.scheduled += 1;
        log::debug!("Tick task scheduled every {:?}", self.interval);
        true
    }

    /// Stop ticking. Returns `false` if nothing was scheduled.
    pub fn cancel(&mut self) -> bool {
        if self.ticker.take().is_none() {
            return false;
        }
        self.stats.cancelled += 1;
        log::debug!("Tick task cancelled");
        true
    }

    /// Schedule or cancel so the task matches `should_run`
    pub fn reconcile(&mut self, should_run: bool) {
        if should_run {
            self.schedule();
        } else {
            self.cancel();
        }
    }

    /// Channel to select on; never fires while cancelled
    fn receiver(&self) -> Receiver<Instant> {
        self.ticker.clone().unwrap_or_else(never)
    }
}

// ============ Scheduler ============

/// Owns the scheduler thread
pub struct TickScheduler {
    handle: SyncHandle,
    thread: Option<JoinHandle<(PlaybackSession, SchedulerStats)>>,
}

impl TickScheduler {
    /// Move the session onto a new scheduler thread
    pub fn spawn(session: PlaybackSession, interval: Duration) -> Self {
        let (commands_tx, commands_rx) = unbounded::<SyncCommand>();
        let publisher = session.publisher().clone();

        let thread = thread::Builder::new()
            .name("sv-tick".into())
            .spawn(move || run(session, commands_rx, TickTask::new(interval)))
            .expect("Failed to spawn tick scheduler thread");

        log::info!("Tick scheduler started ({:?} interval)", interval);
        Self {
            handle: SyncHandle {
                commands: commands_tx,
                publisher,
            },
            thread: Some(thread),
        }
    }

    /// Cloneable command handle
    pub fn handle(&self) -> SyncHandle {
        self.handle.clone()
    }

    /// Stop the thread and take the session back
    pub fn shutdown(mut self) -> Option<(PlaybackSession, SchedulerStats)> {
        self.stop()
    }

    fn stop(&mut self) -> Option<(PlaybackSession, SchedulerStats)> {
        let thread = self.thread.take()?;
        let _ = self.handle.commands.send(SyncCommand::Shutdown);
        match thread.join() {
            Ok(result) => Some(result),
            Err(_) => {
                log::warn!("Tick scheduler thread panicked");
                None
            }
        }
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    mut session: PlaybackSession,
    commands: Receiver<SyncCommand>,
    mut task: TickTask,
) -> (PlaybackSession, SchedulerStats) {
    loop {
        let ticker = task.receiver();
        select! {
            recv(commands) -> msg => match msg {
                Ok(SyncCommand::Shutdown) | Err(_) => break,
                Ok(command) => dispatch(&mut session, command),
            },
            recv(ticker) -> _ => {
                // Sync may have been turned off since this tick was queued
                if session.is_synchronized() {
                    task.stats.ticks += 1;
                    session.tick();
                }
            },
        }
        task.reconcile(session.is_ticking());
    }

    task.cancel();
    session.shutdown();
    log::info!(
        "Tick scheduler exiting after {} tick(s)",
        task.stats().ticks
    );
    (session, task.stats())
}

fn dispatch(session: &mut PlaybackSession, command: SyncCommand) {
    // Replies are best effort: the requester may have given up
    match command {
        SyncCommand::TogglePlayPause(reply) => {
            let _ = reply.send(session.toggle_play_pause());
        }
        SyncCommand::Seek(position, reply) => {
            let _ = reply.send(session.seek(position));
        }
        SyncCommand::SetRate(rate, reply) => {
            let _ = reply.send(session.set_rate(rate));
        }
        SyncCommand::ToggleLoop(reply) => {
            let _ = reply.send(session.toggle_loop());
        }
        SyncCommand::AdjustOffset { slot, delta, reply } => {
            let _ = reply.send(session.adjust_offset(slot, delta));
        }
        SyncCommand::Step { slot, delta, reply } => {
            let _ = reply.send(session.step(slot, delta));
        }
        SyncCommand::ToggleSync(reply) => {
            let _ = reply.send(session.toggle_sync());
        }
        SyncCommand::Assign {
            index,
            asset,
            handle,
            reply,
        } => {
            let _ = reply.send(session.assign(index, asset, handle));
        }
        SyncCommand::Clear(index, reply) => {
            let _ = reply.send(session.clear(index));
        }
        SyncCommand::Detach(index, reply) => {
            let _ = reply.send(session.detach(index));
        }
        SyncCommand::StreamEvent(index, event) => {
            session.handle_stream_event(index, event);
        }
        SyncCommand::SetActiveTile(tile) => session.set_active_tile(tile),
        SyncCommand::SetMuted(muted) => session.set_muted(muted),
        SyncCommand::Snapshot(reply) => {
            let _ = reply.send(session.snapshot());
        }
        SyncCommand::Shutdown => {}
    }
}

// ============ Handle ============

/// Cloneable front end to a running scheduler
#[derive(Clone)]
pub struct SyncHandle {
    commands: Sender<SyncCommand>,
    publisher: SnapshotPublisher,
}

impl SyncHandle {
    fn send(&self, command: SyncCommand) -> SvResult<()> {
        self.commands
            .send(command)
            .map_err(|_| SvError::SchedulerStopped)
    }

    fn request<T>(&self, build: impl FnOnce(Sender<T>) -> SyncCommand) -> SvResult<T> {
        let (reply_tx, reply_rx) = bounded(1);
        self.send(build(reply_tx))?;
        reply_rx.recv().map_err(|_| SvError::SchedulerStopped)
    }

    pub fn toggle_play_pause(&self) -> SvResult<Option<PlayReport>> {
        self.request(SyncCommand::TogglePlayPause)?
    }

    pub fn seek(&self, position: f64) -> SvResult<f64> {
        self.request(|reply| SyncCommand::Seek(position, reply))?
    }

    pub fn set_rate(&self, rate: f64) -> SvResult<()> {
        self.request(|reply| SyncCommand::SetRate(rate, reply))?
    }

    pub fn toggle_loop(&self) -> SvResult<bool> {
        self.request(SyncCommand::ToggleLoop)
    }

    pub fn adjust_offset(&self, slot: usize, delta: f64) -> SvResult<f64> {
        self.request(|reply| SyncCommand::AdjustOffset { slot, delta, reply })?
    }

    pub fn step(&self, slot: usize, delta: f64) -> SvResult<f64> {
        self.request(|reply| SyncCommand::Step { slot, delta, reply })?
    }

    /// Returns `true` when synchronization is now on
    pub fn toggle_sync(&self) -> SvResult<bool> {
        self.request(SyncCommand::ToggleSync)
    }

    pub fn assign(
        &self,
        index: usize,
        asset: ClipAsset,
        handle: Option<Box<dyn StreamHandle>>,
    ) -> SvResult<()> {
        self.request(|reply| SyncCommand::Assign {
            index,
            asset,
            handle,
            reply,
        })?
    }

    pub fn clear(&self, index: usize) -> SvResult<Option<ClipAsset>> {
        self.request(|reply| SyncCommand::Clear(index, reply))?
    }

    pub fn detach(&self, index: usize) -> SvResult<Option<Box<dyn StreamHandle>>> {
        self.request(|reply| SyncCommand::Detach(index, reply))?
    }

    /// Forward a native stream notification
    pub fn stream_event(&self, index: usize, event: StreamEvent) -> SvResult<()> {
        self.send(SyncCommand::StreamEvent(index, event))
    }

    pub fn set_active_tile(&self, tile: Option<usize>) -> SvResult<()> {
        self.send(SyncCommand::SetActiveTile(tile))
    }

    pub fn set_muted(&self, muted: bool) -> SvResult<()> {
        self.send(SyncCommand::SetMuted(muted))
    }

    /// Freshly sampled state (not throttled)
    pub fn snapshot(&self) -> SvResult<TransportSnapshot> {
        self.request(SyncCommand::Snapshot)
    }

    pub fn subscribe(&self) -> Receiver<TransportSnapshot> {
        self.publisher.subscribe()
    }

    /// Last published snapshot
    pub fn latest(&self) -> TransportSnapshot {
        self.publisher.latest()
    }
}
