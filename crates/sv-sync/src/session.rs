//! Playback Session
//!
//! Owns the slot board and the playback mode. In independent mode every tile
//! plays and loops on its own; in synchronized mode a [`SyncTransport`] drives
//! all tiles from one virtual clock. The virtual clock only exists while the
//! session is synchronized.

use std::sync::Arc;

use sv_core::{
    ClipAsset, MAX_SLOTS, SlotBinding, StreamEvent, StreamHandle, SvError, SvResult,
    SyncPreferences, is_valid_rate,
};

use crate::board::{PlayReport, SlotBoard};
use crate::clock::WallClock;
use crate::local_loop::{LocalLoop, LoopAction};
use crate::observer::{SnapshotPublisher, TransportSnapshot};
use crate::transport::{SyncTransport, TickReport};

/// Current playback mode
pub enum SyncMode {
    /// Each stream drives its own local time
    Independent(LocalLoop),
    /// All streams follow the virtual clock
    Synchronized(SyncTransport),
}

/// Multi-tile playback session
pub struct PlaybackSession {
    board: SlotBoard,
    prefs: SyncPreferences,
    publisher: SnapshotPublisher,
    wall: Arc<dyn WallClock>,
    mode: SyncMode,
}

impl PlaybackSession {
    /// New session in independent mode
    pub fn new(prefs: SyncPreferences, wall: Arc<dyn WallClock>) -> Self {
        let prefs = prefs.validated();
        let mut board = SlotBoard::new();
        board.set_muted(prefs.muted);
        Self {
            board,
            publisher: SnapshotPublisher::new(prefs.publish_interval()),
            mode: SyncMode::Independent(LocalLoop::new(prefs.loop_enabled)),
            prefs,
            wall,
        }
    }

    pub fn board(&self) -> &SlotBoard {
        &self.board
    }

    pub fn preferences(&self) -> &SyncPreferences {
        &self.prefs
    }

    pub fn publisher(&self) -> &SnapshotPublisher {
        &self.publisher
    }

    pub fn wall(&self) -> Arc<dyn WallClock> {
        self.wall.clone()
    }

    pub fn mode(&self) -> &SyncMode {
        &self.mode
    }

    pub fn transport(&self) -> Option<&SyncTransport> {
        match &self.mode {
            SyncMode::Synchronized(transport) => Some(transport),
            SyncMode::Independent(_) => None,
        }
    }

    #[inline]
    pub fn is_synchronized(&self) -> bool {
        matches!(self.mode, SyncMode::Synchronized(_))
    }

    pub fn is_looping(&self) -> bool {
        match &self.mode {
            SyncMode::Synchronized(transport) => transport.is_looping(),
            SyncMode::Independent(local) => local.is_looping(),
        }
    }

    /// Synchronized: the virtual clock state. Independent: any tile playing.
    pub fn is_playing(&self) -> bool {
        match &self.mode {
            SyncMode::Synchronized(transport) => transport.is_playing(),
            SyncMode::Independent(_) => (0..MAX_SLOTS).any(|index| {
                self.board
                    .slot(index)
                    .and_then(|slot| slot.live_handle())
                    .is_some_and(|handle| !handle.is_paused())
            }),
        }
    }

    /// The recurring tick should be scheduled
    pub fn is_ticking(&self) -> bool {
        match &self.mode {
            SyncMode::Synchronized(transport) => transport.is_playing(),
            SyncMode::Independent(_) => false,
        }
    }

    // ============ Mode ============

    /// Switch between independent and synchronized playback.
    /// Returns `true` when the session is now synchronized.
    pub fn toggle_sync(&mut self) -> bool {
        let looping = self.is_looping();
        if let SyncMode::Synchronized(transport) = &mut self.mode {
            transport.shutdown(&mut self.board);
            log::info!("Synchronized playback off");
            self.mode = SyncMode::Independent(LocalLoop::new(looping));
            self.publisher.publish_now(self.snapshot());
            return false;
        }

        self.board.pause_all();
        let mut prefs = self.prefs.clone();
        prefs.loop_enabled = looping;
        let mut transport = SyncTransport::new(self.wall.clone(), &prefs, self.publisher.clone());
        self.board.set_rate_all(transport.rate());
        transport.seek(&mut self.board, 0.0);
        log::info!(
            "Synchronized playback on ({} live stream(s))",
            self.board.active_indices().len()
        );
        self.mode = SyncMode::Synchronized(transport);
        true
    }

    // ============ Slot content ============

    /// Assign content (and optionally a stream) to a slot
    pub fn assign(
        &mut self,
        index: usize,
        asset: ClipAsset,
        handle: Option<Box<dyn StreamHandle>>,
    ) -> SvResult<()> {
        self.board.assign(index, asset, handle)?;
        self.adopt(index);
        Ok(())
    }

    pub fn clear(&mut self, index: usize) -> SvResult<Option<ClipAsset>> {
        let cleared = self.board.clear(index)?;
        self.publish_if_synchronized();
        Ok(cleared)
    }

    /// Clear every slot showing a deleted library clip
    pub fn remove_asset(&mut self, asset_id: &str) -> usize {
        let removed = self.board.remove_asset(asset_id);
        if removed > 0 {
            self.publish_if_synchronized();
        }
        removed
    }

    /// Take a slot's stream away; the binding stays
    pub fn detach(&mut self, index: usize) -> SvResult<Option<Box<dyn StreamHandle>>> {
        let handle = self.board.detach(index)?;
        self.publish_if_synchronized();
        Ok(handle)
    }

    /// Bind a stream to a slot that already has content
    pub fn attach(&mut self, index: usize, handle: Box<dyn StreamHandle>) -> SvResult<()> {
        self.board.attach(index, handle)?;
        self.adopt(index);
        Ok(())
    }

    fn adopt(&mut self, index: usize) {
        if let SyncMode::Synchronized(transport) = &mut self.mode {
            transport.adopt(&mut self.board, index);
            self.publisher.publish_now(transport.snapshot(&self.board));
        }
    }

    fn publish_if_synchronized(&self) {
        if let SyncMode::Synchronized(transport) = &self.mode {
            self.publisher.publish_now(transport.snapshot(&self.board));
        }
    }

    // ============ Synchronized transport ============

    fn synced(&mut self) -> SvResult<(&mut SyncTransport, &mut SlotBoard)> {
        match &mut self.mode {
            SyncMode::Synchronized(transport) => Ok((transport, &mut self.board)),
            SyncMode::Independent(_) => Err(SvError::SyncDisabled),
        }
    }

    pub fn toggle_play_pause(&mut self) -> SvResult<Option<PlayReport>> {
        let (transport, board) = self.synced()?;
        Ok(transport.toggle_play_pause(board))
    }

    pub fn seek(&mut self, position: f64) -> SvResult<f64> {
        let (transport, board) = self.synced()?;
        Ok(transport.seek(board, position))
    }

    pub fn set_rate(&mut self, rate: f64) -> SvResult<()> {
        let (transport, board) = self.synced()?;
        transport.set_rate(board, rate)
    }

    pub fn adjust_offset(&mut self, slot: usize, delta: f64) -> SvResult<f64> {
        let (transport, board) = self.synced()?;
        transport.adjust_offset(board, slot, delta)
    }

    /// Flip looping in either mode; returns the new state
    pub fn toggle_loop(&mut self) -> bool {
        let looping = match &mut self.mode {
            SyncMode::Synchronized(transport) => return transport.toggle_loop(&self.board),
            SyncMode::Independent(local) => {
                let looping = !local.is_looping();
                local.set_looping(looping);
                looping
            }
        };
        self.publisher.publish_now(self.snapshot());
        looping
    }

    /// One scheduled frame. `None` when not synchronized.
    pub fn tick(&mut self) -> Option<TickReport> {
        match &mut self.mode {
            SyncMode::Synchronized(transport) => Some(transport.tick(&mut self.board)),
            SyncMode::Independent(_) => None,
        }
    }

    // ============ Per-tile controls ============

    /// Tile play/pause button. In synchronized mode this is the shared
    /// transport toggle. Returns whether the tile (or session) now plays.
    pub fn play_pause_slot(&mut self, index: usize) -> SvResult<bool> {
        if let SyncMode::Synchronized(transport) = &mut self.mode {
            transport.toggle_play_pause(&mut self.board);
            return Ok(transport.is_playing());
        }

        let handle = self.live_handle(index)?;
        if handle.is_paused() {
            if let Err(err) = handle.play() {
                log::warn!("Slot {} play rejected: {}", index, err);
            }
        } else {
            handle.pause();
        }
        Ok(!handle.is_paused())
    }

    /// Tile scrubber. Independent: clamp into the trim window and reposition.
    /// Synchronized: seek the shared timeline to the matching position.
    /// Returns the slot-local position.
    pub fn seek_slot(&mut self, index: usize, local: f64) -> SvResult<f64> {
        let binding = self.bound(index)?;

        if let SyncMode::Synchronized(transport) = &mut self.mode {
            let timeline = transport.seek(
                &mut self.board,
                local - binding.trim_start() - binding.offset(),
            );
            return Ok(binding.target_position(timeline));
        }

        let handle = self.live_handle(index)?;
        let target = binding.window().clamp(local, handle.duration());
        handle.set_position(target);
        Ok(target)
    }

    /// Tile rate selector. Synchronized mode applies the rate to every tile.
    pub fn set_slot_rate(&mut self, index: usize, rate: f64) -> SvResult<()> {
        if let SyncMode::Synchronized(transport) = &mut self.mode {
            return transport.set_rate(&mut self.board, rate);
        }
        if !is_valid_rate(rate) {
            return Err(SvError::InvalidRate(rate));
        }
        self.live_handle(index)?.set_rate(rate);
        Ok(())
    }

    /// Step button. Independent: move the tile within its trim window and
    /// return the new local position. Synchronized: nudge the slot offset and
    /// return the new offset.
    pub fn step(&mut self, index: usize, delta: f64) -> SvResult<f64> {
        if let SyncMode::Synchronized(transport) = &mut self.mode {
            return transport.adjust_offset(&mut self.board, index, delta);
        }

        let binding = self.bound(index)?;
        let handle = self.live_handle(index)?;
        let target = binding
            .window()
            .clamp(handle.position() + delta, handle.duration());
        handle.set_position(target);
        Ok(target)
    }

    fn bound(&self, index: usize) -> SvResult<SlotBinding> {
        if index >= MAX_SLOTS {
            return Err(SvError::InvalidSlot(index));
        }
        self.board
            .binding(index)
            .copied()
            .ok_or(SvError::EmptySlot(index))
    }

    fn live_handle(&mut self, index: usize) -> SvResult<&mut Box<dyn StreamHandle>> {
        if index >= MAX_SLOTS {
            return Err(SvError::InvalidSlot(index));
        }
        self.board
            .handle_mut(index)
            .ok_or(SvError::EmptySlot(index))
    }

    // ============ Native notifications ============

    /// Route a native stream notification. Independent tiles self-loop;
    /// synchronized tiles never do.
    pub fn handle_stream_event(&mut self, index: usize, event: StreamEvent) -> LoopAction {
        match &mut self.mode {
            SyncMode::Independent(local) => {
                let Some(binding) = self.board.binding(index).copied() else {
                    return LoopAction::None;
                };
                let Some(handle) = self.board.handle_mut(index) else {
                    return LoopAction::None;
                };
                match event {
                    StreamEvent::TimeUpdate => local.on_time_update(&binding, &mut **handle),
                    StreamEvent::Ended => local.on_ended(&binding, &mut **handle),
                    _ => LoopAction::None,
                }
            }
            SyncMode::Synchronized(transport) => {
                if event == StreamEvent::DurationChange {
                    log::debug!(
                        "Slot {} duration changed, loop now {:.3}s",
                        index,
                        self.board.loop_duration()
                    );
                    self.publisher.publish_now(transport.snapshot(&self.board));
                }
                LoopAction::None
            }
        }
    }

    // ============ Audio ============

    pub fn set_active_tile(&mut self, tile: Option<usize>) {
        self.board.set_active_tile(tile);
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.board.set_muted(muted);
    }

    // ============ Observation ============

    /// Current state. Independent mode reports the active tile.
    pub fn snapshot(&self) -> TransportSnapshot {
        match &self.mode {
            SyncMode::Synchronized(transport) => transport.snapshot(&self.board),
            SyncMode::Independent(local) => {
                let mut snapshot = TransportSnapshot {
                    looping: local.is_looping(),
                    synchronized: false,
                    ..Default::default()
                };
                let tile = self.board.active_tile().and_then(|index| self.board.slot(index));
                if let Some(slot) = tile {
                    if let Some(handle) = slot.live_handle() {
                        let window = slot.binding().window();
                        snapshot.is_playing = !handle.is_paused();
                        snapshot.current_position = (handle.position() - window.start()).max(0.0);
                        snapshot.duration = window.length(handle.duration()).unwrap_or(0.0).max(0.0);
                        snapshot.rate = handle.rate();
                    }
                }
                snapshot
            }
        }
    }

    /// Stop everything
    pub fn shutdown(&mut self) {
        match &mut self.mode {
            SyncMode::Synchronized(transport) => transport.shutdown(&mut self.board),
            SyncMode::Independent(_) => self.board.pause_all(),
        }
    }
}
