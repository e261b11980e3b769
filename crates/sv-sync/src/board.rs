//! Slot Board
//!
//! Owns the up-to-four slots: each slot's clip metadata, its binding, and the
//! (nullable) stream handle bound to it. The tick reads bindings and handles
//! from here on every invocation, so there is no captured stale state.

use sv_core::{ClipAsset, MAX_SLOTS, SlotBinding, StreamError, StreamHandle, SvError, SvResult};

// ============ Slot ============

/// One occupied slot
pub struct Slot {
    asset: ClipAsset,
    binding: SlotBinding,
    handle: Option<Box<dyn StreamHandle>>,
}

impl Slot {
    pub fn asset(&self) -> &ClipAsset {
        &self.asset
    }

    pub fn binding(&self) -> &SlotBinding {
        &self.binding
    }

    /// Handle if present and still attached
    pub fn live_handle(&self) -> Option<&dyn StreamHandle> {
        self.handle
            .as_deref()
            .filter(|handle| handle.is_attached())
    }

    pub fn has_live_handle(&self) -> bool {
        self.live_handle().is_some()
    }
}

// ============ Play Report ============

/// Outcome of commanding every live stream to play
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayReport {
    /// Slots whose play command succeeded
    pub started: Vec<usize>,
    /// Slots whose play command was rejected
    pub rejected: Vec<(usize, StreamError)>,
}

impl PlayReport {
    pub fn is_degraded(&self) -> bool {
        !self.rejected.is_empty()
    }
}

// ============ Slot Board ============

/// Fixed array of nullable slots plus the tile mute policy
pub struct SlotBoard {
    slots: [Option<Slot>; MAX_SLOTS],
    /// Tile whose audio is audible
    active_tile: Option<usize>,
    /// Global mute
    muted: bool,
}

impl SlotBoard {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            active_tile: Some(0),
            muted: false,
        }
    }

    fn check_index(index: usize) -> SvResult<()> {
        if index < MAX_SLOTS {
            Ok(())
        } else {
            Err(SvError::InvalidSlot(index))
        }
    }

    /// Put new content into a slot. The binding is rebuilt from the asset's trim
    /// metadata, so the offset always starts at 0.
    pub fn assign(
        &mut self,
        index: usize,
        asset: ClipAsset,
        handle: Option<Box<dyn StreamHandle>>,
    ) -> SvResult<()> {
        Self::check_index(index)?;

        if let Some(previous) = self.slots[index].take() {
            log::debug!("Slot {} replacing '{}'", index, previous.asset.name);
            if let Some(mut old) = previous.handle {
                old.pause();
            }
        }

        let binding = SlotBinding::from_asset(&asset);
        let mut handle = handle;
        if let Some(h) = handle.as_mut() {
            h.set_position(binding.trim_start());
        }

        log::info!(
            "Slot {} <- '{}' (trim {:.3}..{})",
            index,
            asset.name,
            binding.trim_start(),
            binding
                .trim_end()
                .map(|e| format!("{:.3}", e))
                .unwrap_or_else(|| "end".into())
        );

        self.slots[index] = Some(Slot {
            asset,
            binding,
            handle,
        });
        self.apply_mute();
        Ok(())
    }

    /// Remove a slot's content. Returns the asset that was shown.
    pub fn clear(&mut self, index: usize) -> SvResult<Option<ClipAsset>> {
        Self::check_index(index)?;
        Ok(self.slots[index].take().map(|slot| {
            if let Some(mut handle) = slot.handle {
                handle.pause();
            }
            log::info!("Slot {} cleared", index);
            slot.asset
        }))
    }

    /// Clear every slot showing the given library clip
    pub fn remove_asset(&mut self, asset_id: &str) -> usize {
        let mut removed = 0;
        for index in 0..MAX_SLOTS {
            let matches = self.slots[index]
                .as_ref()
                .is_some_and(|slot| slot.asset.id == asset_id);
            if matches {
                // Index is in range by construction
                let _ = self.clear(index);
                removed += 1;
            }
        }
        removed
    }

    /// Take the stream handle away from a slot, keeping its binding
    pub fn detach(&mut self, index: usize) -> SvResult<Option<Box<dyn StreamHandle>>> {
        Self::check_index(index)?;
        Ok(self.slots[index]
            .as_mut()
            .and_then(|slot| slot.handle.take()))
    }

    /// Bind a (new) stream handle to a slot that already has content
    pub fn attach(&mut self, index: usize, handle: Box<dyn StreamHandle>) -> SvResult<()> {
        Self::check_index(index)?;
        let slot = self.slots[index]
            .as_mut()
            .ok_or(SvError::EmptySlot(index))?;
        slot.handle = Some(handle);
        self.apply_mute();
        Ok(())
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index).and_then(|slot| slot.as_ref())
    }

    pub fn binding(&self, index: usize) -> Option<&SlotBinding> {
        self.slot(index).map(|slot| &slot.binding)
    }

    /// Live handle of a slot for direct commands
    pub fn handle_mut(&mut self, index: usize) -> Option<&mut Box<dyn StreamHandle>> {
        self.slots
            .get_mut(index)
            .and_then(|slot| slot.as_mut())
            .and_then(|slot| slot.handle.as_mut())
            .filter(|handle| handle.is_attached())
    }

    /// Shift a slot's offset; returns the new offset
    pub fn adjust_offset(&mut self, index: usize, delta: f64) -> SvResult<f64> {
        Self::check_index(index)?;
        let slot = self.slots[index]
            .as_mut()
            .ok_or(SvError::EmptySlot(index))?;
        if !slot.binding.adjust_offset(delta) {
            log::warn!("Slot {} ignoring non-finite offset delta {}", index, delta);
        }
        Ok(slot.binding.offset())
    }

    /// Number of slots with content
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Indices of slots with a live handle
    pub fn active_indices(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.as_ref().is_some_and(Slot::has_live_handle))
            .map(|(index, _)| index)
            .collect()
    }

    /// Slots with content but no usable handle
    pub fn stale_count(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .filter(|slot| !slot.has_live_handle())
            .count()
    }

    /// Live slots: index, binding snapshot, handle
    pub fn live_mut(
        &mut self,
    ) -> impl Iterator<Item = (usize, SlotBinding, &mut Box<dyn StreamHandle>)> + '_ {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| {
                let slot = slot.as_mut()?;
                let binding = slot.binding;
                match slot.handle.as_mut() {
                    Some(handle) if handle.is_attached() => Some((index, binding, handle)),
                    _ => None,
                }
            })
    }

    /// Shared loop length: the shortest positive trim window over live slots,
    /// or 0 when none qualifies
    pub fn loop_duration(&self) -> f64 {
        self.slots
            .iter()
            .flatten()
            .filter_map(|slot| {
                let handle = slot.live_handle()?;
                slot.binding.window().length(handle.duration())
            })
            .filter(|len| *len > 0.0)
            .fold(None, |min: Option<f64>, len| {
                Some(min.map_or(len, |m| m.min(len)))
            })
            .unwrap_or(0.0)
    }

    // ============ Transport fan-out ============

    /// Command every live stream to play; rejections do not stop the others
    pub fn play_all(&mut self) -> PlayReport {
        let mut report = PlayReport::default();
        for (index, _, handle) in self.live_mut() {
            match handle.play() {
                Ok(()) => report.started.push(index),
                Err(err) => {
                    log::warn!("Slot {} play rejected: {}", index, err);
                    report.rejected.push((index, err));
                }
            }
        }
        report
    }

    pub fn pause_all(&mut self) {
        for (_, _, handle) in self.live_mut() {
            handle.pause();
        }
    }

    pub fn set_rate_all(&mut self, rate: f64) {
        for (_, _, handle) in self.live_mut() {
            handle.set_rate(rate);
        }
    }

    // ============ Mute policy ============

    pub fn active_tile(&self) -> Option<usize> {
        self.active_tile
    }

    /// Select the audible tile; out-of-range selections fall back to tile 0
    pub fn set_active_tile(&mut self, tile: Option<usize>) {
        self.active_tile = match tile {
            Some(index) if index >= MAX_SLOTS => Some(0),
            other => other,
        };
        self.apply_mute();
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.apply_mute();
    }

    fn apply_mute(&mut self) {
        let muted = self.muted;
        let active = self.active_tile;
        for (index, _, handle) in self.live_mut() {
            handle.set_muted(muted || active != Some(index));
        }
    }
}

impl Default for SlotBoard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::sim::SimulatedStream;
    use std::sync::Arc;

    fn stream(wall: &ManualClock, duration: f64) -> SimulatedStream {
        SimulatedStream::new(Arc::new(wall.clone()), Some(duration))
    }

    #[test]
    fn test_assign_seeks_to_trim_start() {
        let wall = ManualClock::new();
        let watched = stream(&wall, 12.0);
        let mut board = SlotBoard::new();
        let asset = ClipAsset::new("a", "a.mp4", 12.0).with_trim(Some(2.0), Some(8.0));
        board.assign(1, asset, Some(Box::new(watched.clone()))).unwrap();

        assert_eq!(watched.position(), 2.0);
        assert_eq!(board.active_indices(), vec![1]);
        assert_eq!(board.occupied(), 1);
    }

    #[test]
    fn test_assign_out_of_range() {
        let mut board = SlotBoard::new();
        let err = board
            .assign(MAX_SLOTS, ClipAsset::new("a", "a", 1.0), None)
            .unwrap_err();
        assert!(matches!(err, SvError::InvalidSlot(4)));
    }

    #[test]
    fn test_replacing_content_resets_offset() {
        let mut board = SlotBoard::new();
        board.assign(0, ClipAsset::new("a", "a", 10.0), None).unwrap();
        board.adjust_offset(0, 0.5).unwrap();
        board.adjust_offset(0, 0.25).unwrap();
        assert_eq!(board.binding(0).unwrap().offset(), 0.75);

        board.assign(0, ClipAsset::new("b", "b", 10.0), None).unwrap();
        assert_eq!(board.binding(0).unwrap().offset(), 0.0);
    }

    #[test]
    fn test_adjust_offset_empty_slot() {
        let mut board = SlotBoard::new();
        assert!(matches!(board.adjust_offset(2, 0.15), Err(SvError::EmptySlot(2))));
    }

    #[test]
    fn test_loop_duration_is_shortest_positive_window() {
        let wall = ManualClock::new();
        let mut board = SlotBoard::new();
        board
            .assign(
                0,
                ClipAsset::new("a", "a", 12.0).with_trim(Some(2.0), Some(8.0)),
                Some(Box::new(stream(&wall, 12.0))),
            )
            .unwrap();
        board
            .assign(1, ClipAsset::new("b", "b", 4.5), Some(Box::new(stream(&wall, 4.5))))
            .unwrap();
        // Degenerate window excluded
        board
            .assign(
                2,
                ClipAsset::new("c", "c", 9.0).with_trim(Some(5.0), Some(5.0)),
                Some(Box::new(stream(&wall, 9.0))),
            )
            .unwrap();

        assert_eq!(board.loop_duration(), 4.5);
    }

    #[test]
    fn test_loop_duration_ignores_stale_and_unknown() {
        let wall = ManualClock::new();
        let mut board = SlotBoard::new();
        assert_eq!(board.loop_duration(), 0.0);

        let loading = SimulatedStream::new(Arc::new(wall.clone()), None);
        board
            .assign(0, ClipAsset::new("a", "a", 0.0), Some(Box::new(loading.clone())))
            .unwrap();
        assert_eq!(board.loop_duration(), 0.0);

        loading.set_duration(Some(6.0));
        assert_eq!(board.loop_duration(), 6.0);

        loading.set_attached(false);
        assert_eq!(board.loop_duration(), 0.0);
        assert_eq!(board.stale_count(), 1);
        assert!(board.active_indices().is_empty());
    }

    #[test]
    fn test_detach_and_attach() {
        let wall = ManualClock::new();
        let mut board = SlotBoard::new();
        board
            .assign(0, ClipAsset::new("a", "a", 5.0), Some(Box::new(stream(&wall, 5.0))))
            .unwrap();
        board.adjust_offset(0, 0.25).unwrap();

        let handle = board.detach(0).unwrap();
        assert!(handle.is_some());
        assert_eq!(board.stale_count(), 1);
        assert_eq!(board.binding(0).unwrap().offset(), 0.25);

        board.attach(0, Box::new(stream(&wall, 5.0))).unwrap();
        assert_eq!(board.stale_count(), 0);
        assert!(matches!(
            board.attach(3, Box::new(stream(&wall, 5.0))),
            Err(SvError::EmptySlot(3))
        ));
    }

    #[test]
    fn test_remove_asset_clears_all_matching() {
        let mut board = SlotBoard::new();
        board.assign(0, ClipAsset::new("a", "a", 5.0), None).unwrap();
        board.assign(2, ClipAsset::new("a", "a", 5.0), None).unwrap();
        board.assign(3, ClipAsset::new("b", "b", 5.0), None).unwrap();

        assert_eq!(board.remove_asset("a"), 2);
        assert_eq!(board.occupied(), 1);
        assert!(board.slot(3).is_some());
    }

    #[test]
    fn test_play_all_continues_past_rejection() {
        let wall = ManualClock::new();
        let mut board = SlotBoard::new();
        let streams: Vec<_> = (0..3).map(|_| stream(&wall, 10.0)).collect();
        streams[1].set_reject_play(true);
        for (i, s) in streams.iter().enumerate() {
            board
                .assign(i, ClipAsset::new(format!("{i}"), "clip", 10.0), Some(Box::new(s.clone())))
                .unwrap();
        }

        let report = board.play_all();
        assert_eq!(report.started, vec![0, 2]);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].0, 1);
        assert!(report.is_degraded());
        assert!(!streams[0].is_paused());
        assert!(streams[1].is_paused());
        assert!(!streams[2].is_paused());
    }

    #[test]
    fn test_mute_policy() {
        let wall = ManualClock::new();
        let mut board = SlotBoard::new();
        let a = stream(&wall, 5.0);
        let b = stream(&wall, 5.0);
        board.assign(0, ClipAsset::new("a", "a", 5.0), Some(Box::new(a.clone()))).unwrap();
        board.assign(1, ClipAsset::new("b", "b", 5.0), Some(Box::new(b.clone()))).unwrap();

        assert!(!a.is_muted());
        assert!(b.is_muted());

        board.set_active_tile(Some(1));
        assert!(a.is_muted());
        assert!(!b.is_muted());

        board.set_muted(true);
        assert!(a.is_muted() && b.is_muted());

        board.set_muted(false);
        board.set_active_tile(Some(9));
        assert_eq!(board.active_tile(), Some(0));
        assert!(!a.is_muted());
    }
}
