//! Drift Corrector
//!
//! Keeps every live stream's native position near the position the virtual
//! clock dictates: `target = trim_start + offset + clock_position`. Streams are
//! only repositioned when they drift past the threshold, since native playback
//! already advances at about the right rate and forcing the position every
//! frame causes visible jitter.

use sv_core::DEFAULT_CORRECTION_THRESHOLD_SECS;

use crate::board::SlotBoard;

/// Default correction threshold (seconds)
pub const CORRECTION_THRESHOLD: f64 = DEFAULT_CORRECTION_THRESHOLD_SECS;

/// Result of one correction pass
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CorrectionReport {
    /// Streams repositioned
    pub corrected: usize,
    /// Streams within tolerance
    pub in_sync: usize,
    /// Occupied slots skipped for lack of a live handle
    pub skipped: usize,
    /// Largest absolute drift observed
    pub max_drift: f64,
}

/// Cumulative statistics of [`DriftCorrector::apply`] passes
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriftStats {
    pub passes: u64,
    pub corrections: u64,
    pub skipped: u64,
    pub worst_drift: f64,
}

/// Threshold-based position reconciler
#[derive(Debug, Clone)]
pub struct DriftCorrector {
    threshold: f64,
    stats: DriftStats,
    /// Stale count seen on the previous pass
    last_skipped: usize,
}

impl DriftCorrector {
    pub fn new() -> Self {
        Self::with_threshold(CORRECTION_THRESHOLD)
    }

    pub fn with_threshold(threshold: f64) -> Self {
        let threshold = if threshold.is_finite() && threshold > 0.0 {
            threshold
        } else {
            CORRECTION_THRESHOLD
        };
        Self {
            threshold,
            stats: DriftStats::default(),
            last_skipped: 0,
        }
    }

    #[inline]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn stats(&self) -> DriftStats {
        self.stats
    }

    /// Correction pass for a tick: reconcile, then fold the result into
    /// [`DriftStats`].
    pub fn apply(&mut self, board: &mut SlotBoard, clock_position: f64) -> CorrectionReport {
        let report = self.reconcile(board, clock_position);

        self.stats.passes += 1;
        self.stats.corrections += report.corrected as u64;
        self.stats.skipped += report.skipped as u64;
        if report.max_drift > self.stats.worst_drift {
            self.stats.worst_drift = report.max_drift;
        }

        report
    }

    /// Reconcile every live stream against one sampled clock position.
    /// All streams target the same logical instant. Not counted in the stats.
    pub fn reconcile(&mut self, board: &mut SlotBoard, clock_position: f64) -> CorrectionReport {
        let mut report = CorrectionReport {
            skipped: board.stale_count(),
            ..Default::default()
        };
        if report.skipped != self.last_skipped {
            if report.skipped > self.last_skipped {
                log::warn!("{} slot(s) without a live stream, skipping", report.skipped);
            }
            self.last_skipped = report.skipped;
        }

        for (index, binding, handle) in board.live_mut() {
            let target = binding.target_position(clock_position);
            let drift = handle.position() - target;
            let magnitude = drift.abs();
            if magnitude > report.max_drift {
                report.max_drift = magnitude;
            }

            if magnitude > self.threshold {
                log::debug!(
                    "Slot {} drift {:+.3}s, repositioning to {:.3}",
                    index,
                    drift,
                    target
                );
                handle.set_position(target);
                report.corrected += 1;
            } else {
                report.in_sync += 1;
            }
        }

        report
    }
}

impl Default for DriftCorrector {
    fn default() -> Self {
        Self::new()
    }
}
