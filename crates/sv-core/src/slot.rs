//! Slot bindings
//!
//! A slot is one of up to [`MAX_SLOTS`] presentation positions. Each occupied
//! slot carries a binding that maps the shared timeline onto the clip's own
//! time: `local = trim_start + offset + timeline`.

use serde::{Deserialize, Serialize};

/// Maximum number of simultaneously bound slots
pub const MAX_SLOTS: usize = 4;

// ============ Clip Asset ============

/// Clip metadata handed over by the library when a slot receives content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipAsset {
    /// Library identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Native duration in seconds
    pub duration_secs: f64,
    /// Trim start in seconds (unset = 0)
    #[serde(default)]
    pub trim_start: Option<f64>,
    /// Trim end in seconds (unset = native duration)
    #[serde(default)]
    pub trim_end: Option<f64>,
}

impl ClipAsset {
    pub fn new(id: impl Into<String>, name: impl Into<String>, duration_secs: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            duration_secs,
            trim_start: None,
            trim_end: None,
        }
    }

    /// Attach trim metadata
    pub fn with_trim(mut self, start: Option<f64>, end: Option<f64>) -> Self {
        self.trim_start = start;
        self.trim_end = end;
        self
    }

    /// Trim window described by this asset's metadata
    pub fn trim_window(&self) -> TrimWindow {
        TrimWindow::new(self.trim_start.unwrap_or(0.0), self.trim_end)
    }
}

// ============ Trim Window ============

/// The `[start, end)` range of a clip considered in scope for playback
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimWindow {
    start: f64,
    end: Option<f64>,
}

impl TrimWindow {
    /// Full clip, no trimming
    pub const FULL: Self = Self {
        start: 0.0,
        end: None,
    };

    /// Create a window. Negative or non-finite starts become 0, a non-finite or
    /// zero end is treated as unset.
    pub fn new(start: f64, end: Option<f64>) -> Self {
        let start = if start.is_finite() { start.max(0.0) } else { 0.0 };
        let end = end.filter(|e| e.is_finite() && *e > 0.0);
        Self { start, end }
    }

    #[inline]
    pub fn start(&self) -> f64 {
        self.start
    }

    #[inline]
    pub fn end(&self) -> Option<f64> {
        self.end
    }

    /// End of the window, falling back to the native duration
    pub fn resolved_end(&self, native_duration: Option<f64>) -> Option<f64> {
        self.end
            .or_else(|| native_duration.filter(|d| d.is_finite() && *d > 0.0))
    }

    /// Window length, `None` while neither trim end nor native duration is known.
    /// May be zero or negative for degenerate windows.
    pub fn length(&self, native_duration: Option<f64>) -> Option<f64> {
        self.resolved_end(native_duration).map(|end| end - self.start)
    }

    /// Clamp a local time into the window
    pub fn clamp(&self, local: f64, native_duration: Option<f64>) -> f64 {
        let upper = self
            .resolved_end(native_duration)
            .unwrap_or(f64::INFINITY)
            .max(self.start);
        if local.is_nan() {
            return self.start;
        }
        local.clamp(self.start, upper)
    }
}

impl Default for TrimWindow {
    fn default() -> Self {
        Self::FULL
    }
}

// ============ Slot Binding ============

/// Static trim window plus the user-adjustable offset of one slot.
///
/// The trim window is fixed for the life of the binding. Replacing a slot's
/// content creates a new binding, which resets the offset to zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlotBinding {
    window: TrimWindow,
    offset: f64,
}

impl SlotBinding {
    pub fn new(window: TrimWindow) -> Self {
        Self {
            window,
            offset: 0.0,
        }
    }

    pub fn from_asset(asset: &ClipAsset) -> Self {
        Self::new(asset.trim_window())
    }

    #[inline]
    pub fn window(&self) -> TrimWindow {
        self.window
    }

    #[inline]
    pub fn trim_start(&self) -> f64 {
        self.window.start()
    }

    #[inline]
    pub fn trim_end(&self) -> Option<f64> {
        self.window.end()
    }

    #[inline]
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Shift the offset. Non-finite deltas are ignored and `false` is returned.
    pub fn adjust_offset(&mut self, delta: f64) -> bool {
        if !delta.is_finite() {
            return false;
        }
        self.offset += delta;
        true
    }

    /// Local stream time the given timeline position maps to
    #[inline]
    pub fn target_position(&self, timeline: f64) -> f64 {
        self.window.start() + self.offset + timeline
    }
}

impl Default for SlotBinding {
    fn default() -> Self {
        Self::new(TrimWindow::FULL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_window_from_asset() {
        let asset = ClipAsset::new("a", "jump.mp4", 12.0).with_trim(Some(2.0), Some(8.0));
        let window = asset.trim_window();
        assert_eq!(window.start(), 2.0);
        assert_eq!(window.end(), Some(8.0));
        assert_eq!(window.length(Some(12.0)), Some(6.0));
    }

    #[test]
    fn test_window_unset_end_uses_native_duration() {
        let window = TrimWindow::new(1.5, None);
        assert_eq!(window.length(Some(10.0)), Some(8.5));
        assert_eq!(window.length(None), None);
        assert_eq!(window.length(Some(f64::NAN)), None);
    }

    #[test]
    fn test_window_sanitizes_inputs() {
        let window = TrimWindow::new(-4.0, Some(0.0));
        assert_eq!(window.start(), 0.0);
        assert_eq!(window.end(), None);

        let window = TrimWindow::new(f64::NAN, Some(f64::INFINITY));
        assert_eq!(window.start(), 0.0);
        assert_eq!(window.end(), None);
    }

    #[test]
    fn test_window_clamp() {
        let window = TrimWindow::new(2.0, Some(8.0));
        assert_eq!(window.clamp(1.0, None), 2.0);
        assert_eq!(window.clamp(9.0, None), 8.0);
        assert_eq!(window.clamp(5.5, None), 5.5);
        assert_eq!(window.clamp(f64::NAN, None), 2.0);

        let open = TrimWindow::new(0.0, None);
        assert_eq!(open.clamp(42.0, None), 42.0);
        assert_eq!(open.clamp(42.0, Some(30.0)), 30.0);
    }

    #[test]
    fn test_binding_target_position() {
        let mut binding = SlotBinding::new(TrimWindow::new(2.0, Some(8.0)));
        assert_abs_diff_eq!(binding.target_position(1.0), 3.0);

        assert!(binding.adjust_offset(0.25));
        assert!(binding.adjust_offset(-0.15));
        assert_abs_diff_eq!(binding.offset(), 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(binding.target_position(1.0), 3.1, epsilon = 1e-12);
    }

    #[test]
    fn test_binding_rejects_non_finite_delta() {
        let mut binding = SlotBinding::default();
        assert!(!binding.adjust_offset(f64::NAN));
        assert_eq!(binding.offset(), 0.0);
    }
}
