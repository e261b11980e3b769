//! Sync Preferences
//!
//! Persistent tuning for synchronized playback:
//! - Drift correction threshold
//! - Tick and snapshot publish cadence
//! - Loop / mute defaults
//! - Rate and step presets offered by the UI

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::SvResult;

/// Rates offered by the rate selector
pub const RATE_PRESETS: [f64; 4] = [1.0, 0.5, 0.25, 0.125];

/// Step magnitudes (seconds) offered by the per-tile step buttons
pub const STEP_PRESETS_SECS: [f64; 3] = [0.15, 0.25, 0.5];

/// Default drift tolerance before a stream is repositioned
pub const DEFAULT_CORRECTION_THRESHOLD_SECS: f64 = 0.05;

/// Roughly one display refresh
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 16;

/// At most 4 snapshot publishes per second
pub const DEFAULT_PUBLISH_INTERVAL_MS: u64 = 250;

/// Synchronized playback preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncPreferences {
    /// Drift (seconds) tolerated before a stream is repositioned
    pub correction_threshold_secs: f64,
    /// Interval of the recurring tick (ms)
    pub tick_interval_ms: u64,
    /// Minimum interval between throttled snapshot publishes (ms)
    pub publish_interval_ms: u64,
    /// Loop playback by default
    pub loop_enabled: bool,
    /// Rate applied when a session starts
    pub default_rate: f64,
    /// Rates shown in the rate selector
    pub rate_presets: Vec<f64>,
    /// Step sizes shown on each tile (seconds)
    pub step_presets_secs: Vec<f64>,
    /// Global mute
    pub muted: bool,
}

impl Default for SyncPreferences {
    fn default() -> Self {
        Self {
            correction_threshold_secs: DEFAULT_CORRECTION_THRESHOLD_SECS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            publish_interval_ms: DEFAULT_PUBLISH_INTERVAL_MS,
            loop_enabled: true,
            default_rate: 1.0,
            rate_presets: RATE_PRESETS.to_vec(),
            step_presets_secs: STEP_PRESETS_SECS.to_vec(),
            muted: false,
        }
    }
}

impl SyncPreferences {
    /// Load preferences from standard location
    pub fn load() -> Self {
        Self::load_from(Self::default_path())
    }

    /// Load preferences from specified path. Missing or unreadable files yield defaults.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let prefs = match fs::read_to_string(path.as_ref()) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                log::warn!(
                    "Ignoring malformed preferences {}: {}",
                    path.as_ref().display(),
                    e
                );
                Self::default()
            }),
            Err(_) => Self::default(),
        };
        prefs.validated()
    }

    /// Save preferences to standard location
    pub fn save(&self) -> SvResult<()> {
        self.save_to(Self::default_path())
    }

    /// Save preferences to specified path
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> SvResult<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Get default preferences file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("syncview"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sync-preferences.json")
    }

    /// Replace values the core cannot run with by their defaults
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();

        if !self.correction_threshold_secs.is_finite() || self.correction_threshold_secs <= 0.0 {
            log::warn!(
                "correction_threshold_secs {} invalid, using {}",
                self.correction_threshold_secs,
                defaults.correction_threshold_secs
            );
            self.correction_threshold_secs = defaults.correction_threshold_secs;
        }
        if self.tick_interval_ms == 0 {
            log::warn!("tick_interval_ms must be non-zero");
            self.tick_interval_ms = defaults.tick_interval_ms;
        }
        if self.publish_interval_ms == 0 {
            log::warn!("publish_interval_ms must be non-zero");
            self.publish_interval_ms = defaults.publish_interval_ms;
        }
        if !self.default_rate.is_finite() || self.default_rate <= 0.0 {
            log::warn!("default_rate {} invalid, using 1.0", self.default_rate);
            self.default_rate = defaults.default_rate;
        }
        self.rate_presets.retain(|r| r.is_finite() && *r > 0.0);
        if self.rate_presets.is_empty() {
            self.rate_presets = defaults.rate_presets;
        }
        self.step_presets_secs.retain(|s| s.is_finite() && *s > 0.0);
        if self.step_presets_secs.is_empty() {
            self.step_presets_secs = defaults.step_presets_secs;
        }

        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms)
    }
}
