// Configuration management for the playback engine

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Lowest amplitude gain (waveform zoom) the user can select
    #[serde(default = "default_gain_min")]
    pub amplitude_gain_min: f64,

    /// Highest amplitude gain (waveform zoom) the user can select
    #[serde(default = "default_gain_max")]
    pub amplitude_gain_max: f64,

    /// Seconds between waveform reloads of a recording that is still being written
    #[serde(default = "default_partial_refresh_secs")]
    pub partial_refresh_secs: u32,

    /// Keyboard jog speed in seconds of media per second held
    #[serde(default = "default_jog_rate")]
    pub jog_rate_secs_per_sec: f64,

    /// Step used by the skip forward/back buttons
    #[serde(default = "default_skip_secs")]
    pub skip_secs: f64,

    /// Slowest allowed playback rate
    #[serde(default = "default_rate_min")]
    pub playback_rate_min: f64,

    /// Fastest allowed playback rate
    #[serde(default = "default_rate_max")]
    pub playback_rate_max: f64,

    /// Rates offered in the rate selector
    #[serde(default = "default_rate_options")]
    pub playback_rate_options: Vec<f64>,

    /// Markers closer than this (seconds) are drawn at the same position
    #[serde(default = "default_marker_epsilon")]
    pub marker_epsilon_secs: f64,

    /// Labels within this fraction of either end are edge-aligned
    #[serde(default = "default_label_edge")]
    pub label_edge_threshold: f64,

    /// Labels closer than this fraction are stacked on separate rows
    #[serde(default = "default_label_spacing")]
    pub label_spacing_threshold: f64,

    /// Where client-side preferences (amplitude gain) are persisted.
    /// Falls back to the platform config directory when unset.
    #[serde(default)]
    pub preferences_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            amplitude_gain_min: default_gain_min(),
            amplitude_gain_max: default_gain_max(),
            partial_refresh_secs: default_partial_refresh_secs(),
            jog_rate_secs_per_sec: default_jog_rate(),
            skip_secs: default_skip_secs(),
            playback_rate_min: default_rate_min(),
            playback_rate_max: default_rate_max(),
            playback_rate_options: default_rate_options(),
            marker_epsilon_secs: default_marker_epsilon(),
            label_edge_threshold: default_label_edge(),
            label_spacing_threshold: default_label_spacing(),
            preferences_path: None,
        }
    }
}

impl Config {
    /// Load config from disk or return default
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(contents) => {
                    match toml::from_str::<Config>(&contents) {
                        Ok(config) => return config.sanitized(),
                        Err(e) => {
                            log::warn!("Failed to parse config: {}", e);
                        }
                    }
                }
                Err(e) => {
                    log::warn!("Failed to read config file: {}", e);
                }
            }
        }

        Self::default()
    }

    /// Save config to disk
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;

        Ok(())
    }

    /// Resolved location of the preferences file
    pub fn preferences_file(&self) -> PathBuf {
        self.preferences_path
            .clone()
            .unwrap_or_else(|| config_dir().join("preferences.json"))
    }

    /// Amplitude gain range as (min, max), always ordered and positive
    pub fn gain_range(&self) -> (f64, f64) {
        (self.amplitude_gain_min, self.amplitude_gain_max)
    }

    /// Playback rate range as (min, max)
    pub fn rate_range(&self) -> (f64, f64) {
        (self.playback_rate_min, self.playback_rate_max)
    }

    /// Replace nonsensical values from a hand-edited file with defaults
    fn sanitized(mut self) -> Self {
        let defaults = Self::default();

        if !(self.amplitude_gain_min.is_finite() && self.amplitude_gain_min > 0.0)
            || !(self.amplitude_gain_max.is_finite() && self.amplitude_gain_max >= self.amplitude_gain_min)
        {
            log::warn!(
                "Ignoring invalid amplitude gain range {}..{}",
                self.amplitude_gain_min, self.amplitude_gain_max
            );
            self.amplitude_gain_min = defaults.amplitude_gain_min;
            self.amplitude_gain_max = defaults.amplitude_gain_max;
        }

        if !(self.playback_rate_min.is_finite() && self.playback_rate_min > 0.0)
            || !(self.playback_rate_max.is_finite() && self.playback_rate_max >= self.playback_rate_min)
        {
            log::warn!(
                "Ignoring invalid playback rate range {}..{}",
                self.playback_rate_min, self.playback_rate_max
            );
            self.playback_rate_min = defaults.playback_rate_min;
            self.playback_rate_max = defaults.playback_rate_max;
        }

        self.playback_rate_options.retain(|r| r.is_finite() && *r > 0.0);
        if self.playback_rate_options.is_empty() {
            self.playback_rate_options = defaults.playback_rate_options;
        }

        if self.partial_refresh_secs == 0 {
            self.partial_refresh_secs = defaults.partial_refresh_secs;
        }
        if !(self.marker_epsilon_secs.is_finite() && self.marker_epsilon_secs >= 0.0) {
            self.marker_epsilon_secs = defaults.marker_epsilon_secs;
        }

        self
    }
}

// ============================================================================
// Device padding (pre/post roll reported by the recorder)
// ============================================================================

/// Device-wide padding as served by the configuration endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    #[serde(default)]
    pub pre_pad_ms: Option<u64>,
    #[serde(default)]
    pub post_pad_ms: Option<u64>,
}

/// Padding converted to seconds. `None` disables the matching fallback marker.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DevicePadding {
    pub pre_pad_seconds: Option<f64>,
    pub post_pad_seconds: Option<f64>,
}

impl From<&DeviceConfig> for DevicePadding {
    fn from(device: &DeviceConfig) -> Self {
        Self {
            pre_pad_seconds: device.pre_pad_ms.map(|ms| ms as f64 / 1000.0),
            post_pad_seconds: device.post_pad_ms.map(|ms| ms as f64 / 1000.0),
        }
    }
}

impl DevicePadding {
    /// Parse the device configuration JSON body
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        let device: DeviceConfig = serde_json::from_str(body)?;
        Ok(Self::from(&device))
    }
}

// ============================================================================
// Paths and serde defaults
// ============================================================================

/// Directory holding config.toml and preferences.json
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("recdeck")
}

/// Get the config file path
pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

fn default_gain_min() -> f64 {
    0.1
}

fn default_gain_max() -> f64 {
    8.0
}

fn default_partial_refresh_secs() -> u32 {
    5
}

fn default_jog_rate() -> f64 {
    4.0
}

fn default_skip_secs() -> f64 {
    5.0
}

fn default_rate_min() -> f64 {
    0.25
}

fn default_rate_max() -> f64 {
    4.0
}

fn default_rate_options() -> Vec<f64> {
    vec![0.5, 0.75, 1.0, 1.25, 1.5, 2.0]
}

fn default_marker_epsilon() -> f64 {
    0.05
}

fn default_label_edge() -> f64 {
    0.04
}

fn default_label_spacing() -> f64 {
    0.06
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("nope.toml"));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.partial_refresh_secs = 9;
        config.playback_rate_options = vec![1.0, 3.0];
        config.save(&path).unwrap();

        let loaded = Config::load_or_default(&path);
        assert_eq!(loaded.partial_refresh_secs, 9);
        assert_eq!(loaded.playback_rate_options, vec![1.0, 3.0]);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "skip_secs = 10.0\n").unwrap();

        let config = Config::load_or_default(&path);
        assert_eq!(config.skip_secs, 10.0);
        assert_eq!(config.amplitude_gain_max, 8.0);
    }

    #[test]
    fn test_garbage_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();

        assert_eq!(Config::load_or_default(&path), Config::default());
    }

    #[test]
    fn test_inverted_gain_range_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "amplitude_gain_min = 5.0\namplitude_gain_max = 1.0\n").unwrap();

        let config = Config::load_or_default(&path);
        assert_eq!(config.gain_range(), (0.1, 8.0));
    }

    #[test]
    fn test_device_padding_conversion() {
        let padding = DevicePadding::from_json(r#"{"pre_pad_ms": 2500, "post_pad_ms": 3000}"#).unwrap();
        assert_eq!(padding.pre_pad_seconds, Some(2.5));
        assert_eq!(padding.post_pad_seconds, Some(3.0));

        let padding = DevicePadding::from_json("{}").unwrap();
        assert_eq!(padding, DevicePadding::default());
    }
}
