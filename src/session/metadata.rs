// Recording metadata as served by the recordings API

use serde::{Deserialize, Serialize};

/// Interval during which the external motion sensor fired
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MotionSegment {
    /// Seconds from recording start
    pub start: f64,
    /// Seconds from recording start, `None` while motion is still ongoing
    #[serde(default)]
    pub end: Option<f64>,
}

/// A single recording. Read-only for the playback engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Recording {
    /// Opaque identifier, also the processed audio source
    pub path: String,

    /// Length in seconds, unknown until the file has been probed
    #[serde(default)]
    pub duration_seconds: Option<f64>,

    /// Unix time (seconds) of the first sample
    #[serde(default)]
    pub start_epoch: Option<f64>,

    #[serde(default)]
    pub trigger_offset_seconds: Option<f64>,

    #[serde(default)]
    pub release_offset_seconds: Option<f64>,

    #[serde(default)]
    pub motion_trigger_offset_seconds: Option<f64>,

    #[serde(default)]
    pub motion_release_offset_seconds: Option<f64>,

    #[serde(default)]
    pub motion_segments: Vec<MotionSegment>,

    /// Location of the precomputed peaks JSON
    #[serde(default)]
    pub waveform_path: Option<String>,

    /// Unprocessed capture of the same recording, if kept
    #[serde(default)]
    pub raw_audio_path: Option<String>,

    /// True while the recorder is still writing this file
    #[serde(default)]
    pub is_partial: bool,
}

impl Recording {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Duration if it is known and usable
    pub fn known_duration(&self) -> Option<f64> {
        self.duration_seconds.filter(|d| d.is_finite() && *d > 0.0)
    }

    /// Raw variant path, ignoring blank strings from the API
    pub fn raw_path(&self) -> Option<&str> {
        self.raw_audio_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    pub fn has_raw(&self) -> bool {
        self.raw_path().is_some()
    }
}
