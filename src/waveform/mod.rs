// Waveform data handling
//
// Peaks are precomputed on the recorder and served as JSON. This module
// decodes that payload, normalizes it, and hands the result to the store,
// the renderer and the cursor readouts.

pub mod fetch;
pub mod refresh;
pub mod render;
pub mod store;
pub mod zoom;

pub use fetch::{DefaultFetcher, WaveformFetcher};
pub use refresh::{PartialRefresher, RefreshAction};
pub use render::{Color, DrawSurface, WaveformRenderer};
pub use store::{LoadTicket, WaveformEvent, WaveformStatus, WaveformStore};
pub use zoom::{AmplitudeGain, FilePreferences, MemoryPreferences, PreferenceError, PreferenceStore};

use serde::Deserialize;

/// Divisor used when the payload does not say how its integers are scaled
pub const DEFAULT_PEAK_SCALE: f64 = 32767.0;

/// Durations closer than this are considered the same
pub const DURATION_CHANGE_EPSILON: f64 = 0.05;

/// Raw JSON body of a waveform fetch
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WaveformPayload {
    /// Interleaved min,max samples
    #[serde(default)]
    pub peaks: Vec<f64>,
    #[serde(default)]
    pub peak_scale: Option<f64>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    /// One RMS value per peak pair, same scale as the peaks
    #[serde(default)]
    pub rms: Option<Vec<f64>>,
}

impl WaveformPayload {
    /// Parse a response body
    pub fn parse(body: &str) -> Result<Self, WaveformError> {
        Ok(serde_json::from_str(body)?)
    }
}

/// Normalized waveform for one recording. Replaced wholesale on reload.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformData {
    /// (min, max) per bucket, each in [-1, 1]
    pub peaks: Vec<(f32, f32)>,
    /// RMS ratio per bucket in [0, 1]; empty when the payload has none
    pub rms_values: Vec<f32>,
    pub duration_seconds: f64,
    pub peak_scale: f64,
    pub start_epoch: Option<f64>,
}

impl WaveformData {
    /// Build normalized data from a payload.
    ///
    /// `fallback_duration` is the duration already known for the recording and
    /// is used only when the payload does not carry a usable one.
    pub fn from_payload(
        payload: &WaveformPayload,
        fallback_duration: Option<f64>,
        start_epoch: Option<f64>,
    ) -> Result<Self, WaveformError> {
        let pair_count = payload.peaks.len() / 2;
        if pair_count < 1 {
            return Err(WaveformError::Malformed(format!(
                "expected at least one min/max pair, got {} values",
                payload.peaks.len()
            )));
        }

        let peak_scale = payload
            .peak_scale
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(DEFAULT_PEAK_SCALE);

        let peaks: Vec<(f32, f32)> = payload.peaks[..pair_count * 2]
            .chunks_exact(2)
            .map(|pair| {
                (
                    normalize_sample(pair[0], peak_scale),
                    normalize_sample(pair[1], peak_scale),
                )
            })
            .collect();

        let duration_seconds = payload
            .duration_seconds
            .filter(|d| d.is_finite() && *d > 0.0)
            .or_else(|| fallback_duration.filter(|d| d.is_finite() && *d > 0.0))
            .ok_or_else(|| WaveformError::Malformed("no usable duration".into()))?;

        let rms_values = match &payload.rms {
            Some(rms) if rms.len() == peaks.len() => rms
                .iter()
                .map(|v| {
                    let ratio = if v.is_finite() { v.abs() / peak_scale } else { 0.0 };
                    ratio.clamp(0.0, 1.0) as f32
                })
                .collect(),
            Some(rms) => {
                log::warn!(
                    "Dropping RMS values: {} values for {} peak buckets",
                    rms.len(),
                    peaks.len()
                );
                Vec::new()
            }
            None => Vec::new(),
        };

        Ok(Self {
            peaks,
            rms_values,
            duration_seconds,
            peak_scale,
            start_epoch,
        })
    }

    pub fn bucket_count(&self) -> usize {
        self.peaks.len()
    }

    pub fn has_rms(&self) -> bool {
        !self.rms_values.is_empty()
    }

    /// RMS ratio at a playback fraction, `None` when RMS is not available
    pub fn rms_at(&self, fraction: f64) -> Option<f32> {
        if self.rms_values.is_empty() {
            return None;
        }
        let last = self.rms_values.len() - 1;
        let idx = (fraction.clamp(0.0, 1.0) * self.rms_values.len() as f64).floor() as usize;
        Some(self.rms_values[idx.min(last)])
    }
}

fn normalize_sample(raw: f64, peak_scale: f64) -> f32 {
    if !raw.is_finite() {
        return 0.0;
    }
    (raw / peak_scale).clamp(-1.0, 1.0) as f32
}

/// Error type for waveform loading
#[derive(Debug, thiserror::Error)]
pub enum WaveformError {
    #[error("HTTP status {0}")]
    Http(u16),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed waveform: {0}")]
    Malformed(String),

    #[error("Recording has no waveform")]
    NoWaveform,
}
