// Amplitude gain (waveform zoom) and its persistence

use std::collections::HashMap;
use std::path::PathBuf;

/// Storage key for the persisted gain
pub const GAIN_STORAGE_KEY: &str = "waveform.amplitude_gain";

/// Gain used when nothing valid is stored
pub const DEFAULT_GAIN: f64 = 1.0;

/// Multiplicative step for zoom in/out
const ZOOM_STEP: f64 = 1.25;

/// Client-side key/value storage
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), PreferenceError>;
}

/// Error type for preference persistence
#[derive(Debug, thiserror::Error)]
pub enum PreferenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// In-memory preferences (tests, hosts without storage)
#[derive(Debug, Default, Clone)]
pub struct MemoryPreferences {
    values: HashMap<String, String>,
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PreferenceError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Preferences kept in a flat JSON object on disk
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    values: HashMap<String, String>,
}

impl FilePreferences {
    /// Open the file, starting empty if it is missing or unreadable
    pub fn open(path: PathBuf) -> Self {
        let values = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                log::warn!("Ignoring unreadable preferences {}: {}", path.display(), e);
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };
        Self { path, values }
    }

    fn flush(&self) -> Result<(), PreferenceError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl PreferenceStore for FilePreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PreferenceError> {
        self.values.insert(key.to_string(), value.to_string());
        self.flush()
    }
}

/// User-controlled vertical gain applied to the envelope
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmplitudeGain {
    value: f64,
    min: f64,
    max: f64,
}

impl AmplitudeGain {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            value: DEFAULT_GAIN.clamp(min, max),
            min,
            max,
        }
    }

    /// Restore the persisted gain. Missing, malformed, non-positive or
    /// out-of-range values fall back to the default.
    pub fn load(store: &dyn PreferenceStore, min: f64, max: f64) -> Self {
        let mut gain = Self::new(min, max);
        let stored = store
            .get(GAIN_STORAGE_KEY)
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v > 0.0 && *v >= min && *v <= max);

        match stored {
            Some(v) => gain.value = v,
            None => log::debug!("No valid stored amplitude gain, using {}", gain.value),
        }
        gain
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn range(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    /// Set and persist. Returns the clamped value actually applied.
    pub fn set(&mut self, value: f64, store: &mut dyn PreferenceStore) -> f64 {
        if !value.is_finite() || value <= 0.0 {
            return self.value;
        }
        self.value = value.clamp(self.min, self.max);
        if let Err(e) = store.set(GAIN_STORAGE_KEY, &self.value.to_string()) {
            log::warn!("Failed to persist amplitude gain: {}", e);
        }
        self.value
    }

    pub fn zoom_in(&mut self, store: &mut dyn PreferenceStore) -> f64 {
        self.set(self.value * ZOOM_STEP, store)
    }

    pub fn zoom_out(&mut self, store: &mut dyn PreferenceStore) -> f64 {
        self.set(self.value / ZOOM_STEP, store)
    }
}
