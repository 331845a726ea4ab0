// Waveform fetcher whose responses are released by the test

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::waveform::{WaveformError, WaveformFetcher, WaveformPayload};

type Gate = oneshot::Receiver<Result<WaveformPayload, WaveformError>>;

/// Each path answers once its gate is sent on. Paths without a gate
/// answer with HTTP 404.
#[derive(Default)]
pub struct GatedFetcher {
    gates: Mutex<HashMap<String, Gate>>,
}

impl GatedFetcher {
    pub fn gate(&self, path: &str) -> oneshot::Sender<Result<WaveformPayload, WaveformError>> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().insert(path.to_string(), rx);
        tx
    }
}

impl WaveformFetcher for Arc<GatedFetcher> {
    async fn fetch(&self, path: &str) -> Result<WaveformPayload, WaveformError> {
        let gate = self.gates.lock().remove(path);
        match gate {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(WaveformError::Transport("gate dropped".into()))),
            None => Err(WaveformError::Http(404)),
        }
    }
}

/// Payload with unit scale
pub fn payload(peaks: &[f64], duration: Option<f64>) -> WaveformPayload {
    WaveformPayload {
        peaks: peaks.to_vec(),
        peak_scale: Some(1.0),
        duration_seconds: duration,
        rms: None,
    }
}
