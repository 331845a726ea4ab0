// Waveform store - owns the waveform of the selected recording
//
// Every load gets a monotonically increasing request id. A finished fetch is
// applied only if its id is still the latest one issued; anything older is
// dropped. Starting a new load aborts the previous fetch task.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use super::{
    WaveformData, WaveformError, WaveformFetcher, WaveformPayload, DURATION_CHANGE_EPSILON,
};
use crate::session::Recording;

/// What the waveform area should show
#[derive(Debug, Clone, PartialEq)]
pub enum WaveformStatus {
    /// Nothing selected
    Empty,
    Loading,
    Ready,
    /// Fetch or decode failed; the reason is shown in place of the waveform
    Unavailable(String),
}

/// Notifications for the session owner
#[derive(Debug, Clone, PartialEq)]
pub enum WaveformEvent {
    Loaded {
        request: u64,
        path: String,
    },
    Unavailable {
        request: u64,
        path: String,
        reason: String,
    },
    /// The waveform reported a duration materially different from the one
    /// the recordings list knows; the list row should be re-rendered.
    DurationChanged {
        path: String,
        duration_seconds: f64,
    },
}

/// A load that has been issued but not yet applied
#[derive(Debug, Clone, PartialEq)]
pub struct LoadTicket {
    pub request: u64,
    pub recording_path: String,
    pub waveform_path: String,
    /// Used when the payload carries no duration
    fallback_duration: Option<f64>,
    /// Duration the list currently shows, for change detection
    baseline_duration: Option<f64>,
    start_epoch: Option<f64>,
}

struct StoreInner {
    latest_request: u64,
    data: Option<Arc<WaveformData>>,
    /// Recording the published data belongs to
    data_path: Option<String>,
    status: WaveformStatus,
}

/// Fetches, decodes and caches the waveform for the selected recording
pub struct WaveformStore<F: WaveformFetcher> {
    fetcher: Arc<F>,
    inner: Arc<Mutex<StoreInner>>,
    in_flight: Option<JoinHandle<()>>,
    events: UnboundedSender<WaveformEvent>,
}

impl<F: WaveformFetcher> WaveformStore<F> {
    pub fn new(fetcher: F) -> Self {
        let (events, _) = mpsc::unbounded_channel();
        Self {
            fetcher: Arc::new(fetcher),
            inner: Arc::new(Mutex::new(StoreInner {
                latest_request: 0,
                data: None,
                data_path: None,
                status: WaveformStatus::Empty,
            })),
            in_flight: None,
            events,
        }
    }

    /// Start receiving store events. Replaces any previous subscriber.
    pub fn subscribe(&mut self) -> UnboundedReceiver<WaveformEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = tx;
        rx
    }

    /// Fire-and-forget load of a recording's waveform.
    ///
    /// Must be called from within a tokio runtime; the fetch runs as a task.
    pub fn load(&mut self, recording: &Recording) {
        let Some(ticket) = self.begin_load(recording) else {
            return;
        };

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                log::warn!("Cannot fetch waveform without a runtime: {}", e);
                self.finish_load(&ticket, Err(WaveformError::Transport(e.to_string())));
                return;
            }
        };

        let fetcher = Arc::clone(&self.fetcher);
        let inner = Arc::clone(&self.inner);
        let events = self.events.clone();

        self.in_flight = Some(handle.spawn(async move {
            let result = fetcher.fetch(&ticket.waveform_path).await;
            apply_result(&inner, &events, &ticket, result);
        }));
    }

    /// Issue a new request id and abort whatever was in flight.
    ///
    /// Returns `None` when the recording has no waveform to fetch; the store is
    /// then already marked unavailable.
    pub fn begin_load(&mut self, recording: &Recording) -> Option<LoadTicket> {
        self.abort_in_flight();

        let mut inner = self.inner.lock();
        inner.latest_request += 1;
        let request = inner.latest_request;

        // Keep the old peaks while reloading the same recording so partial
        // refreshes don't flash an empty waveform
        if inner.data_path.as_deref() != Some(recording.path.as_str()) {
            inner.data = None;
            inner.data_path = None;
        }

        let Some(waveform_path) = recording.waveform_path.clone().filter(|p| !p.trim().is_empty()) else {
            let reason = WaveformError::NoWaveform.to_string();
            inner.data = None;
            inner.data_path = None;
            inner.status = WaveformStatus::Unavailable(reason.clone());
            drop(inner);
            let _ = self.events.send(WaveformEvent::Unavailable {
                request,
                path: recording.path.clone(),
                reason,
            });
            return None;
        };

        inner.status = WaveformStatus::Loading;
        log::debug!("Waveform request {} issued for {}", request, recording.path);

        let previous = match (&inner.data, &inner.data_path) {
            (Some(data), Some(path)) if *path == recording.path => Some(data.duration_seconds),
            _ => None,
        };
        // Metadata refreshes of a partial recording may have raised its duration
        let fallback_duration = recording.known_duration().or(previous);
        let baseline_duration = previous.or_else(|| recording.known_duration());

        Some(LoadTicket {
            request,
            recording_path: recording.path.clone(),
            waveform_path,
            fallback_duration,
            baseline_duration,
            start_epoch: recording.start_epoch,
        })
    }

    /// Apply a completed fetch. Returns false if the ticket was stale.
    pub fn finish_load(
        &self,
        ticket: &LoadTicket,
        result: Result<WaveformPayload, WaveformError>,
    ) -> bool {
        apply_result(&self.inner, &self.events, ticket, result)
    }

    /// Drop any in-flight fetch; published data stays
    pub fn cancel(&mut self) {
        self.abort_in_flight();
        let mut inner = self.inner.lock();
        inner.latest_request += 1;
        if inner.status == WaveformStatus::Loading {
            inner.status = if inner.data.is_some() {
                WaveformStatus::Ready
            } else {
                WaveformStatus::Empty
            };
        }
    }

    /// Cancel and forget everything (no recording selected)
    pub fn clear(&mut self) {
        self.cancel();
        let mut inner = self.inner.lock();
        inner.data = None;
        inner.data_path = None;
        inner.status = WaveformStatus::Empty;
    }

    /// Published waveform, if any
    pub fn data(&self) -> Option<Arc<WaveformData>> {
        self.inner.lock().data.clone()
    }

    /// Published waveform only if it belongs to `path`
    pub fn data_for(&self, path: &str) -> Option<Arc<WaveformData>> {
        let inner = self.inner.lock();
        match &inner.data_path {
            Some(p) if p == path => inner.data.clone(),
            _ => None,
        }
    }

    pub fn status(&self) -> WaveformStatus {
        self.inner.lock().status.clone()
    }

    pub fn latest_request(&self) -> u64 {
        self.inner.lock().latest_request
    }

    pub fn is_loading(&self) -> bool {
        self.inner.lock().status == WaveformStatus::Loading
    }

    fn abort_in_flight(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }
}

impl<F: WaveformFetcher> Drop for WaveformStore<F> {
    fn drop(&mut self) {
        self.abort_in_flight();
    }
}

fn apply_result(
    inner: &Mutex<StoreInner>,
    events: &UnboundedSender<WaveformEvent>,
    ticket: &LoadTicket,
    result: Result<WaveformPayload, WaveformError>,
) -> bool {
    let mut inner = inner.lock();
    if inner.latest_request != ticket.request {
        log::debug!(
            "Discarding stale waveform {} for {} (latest is {})",
            ticket.request, ticket.recording_path, inner.latest_request
        );
        return false;
    }

    let decoded = result.and_then(|payload| {
        WaveformData::from_payload(&payload, ticket.fallback_duration, ticket.start_epoch)
    });

    match decoded {
        Ok(data) => {
            let duration = data.duration_seconds;
            log::debug!(
                "Waveform {} applied for {}: {} buckets, {:.2}s",
                ticket.request,
                ticket.recording_path,
                data.bucket_count(),
                duration
            );

            inner.data = Some(Arc::new(data));
            inner.data_path = Some(ticket.recording_path.clone());
            inner.status = WaveformStatus::Ready;
            drop(inner);

            let _ = events.send(WaveformEvent::Loaded {
                request: ticket.request,
                path: ticket.recording_path.clone(),
            });

            let changed = match ticket.baseline_duration {
                Some(known) => (duration - known).abs() > DURATION_CHANGE_EPSILON,
                None => true,
            };
            if changed {
                let _ = events.send(WaveformEvent::DurationChanged {
                    path: ticket.recording_path.clone(),
                    duration_seconds: duration,
                });
            }
        }
        Err(e) => {
            log::warn!("Waveform unavailable for {}: {}", ticket.recording_path, e);
            let reason = format!("Waveform unavailable: {}", e);

            inner.data = None;
            inner.data_path = None;
            inner.status = WaveformStatus::Unavailable(reason.clone());
            drop(inner);

            let _ = events.send(WaveformEvent::Unavailable {
                request: ticket.request,
                path: ticket.recording_path.clone(),
                reason,
            });
        }
    }

    true
}
