// Test harness - fakes for every host capability the engine depends on
//
// Compiled for unit tests and, behind the `test-harness` feature, for the
// integration tests under tests/.

mod fetcher;
mod media;
mod surface;

pub use fetcher::{payload, GatedFetcher};
pub use media::{FakeMedia, FakeMediaState, DEFAULT_FAKE_DURATION};
pub use surface::{DrawOp, RecordingSurface};

use std::cell::RefCell;
use std::rc::Rc;

use crate::markers::{MarkerLabel, MarkerSet};
use crate::playback::{CursorView, TransportSnapshot, UiHooks};
use crate::waveform::WaveformStatus;

/// Everything the engine reported to the UI
#[derive(Debug, Default)]
pub struct HookLog {
    pub cursors: Vec<CursorView>,
    pub snapshots: Vec<TransportSnapshot>,
    pub statuses: Vec<WaveformStatus>,
    pub durations: Vec<(String, f64)>,
    pub markers: Vec<(MarkerSet, Vec<MarkerLabel>)>,
}

/// UI hooks that append to a shared `HookLog`
#[derive(Debug, Clone, Default)]
pub struct RecordingHooks {
    log: Rc<RefCell<HookLog>>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> std::cell::Ref<'_, HookLog> {
        self.log.borrow()
    }

    pub fn last_snapshot(&self) -> Option<TransportSnapshot> {
        self.log.borrow().snapshots.last().cloned()
    }

    pub fn last_cursor(&self) -> Option<CursorView> {
        self.log.borrow().cursors.last().cloned()
    }

    pub fn last_status(&self) -> Option<WaveformStatus> {
        self.log.borrow().statuses.last().cloned()
    }

    pub fn clear(&self) {
        *self.log.borrow_mut() = HookLog::default();
    }
}

impl UiHooks for RecordingHooks {
    fn cursor_moved(&mut self, view: &CursorView) {
        self.log.borrow_mut().cursors.push(view.clone());
    }

    fn transport_changed(&mut self, snapshot: &TransportSnapshot) {
        self.log.borrow_mut().snapshots.push(snapshot.clone());
    }

    fn waveform_status(&mut self, status: &WaveformStatus) {
        self.log.borrow_mut().statuses.push(status.clone());
    }

    fn duration_changed(&mut self, path: &str, duration_seconds: f64) {
        self.log
            .borrow_mut()
            .durations
            .push((path.to_string(), duration_seconds));
    }

    fn markers_changed(&mut self, markers: &MarkerSet, labels: &[MarkerLabel]) {
        self.log
            .borrow_mut()
            .markers
            .push((*markers, labels.to_vec()));
    }
}
