// Playback session - the state of the currently selected recording
//
// Owns the waveform store, renderer, markers, player and partial refresher
// for one page. The host feeds it selections, media events, animation frames
// and timer polls; it never reads ambient state.

pub mod metadata;

pub use metadata::*;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::{Config, DevicePadding};
use crate::markers::{compute_markers, layout_labels, motion_bands, LabelLayoutConfig, MarkerLabel, MarkerSet};
use crate::playback::{
    AttachOptions, MediaElement, MediaEvent, Player, PlayerSettings, SourceMode, SourceSwitchOptions,
    UiHooks,
};
use crate::waveform::render::{MarkerLine, Scene};
use crate::waveform::{
    AmplitudeGain, DrawSurface, PartialRefresher, PreferenceStore, RefreshAction, WaveformData,
    WaveformEvent, WaveformFetcher, WaveformRenderer, WaveformStatus, WaveformStore,
};

/// Options for `PlaybackSession::select`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectOptions {
    /// Keep the raw/processed choice when the same recording is reselected
    pub preserve_mode: bool,
    /// Seek to the start even when the same recording is reselected
    pub reset_position: bool,
}

/// Host capabilities a session is built from
pub struct SessionParts<M: MediaElement, F: WaveformFetcher> {
    pub media: M,
    pub fetcher: F,
    pub surface: Box<dyn DrawSurface>,
    pub preferences: Box<dyn PreferenceStore>,
    pub hooks: Box<dyn UiHooks>,
}

pub struct PlaybackSession<M: MediaElement, F: WaveformFetcher> {
    config: Config,
    padding: DevicePadding,
    selected: Option<Recording>,
    store: WaveformStore<F>,
    events: UnboundedReceiver<WaveformEvent>,
    markers: MarkerSet,
    labels: Vec<MarkerLabel>,
    renderer: WaveformRenderer,
    preferences: Box<dyn PreferenceStore>,
    player: Player<M>,
    refresher: PartialRefresher,
}

impl<M: MediaElement, F: WaveformFetcher> PlaybackSession<M, F> {
    pub fn new(config: Config, padding: DevicePadding, parts: SessionParts<M, F>) -> Self {
        let mut store = WaveformStore::new(parts.fetcher);
        let events = store.subscribe();

        let (gain_min, gain_max) = config.gain_range();
        let gain = AmplitudeGain::load(&*parts.preferences, gain_min, gain_max);
        let renderer = WaveformRenderer::new(parts.surface, gain);

        let player = Player::new(parts.media, PlayerSettings::from(&config), parts.hooks);
        let refresher = PartialRefresher::new(Duration::from_secs(u64::from(config.partial_refresh_secs)));

        let mut session = Self {
            config,
            padding,
            selected: None,
            store,
            events,
            markers: MarkerSet::default(),
            labels: Vec::new(),
            renderer,
            preferences: parts.preferences,
            player,
            refresher,
        };
        session.resize();
        session
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Select a recording, or nothing.
    ///
    /// Selecting the same recording again (a metadata refresh) keeps the
    /// playback position and reloads the waveform in place.
    pub fn select(&mut self, recording: Option<Recording>, options: SelectOptions, now: Instant) {
        // Any reselection cancels a pending partial reload
        self.refresher.cancel();

        let Some(recording) = recording else {
            if self.selected.take().is_some() {
                log::debug!("Selection cleared");
            }
            self.store.clear();
            self.player.detach();
            self.markers = MarkerSet::default();
            self.labels.clear();
            self.renderer.draw_scene(Scene::default());
            self.player.hooks_mut().waveform_status(&WaveformStatus::Empty);
            return;
        };

        let same = self.selected_path() == Some(recording.path.as_str());
        log::info!("Selected {} (same: {}, partial: {})", recording.path, same, recording.is_partial);

        self.player.attach(
            &recording,
            AttachOptions {
                preserve_mode: same && options.preserve_mode,
                reset_position: options.reset_position,
            },
        );
        self.player.set_waveform(self.store.data_for(&recording.path));
        self.selected = Some(recording);

        self.load_waveform(now);
        self.recompute_markers();
    }

    pub fn selected(&self) -> Option<&Recording> {
        self.selected.as_ref()
    }

    fn selected_path(&self) -> Option<&str> {
        self.selected.as_ref().map(|r| r.path.as_str())
    }

    /// Issue a waveform load for the selection and arm the partial refresh
    fn load_waveform(&mut self, now: Instant) {
        let Some(recording) = &self.selected else {
            return;
        };
        self.store.load(recording);
        if recording.is_partial {
            self.refresher.schedule(&recording.path, now);
        }
        let status = self.store.status();
        self.player.hooks_mut().waveform_status(&status);
    }

    // ========================================================================
    // Waveform events
    // ========================================================================

    /// Apply every store event that has arrived. Returns how many there were.
    pub fn pump_waveform_events(&mut self) -> usize {
        let mut count = 0;
        while let Ok(event) = self.events.try_recv() {
            self.apply_waveform_event(&event);
            count += 1;
        }
        count
    }

    /// Wait for the next store event and apply it
    pub async fn next_waveform_event(&mut self) -> Option<WaveformEvent> {
        let event = self.events.recv().await?;
        self.apply_waveform_event(&event);
        Some(event)
    }

    fn apply_waveform_event(&mut self, event: &WaveformEvent) {
        match event {
            WaveformEvent::Loaded { path, .. } => {
                if self.selected_path() != Some(path.as_str()) {
                    return;
                }
                self.player.set_waveform(self.store.data_for(path));
                self.recompute_markers();
                self.player.hooks_mut().waveform_status(&WaveformStatus::Ready);
            }
            WaveformEvent::Unavailable { path, reason, .. } => {
                if self.selected_path() != Some(path.as_str()) {
                    return;
                }
                self.player.set_waveform(None);
                self.recompute_markers();
                self.player
                    .hooks_mut()
                    .waveform_status(&WaveformStatus::Unavailable(reason.clone()));
            }
            WaveformEvent::DurationChanged { path, duration_seconds } => {
                self.player.hooks_mut().duration_changed(path, *duration_seconds);
            }
        }
    }

    // ========================================================================
    // Host callbacks
    // ========================================================================

    /// Forward a media element event
    pub fn handle_media_event(&mut self, event: MediaEvent) {
        let before = self.player.duration();
        let metadata = event == MediaEvent::LoadedMetadata;
        self.player.handle_media_event(event);

        // The element may be the first to know the duration
        if metadata && self.player.duration() != before {
            self.recompute_markers();
        }
    }

    /// One animation frame. Returns true while another frame is wanted.
    pub fn on_animation_frame(&mut self, now_ms: f64) -> bool {
        self.player.on_animation_frame(now_ms)
    }

    /// Fire due timers
    pub fn poll_timers(&mut self, now: Instant) {
        let selected = self.selected.as_ref().map(|r| (r.path.as_str(), r.is_partial));
        let is_playing = self.player.is_playing();
        if let Some(RefreshAction::Reload(path)) = self.refresher.poll(now, selected, is_playing) {
            log::debug!("Refreshing partial waveform for {}", path);
            self.load_waveform(now);
        }
    }

    /// When the next timer is due, for hosts that sleep between polls
    pub fn next_timer(&self) -> Option<Instant> {
        self.refresher.next_due()
    }

    /// New device padding from the configuration collaborator
    pub fn set_padding(&mut self, padding: DevicePadding) {
        if self.padding != padding {
            self.padding = padding;
            self.recompute_markers();
        }
    }

    /// Waveform container shown or hidden
    pub fn set_visible(&mut self, visible: bool) {
        self.player.set_visible(visible);
        if visible {
            self.resize();
        }
    }

    /// Waveform container resized
    pub fn resize(&mut self) {
        self.renderer.on_container_resize();
        self.player.set_cursor_width(self.renderer.css_width());
    }

    // ========================================================================
    // Amplitude gain
    // ========================================================================

    pub fn gain(&self) -> f64 {
        self.renderer.gain()
    }

    pub fn set_gain(&mut self, value: f64) -> f64 {
        self.renderer.set_gain(value, self.preferences.as_mut())
    }

    pub fn zoom_in(&mut self) -> f64 {
        self.renderer.zoom_in(self.preferences.as_mut())
    }

    pub fn zoom_out(&mut self) -> f64 {
        self.renderer.zoom_out(self.preferences.as_mut())
    }

    // ========================================================================
    // Transport
    // ========================================================================

    pub fn player(&self) -> &Player<M> {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut Player<M> {
        &mut self.player
    }

    pub fn toggle_play(&mut self) {
        self.player.toggle_play();
    }

    pub fn set_source(&mut self, mode: SourceMode, options: SourceSwitchOptions) -> bool {
        self.player.set_source(mode, options)
    }

    // ========================================================================
    // Derived state
    // ========================================================================

    pub fn status(&self) -> WaveformStatus {
        if self.selected.is_none() {
            return WaveformStatus::Empty;
        }
        self.store.status()
    }

    pub fn waveform(&self) -> Option<Arc<WaveformData>> {
        self.selected_path().and_then(|p| self.store.data_for(p))
    }

    pub fn markers(&self) -> &MarkerSet {
        &self.markers
    }

    pub fn labels(&self) -> &[MarkerLabel] {
        &self.labels
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Best known duration: waveform, then recording metadata, then the
    /// media element
    pub fn effective_duration(&self) -> Option<f64> {
        let recording = self.selected.as_ref()?;
        self.store
            .data_for(&recording.path)
            .map(|d| d.duration_seconds)
            .or_else(|| recording.known_duration())
            .or_else(|| self.player.duration())
    }

    fn recompute_markers(&mut self) {
        let duration = self.effective_duration();
        let Some(recording) = &self.selected else {
            return;
        };

        let markers = compute_markers(recording, duration, &self.padding, self.config.marker_epsilon_secs);
        let fractions = markers.fractions();
        let layout = LabelLayoutConfig {
            edge_threshold: self.config.label_edge_threshold,
            spacing_threshold: self.config.label_spacing_threshold,
        };
        self.labels = layout_labels(&fractions, &layout);

        let scene = Scene {
            data: self.store.data_for(&recording.path),
            markers: fractions
                .iter()
                .map(|&(kind, fraction)| MarkerLine { kind, fraction })
                .collect(),
            motion_bands: motion_bands(recording, duration),
        };
        self.renderer.draw_scene(scene);

        if markers != self.markers {
            self.markers = markers;
            let labels = self.labels.clone();
            self.player.hooks_mut().markers_changed(&self.markers, &labels);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_harness::{
        payload, DrawOp, FakeMedia, GatedFetcher, RecordingHooks, RecordingSurface,
    };
    use crate::waveform::MemoryPreferences;

    type TestSession = PlaybackSession<FakeMedia, Arc<GatedFetcher>>;

    struct Harness {
        session: TestSession,
        media: FakeMedia,
        fetcher: Arc<GatedFetcher>,
        hooks: RecordingHooks,
        ops: Arc<parking_lot::Mutex<Vec<DrawOp>>>,
    }

    fn harness(padding: DevicePadding) -> Harness {
        let media = FakeMedia::new();
        let fetcher = Arc::new(GatedFetcher::default());
        let hooks = RecordingHooks::new();
        let surface = RecordingSurface::new(200.0, 50.0, 1.0);
        let ops = Arc::clone(&surface.ops);

        let session = PlaybackSession::new(
            Config::default(),
            padding,
            SessionParts {
                media: media.clone(),
                fetcher: Arc::clone(&fetcher),
                surface: Box::new(surface),
                preferences: Box::new(MemoryPreferences::default()),
                hooks: Box::new(hooks.clone()),
            },
        );
        Harness { session, media, fetcher, hooks, ops }
    }

    fn recording(path: &str) -> Recording {
        let mut rec = Recording::new(path);
        rec.duration_seconds = Some(120.0);
        rec.trigger_offset_seconds = Some(5.0);
        rec.waveform_path = Some(format!("{}.json", path));
        rec
    }

    #[tokio::test]
    async fn test_select_loads_and_draws() {
        let mut h = harness(DevicePadding {
            pre_pad_seconds: None,
            post_pad_seconds: Some(3.0),
        });
        let gate = h.fetcher.gate("r1.json");

        h.session.select(Some(recording("r1")), SelectOptions::default(), Instant::now());
        assert_eq!(h.session.status(), WaveformStatus::Loading);
        assert_eq!(h.session.markers().release_seconds, Some(117.0));

        let _ = gate.send(Ok(payload(&[-0.5, 0.5, -1.0, 1.0], None)));
        let event = h.session.next_waveform_event().await;
        assert!(matches!(event, Some(WaveformEvent::Loaded { .. })));

        assert_eq!(h.session.status(), WaveformStatus::Ready);
        assert_eq!(h.session.waveform().unwrap().duration_seconds, 120.0);
        assert_eq!(h.hooks.last_status(), Some(WaveformStatus::Ready));
        assert!(h.ops.lock().iter().any(|op| matches!(op, DrawOp::Fill(..))));
    }

    #[tokio::test]
    async fn test_unavailable_keeps_transport_usable() {
        let mut h = harness(DevicePadding::default());
        // No gate: the fetch answers 404
        h.session.select(Some(recording("r1")), SelectOptions::default(), Instant::now());
        h.session.next_waveform_event().await;
        assert!(matches!(h.session.status(), WaveformStatus::Unavailable(_)));

        h.media.load_metadata();
        h.session.handle_media_event(MediaEvent::LoadedMetadata);
        h.session.toggle_play();
        assert!(h.session.player().is_playing());
    }

    #[tokio::test]
    async fn test_padding_change_recomputes_markers() {
        let mut h = harness(DevicePadding {
            pre_pad_seconds: None,
            post_pad_seconds: Some(3.0),
        });
        h.session.select(Some(recording("r1")), SelectOptions::default(), Instant::now());
        assert_eq!(h.session.markers().release_seconds, Some(117.0));

        h.session.set_padding(DevicePadding {
            pre_pad_seconds: None,
            post_pad_seconds: Some(0.0),
        });
        assert_eq!(h.session.markers().release_seconds, Some(120.0));
        assert_eq!(h.hooks.log().markers.len(), 2);
    }

    #[tokio::test]
    async fn test_markers_wait_for_duration() {
        let mut h = harness(DevicePadding::default());
        let mut rec = recording("r1");
        rec.duration_seconds = None;
        rec.waveform_path = None;

        h.session.select(Some(rec), SelectOptions::default(), Instant::now());
        assert!(h.session.markers().is_empty());

        h.media.load_metadata();
        h.session.handle_media_event(MediaEvent::LoadedMetadata);
        assert_eq!(h.session.markers().trigger_seconds, Some(5.0));
        assert_eq!(h.session.markers().duration_seconds, 60.0);
    }

    #[tokio::test]
    async fn test_partial_refresh_waits_for_pause() {
        let mut h = harness(DevicePadding::default());
        let mut rec = recording("r1");
        rec.is_partial = true;

        let t0 = Instant::now();
        h.session.select(Some(rec), SelectOptions::default(), t0);
        h.session.next_waveform_event().await;
        let issued = h.session.store.latest_request();

        h.media.load_metadata();
        h.session.handle_media_event(MediaEvent::LoadedMetadata);
        h.session.toggle_play();

        let due = h.session.next_timer().unwrap();
        h.session.poll_timers(due);
        assert_eq!(h.session.store.latest_request(), issued);

        h.session.toggle_play();
        let due = h.session.next_timer().unwrap();
        h.session.poll_timers(due);
        assert_eq!(h.session.store.latest_request(), issued + 1);
        assert!(h.session.next_timer().is_some());
    }

    #[tokio::test]
    async fn test_clear_selection_resets() {
        let mut h = harness(DevicePadding::default());
        h.session.select(Some(recording("r1")), SelectOptions::default(), Instant::now());
        h.session.select(None, SelectOptions::default(), Instant::now());

        assert_eq!(h.session.status(), WaveformStatus::Empty);
        assert!(h.session.markers().is_empty());
        assert_eq!(h.media.src(), None);
        assert_eq!(h.hooks.last_status(), Some(WaveformStatus::Empty));
    }

    #[tokio::test]
    async fn test_gain_clamped_to_config_range() {
        let mut h = harness(DevicePadding::default());
        assert_eq!(h.session.gain(), 1.0);
        assert_eq!(h.session.set_gain(2.5), 2.5);
        assert_eq!(h.session.set_gain(100.0), 8.0);
    }
}
