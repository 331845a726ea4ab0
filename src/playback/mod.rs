// Playback - the player owns the single media element
//
// Transport operations, keyboard jog and source switching are split across
// the submodules as `impl Player` blocks. Browser callbacks come in through
// `handle_media_event` and `on_animation_frame`; the UI is told about changes
// through `UiHooks`.

pub mod cursor;
pub mod jog;
pub mod media;
pub mod source;
pub mod transport;

pub use cursor::{format_elapsed, format_rms, wall_clock_label, CursorSync, CursorView, FrameHandle};
pub use jog::JogKey;
pub use media::{is_playing, known_duration, MediaElement, MediaError, MediaEvent};
pub use source::{PlaybackSourceState, SourceMode, SourceSwitchOptions};
pub use transport::RateOption;

use std::sync::Arc;

use crate::config::Config;
use crate::markers::{MarkerLabel, MarkerSet};
use crate::session::Recording;
use crate::waveform::{WaveformData, WaveformStatus};

use jog::JogState;

// ============================================================================
// UI hooks
// ============================================================================

/// Callbacks into the page. Every method defaults to doing nothing.
pub trait UiHooks {
    /// Cursor position or readouts changed
    fn cursor_moved(&mut self, _view: &CursorView) {}
    /// Any transport state changed
    fn transport_changed(&mut self, _snapshot: &TransportSnapshot) {}
    fn waveform_status(&mut self, _status: &WaveformStatus) {}
    /// The recordings list row for `path` should show a new duration
    fn duration_changed(&mut self, _path: &str, _duration_seconds: f64) {}
    fn markers_changed(&mut self, _markers: &MarkerSet, _labels: &[MarkerLabel]) {}
}

/// Hooks for hosts that poll `snapshot()` instead
#[derive(Debug, Default)]
pub struct NoopHooks;

impl UiHooks for NoopHooks {}

// ============================================================================
// State
// ============================================================================

/// Idle: nothing selected. Ready: source loading. Active: playable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportPhase {
    Idle,
    Ready,
    Active,
}

/// Transport tunables taken from the config
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSettings {
    pub jog_rate: f64,
    pub skip_secs: f64,
    pub rate_min: f64,
    pub rate_max: f64,
    pub rate_options: Vec<f64>,
}

impl From<&Config> for PlayerSettings {
    fn from(config: &Config) -> Self {
        let (rate_min, rate_max) = config.rate_range();
        Self {
            jog_rate: config.jog_rate_secs_per_sec,
            skip_secs: config.skip_secs,
            rate_min,
            rate_max,
            rate_options: config.playback_rate_options.clone(),
        }
    }
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Per-session transport state. Jog state lives in `JogState`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TransportState {
    /// Last known position in [0, 1]
    pub fraction: f64,
    pub scrubbing: bool,
    pub scrub_was_playing: bool,
    /// Uncommitted scrub target
    pub scrub_seconds: Option<f64>,
    pub last_user_volume: f64,
    pub playback_rate: f64,
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            fraction: 0.0,
            scrubbing: false,
            scrub_was_playing: false,
            scrub_seconds: None,
            last_user_volume: 1.0,
            playback_rate: 1.0,
        }
    }
}

/// What the next metadata-loaded event should do to a freshly loaded source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct LoadFlags {
    pub reset_to_start: bool,
    pub force_pause: bool,
}

/// Options for attaching a (re)selected recording
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttachOptions {
    /// Keep the raw/processed choice on a same-recording refresh
    pub preserve_mode: bool,
    /// Seek back to the start even when the recording is unchanged
    pub reset_position: bool,
}

/// Everything the transport controls display
#[derive(Debug, Clone, PartialEq)]
pub struct TransportSnapshot {
    pub phase: TransportPhase,
    pub playing: bool,
    pub position_seconds: f64,
    pub duration_seconds: Option<f64>,
    pub fraction: f64,
    /// "elapsed / total"
    pub time_text: String,
    pub scrubbing: bool,
    pub jogging: bool,
    pub muted: bool,
    pub volume: f64,
    pub playback_rate: f64,
    pub rate_options: Vec<RateOption>,
    pub source_mode: SourceMode,
    pub has_raw: bool,
    pub hint: Option<String>,
}

// ============================================================================
// Player
// ============================================================================

/// Single owner of the media element.
///
/// Nothing else touches the element's source, position or play state.
pub struct Player<M: MediaElement> {
    media: M,
    settings: PlayerSettings,
    phase: TransportPhase,
    transport: TransportState,
    source: PlaybackSourceState,
    load_flags: LoadFlags,
    cursor: CursorSync,
    jog: JogState,
    hooks: Box<dyn UiHooks>,
    waveform: Option<Arc<WaveformData>>,
    start_epoch: Option<f64>,
    next_frame: FrameHandle,
}

impl<M: MediaElement> Player<M> {
    pub fn new(media: M, settings: PlayerSettings, hooks: Box<dyn UiHooks>) -> Self {
        Self {
            media,
            settings,
            phase: TransportPhase::Idle,
            transport: TransportState::default(),
            source: PlaybackSourceState::default(),
            load_flags: LoadFlags::default(),
            cursor: CursorSync::default(),
            jog: JogState::default(),
            hooks,
            waveform: None,
            start_epoch: None,
            next_frame: 0,
        }
    }

    /// Point the player at a selected recording.
    ///
    /// A new recording loads its processed source from the start. A
    /// same-recording refresh keeps the loaded source and position unless the
    /// source has to change or `reset_position` is set.
    pub fn attach(&mut self, recording: &Recording, options: AttachOptions) {
        self.start_epoch = recording.start_epoch;

        let same = self.source.record_path.as_deref() == Some(recording.path.as_str());
        if !same {
            log::debug!("Attaching {}", recording.path);
            self.cancel_jog(false);
            self.cursor.stop();
            self.transport.fraction = 0.0;
            self.transport.scrubbing = false;
            self.transport.scrub_was_playing = false;
            self.transport.scrub_seconds = None;
            self.source = PlaybackSourceState::for_recording(recording);
            self.load_source(LoadFlags {
                reset_to_start: true,
                force_pause: true,
            });
            self.notify();
            return;
        }

        self.source.refresh(recording, options.preserve_mode);
        if self.source.needs_reload() {
            // Mode or path changed under a live source: switch in place
            self.switch_loaded_source();
        } else if options.reset_position && self.phase == TransportPhase::Active {
            self.seek_to(0.0);
        }
        self.notify();
    }

    /// No recording selected: unload and reset everything
    pub fn detach(&mut self) {
        if self.phase == TransportPhase::Idle && self.source.record_path.is_none() {
            return;
        }
        log::debug!("Detaching player");
        self.cancel_jog(false);
        self.cursor.stop();
        if let Err(e) = self.media.pause() {
            log::debug!("Pause on detach failed: {}", e);
        }
        self.media.set_source(None);
        self.media.set_playback_rate(1.0);

        self.phase = TransportPhase::Idle;
        self.transport = TransportState::default();
        self.source = PlaybackSourceState::default();
        self.load_flags = LoadFlags::default();
        self.waveform = None;
        self.start_epoch = None;
        self.notify();
    }

    /// Forward a media element event
    pub fn handle_media_event(&mut self, event: MediaEvent) {
        if self.phase == TransportPhase::Idle {
            return;
        }

        match event {
            MediaEvent::LoadedMetadata => self.on_loaded_metadata(),
            MediaEvent::Error(message) => self.on_source_error(&message),
            MediaEvent::Playing => {
                self.start_cursor();
                self.notify();
            }
            MediaEvent::Paused | MediaEvent::Ended => {
                self.cursor.stop();
                if !self.transport.scrubbing {
                    self.sync_cursor_to_media();
                }
                self.notify();
            }
            MediaEvent::TimeUpdate => {
                if !self.cursor.is_running() && !self.transport.scrubbing && !self.jog.is_active() {
                    self.sync_cursor_to_media();
                }
            }
        }
    }

    /// One animation frame. Returns true while another frame is wanted.
    pub fn on_animation_frame(&mut self, now_ms: f64) -> bool {
        let mut wants_frame = false;

        if self.jog.is_active() {
            wants_frame |= self.jog_tick(now_ms);
        }

        if self.cursor.is_running() {
            if self.cursor_may_run() {
                let view = self.cursor.on_tick(
                    self.media.current_time(),
                    known_duration(&self.media),
                    self.waveform.as_deref(),
                    self.start_epoch,
                );
                self.transport.fraction = view.fraction;
                self.hooks.cursor_moved(&view);
                wants_frame = true;
            } else {
                self.cursor.stop();
            }
        }

        wants_frame
    }

    /// Current transport state for the controls
    pub fn snapshot(&self) -> TransportSnapshot {
        let duration = known_duration(&self.media);
        let position = self.position_seconds();
        let total = duration.map(format_elapsed).unwrap_or_else(|| "-:--".to_string());

        TransportSnapshot {
            phase: self.phase,
            playing: self.is_playing(),
            position_seconds: position,
            duration_seconds: duration,
            fraction: self.transport.fraction,
            time_text: format!("{} / {}", format_elapsed(position), total),
            scrubbing: self.transport.scrubbing,
            jogging: self.jog.is_active(),
            muted: self.media.muted(),
            volume: self.media.volume(),
            playback_rate: self.transport.playback_rate,
            rate_options: self.rate_options(),
            source_mode: self.source.mode,
            has_raw: self.source.has_raw,
            hint: self.source.hint.clone(),
        }
    }

    pub fn phase(&self) -> TransportPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == TransportPhase::Active
    }

    /// Playing means a playable source that is neither paused nor ended
    pub fn is_playing(&self) -> bool {
        self.is_active() && is_playing(&self.media)
    }

    pub fn fraction(&self) -> f64 {
        self.transport.fraction
    }

    pub fn is_scrubbing(&self) -> bool {
        self.transport.scrubbing
    }

    pub fn duration(&self) -> Option<f64> {
        known_duration(&self.media)
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    pub fn source_state(&self) -> &PlaybackSourceState {
        &self.source
    }

    pub fn cursor(&self) -> &CursorSync {
        &self.cursor
    }

    pub fn hooks_mut(&mut self) -> &mut dyn UiHooks {
        self.hooks.as_mut()
    }

    /// New waveform for the cursor's RMS readout
    pub fn set_waveform(&mut self, waveform: Option<Arc<WaveformData>>) {
        self.waveform = waveform;
    }

    /// Waveform container shown or hidden
    pub fn set_visible(&mut self, visible: bool) {
        self.cursor.set_visible(visible);
        if visible && self.is_playing() {
            self.start_cursor();
        }
    }

    /// Waveform container width in CSS pixels
    pub fn set_cursor_width(&mut self, width_px: f64) {
        self.cursor.set_width(width_px);
    }

    // ------------------------------------------------------------------------
    // Internals shared by the submodules
    // ------------------------------------------------------------------------

    pub(crate) fn notify(&mut self) {
        let snapshot = self.snapshot();
        self.hooks.transport_changed(&snapshot);
    }

    pub(crate) fn request_frame(&mut self) -> FrameHandle {
        self.next_frame += 1;
        self.next_frame
    }

    /// Position shown to the user, honoring an uncommitted scrub
    pub(crate) fn position_seconds(&self) -> f64 {
        if self.transport.scrubbing {
            if let Some(secs) = self.transport.scrub_seconds {
                return secs;
            }
        }
        let t = self.media.current_time();
        if t.is_finite() {
            t.max(0.0)
        } else {
            0.0
        }
    }

    pub(crate) fn start_cursor(&mut self) {
        if self.cursor_may_run() {
            let handle = self.request_frame();
            self.cursor.start(handle);
        }
    }

    fn cursor_may_run(&self) -> bool {
        self.is_playing() && self.cursor.is_visible() && !self.transport.scrubbing
    }

    /// Best-effort seek that also moves the cursor
    pub(crate) fn seek_to(&mut self, seconds: f64) {
        if let Err(e) = self.media.set_current_time(seconds) {
            log::debug!("Seek to {:.3}s failed: {}", seconds, e);
        }
        self.sync_cursor_to_media();
    }

    /// Best-effort play; a rejection leaves the transport paused
    pub(crate) fn try_play(&mut self) {
        if let Err(e) = self.media.play() {
            log::debug!("Playback request rejected: {}", e);
            return;
        }
        self.start_cursor();
    }

    pub(crate) fn try_pause(&mut self) {
        if let Err(e) = self.media.pause() {
            log::debug!("Pause failed: {}", e);
        }
        self.cursor.stop();
    }

    pub(crate) fn sync_cursor_to_media(&mut self) {
        let view = self.cursor.on_tick(
            self.media.current_time(),
            known_duration(&self.media),
            self.waveform.as_deref(),
            self.start_epoch,
        );
        self.transport.fraction = view.fraction;
        self.hooks.cursor_moved(&view);
    }

    pub(crate) fn move_cursor_to(&mut self, fraction: f64) {
        let view = self.cursor.set_fraction(
            fraction,
            known_duration(&self.media),
            self.waveform.as_deref(),
            self.start_epoch,
        );
        self.transport.fraction = view.fraction;
        self.hooks.cursor_moved(&view);
    }

    /// Hand the current source to the media element
    pub(crate) fn load_source(&mut self, flags: LoadFlags) {
        self.load_flags = flags;
        self.phase = TransportPhase::Ready;
        let src = self.source.current_src();
        log::debug!("Loading {:?} source {:?}", self.source.mode, src);
        self.media.set_source(src.as_deref());
        self.source.loaded_src = src;
    }

    fn on_loaded_metadata(&mut self) {
        let was_ready = self.phase == TransportPhase::Ready;
        self.phase = TransportPhase::Active;
        self.media.set_playback_rate(self.transport.playback_rate);

        if self.source.switch_pending {
            self.restore_after_switch();
        } else if was_ready {
            let flags = std::mem::take(&mut self.load_flags);
            if flags.reset_to_start {
                if let Err(e) = self.media.set_current_time(0.0) {
                    log::debug!("Reset to start failed: {}", e);
                }
            }
            if flags.force_pause {
                self.try_pause();
            }
        }

        self.sync_cursor_to_media();
        if self.is_playing() {
            self.start_cursor();
        }
        self.notify();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_harness::{FakeMedia, RecordingHooks};

    pub(super) fn recording(path: &str) -> Recording {
        let mut rec = Recording::new(path);
        rec.duration_seconds = Some(60.0);
        rec
    }

    /// Player with `path` attached and its metadata loaded
    pub(super) fn active_player(path: &str) -> (Player<FakeMedia>, FakeMedia, RecordingHooks) {
        let media = FakeMedia::new();
        let hooks = RecordingHooks::new();
        let mut player = Player::new(media.clone(), PlayerSettings::default(), Box::new(hooks.clone()));
        player.attach(&recording(path), AttachOptions::default());
        media.load_metadata();
        player.handle_media_event(MediaEvent::LoadedMetadata);
        (player, media, hooks)
    }

    #[test]
    fn test_phases() {
        let media = FakeMedia::new();
        let mut player = Player::new(media.clone(), PlayerSettings::default(), Box::new(NoopHooks));
        assert_eq!(player.phase(), TransportPhase::Idle);

        player.attach(&recording("a.opus"), AttachOptions::default());
        assert_eq!(player.phase(), TransportPhase::Ready);
        assert_eq!(media.src().as_deref(), Some("a.opus"));

        media.load_metadata();
        player.handle_media_event(MediaEvent::LoadedMetadata);
        assert_eq!(player.phase(), TransportPhase::Active);
        assert_eq!(player.duration(), Some(60.0));

        player.detach();
        assert_eq!(player.phase(), TransportPhase::Idle);
        assert_eq!(media.src(), None);
    }

    #[test]
    fn test_events_ignored_when_idle() {
        let media = FakeMedia::new();
        let hooks = RecordingHooks::new();
        let mut player = Player::new(media, PlayerSettings::default(), Box::new(hooks.clone()));
        player.handle_media_event(MediaEvent::LoadedMetadata);
        assert_eq!(player.phase(), TransportPhase::Idle);
        assert!(hooks.log().snapshots.is_empty());
    }

    #[test]
    fn test_cursor_loop_runs_only_while_playing() {
        let (mut player, media, hooks) = active_player("a.opus");
        assert!(!player.on_animation_frame(0.0));

        player.play();
        assert!(player.cursor().is_running());
        media.advance(30.0);
        assert!(player.on_animation_frame(16.0));
        assert_eq!(hooks.last_cursor().unwrap().fraction, 0.5);

        media.state_mut().paused = true;
        assert!(!player.on_animation_frame(32.0));
        assert!(!player.cursor().is_running());
    }

    #[test]
    fn test_hidden_waveform_stops_cursor() {
        let (mut player, _media, _hooks) = active_player("a.opus");
        player.play();
        player.set_visible(false);
        assert!(!player.on_animation_frame(0.0));

        player.set_visible(true);
        assert!(player.cursor().is_running());
    }

    #[test]
    fn test_ended_event_moves_cursor_to_end() {
        let (mut player, media, hooks) = active_player("a.opus");
        player.play();
        media.advance(120.0);
        player.handle_media_event(MediaEvent::Ended);

        assert!(!player.cursor().is_running());
        assert_eq!(player.fraction(), 1.0);
        assert!(!hooks.last_snapshot().unwrap().playing);
    }

    #[test]
    fn test_same_recording_reattach_keeps_position() {
        let (mut player, media, _hooks) = active_player("a.opus");
        player.skip(20.0);
        let loads = media.state().sources.len();

        player.attach(&recording("a.opus"), AttachOptions::default());
        assert_eq!(media.state().sources.len(), loads);
        assert_eq!(media.time(), 20.0);
        assert!(player.is_active());

        player.attach(
            &recording("a.opus"),
            AttachOptions {
                reset_position: true,
                ..Default::default()
            },
        );
        assert_eq!(media.time(), 0.0);
    }

    #[test]
    fn test_new_recording_starts_paused_at_zero() {
        let (mut player, media, _hooks) = active_player("a.opus");
        player.skip(10.0);
        player.play();

        player.attach(&recording("b.opus"), AttachOptions::default());
        media.load_metadata();
        player.handle_media_event(MediaEvent::LoadedMetadata);

        assert_eq!(media.src().as_deref(), Some("b.opus"));
        assert_eq!(media.time(), 0.0);
        assert!(media.is_paused());
        assert_eq!(player.fraction(), 0.0);
    }

    #[test]
    fn test_time_update_follows_external_seek_while_paused() {
        let (mut player, media, hooks) = active_player("a.opus");
        media.state_mut().current_time = 15.0;
        player.handle_media_event(MediaEvent::TimeUpdate);

        assert_eq!(player.fraction(), 0.25);
        assert_eq!(hooks.last_cursor().unwrap().fraction, 0.25);
    }

    #[test]
    fn test_time_update_ignored_while_cursor_runs() {
        let (mut player, media, _hooks) = active_player("a.opus");
        player.play();
        media.state_mut().current_time = 15.0;
        player.handle_media_event(MediaEvent::TimeUpdate);
        assert_eq!(player.fraction(), 0.0);
    }

    #[test]
    fn test_time_update_ignored_while_scrubbing() {
        let (mut player, media, hooks) = active_player("a.opus");
        player.begin_scrub();
        player.update_scrub(0.75);

        media.state_mut().current_time = 15.0;
        player.handle_media_event(MediaEvent::TimeUpdate);
        assert_eq!(player.fraction(), 0.75);
        assert_eq!(hooks.last_cursor().unwrap().fraction, 0.75);
    }

    #[test]
    fn test_time_update_ignored_while_jogging() {
        let (mut player, media, _hooks) = active_player("a.opus");
        assert!(player.jog_key_down(JogKey::Forward, false));

        media.state_mut().current_time = 15.0;
        player.handle_media_event(MediaEvent::TimeUpdate);
        assert_eq!(player.fraction(), 0.0);
    }

    #[test]
    fn test_paused_event_stops_cursor_and_syncs() {
        let (mut player, media, hooks) = active_player("a.opus");
        player.play();
        media.advance(30.0);
        media.state_mut().paused = true;
        player.handle_media_event(MediaEvent::Paused);

        assert!(!player.cursor().is_running());
        assert_eq!(player.fraction(), 0.5);
        assert!(!hooks.last_snapshot().unwrap().playing);
    }

    #[test]
    fn test_paused_event_keeps_scrub_cursor() {
        let (mut player, media, _hooks) = active_player("a.opus");
        player.play();
        player.begin_scrub();
        player.update_scrub(0.75);

        media.state_mut().current_time = 15.0;
        player.handle_media_event(MediaEvent::Paused);
        assert!(!player.cursor().is_running());
        assert_eq!(player.fraction(), 0.75);
    }

    #[test]
    fn test_snapshot_time_text() {
        let (mut player, _media, hooks) = active_player("a.opus");
        player.skip(65.0);
        let snap = hooks.last_snapshot().unwrap();
        assert_eq!(snap.time_text, "1:00 / 1:00");
        assert_eq!(snap.phase, TransportPhase::Active);
        assert_eq!(snap.source_mode, SourceMode::Processed);
    }
}
