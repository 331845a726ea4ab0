// Playback source switching between processed and raw audio
//
// A switch captures position and play state, swaps the element's source and
// restores both once the new source reports its metadata. A failing raw
// source falls back to processed once.

use super::{known_duration, LoadFlags, MediaElement, Player, TransportPhase};
use crate::session::Recording;

/// Keep restored positions this far below the end so the element doesn't
/// immediately report `ended`
const RESTORE_END_MARGIN_SECS: f64 = 0.01;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SourceMode {
    #[default]
    Processed,
    Raw,
}

/// Options for `Player::set_source`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSwitchOptions {
    /// Reload even if the mode is already active
    pub force: bool,
    /// Fall back to processed if the raw source fails to load
    pub allow_fallback: bool,
}

impl Default for SourceSwitchOptions {
    fn default() -> Self {
        Self {
            force: false,
            allow_fallback: true,
        }
    }
}

/// Which variant of the selected recording is loaded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackSourceState {
    pub mode: SourceMode,
    pub has_raw: bool,
    pub raw_path: Option<String>,
    pub record_path: Option<String>,
    /// Position to restore once the new source is ready
    pub pending_seek_seconds: Option<f64>,
    /// Resume playback once the new source is ready
    pub pending_play: bool,
    /// User-facing note about the source (missing raw, failed load)
    pub hint: Option<String>,
    pub(crate) loaded_src: Option<String>,
    pub(crate) switch_pending: bool,
    pub(crate) fallback_allowed: bool,
    pub(crate) fallback_used: bool,
}

impl PlaybackSourceState {
    pub(crate) fn for_recording(recording: &Recording) -> Self {
        Self {
            has_raw: recording.has_raw(),
            raw_path: recording.raw_path().map(str::to_string),
            record_path: Some(recording.path.clone()),
            fallback_allowed: true,
            ..Default::default()
        }
    }

    /// Same recording, fresh metadata
    pub(crate) fn refresh(&mut self, recording: &Recording, preserve_mode: bool) {
        self.has_raw = recording.has_raw();
        self.raw_path = recording.raw_path().map(str::to_string);
        if !preserve_mode || !self.has_raw {
            self.mode = SourceMode::Processed;
        }
    }

    /// Source path for the current mode
    pub fn current_src(&self) -> Option<String> {
        match self.mode {
            SourceMode::Raw => self.raw_path.clone(),
            SourceMode::Processed => self.record_path.clone(),
        }
    }

    /// The element holds a different source than the current mode wants
    pub(crate) fn needs_reload(&self) -> bool {
        self.current_src() != self.loaded_src
    }
}

impl<M: MediaElement> Player<M> {
    /// Switch between processed and raw audio.
    ///
    /// Returns true if a new source was handed to the media element.
    pub fn set_source(&mut self, mode: SourceMode, options: SourceSwitchOptions) -> bool {
        if self.phase == TransportPhase::Idle || self.source.record_path.is_none() {
            return false;
        }
        if mode == self.source.mode && !options.force {
            return false;
        }
        if mode == SourceMode::Raw && !self.source.has_raw {
            log::debug!("No raw audio for {:?}; staying on processed", self.source.record_path);
            self.source.hint = Some("Raw audio is not available for this recording".to_string());
            self.notify();
            return false;
        }

        self.source.mode = mode;
        self.source.fallback_allowed = options.allow_fallback;
        self.source.fallback_used = false;
        self.source.hint = None;
        self.switch_loaded_source();
        self.notify();
        true
    }

    /// Capture position and play state, then load the current mode's source
    pub(crate) fn switch_loaded_source(&mut self) {
        // A switch while another is still pending keeps the first capture
        if !self.source.switch_pending {
            if self.phase == TransportPhase::Active {
                self.source.pending_seek_seconds = Some(self.position_seconds());
                self.source.pending_play = self.is_playing();
            } else {
                self.source.pending_seek_seconds = None;
                self.source.pending_play = false;
            }
        }

        log::info!(
            "Switching to {:?} source at {:?}s (resume: {})",
            self.source.mode,
            self.source.pending_seek_seconds,
            self.source.pending_play
        );

        self.cancel_jog(false);
        self.transport.scrubbing = false;
        self.transport.scrub_was_playing = false;
        self.transport.scrub_seconds = None;
        self.try_pause();

        self.source.switch_pending = true;
        // Reset/pause-on-load would fight the restore
        self.load_source(LoadFlags::default());
    }

    /// New source is ready: put the captured position and play state back
    pub(crate) fn restore_after_switch(&mut self) {
        self.source.switch_pending = false;
        let seek = self.source.pending_seek_seconds.take();
        let play = std::mem::take(&mut self.source.pending_play);

        if let Some(seconds) = seek {
            let target = match known_duration(&self.media) {
                Some(d) => seconds.min(d - RESTORE_END_MARGIN_SECS).max(0.0),
                None => seconds.max(0.0),
            };
            if let Err(e) = self.media.set_current_time(target) {
                log::debug!("Restoring position {:.3}s failed: {}", target, e);
            }
        }
        if play {
            self.try_play();
        }
    }

    /// The loaded source failed
    pub(crate) fn on_source_error(&mut self, message: &str) {
        let can_fall_back = self.source.mode == SourceMode::Raw
            && self.source.fallback_allowed
            && !self.source.fallback_used;

        if can_fall_back {
            log::warn!("Raw source failed ({}); falling back to processed", message);
            self.source.fallback_used = true;
            self.source.mode = SourceMode::Processed;
            // A pending switch keeps its capture; a raw source that already
            // played hands over where it got to
            if !self.source.switch_pending && self.phase == TransportPhase::Active {
                self.source.pending_seek_seconds = Some(self.position_seconds());
                self.source.pending_play = self.is_playing();
                self.cancel_jog(false);
                self.transport.scrubbing = false;
                self.transport.scrub_was_playing = false;
                self.transport.scrub_seconds = None;
                self.try_pause();
            }
            self.source.switch_pending = true;
            self.load_source(self.load_flags);
            self.notify();
            return;
        }

        log::warn!("Playback source failed: {}", message);
        self.source.hint = Some(format!("Playback failed: {}", message));
        self.source.switch_pending = false;
        self.source.pending_seek_seconds = None;
        self.source.pending_play = false;
        self.cancel_jog(false);
        self.cursor.stop();
        self.phase = TransportPhase::Ready;
        self.notify();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::tests::active_player;
    use crate::playback::{AttachOptions, MediaEvent, NoopHooks, PlayerSettings};
    use crate::test_harness::FakeMedia;

    fn with_raw(path: &str) -> Recording {
        let mut rec = Recording::new(path);
        rec.duration_seconds = Some(60.0);
        rec.raw_audio_path = Some(format!("raw/{}", path));
        rec
    }

    fn active_with_raw() -> (Player<FakeMedia>, FakeMedia) {
        let media = FakeMedia::new();
        let mut player = Player::new(media.clone(), PlayerSettings::default(), Box::new(NoopHooks));
        player.attach(&with_raw("a.opus"), AttachOptions::default());
        media.load_metadata();
        player.handle_media_event(MediaEvent::LoadedMetadata);
        (player, media)
    }

    fn metadata(player: &mut Player<FakeMedia>, media: &FakeMedia) {
        media.load_metadata();
        player.handle_media_event(MediaEvent::LoadedMetadata);
    }

    #[test]
    fn test_switch_preserves_position_and_play_state() {
        let (mut player, media) = active_with_raw();
        player.skip(30.0);
        player.play();

        assert!(player.set_source(SourceMode::Raw, SourceSwitchOptions::default()));
        assert_eq!(media.src().as_deref(), Some("raw/a.opus"));
        assert!(media.is_paused());

        metadata(&mut player, &media);
        assert!((media.time() - 30.0).abs() <= 0.05);
        assert!(player.is_playing());

        assert!(player.set_source(SourceMode::Processed, SourceSwitchOptions::default()));
        metadata(&mut player, &media);
        assert_eq!(media.src().as_deref(), Some("a.opus"));
        assert!((media.time() - 30.0).abs() <= 0.05);
        assert!(player.is_playing());
    }

    #[test]
    fn test_same_mode_is_noop_unless_forced() {
        let (mut player, media) = active_with_raw();
        let loads = media.state().sources.len();

        assert!(!player.set_source(SourceMode::Processed, SourceSwitchOptions::default()));
        assert_eq!(media.state().sources.len(), loads);

        let forced = SourceSwitchOptions {
            force: true,
            ..Default::default()
        };
        assert!(player.set_source(SourceMode::Processed, forced));
        assert_eq!(media.state().sources.len(), loads + 1);
    }

    #[test]
    fn test_raw_without_variant_stays_processed() {
        let (mut player, media, _hooks) = active_player("a.opus");
        let loads = media.state().sources.len();

        assert!(!player.set_source(SourceMode::Raw, SourceSwitchOptions::default()));
        assert_eq!(player.source_state().mode, SourceMode::Processed);
        assert!(player.source_state().hint.is_some());
        assert_eq!(media.state().sources.len(), loads);
    }

    #[test]
    fn test_restore_clamped_below_duration() {
        let (mut player, media) = active_with_raw();
        player.jump_to_end();

        player.set_source(SourceMode::Raw, SourceSwitchOptions::default());
        media.state_mut().durations.insert("raw/a.opus".into(), 50.0);
        metadata(&mut player, &media);

        assert!((media.time() - 49.99).abs() < 1e-9);
    }

    #[test]
    fn test_raw_error_falls_back_once() {
        let (mut player, media) = active_with_raw();
        player.skip(12.0);
        player.play();

        player.set_source(SourceMode::Raw, SourceSwitchOptions::default());
        player.handle_media_event(MediaEvent::Error("decode error".into()));

        assert_eq!(player.source_state().mode, SourceMode::Processed);
        assert_eq!(media.src().as_deref(), Some("a.opus"));
        assert!(player.source_state().hint.is_none());

        metadata(&mut player, &media);
        assert!((media.time() - 12.0).abs() <= 0.05);
        assert!(player.is_playing());
    }

    #[test]
    fn test_raw_error_after_playing_keeps_position() {
        let (mut player, media) = active_with_raw();
        player.set_source(SourceMode::Raw, SourceSwitchOptions::default());
        metadata(&mut player, &media);
        assert_eq!(media.src().as_deref(), Some("raw/a.opus"));

        player.skip(30.0);
        player.play();
        player.handle_media_event(MediaEvent::Error("decode error".into()));
        assert_eq!(media.src().as_deref(), Some("a.opus"));

        metadata(&mut player, &media);
        assert!((media.time() - 30.0).abs() <= 0.05);
        assert!(player.is_playing());
        assert!(player.source_state().hint.is_none());
    }

    #[test]
    fn test_fallback_failure_surfaces_hint() {
        let (mut player, media) = active_with_raw();
        player.set_source(SourceMode::Raw, SourceSwitchOptions::default());
        player.handle_media_event(MediaEvent::Error("decode error".into()));
        player.handle_media_event(MediaEvent::Error("network error".into()));

        assert_eq!(player.phase(), TransportPhase::Ready);
        assert_eq!(
            player.source_state().hint.as_deref(),
            Some("Playback failed: network error")
        );
        // Only one fallback load was issued
        let loads: Vec<_> = media.state().sources.iter().flatten().cloned().collect();
        assert_eq!(loads, vec!["a.opus", "raw/a.opus", "a.opus"]);
    }

    #[test]
    fn test_no_fallback_when_disallowed() {
        let (mut player, _media) = active_with_raw();
        let options = SourceSwitchOptions {
            allow_fallback: false,
            ..Default::default()
        };
        player.set_source(SourceMode::Raw, options);
        player.handle_media_event(MediaEvent::Error("decode error".into()));

        assert_eq!(player.source_state().mode, SourceMode::Raw);
        assert!(player.source_state().hint.is_some());
    }

    #[test]
    fn test_preserve_mode_on_refresh() {
        let (mut player, media) = active_with_raw();
        player.set_source(SourceMode::Raw, SourceSwitchOptions::default());
        metadata(&mut player, &media);
        let loads = media.state().sources.len();

        let keep = AttachOptions {
            preserve_mode: true,
            ..Default::default()
        };
        player.attach(&with_raw("a.opus"), keep);
        assert_eq!(player.source_state().mode, SourceMode::Raw);
        assert_eq!(media.state().sources.len(), loads);

        // Without preserve_mode the refresh returns to processed, in place
        player.skip(7.0);
        player.attach(&with_raw("a.opus"), AttachOptions::default());
        assert_eq!(player.source_state().mode, SourceMode::Processed);
        metadata(&mut player, &media);
        assert_eq!(media.src().as_deref(), Some("a.opus"));
        assert!((media.time() - 7.0).abs() <= 0.05);
    }

    #[test]
    fn test_switch_suppresses_load_flags() {
        let media = FakeMedia::new();
        let mut player = Player::new(media.clone(), PlayerSettings::default(), Box::new(NoopHooks));
        player.attach(&with_raw("a.opus"), AttachOptions::default());
        metadata(&mut player, &media);
        player.skip(20.0);
        player.play();

        player.set_source(SourceMode::Raw, SourceSwitchOptions::default());
        metadata(&mut player, &media);
        // No reset-to-start or force-pause from the original load
        assert!((media.time() - 20.0).abs() <= 0.05);
        assert!(!media.is_paused());
    }
}
