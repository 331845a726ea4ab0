// Transport controls: play/pause, scrub, skip, volume and rate
//
// Every operation is a no-op unless the player has a playable source.
// Media calls are best-effort; the snapshot reports what the element
// actually does, not what was asked of it.

use super::{is_playing, known_duration, MediaElement, Player};

/// Rates closer than this are the same option
const RATE_MATCH_EPSILON: f64 = 1e-6;

/// One entry of the playback-rate selector
#[derive(Debug, Clone, PartialEq)]
pub struct RateOption {
    pub value: f64,
    pub label: String,
    pub selected: bool,
    /// Added because the current rate is not one of the configured options
    pub synthesized: bool,
}

/// Selector label for a rate, e.g. "1.25×"
pub fn rate_label(rate: f64) -> String {
    format!("{}×", (rate * 100.0).round() / 100.0)
}

impl<M: MediaElement> Player<M> {
    pub fn toggle_play(&mut self) {
        if !self.is_active() {
            return;
        }
        if is_playing(&self.media) {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Request playback. An ended source starts over.
    pub fn play(&mut self) {
        if !self.is_active() || self.transport.scrubbing || self.jog.is_active() {
            return;
        }
        if self.media.ended() {
            if let Err(e) = self.media.set_current_time(0.0) {
                log::debug!("Rewind before replay failed: {}", e);
            }
        }
        self.try_play();
        self.notify();
    }

    pub fn pause(&mut self) {
        if !self.is_active() {
            return;
        }
        self.try_pause();
        self.sync_cursor_to_media();
        self.notify();
    }

    // ------------------------------------------------------------------------
    // Scrub
    // ------------------------------------------------------------------------

    /// Pointer down on the position slider
    pub fn begin_scrub(&mut self) {
        if !self.is_active() || self.transport.scrubbing {
            return;
        }
        self.cancel_jog(false);

        self.transport.scrub_was_playing = is_playing(&self.media);
        if self.transport.scrub_was_playing {
            self.try_pause();
        }
        self.cursor.stop();
        self.transport.scrubbing = true;
        self.transport.scrub_seconds = Some(self.position_seconds());
        self.notify();
    }

    /// Pointer moved: update the cursor and clock without seeking
    pub fn update_scrub(&mut self, fraction: f64) {
        if !self.is_active() || !self.transport.scrubbing {
            return;
        }
        let Some(duration) = known_duration(&self.media) else {
            return;
        };
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        self.transport.scrub_seconds = Some(fraction * duration);
        self.move_cursor_to(fraction);
        self.notify();
    }

    /// Pointer released: seek once and resume if playing before
    pub fn commit_scrub(&mut self) {
        if !self.transport.scrubbing {
            return;
        }
        let target = self.transport.scrub_seconds.take();
        let resume = std::mem::take(&mut self.transport.scrub_was_playing);
        self.transport.scrubbing = false;

        if !self.is_active() {
            return;
        }
        if let Some(seconds) = target {
            self.seek_to(seconds);
        }
        if resume {
            self.try_play();
        }
        self.notify();
    }

    // ------------------------------------------------------------------------
    // Seeks
    // ------------------------------------------------------------------------

    /// Relative seek, clamped to the recording
    pub fn skip(&mut self, offset_seconds: f64) {
        if !self.is_active() || !offset_seconds.is_finite() {
            return;
        }
        let Some(duration) = known_duration(&self.media) else {
            return;
        };
        let target = (self.media.current_time() + offset_seconds).clamp(0.0, duration);
        self.seek_to(target);
        self.notify();
    }

    /// Skip back by the configured step
    pub fn skip_back(&mut self) {
        self.skip(-self.settings.skip_secs);
    }

    /// Skip forward by the configured step
    pub fn skip_forward(&mut self) {
        self.skip(self.settings.skip_secs);
    }

    pub fn restart(&mut self) {
        if !self.is_active() {
            return;
        }
        self.seek_to(0.0);
        self.notify();
    }

    pub fn jump_to_end(&mut self) {
        if !self.is_active() {
            return;
        }
        let Some(duration) = known_duration(&self.media) else {
            return;
        };
        self.seek_to(duration);
        self.notify();
    }

    // ------------------------------------------------------------------------
    // Volume
    // ------------------------------------------------------------------------

    /// Unmuting from zero volume restores the last volume the user chose
    pub fn toggle_mute(&mut self) {
        if !self.is_active() {
            return;
        }
        if self.media.muted() || self.media.volume() <= 0.0 {
            self.media.set_muted(false);
            if self.media.volume() <= 0.0 {
                self.media.set_volume(self.transport.last_user_volume);
            }
        } else {
            self.media.set_muted(true);
        }
        self.notify();
    }

    /// Set volume in [0, 1]. Anything above zero also unmutes.
    pub fn set_volume(&mut self, volume: f64) {
        if !self.is_active() || !volume.is_finite() {
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        self.media.set_volume(volume);
        if volume > 0.0 {
            self.transport.last_user_volume = volume;
            if self.media.muted() {
                self.media.set_muted(false);
            }
        }
        self.notify();
    }

    // ------------------------------------------------------------------------
    // Playback rate
    // ------------------------------------------------------------------------

    /// Set the playback rate, clamped to the configured range
    pub fn set_playback_rate(&mut self, rate: f64) {
        if !self.is_active() || !rate.is_finite() || rate <= 0.0 {
            return;
        }
        let rate = rate.clamp(self.settings.rate_min, self.settings.rate_max);
        self.transport.playback_rate = rate;
        self.media.set_playback_rate(rate);
        self.notify();
    }

    pub fn playback_rate(&self) -> f64 {
        self.transport.playback_rate
    }

    /// Configured rates plus the current rate if it isn't one of them
    pub fn rate_options(&self) -> Vec<RateOption> {
        let current = self.transport.playback_rate;
        let mut options: Vec<RateOption> = self
            .settings
            .rate_options
            .iter()
            .map(|&value| RateOption {
                value,
                label: rate_label(value),
                selected: (value - current).abs() < RATE_MATCH_EPSILON,
                synthesized: false,
            })
            .collect();

        if !options.iter().any(|o| o.selected) {
            options.push(RateOption {
                value: current,
                label: rate_label(current),
                selected: true,
                synthesized: true,
            });
            options.sort_by(|a, b| a.value.total_cmp(&b.value));
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::tests::active_player;
    use crate::playback::{AttachOptions, NoopHooks, PlayerSettings};
    use crate::test_harness::FakeMedia;

    #[test]
    fn test_operations_are_noops_until_active() {
        let media = FakeMedia::new();
        let mut player = Player::new(media.clone(), PlayerSettings::default(), Box::new(NoopHooks));

        player.toggle_play();
        player.skip(5.0);
        player.set_volume(0.2);
        player.begin_scrub();
        assert_eq!(media.state().play_calls, 0);
        assert_eq!(media.state().volume, 1.0);
        assert!(!player.is_scrubbing());

        let mut rec = crate::session::Recording::new("a.opus");
        rec.duration_seconds = Some(60.0);
        player.attach(&rec, AttachOptions::default());
        player.toggle_play();
        assert_eq!(media.state().play_calls, 0);
    }

    #[test]
    fn test_toggle_play() {
        let (mut player, media, hooks) = active_player("a.opus");
        player.toggle_play();
        assert!(!media.is_paused());
        assert!(hooks.last_snapshot().unwrap().playing);

        player.toggle_play();
        assert!(media.is_paused());
        assert!(!hooks.last_snapshot().unwrap().playing);
    }

    #[test]
    fn test_rejected_play_reports_paused() {
        let (mut player, media, hooks) = active_player("a.opus");
        media.state_mut().reject_play = true;

        player.toggle_play();
        assert_eq!(media.state().play_calls, 1);
        assert!(!hooks.last_snapshot().unwrap().playing);
        assert!(!player.cursor().is_running());
    }

    #[test]
    fn test_play_after_end_restarts() {
        let (mut player, media, _hooks) = active_player("a.opus");
        player.play();
        media.advance(100.0);
        assert!(media.state().ended);

        player.toggle_play();
        assert_eq!(media.time(), 0.0);
        assert!(player.is_playing());
    }

    #[test]
    fn test_scrub_round_trip_resumes_playback() {
        let (mut player, media, hooks) = active_player("a.opus");
        player.play();

        player.begin_scrub();
        assert!(media.is_paused());
        let seeks_before = media.state().seeks.len();

        player.update_scrub(0.25);
        player.update_scrub(0.75);
        assert_eq!(media.state().seeks.len(), seeks_before);
        assert_eq!(hooks.last_cursor().unwrap().fraction, 0.75);
        assert_eq!(hooks.last_snapshot().unwrap().position_seconds, 45.0);

        player.commit_scrub();
        assert!((media.time() - 45.0).abs() < 1e-9);
        assert!(player.is_playing());
        assert!(!player.is_scrubbing());
    }

    #[test]
    fn test_scrub_while_paused_stays_paused() {
        let (mut player, media, _hooks) = active_player("a.opus");
        player.begin_scrub();
        player.update_scrub(0.5);
        player.commit_scrub();

        assert!((media.time() - 30.0).abs() < 1e-9);
        assert!(media.is_paused());
    }

    #[test]
    fn test_skip_clamps_and_preserves_state() {
        let (mut player, media, _hooks) = active_player("a.opus");
        player.skip(-10.0);
        assert_eq!(media.time(), 0.0);

        player.play();
        player.skip(50.0);
        player.skip_forward();
        assert_eq!(media.time(), 55.0);
        assert!(player.is_playing());

        player.skip_back();
        assert_eq!(media.time(), 50.0);

        player.jump_to_end();
        assert_eq!(media.time(), 60.0);
        player.restart();
        assert_eq!(media.time(), 0.0);
        assert!(player.is_playing());
    }

    #[test]
    fn test_mute_restores_last_volume() {
        let (mut player, media, _hooks) = active_player("a.opus");
        player.set_volume(0.6);
        player.set_volume(0.0);
        assert!(!media.state().muted);

        player.toggle_mute();
        assert_eq!(media.state().volume, 0.6);
        assert!(!media.state().muted);

        player.toggle_mute();
        assert!(media.state().muted);
        player.set_volume(0.3);
        assert!(!media.state().muted);
        assert_eq!(media.state().volume, 0.3);
    }

    #[test]
    fn test_rate_clamped() {
        let (mut player, media, _hooks) = active_player("a.opus");
        player.set_playback_rate(10.0);
        assert_eq!(media.state().playback_rate, 4.0);
        player.set_playback_rate(0.01);
        assert_eq!(player.playback_rate(), 0.25);
        player.set_playback_rate(f64::NAN);
        assert_eq!(player.playback_rate(), 0.25);
    }

    #[test]
    fn test_unlisted_rate_gets_synthesized_option() {
        let (mut player, _media, _hooks) = active_player("a.opus");
        let options = player.rate_options();
        assert_eq!(options.len(), 6);
        assert!(options.iter().any(|o| o.selected && o.value == 1.0 && o.label == "1×"));

        player.set_playback_rate(1.1);
        let options = player.rate_options();
        assert_eq!(options.len(), 7);
        let synthesized: Vec<_> = options.iter().filter(|o| o.synthesized).collect();
        assert_eq!(synthesized.len(), 1);
        assert_eq!(synthesized[0].label, "1.1×");
        assert!(synthesized[0].selected);
        assert_eq!(options[3].value, 1.1);
    }

    #[test]
    fn test_rate_label() {
        assert_eq!(rate_label(0.5), "0.5×");
        assert_eq!(rate_label(1.25), "1.25×");
        assert_eq!(rate_label(2.0), "2×");
    }
}
