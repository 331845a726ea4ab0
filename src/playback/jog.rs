// Keyboard jog - continuous seeking while a direction key is held

use super::{is_playing, known_duration, FrameHandle, MediaElement, Player};

/// Longest frame gap a jog step will integrate over
const MAX_JOG_FRAME_SECS: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JogKey {
    Back,
    Forward,
}

impl JogKey {
    fn direction(self) -> i8 {
        match self {
            JogKey::Back => -1,
            JogKey::Forward => 1,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct JogState {
    /// Held keys, most recent last
    held: Vec<JogKey>,
    direction: i8,
    handle: Option<FrameHandle>,
    last_frame_ms: Option<f64>,
    /// Playback was running when the jog began
    resume_after: bool,
}

impl JogState {
    pub(crate) fn is_active(&self) -> bool {
        self.handle.is_some()
    }
}

impl<M: MediaElement> Player<M> {
    /// A direction key went down. Returns true if the key was consumed.
    ///
    /// Keys are ignored while an editable control has focus.
    pub fn jog_key_down(&mut self, key: JogKey, editable_focused: bool) -> bool {
        if editable_focused || !self.is_active() || self.transport.scrubbing {
            return false;
        }
        if self.jog.held.contains(&key) {
            // Auto-repeat
            return true;
        }

        self.jog.held.push(key);
        self.jog.direction = key.direction();

        if !self.jog.is_active() {
            self.jog.resume_after = is_playing(&self.media);
            self.try_pause();
            self.jog.last_frame_ms = None;
            self.jog.handle = Some(self.request_frame());
            log::debug!("Jog started ({:?}), resume after: {}", key, self.jog.resume_after);
            self.notify();
        }
        true
    }

    /// A direction key came up. The other key, if still held, takes over.
    pub fn jog_key_up(&mut self, key: JogKey) -> bool {
        let before = self.jog.held.len();
        self.jog.held.retain(|k| *k != key);
        if self.jog.held.len() == before {
            return false;
        }

        match self.jog.held.last().copied() {
            Some(remaining) => self.jog.direction = remaining.direction(),
            None => self.cancel_jog(true),
        }
        true
    }

    /// Window lost focus: stop jogging and leave playback paused
    pub fn window_blur(&mut self) {
        self.jog.held.clear();
        self.cancel_jog(false);
    }

    pub fn is_jogging(&self) -> bool {
        self.jog.is_active()
    }

    /// -1, 0 or 1
    pub fn jog_direction(&self) -> i8 {
        self.jog.direction
    }

    /// Stop the jog loop, optionally resuming playback
    pub(crate) fn cancel_jog(&mut self, resume: bool) {
        if self.jog.handle.take().is_none() {
            return;
        }
        self.jog.held.clear();
        self.jog.direction = 0;
        self.jog.last_frame_ms = None;
        let resume_after = std::mem::take(&mut self.jog.resume_after);
        log::debug!("Jog stopped, resuming: {}", resume && resume_after);

        if resume && resume_after && self.is_active() {
            self.try_play();
        }
        self.notify();
    }

    /// One jog frame. Returns false once the loop has ended.
    pub(crate) fn jog_tick(&mut self, now_ms: f64) -> bool {
        let duration = known_duration(&self.media);
        let (Some(duration), true, true) = (duration, self.is_active(), self.jog.direction != 0) else {
            self.cancel_jog(false);
            return false;
        };

        let dt = match self.jog.last_frame_ms {
            Some(last) => ((now_ms - last) / 1000.0).clamp(0.0, MAX_JOG_FRAME_SECS),
            None => 0.0,
        };
        self.jog.last_frame_ms = Some(now_ms);

        if dt > 0.0 {
            let step = self.settings.jog_rate * dt * f64::from(self.jog.direction);
            let target = (self.media.current_time() + step).clamp(0.0, duration);
            self.seek_to(target);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::tests::active_player;

    #[test]
    fn test_jog_forward_accumulates() {
        let (mut player, media, _hooks) = active_player("a.opus");
        player.skip(10.0);

        assert!(player.jog_key_down(JogKey::Forward, false));
        assert!(player.is_jogging());
        assert!(player.on_animation_frame(1000.0));
        assert!(player.on_animation_frame(1100.0));
        assert!(player.on_animation_frame(1200.0));
        assert!((media.time() - 10.8).abs() < 1e-9);

        player.jog_key_up(JogKey::Forward);
        assert!(!player.is_jogging());
        assert!(!player.on_animation_frame(1300.0));
    }

    #[test]
    fn test_stalled_frame_is_clamped() {
        let (mut player, media, _hooks) = active_player("a.opus");
        player.skip(30.0);
        player.jog_key_down(JogKey::Back, false);
        player.on_animation_frame(0.0);
        player.on_animation_frame(5000.0);
        assert!((media.time() - 29.0).abs() < 1e-9);
    }

    #[test]
    fn test_jog_pauses_then_resumes() {
        let (mut player, media, _hooks) = active_player("a.opus");
        player.play();

        player.jog_key_down(JogKey::Forward, false);
        assert!(media.is_paused());

        player.jog_key_up(JogKey::Forward);
        assert!(player.is_playing());
    }

    #[test]
    fn test_last_pressed_direction_wins() {
        let (mut player, _media, _hooks) = active_player("a.opus");
        player.jog_key_down(JogKey::Forward, false);
        player.jog_key_down(JogKey::Back, false);
        assert_eq!(player.jog_direction(), -1);

        player.jog_key_up(JogKey::Back);
        assert!(player.is_jogging());
        assert_eq!(player.jog_direction(), 1);

        player.jog_key_up(JogKey::Forward);
        assert!(!player.is_jogging());
        assert_eq!(player.jog_direction(), 0);
    }

    #[test]
    fn test_blur_cancels_without_resuming() {
        for playing in [true, false] {
            let (mut player, media, _hooks) = active_player("a.opus");
            if playing {
                player.play();
            }
            player.jog_key_down(JogKey::Forward, false);
            player.window_blur();

            assert!(!player.is_jogging());
            assert!(media.is_paused());
            // A late key-up must not resume either
            assert!(!player.jog_key_up(JogKey::Forward));
            assert!(media.is_paused());
        }
    }

    #[test]
    fn test_ignored_while_editing() {
        let (mut player, _media, _hooks) = active_player("a.opus");
        assert!(!player.jog_key_down(JogKey::Forward, true));
        assert!(!player.is_jogging());
    }

    #[test]
    fn test_loop_self_terminates_when_source_goes_away() {
        let (mut player, media, _hooks) = active_player("a.opus");
        player.jog_key_down(JogKey::Forward, false);
        media.state_mut().duration = f64::NAN;
        assert!(!player.on_animation_frame(16.0));
        assert!(!player.is_jogging());
    }
}
