// Scriptable media element

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::playback::{MediaElement, MediaError};

/// Duration reported for sources without an explicit one
pub const DEFAULT_FAKE_DURATION: f64 = 60.0;

#[derive(Debug)]
pub struct FakeMediaState {
    pub src: Option<String>,
    pub current_time: f64,
    /// NaN until `load_metadata` is called for the current source
    pub duration: f64,
    pub paused: bool,
    pub ended: bool,
    pub volume: f64,
    pub muted: bool,
    pub playback_rate: f64,
    /// Next `play()` calls are rejected like an autoplay policy would
    pub reject_play: bool,
    pub durations: HashMap<String, f64>,
    /// Every source assignment, in order
    pub sources: Vec<Option<String>>,
    /// Every successful seek target, in order
    pub seeks: Vec<f64>,
    pub play_calls: usize,
}

impl Default for FakeMediaState {
    fn default() -> Self {
        Self {
            src: None,
            current_time: 0.0,
            duration: f64::NAN,
            paused: true,
            ended: false,
            volume: 1.0,
            muted: false,
            playback_rate: 1.0,
            reject_play: false,
            durations: HashMap::new(),
            sources: Vec::new(),
            seeks: Vec::new(),
            play_calls: 0,
        }
    }
}

/// Media element fake. Clones share state so a test can keep a handle
/// after giving the element to a player.
#[derive(Debug, Clone, Default)]
pub struct FakeMedia {
    state: Rc<RefCell<FakeMediaState>>,
}

impl FakeMedia {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the duration reported once `src` has loaded
    pub fn with_duration(self, src: &str, duration: f64) -> Self {
        self.state.borrow_mut().durations.insert(src.to_string(), duration);
        self
    }

    pub fn state(&self) -> std::cell::Ref<'_, FakeMediaState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> std::cell::RefMut<'_, FakeMediaState> {
        self.state.borrow_mut()
    }

    /// Metadata for the current source arrives; the caller forwards
    /// `MediaEvent::LoadedMetadata` to the player.
    pub fn load_metadata(&self) {
        let mut guard = self.state.borrow_mut();
        let s = &mut *guard;
        let duration = match &s.src {
            Some(src) => s.durations.get(src).copied().unwrap_or(DEFAULT_FAKE_DURATION),
            None => f64::NAN,
        };
        s.duration = duration;
    }

    /// Let `seconds` of wall time pass
    pub fn advance(&self, seconds: f64) {
        let mut guard = self.state.borrow_mut();
        let s = &mut *guard;
        if s.paused || s.ended || !s.duration.is_finite() {
            return;
        }
        s.current_time += seconds * s.playback_rate;
        if s.current_time >= s.duration {
            s.current_time = s.duration;
            s.ended = true;
            s.paused = true;
        }
    }

    pub fn src(&self) -> Option<String> {
        self.state.borrow().src.clone()
    }

    pub fn time(&self) -> f64 {
        self.state.borrow().current_time
    }

    pub fn is_paused(&self) -> bool {
        self.state.borrow().paused
    }
}

impl MediaElement for FakeMedia {
    fn play(&mut self) -> Result<(), MediaError> {
        let mut s = self.state.borrow_mut();
        s.play_calls += 1;
        if s.reject_play {
            return Err(MediaError::PlayRejected("autoplay blocked".into()));
        }
        if s.src.is_none() {
            return Err(MediaError::SourceFailed("no source".into()));
        }
        if s.ended {
            s.current_time = 0.0;
            s.ended = false;
        }
        s.paused = false;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), MediaError> {
        self.state.borrow_mut().paused = true;
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.state.borrow().current_time
    }

    fn set_current_time(&mut self, seconds: f64) -> Result<(), MediaError> {
        let mut guard = self.state.borrow_mut();
        let s = &mut *guard;
        if !seconds.is_finite() {
            return Err(MediaError::SeekFailed(format!("non-finite target {}", seconds)));
        }
        let target = if s.duration.is_finite() {
            seconds.clamp(0.0, s.duration)
        } else {
            seconds.max(0.0)
        };
        s.current_time = target;
        s.ended = s.duration.is_finite() && target >= s.duration && s.paused;
        s.seeks.push(target);
        Ok(())
    }

    fn duration(&self) -> f64 {
        self.state.borrow().duration
    }

    fn paused(&self) -> bool {
        self.state.borrow().paused
    }

    fn ended(&self) -> bool {
        self.state.borrow().ended
    }

    fn volume(&self) -> f64 {
        self.state.borrow().volume
    }

    fn set_volume(&mut self, volume: f64) {
        self.state.borrow_mut().volume = volume;
    }

    fn muted(&self) -> bool {
        self.state.borrow().muted
    }

    fn set_muted(&mut self, muted: bool) {
        self.state.borrow_mut().muted = muted;
    }

    fn playback_rate(&self) -> f64 {
        self.state.borrow().playback_rate
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.state.borrow_mut().playback_rate = rate;
    }

    fn set_source(&mut self, src: Option<&str>) {
        let mut guard = self.state.borrow_mut();
        let s = &mut *guard;
        s.src = src.map(str::to_string);
        s.sources.push(s.src.clone());
        s.current_time = 0.0;
        s.duration = f64::NAN;
        s.paused = true;
        s.ended = false;
    }
}
