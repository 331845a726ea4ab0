// Media element capability surface
//
// The browser's audio element reduced to what the transport needs. Hosts
// bind this to the real element; tests use the fake in `test_harness`.

/// Capabilities of the single media element owned by the player
pub trait MediaElement {
    /// Request playback. Autoplay policies may reject it.
    fn play(&mut self) -> Result<(), MediaError>;
    fn pause(&mut self) -> Result<(), MediaError>;
    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, seconds: f64) -> Result<(), MediaError>;
    /// Duration in seconds, NaN or infinite while unknown
    fn duration(&self) -> f64;
    fn paused(&self) -> bool;
    fn ended(&self) -> bool;
    fn volume(&self) -> f64;
    fn set_volume(&mut self, volume: f64);
    fn muted(&self) -> bool;
    fn set_muted(&mut self, muted: bool);
    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&mut self, rate: f64);
    /// Swap the source; `None` unloads the element
    fn set_source(&mut self, src: Option<&str>);
}

/// Lifecycle events forwarded from the media element
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// Duration is known and the source can be played
    LoadedMetadata,
    /// The source failed to load or decode
    Error(String),
    Playing,
    Paused,
    Ended,
    TimeUpdate,
}

/// Error type for media element calls
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum MediaError {
    #[error("Playback rejected: {0}")]
    PlayRejected(String),

    #[error("Seek failed: {0}")]
    SeekFailed(String),

    #[error("Source failed: {0}")]
    SourceFailed(String),
}

/// Duration if the element knows it
pub fn known_duration<M: MediaElement + ?Sized>(media: &M) -> Option<f64> {
    let d = media.duration();
    if d.is_finite() && d > 0.0 {
        Some(d)
    } else {
        None
    }
}

/// Playing means not paused and not at the end
pub fn is_playing<M: MediaElement + ?Sized>(media: &M) -> bool {
    !media.paused() && !media.ended()
}
