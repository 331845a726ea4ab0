// Recdeck - playback transport and waveform engine
// Library entry point

pub mod config;
pub mod markers;
pub mod playback;
pub mod session;
pub mod waveform;

#[cfg(any(test, feature = "test-harness"))]
pub mod test_harness;

pub use config::{Config, DevicePadding};
pub use playback::{MediaElement, MediaEvent, Player, TransportSnapshot, UiHooks};
pub use session::{PlaybackSession, Recording, SelectOptions, SessionParts};
