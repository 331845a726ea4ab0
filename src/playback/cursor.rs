// Cursor sync - mirrors the player position onto the waveform cursor,
// the wall-clock readout and the RMS readout

use chrono::{Local, TimeZone};

use crate::waveform::WaveformData;

/// Shown when the wall-clock time cannot be computed
pub const CLOCK_PLACEHOLDER: &str = "--:--:--";

/// Handle of a requested animation frame loop
pub type FrameHandle = u64;

/// What the cursor overlay should display
#[derive(Debug, Clone, PartialEq)]
pub struct CursorView {
    /// Position in [0, 1]
    pub fraction: f64,
    /// Cursor offset from the left edge in CSS pixels
    pub offset_px: f64,
    /// Local wall-clock time at the cursor
    pub wall_clock: String,
    /// `None` hides the RMS readout
    pub rms: Option<String>,
}

/// Per-frame cursor loop state.
///
/// The loop only runs while the media plays and the waveform is visible.
#[derive(Debug)]
pub struct CursorSync {
    fraction: f64,
    handle: Option<FrameHandle>,
    visible: bool,
    width_px: f64,
}

impl Default for CursorSync {
    fn default() -> Self {
        Self {
            fraction: 0.0,
            handle: None,
            visible: true,
            width_px: 0.0,
        }
    }
}

impl CursorSync {
    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Container shown/hidden. Hiding stops the loop.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        if !visible {
            self.stop();
        }
    }

    /// Container width in CSS pixels
    pub fn set_width(&mut self, width_px: f64) {
        self.width_px = if width_px.is_finite() { width_px.max(0.0) } else { 0.0 };
    }

    /// Start the loop if it may run. Returns true when it is running.
    pub fn start(&mut self, handle: FrameHandle) -> bool {
        if !self.visible {
            return false;
        }
        if self.handle.is_none() {
            self.handle = Some(handle);
        }
        true
    }

    pub fn stop(&mut self) {
        self.handle = None;
    }

    /// One frame: derive the fraction from the player clock
    pub fn on_tick(
        &mut self,
        current_time: f64,
        duration: Option<f64>,
        waveform: Option<&WaveformData>,
        start_epoch: Option<f64>,
    ) -> CursorView {
        let fraction = match duration {
            Some(d) if d > 0.0 && current_time.is_finite() => (current_time / d).clamp(0.0, 1.0),
            _ => 0.0,
        };
        self.set_fraction(fraction, duration, waveform, start_epoch)
    }

    /// Position the cursor directly (scrubbing, seeks)
    pub fn set_fraction(
        &mut self,
        fraction: f64,
        duration: Option<f64>,
        waveform: Option<&WaveformData>,
        start_epoch: Option<f64>,
    ) -> CursorView {
        self.fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        CursorView {
            fraction: self.fraction,
            offset_px: self.fraction * self.width_px,
            wall_clock: wall_clock_label(start_epoch, duration, self.fraction, &Local),
            rms: waveform.and_then(|w| w.rms_at(self.fraction)).map(format_rms),
        }
    }
}

/// `start_epoch + fraction * duration` formatted as HH:MM:SS in `tz`
pub fn wall_clock_label<Tz: TimeZone>(
    start_epoch: Option<f64>,
    duration: Option<f64>,
    fraction: f64,
    tz: &Tz,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let (Some(start), Some(duration)) = (start_epoch, duration) else {
        return CLOCK_PLACEHOLDER.to_string();
    };
    let epoch = start + fraction * duration;
    if !epoch.is_finite() {
        return CLOCK_PLACEHOLDER.to_string();
    }

    let secs = epoch.floor() as i64;
    let nanos = ((epoch - epoch.floor()) * 1e9) as u32;
    match tz.timestamp_opt(secs, nanos).single() {
        Some(time) => time.format("%H:%M:%S").to_string(),
        None => CLOCK_PLACEHOLDER.to_string(),
    }
}

/// RMS ratio as dBFS
pub fn format_rms(ratio: f32) -> String {
    if ratio <= 0.0 {
        return "RMS -inf dB".to_string();
    }
    format!("RMS {:.1} dB", 20.0 * ratio.log10())
}

/// Elapsed time as m:ss, or h:mm:ss past an hour
pub fn format_elapsed(seconds: f64) -> String {
    let total = if seconds.is_finite() { seconds.max(0.0).floor() as u64 } else { 0 };
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}
