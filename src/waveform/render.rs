// Waveform renderer - peak envelope, motion bands and marker lines
//
// Draws onto a 2D raster surface sized in device pixels. The surface is
// resized to the container's CSS size times the device pixel ratio.

use std::sync::Arc;

use super::{AmplitudeGain, PreferenceStore, WaveformData};
use crate::markers::MarkerKind;

/// RGBA color, 8 bits per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

pub const ENVELOPE_FILL: Color = Color::rgba(64, 156, 255, 96);
pub const MAX_LINE: Color = Color::rgba(120, 190, 255, 255);
pub const MIN_LINE: Color = Color::rgba(40, 110, 190, 200);
pub const MOTION_BAND: Color = Color::rgba(255, 196, 0, 40);

/// Line color for a marker kind
pub fn marker_color(kind: MarkerKind) -> Color {
    match kind {
        MarkerKind::Trigger => Color::rgba(46, 204, 113, 255),
        MarkerKind::Release => Color::rgba(231, 76, 60, 255),
        MarkerKind::MotionTrigger => Color::rgba(241, 196, 15, 255),
        MarkerKind::MotionRelease => Color::rgba(230, 126, 34, 255),
    }
}

/// Raster target the renderer draws onto
pub trait DrawSurface {
    /// Container size in CSS pixels
    fn container_size(&self) -> (f64, f64);
    fn device_pixel_ratio(&self) -> f64;
    /// Resize the backing store (device pixels)
    fn set_backing_size(&mut self, width: u32, height: u32);
    fn clear(&mut self);
    fn fill_path(&mut self, points: &[(f64, f64)], color: Color);
    fn stroke_path(&mut self, points: &[(f64, f64)], color: Color, line_width: f64);
}

/// A marker line at a playback fraction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerLine {
    pub kind: MarkerKind,
    pub fraction: f64,
}

/// Everything the renderer paints for one recording
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub data: Option<Arc<WaveformData>>,
    pub markers: Vec<MarkerLine>,
    /// Motion intervals as (start, end) fractions
    pub motion_bands: Vec<(f64, f64)>,
}

pub struct WaveformRenderer {
    surface: Box<dyn DrawSurface>,
    gain: AmplitudeGain,
    width: u32,
    height: u32,
    css_width: f64,
    scene: Scene,
    /// A draw was requested while the container had no size
    deferred: bool,
}

impl WaveformRenderer {
    pub fn new(surface: Box<dyn DrawSurface>, gain: AmplitudeGain) -> Self {
        Self {
            surface,
            gain,
            width: 0,
            height: 0,
            css_width: 0.0,
            scene: Scene::default(),
            deferred: false,
        }
    }

    /// Match the backing store to the container. Returns false when the
    /// container has no size yet.
    pub fn resize(&mut self) -> bool {
        let (css_w, css_h) = self.surface.container_size();
        let dpr = self.surface.device_pixel_ratio();
        let dpr = if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 };

        let width = (css_w.max(0.0) * dpr).round() as u32;
        let height = (css_h.max(0.0) * dpr).round() as u32;
        if width == 0 || height == 0 {
            self.width = 0;
            self.height = 0;
            self.css_width = 0.0;
            return false;
        }
        self.css_width = css_w;

        if width != self.width || height != self.height {
            self.width = width;
            self.height = height;
            self.surface.set_backing_size(width, height);
        }
        true
    }

    /// Container resized: resize and repaint the current scene
    pub fn on_container_resize(&mut self) {
        self.refresh();
    }

    /// Replace the scene and paint it
    pub fn draw_scene(&mut self, scene: Scene) {
        self.scene = scene;
        self.refresh();
    }

    /// Repaint the current scene with new peaks only
    pub fn draw(&mut self, data: Option<Arc<WaveformData>>) {
        self.scene.data = data;
        self.refresh();
    }

    pub fn gain(&self) -> f64 {
        self.gain.value()
    }

    pub fn gain_range(&self) -> (f64, f64) {
        self.gain.range()
    }

    /// Change and persist the amplitude gain, then repaint
    pub fn set_gain(&mut self, value: f64, store: &mut dyn PreferenceStore) -> f64 {
        let applied = self.gain.set(value, store);
        self.repaint();
        applied
    }

    pub fn zoom_in(&mut self, store: &mut dyn PreferenceStore) -> f64 {
        let applied = self.gain.zoom_in(store);
        self.repaint();
        applied
    }

    pub fn zoom_out(&mut self, store: &mut dyn PreferenceStore) -> f64 {
        let applied = self.gain.zoom_out(store);
        self.repaint();
        applied
    }

    /// Width of the backing store in device pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Container width in CSS pixels as of the last resize
    pub fn css_width(&self) -> f64 {
        self.css_width
    }

    /// True if the last draw was skipped for lack of a container size
    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    fn refresh(&mut self) {
        if self.resize() {
            self.paint();
        } else {
            self.deferred = true;
        }
    }

    fn repaint(&mut self) {
        if self.width > 0 && self.height > 0 {
            self.paint();
        }
    }

    fn paint(&mut self) {
        if self.width == 0 || self.height == 0 {
            self.deferred = true;
            return;
        }
        self.deferred = false;

        let w = self.width as f64;
        let h = self.height as f64;
        self.surface.clear();

        for &(start, end) in &self.scene.motion_bands {
            let x0 = start.clamp(0.0, 1.0) * w;
            let x1 = end.clamp(0.0, 1.0) * w;
            if x1 > x0 {
                self.surface
                    .fill_path(&[(x0, 0.0), (x1, 0.0), (x1, h), (x0, h)], MOTION_BAND);
            }
        }

        if let Some(data) = &self.scene.data {
            let columns = envelope_columns(&data.peaks, self.width as usize, self.gain.value());
            let mid = h / 2.0;
            let max_line: Vec<(f64, f64)> = columns
                .iter()
                .enumerate()
                .map(|(x, &(_, max))| (x as f64 + 0.5, mid - max as f64 * mid))
                .collect();
            let min_line: Vec<(f64, f64)> = columns
                .iter()
                .enumerate()
                .map(|(x, &(min, _))| (x as f64 + 0.5, mid - min as f64 * mid))
                .collect();

            let mut polygon = max_line.clone();
            polygon.extend(min_line.iter().rev());

            self.surface.fill_path(&polygon, ENVELOPE_FILL);
            self.surface.stroke_path(&max_line, MAX_LINE, 1.0);
            self.surface.stroke_path(&min_line, MIN_LINE, 1.0);
        }

        for marker in &self.scene.markers {
            let x = marker.fraction.clamp(0.0, 1.0) * w;
            self.surface
                .stroke_path(&[(x, 0.0), (x, h)], marker_color(marker.kind), 2.0);
        }
    }
}

/// Map `peaks` onto `width` pixel columns, applying gain and clamping.
///
/// With fewer buckets than columns a bucket covers several columns; with more
/// buckets each column takes the extremes of the buckets it covers.
pub fn envelope_columns(peaks: &[(f32, f32)], width: usize, gain: f64) -> Vec<(f32, f32)> {
    let n = peaks.len();
    if n == 0 || width == 0 {
        return Vec::new();
    }

    let gain = gain as f32;
    (0..width)
        .map(|x| {
            let start = (x * n / width).min(n - 1);
            let end = ((x + 1) * n / width).clamp(start + 1, n);
            let (min, max) = peaks[start..end]
                .iter()
                .fold((f32::MAX, f32::MIN), |(lo, hi), &(mn, mx)| (lo.min(mn), hi.max(mx)));
            (
                (min * gain).clamp(-1.0, 1.0),
                (max * gain).clamp(-1.0, 1.0),
            )
        })
        .collect()
}
