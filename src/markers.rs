// Event markers (trigger / release / motion) and their label layout

use crate::config::DevicePadding;
use crate::session::Recording;

/// Markers closer than this many seconds are drawn at the same position
pub const MARKER_EPSILON_SECS: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    Trigger,
    Release,
    MotionTrigger,
    MotionRelease,
}

impl MarkerKind {
    /// Fixed evaluation order; also the tie-break order for layout
    pub const ALL: [MarkerKind; 4] = [
        MarkerKind::Trigger,
        MarkerKind::Release,
        MarkerKind::MotionTrigger,
        MarkerKind::MotionRelease,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MarkerKind::Trigger => "Trigger",
            MarkerKind::Release => "Release",
            MarkerKind::MotionTrigger => "Motion",
            MarkerKind::MotionRelease => "Motion end",
        }
    }
}

/// Marker positions in seconds, each clamped to [0, duration]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MarkerSet {
    pub trigger_seconds: Option<f64>,
    pub release_seconds: Option<f64>,
    pub motion_trigger_seconds: Option<f64>,
    pub motion_release_seconds: Option<f64>,
    /// Duration the set was computed against
    pub duration_seconds: f64,
}

impl MarkerSet {
    pub fn get(&self, kind: MarkerKind) -> Option<f64> {
        match kind {
            MarkerKind::Trigger => self.trigger_seconds,
            MarkerKind::Release => self.release_seconds,
            MarkerKind::MotionTrigger => self.motion_trigger_seconds,
            MarkerKind::MotionRelease => self.motion_release_seconds,
        }
    }

    fn slot(&mut self, kind: MarkerKind) -> &mut Option<f64> {
        match kind {
            MarkerKind::Trigger => &mut self.trigger_seconds,
            MarkerKind::Release => &mut self.release_seconds,
            MarkerKind::MotionTrigger => &mut self.motion_trigger_seconds,
            MarkerKind::MotionRelease => &mut self.motion_release_seconds,
        }
    }

    pub fn is_empty(&self) -> bool {
        MarkerKind::ALL.iter().all(|k| self.get(*k).is_none())
    }

    /// Present markers as (kind, fraction of duration), fractions in [0, 1]
    pub fn fractions(&self) -> Vec<(MarkerKind, f64)> {
        if !(self.duration_seconds > 0.0) {
            return Vec::new();
        }
        MarkerKind::ALL
            .iter()
            .filter_map(|&kind| {
                self.get(kind)
                    .map(|secs| (kind, (secs / self.duration_seconds).clamp(0.0, 1.0)))
            })
            .collect()
    }
}

/// Compute marker positions for a recording.
///
/// Returns an empty set until the duration is known. Markers within
/// `epsilon` seconds of an earlier marker (in `MarkerKind::ALL` order) take
/// that marker's value so they render as one.
pub fn compute_markers(
    recording: &Recording,
    duration: Option<f64>,
    padding: &DevicePadding,
    epsilon: f64,
) -> MarkerSet {
    let Some(duration) = duration.filter(|d| d.is_finite() && *d > 0.0) else {
        return MarkerSet::default();
    };

    let clamp = |v: f64| v.clamp(0.0, duration);
    let finite = |v: Option<f64>| v.filter(|x| x.is_finite());

    let trigger_seconds = finite(recording.trigger_offset_seconds)
        .or_else(|| finite(padding.pre_pad_seconds))
        .map(clamp);

    let release_seconds = match finite(recording.release_offset_seconds) {
        Some(release) => Some(clamp(release)),
        None => finite(padding.post_pad_seconds)
            .map(|post| duration - post)
            .filter(|r| (0.0..=duration).contains(r)),
    };

    let motion_trigger_seconds = finite(recording.motion_trigger_offset_seconds).map(clamp);
    let mut motion_release_seconds = finite(recording.motion_release_offset_seconds).map(clamp);

    // A lone motion release sitting on the trigger is drawn on the trigger
    if motion_trigger_seconds.is_none() {
        if let (Some(mr), Some(t)) = (motion_release_seconds, trigger_seconds) {
            if (mr - t).abs() <= epsilon {
                motion_release_seconds = Some(t);
            }
        }
    }

    let mut set = MarkerSet {
        trigger_seconds,
        release_seconds,
        motion_trigger_seconds,
        motion_release_seconds,
        duration_seconds: duration,
    };
    collapse(&mut set, epsilon);
    set
}

/// Snap markers onto earlier markers within `epsilon`
fn collapse(set: &mut MarkerSet, epsilon: f64) {
    let mut placed: Vec<f64> = Vec::with_capacity(4);
    for kind in MarkerKind::ALL {
        let slot = set.slot(kind);
        if let Some(value) = *slot {
            if let Some(anchor) = placed.iter().copied().find(|p| (value - p).abs() <= epsilon) {
                *slot = Some(anchor);
            } else {
                placed.push(value);
            }
        }
    }
}

/// Motion segments as (start, end) fractions; open segments run to the end
pub fn motion_bands(recording: &Recording, duration: Option<f64>) -> Vec<(f64, f64)> {
    let Some(duration) = duration.filter(|d| d.is_finite() && *d > 0.0) else {
        return Vec::new();
    };
    recording
        .motion_segments
        .iter()
        .filter(|s| s.start.is_finite())
        .map(|s| {
            let end = s.end.filter(|e| e.is_finite()).unwrap_or(duration);
            (
                (s.start / duration).clamp(0.0, 1.0),
                (end / duration).clamp(0.0, 1.0),
            )
        })
        .filter(|(a, b)| b > a)
        .collect()
}

// ============================================================================
// Label layout
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelAlign {
    Left,
    Center,
    Right,
}

/// Where to put one marker's label
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerLabel {
    pub kind: MarkerKind,
    pub fraction: f64,
    pub align: LabelAlign,
    /// Vertical stacking row, 0 = top
    pub row: usize,
}

/// Layout thresholds, both as fractions of the waveform width
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelLayoutConfig {
    pub edge_threshold: f64,
    pub spacing_threshold: f64,
}

impl Default for LabelLayoutConfig {
    fn default() -> Self {
        Self {
            edge_threshold: 0.04,
            spacing_threshold: 0.06,
        }
    }
}

/// Align labels near the edges and stack labels that would overlap.
///
/// Labels are sorted by fraction (ties keep `MarkerKind::ALL` order). A label
/// closer than `spacing_threshold` to the previous one goes one row below it.
pub fn layout_labels(markers: &[(MarkerKind, f64)], config: &LabelLayoutConfig) -> Vec<MarkerLabel> {
    let mut sorted: Vec<(MarkerKind, f64)> = markers
        .iter()
        .map(|&(k, f)| (k, f.clamp(0.0, 1.0)))
        .collect();
    sorted.sort_by(|a, b| {
        a.1.total_cmp(&b.1).then_with(|| {
            let ia = MarkerKind::ALL.iter().position(|k| *k == a.0);
            let ib = MarkerKind::ALL.iter().position(|k| *k == b.0);
            ia.cmp(&ib)
        })
    });

    let mut labels: Vec<MarkerLabel> = Vec::with_capacity(sorted.len());
    for (kind, fraction) in sorted {
        let align = if fraction <= config.edge_threshold {
            LabelAlign::Left
        } else if fraction >= 1.0 - config.edge_threshold {
            LabelAlign::Right
        } else {
            LabelAlign::Center
        };

        let row = match labels.last() {
            Some(prev) if fraction - prev.fraction < config.spacing_threshold => prev.row + 1,
            _ => 0,
        };

        labels.push(MarkerLabel { kind, fraction, align, row });
    }
    labels
}
