// Drawing surface that records every call

use std::sync::Arc;

use parking_lot::Mutex;

use crate::waveform::{Color, DrawSurface};

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Resize(u32, u32),
    Clear,
    Fill(Vec<(f64, f64)>, Color),
    Stroke(Vec<(f64, f64)>, Color),
}

/// Surface that records draw calls into a shared log.
///
/// `size` and `ops` are shared so a test can resize the container and inspect
/// the log after handing the surface to a renderer.
pub struct RecordingSurface {
    pub size: Arc<Mutex<(f64, f64)>>,
    pub dpr: f64,
    pub ops: Arc<Mutex<Vec<DrawOp>>>,
}

impl RecordingSurface {
    pub fn new(w: f64, h: f64, dpr: f64) -> Self {
        Self {
            size: Arc::new(Mutex::new((w, h))),
            dpr,
            ops: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl DrawSurface for RecordingSurface {
    fn container_size(&self) -> (f64, f64) {
        *self.size.lock()
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.dpr
    }

    fn set_backing_size(&mut self, width: u32, height: u32) {
        self.ops.lock().push(DrawOp::Resize(width, height));
    }

    fn clear(&mut self) {
        self.ops.lock().push(DrawOp::Clear);
    }

    fn fill_path(&mut self, points: &[(f64, f64)], color: Color) {
        self.ops.lock().push(DrawOp::Fill(points.to_vec(), color));
    }

    fn stroke_path(&mut self, points: &[(f64, f64)], color: Color, _line_width: f64) {
        self.ops.lock().push(DrawOp::Stroke(points.to_vec(), color));
    }
}
