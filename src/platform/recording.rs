use std::sync::{Arc, Mutex};

use crate::geometry::Rect;
use crate::processing::region::Region;

use super::{HitShape, ShapeDriver, ShapeOutcome};

#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Shape(HitShape),
    RaiseAbove(bool),
    Opacity(f32),
}

/// Driver that records every request instead of talking to a window server.
///
/// Clones share the same log, so a test can keep one handle while the
/// synchronizer owns the boxed driver.
#[derive(Debug, Clone, Default)]
pub struct RecordingDriver {
    calls: Arc<Mutex<Vec<DriverCall>>>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Shapes pushed so far, in order.
    pub fn shapes(&self) -> Vec<HitShape> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DriverCall::Shape(shape) => Some(shape),
                _ => None,
            })
            .collect()
    }

    pub fn last_shape(&self) -> Option<HitShape> {
        self.shapes().pop()
    }

    pub fn clear(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    fn push(&self, call: DriverCall) -> ShapeOutcome {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        ShapeOutcome::Applied
    }
}

impl ShapeDriver for RecordingDriver {
    fn backend(&self) -> &'static str {
        "recording"
    }

    fn set_full_window_clickable(&mut self) -> ShapeOutcome {
        self.push(DriverCall::Shape(HitShape::Clickable))
    }

    fn set_full_window_passthrough(&mut self) -> ShapeOutcome {
        self.push(DriverCall::Shape(HitShape::Passthrough))
    }

    fn set_clickable_rectangle(&mut self, rect: Rect) -> ShapeOutcome {
        self.push(DriverCall::Shape(HitShape::Rect(rect)))
    }

    fn set_clickable_region(&mut self, region: &Region) -> ShapeOutcome {
        self.push(DriverCall::Shape(HitShape::Region(region.clone())))
    }

    fn raise_above(&mut self, above: bool) -> ShapeOutcome {
        self.push(DriverCall::RaiseAbove(above))
    }

    fn set_opacity(&mut self, opacity: f32) -> ShapeOutcome {
        self.push(DriverCall::Opacity(opacity))
    }
}
