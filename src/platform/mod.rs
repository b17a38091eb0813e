//! Window input-shape backends.
//!
//! A [`ShapeDriver`] owns the native side of one window's hit region. Every
//! operation is best-effort: failures are logged where they happen and
//! reported as a [`ShapeOutcome`], never as an error.

mod hittest;
mod recording;
#[cfg(all(unix, not(target_os = "macos"), not(target_os = "android")))]
mod x11;

use std::sync::Arc;

use tracing::debug;
use winit::window::Window;

use crate::geometry::Rect;
use crate::processing::region::Region;

pub use hittest::HitTestDriver;
pub use recording::{DriverCall, RecordingDriver};
#[cfg(all(unix, not(target_os = "macos"), not(target_os = "android")))]
pub use x11::X11ShapeDriver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeOutcome {
    /// The window server accepted the request and it has been flushed.
    Applied,
    /// Only an all-or-nothing approximation could be applied.
    Approximate,
    /// The backend has no way to express the request.
    Unsupported,
    /// No native window exists (yet).
    NoWindow,
}

impl ShapeOutcome {
    pub fn is_applied(self) -> bool {
        matches!(self, ShapeOutcome::Applied | ShapeOutcome::Approximate)
    }
}

/// Input shape as pushed to a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HitShape {
    Clickable,
    Passthrough,
    Rect(Rect),
    Region(Region),
}

pub trait ShapeDriver {
    fn backend(&self) -> &'static str;

    /// Remove any input shape so the whole window accepts pointer events.
    fn set_full_window_clickable(&mut self) -> ShapeOutcome;

    /// Install an empty input shape so every pointer event falls through.
    fn set_full_window_passthrough(&mut self) -> ShapeOutcome;

    fn set_clickable_rectangle(&mut self, rect: Rect) -> ShapeOutcome;

    /// `region` must consist of non-overlapping window-local rectangles.
    fn set_clickable_region(&mut self, region: &Region) -> ShapeOutcome;

    /// Ask the window manager to keep the window above (or release it).
    fn raise_above(&mut self, _above: bool) -> ShapeOutcome {
        ShapeOutcome::Unsupported
    }

    fn set_opacity(&mut self, _opacity: f32) -> ShapeOutcome {
        ShapeOutcome::Unsupported
    }

    fn apply(&mut self, shape: &HitShape) -> ShapeOutcome {
        match shape {
            HitShape::Clickable => self.set_full_window_clickable(),
            HitShape::Passthrough => self.set_full_window_passthrough(),
            HitShape::Rect(rect) => self.set_clickable_rectangle(*rect),
            HitShape::Region(region) => self.set_clickable_region(region),
        }
    }
}

/// Stand-in used before a native window exists.
#[derive(Debug, Default)]
pub struct DetachedDriver;

impl ShapeDriver for DetachedDriver {
    fn backend(&self) -> &'static str {
        "detached"
    }

    fn set_full_window_clickable(&mut self) -> ShapeOutcome {
        detached("clickable")
    }

    fn set_full_window_passthrough(&mut self) -> ShapeOutcome {
        detached("passthrough")
    }

    fn set_clickable_rectangle(&mut self, _rect: Rect) -> ShapeOutcome {
        detached("rectangle")
    }

    fn set_clickable_region(&mut self, _region: &Region) -> ShapeOutcome {
        detached("region")
    }
}

fn detached(op: &'static str) -> ShapeOutcome {
    debug!(op, "shape request without a native window");
    ShapeOutcome::NoWindow
}

/// Pick the best shape backend for `window`.
///
/// X11 windows get the SHAPE-extension driver; everything else, and X11
/// sessions where the driver cannot connect, get the hit-test fallback.
pub fn driver_for(window: &Arc<Window>) -> Box<dyn ShapeDriver> {
    #[cfg(all(unix, not(target_os = "macos"), not(target_os = "android")))]
    {
        let driver = x11::native_window_id(window)
            .ok_or(crate::error::ShapeError::NoWindow)
            .and_then(X11ShapeDriver::connect);
        match driver {
            Ok(driver) => return Box::new(driver),
            Err(err) => debug!(error = %err, "x11 shape driver unavailable"),
        }
    }
    Box::new(HitTestDriver::new(window.clone()))
}
