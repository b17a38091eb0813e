use std::sync::Arc;

use tracing::{debug, warn};
use winit::window::Window;

use crate::geometry::Rect;
use crate::processing::region::Region;

use super::{ShapeDriver, ShapeOutcome};

/// Coarse fallback built on winit's cursor hit-test switch.
///
/// The window either accepts or rejects all pointer input; any clickable
/// rectangle or region widens to the whole window.
pub struct HitTestDriver {
    window: Arc<Window>,
}

impl HitTestDriver {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window }
    }

    fn set_hittest(&self, hittest: bool) -> ShapeOutcome {
        match self.window.set_cursor_hittest(hittest) {
            Ok(()) => ShapeOutcome::Applied,
            Err(err) => {
                warn!(error = %err, hittest, "cursor hit-test not supported");
                ShapeOutcome::Unsupported
            }
        }
    }
}

impl ShapeDriver for HitTestDriver {
    fn backend(&self) -> &'static str {
        "hittest"
    }

    fn set_full_window_clickable(&mut self) -> ShapeOutcome {
        self.set_hittest(true)
    }

    fn set_full_window_passthrough(&mut self) -> ShapeOutcome {
        self.set_hittest(false)
    }

    fn set_clickable_rectangle(&mut self, rect: Rect) -> ShapeOutcome {
        debug!(?rect, "rectangle widened to the whole window");
        match self.set_hittest(true) {
            ShapeOutcome::Applied => ShapeOutcome::Approximate,
            other => other,
        }
    }

    fn set_clickable_region(&mut self, region: &Region) -> ShapeOutcome {
        debug!(rects = region.len(), "region widened to the whole window");
        match self.set_hittest(true) {
            ShapeOutcome::Applied => ShapeOutcome::Approximate,
            other => other,
        }
    }
}
