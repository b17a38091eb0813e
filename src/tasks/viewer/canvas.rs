//! Canvas mode: pinning the current image above every other window.
//!
//! [`CanvasController`] owns the Disabled/Enabled state and drives a
//! [`CanvasHost`] through the enter and exit sequences. Which strategy runs
//! is fixed by configuration.

use std::sync::Arc;

use anyhow::Result;
use config_model::CanvasStrategy;
use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::geometry::{PointF, Rect};
use crate::processing::layout;
use crate::viewport::Viewport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowFlags {
    pub decorations: bool,
    pub always_on_top: bool,
    pub transparent: bool,
}

/// Primary window state captured on entry and restored on exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub position: Option<(i32, i32)>,
    pub size: (u32, u32),
    pub maximized: bool,
    pub flags: WindowFlags,
}

/// Immutable image and transform snapshot handed to the overlay.
#[derive(Debug, Clone)]
pub struct DisplayState {
    pub image: Option<Arc<RgbaImage>>,
    pub has_alpha: bool,
    pub scale: f64,
    pub pan: PointF,
    /// Placement in the primary window at capture time.
    pub image_rect: Option<Rect>,
    pub opacity: f32,
}

impl DisplayState {
    /// Prefer the rendered (transformed) image, fall back to the decoded one.
    pub fn capture(
        rendered: Option<&Arc<RgbaImage>>,
        decoded: Option<&Arc<RgbaImage>>,
        has_alpha: bool,
        viewport: &Viewport,
        opacity: f32,
    ) -> Self {
        let image = rendered.or(decoded).cloned();
        let image_rect = image.as_ref().map(|img| {
            let window = viewport.window_rect();
            layout::placement(
                img.width(),
                img.height(),
                viewport.scale(),
                viewport.pan(),
                window.width,
                window.height,
            )
        });
        Self {
            image,
            has_alpha,
            scale: viewport.scale(),
            pan: viewport.pan(),
            image_rect,
            opacity,
        }
    }

    /// Placement recomputed for a window of the given size.
    pub fn placement_in(&self, width: u32, height: u32) -> Option<Rect> {
        let img = self.image.as_ref()?;
        Some(layout::placement(
            img.width(),
            img.height(),
            self.scale,
            self.pan,
            width,
            height,
        ))
    }
}

/// Window operations the controller needs from the application.
pub trait CanvasHost {
    fn snapshot(&self) -> WindowSnapshot;
    fn display_state(&self) -> DisplayState;

    fn open_overlay(&mut self, snapshot: &WindowSnapshot, state: DisplayState) -> Result<()>;
    fn close_overlay(&mut self);

    /// Make the primary window frameless, top-most, translucent and click-through.
    fn enter_in_place(&mut self) -> Result<()>;
    fn leave_in_place(&mut self);

    fn open_control_panel(&mut self) -> Result<()>;
    fn close_control_panel(&mut self);

    fn hide_primary(&mut self);
    /// Restore geometry, maximized state and flags, then show and focus.
    fn restore_primary(&mut self, snapshot: &WindowSnapshot);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanvasMode {
    Disabled,
    Enabled {
        saved: WindowSnapshot,
        strategy: CanvasStrategy,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanvasChange {
    Entered(CanvasStrategy),
    Exited,
    /// Entry was attempted and rolled back.
    Failed,
}

#[derive(Debug, Clone, Copy)]
pub struct CanvasController {
    mode: CanvasMode,
    strategy: CanvasStrategy,
}

impl CanvasController {
    pub fn new(strategy: CanvasStrategy) -> Self {
        Self {
            mode: CanvasMode::Disabled,
            strategy,
        }
    }

    pub fn mode(&self) -> CanvasMode {
        self.mode
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.mode, CanvasMode::Enabled { .. })
    }

    pub fn active_strategy(&self) -> Option<CanvasStrategy> {
        match self.mode {
            CanvasMode::Enabled { strategy, .. } => Some(strategy),
            CanvasMode::Disabled => None,
        }
    }

    pub fn enable(&mut self, host: &mut dyn CanvasHost) -> Option<CanvasChange> {
        if self.is_enabled() {
            debug!("canvas mode already enabled");
            return None;
        }
        let saved = host.snapshot();
        let strategy = self.strategy;

        let entered = match strategy {
            CanvasStrategy::Overlay => {
                let state = host.display_state();
                if state.image.is_none() {
                    warn!("entering canvas mode without an image");
                }
                host.open_overlay(&saved, state)
            }
            CanvasStrategy::InPlace => host.enter_in_place(),
        };
        if let Err(err) = entered {
            warn!(error = ?err, ?strategy, "failed to enter canvas mode");
            self.teardown(host, strategy, &saved);
            return Some(CanvasChange::Failed);
        }

        if let Err(err) = host.open_control_panel() {
            warn!(error = ?err, "failed to create canvas control panel");
            self.teardown(host, strategy, &saved);
            return Some(CanvasChange::Failed);
        }

        if strategy == CanvasStrategy::Overlay {
            host.hide_primary();
        }
        self.mode = CanvasMode::Enabled { saved, strategy };
        info!(?strategy, "canvas mode enabled");
        Some(CanvasChange::Entered(strategy))
    }

    pub fn disable(&mut self, host: &mut dyn CanvasHost) -> Option<CanvasChange> {
        let CanvasMode::Enabled { saved, strategy } = self.mode else {
            debug!("canvas mode already disabled");
            return None;
        };
        host.close_control_panel();
        match strategy {
            CanvasStrategy::Overlay => host.close_overlay(),
            CanvasStrategy::InPlace => host.leave_in_place(),
        }
        host.restore_primary(&saved);
        self.mode = CanvasMode::Disabled;
        info!("canvas mode disabled");
        Some(CanvasChange::Exited)
    }

    pub fn toggle(&mut self, host: &mut dyn CanvasHost) -> Option<CanvasChange> {
        if self.is_enabled() {
            self.disable(host)
        } else {
            self.enable(host)
        }
    }

    fn teardown(
        &mut self,
        host: &mut dyn CanvasHost,
        strategy: CanvasStrategy,
        saved: &WindowSnapshot,
    ) {
        host.close_control_panel();
        match strategy {
            CanvasStrategy::Overlay => host.close_overlay(),
            CanvasStrategy::InPlace => host.leave_in_place(),
        }
        host.restore_primary(saved);
        self.mode = CanvasMode::Disabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::ZoomLimits;

    #[test]
    fn capture_prefers_rendered_image() {
        let decoded = Arc::new(RgbaImage::new(40, 30));
        let rendered = Arc::new(RgbaImage::new(30, 40));
        let mut vp = Viewport::new(300, 400, ZoomLimits::default());
        vp.set_image(Some((30, 40)));
        let state = DisplayState::capture(Some(&rendered), Some(&decoded), true, &vp, 0.7);
        let img = state.image.as_ref().unwrap();
        assert_eq!(img.dimensions(), (30, 40));
        assert_eq!(state.image_rect, Some(Rect::new(0, 0, 300, 400)));

        let fallback = DisplayState::capture(None, Some(&decoded), true, &vp, 0.7);
        assert_eq!(fallback.image.unwrap().dimensions(), (40, 30));
    }

    #[test]
    fn empty_state_has_no_placement() {
        let vp = Viewport::new(300, 400, ZoomLimits::default());
        let state = DisplayState::capture(None, None, false, &vp, 1.0);
        assert!(state.image_rect.is_none());
        assert!(state.placement_in(100, 100).is_none());
    }
}
