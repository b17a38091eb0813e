//! Separate always-on-top window mirroring the viewer's image.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use config_model::{CanvasConfig, MaskConfig};
use softbuffer::{Context as SoftContext, Surface};
use tracing::{debug, info, warn};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowId, WindowLevel};

use crate::geometry::Rect;
use crate::mask_sync::{Flush, MaskInputs, MaskSynchronizer, MaskTrigger, MaskView};
use crate::platform::{self, ShapeOutcome};

use super::canvas::{DisplayState, WindowSnapshot};
use super::render::{Color, Frame, ScaledCache};
use super::tool_window;

type WindowHandle = Arc<Window>;

const GRID: Color = Color::rgba(0x6c7a89, 0.18);
const BORDER: Color = Color::rgba(0x3d8bfd, 0.85);
const BAND: Color = Color::rgba(0x101418, 0.55);
const BAND_HEIGHT: u32 = 28;

pub struct OverlayWindow {
    window: WindowHandle,
    _context: SoftContext<WindowHandle>,
    surface: Surface<WindowHandle, WindowHandle>,
    state: DisplayState,
    mask: MaskSynchronizer,
    scaled: ScaledCache,
    chrome: bool,
    hole: Option<Rect>,
    settled: bool,
    native_opacity: bool,
}

impl OverlayWindow {
    /// Build the overlay over the primary window's last geometry. It stays
    /// unmapped until [`OverlayWindow::show`].
    pub fn create(
        event_loop: &ActiveEventLoop,
        snapshot: &WindowSnapshot,
        state: DisplayState,
        canvas: &CanvasConfig,
        mask: &MaskConfig,
    ) -> Result<Self> {
        let (width, height) = snapshot.size;
        let mut attrs = Window::default_attributes()
            .with_title("Canvas")
            .with_decorations(false)
            .with_resizable(false)
            .with_transparent(true)
            .with_window_level(WindowLevel::AlwaysOnTop)
            .with_active(false)
            .with_visible(false)
            .with_inner_size(PhysicalSize::new(width.max(1), height.max(1)));
        if let Some((x, y)) = snapshot.position {
            attrs = attrs.with_position(PhysicalPosition::new(x, y));
        }
        let window = event_loop
            .create_window(tool_window(attrs))
            .context("failed to create overlay window")?;
        let window = WindowHandle::new(window);

        let context = SoftContext::new(window.clone())
            .map_err(|err| anyhow!("failed to create overlay softbuffer context: {err}"))?;
        let surface = Surface::new(&context, window.clone())
            .map_err(|err| anyhow!("failed to create overlay softbuffer surface: {err}"))?;

        let sync = MaskSynchronizer::with_driver(mask, platform::driver_for(&window));
        let mut overlay = Self {
            window,
            _context: context,
            surface,
            state,
            mask: sync,
            scaled: ScaledCache::default(),
            chrome: canvas.chrome,
            hole: None,
            settled: false,
            native_opacity: false,
        };
        overlay.resize(overlay.window.inner_size());
        overlay.apply_opacity();
        info!(width, height, "overlay window created");
        Ok(overlay)
    }

    pub fn id(&self) -> WindowId {
        self.window.id()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn outer_position(&self) -> Option<(i32, i32)> {
        self.window.outer_position().ok().map(|p| (p.x, p.y))
    }

    /// Map the window. Its input shape is applied by [`OverlayWindow::settle`]
    /// once the window server had time to map it.
    pub fn show(&mut self) {
        self.window.set_visible(true);
        self.window.request_redraw();
    }

    /// Make the overlay click-through, keeping `hole` (window-local) clickable.
    pub fn settle(&mut self, hole: Option<Rect>, now: Instant) {
        self.hole = hole;
        self.settled = true;
        self.mask.request_refresh(MaskTrigger::CanvasChanged, now);
        self.flush_mask(now);
        debug!(?hole, "overlay input shape settled");
    }

    /// True when a pointer event at `(x, y)` landed in the clickable hole.
    pub fn hits_hole(&self, x: i32, y: i32) -> bool {
        self.settled && self.mask.accepts_pointer(x, y)
    }

    pub fn set_display_state(&mut self, state: DisplayState) {
        let opacity_changed = (state.opacity - self.state.opacity).abs() > f32::EPSILON;
        self.state = state;
        self.scaled.invalidate();
        if opacity_changed {
            self.apply_opacity();
        }
        self.window.request_redraw();
    }

    pub fn display_state(&self) -> &DisplayState {
        &self.state
    }

    /// Re-assert top-most stacking through winit and the window manager.
    pub fn force_raise(&mut self) {
        self.window.set_window_level(WindowLevel::AlwaysOnTop);
        match self.mask.driver_mut().raise_above(true) {
            ShapeOutcome::Applied => debug!("overlay raised"),
            outcome => debug!(?outcome, "overlay raise limited to window level"),
        }
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        if let (Some(width), Some(height)) = (
            NonZeroU32::new(size.width.max(1)),
            NonZeroU32::new(size.height.max(1)),
        ) {
            if let Err(err) = self.surface.resize(width, height) {
                warn!(error = %err, "failed to resize overlay surface");
            }
        }
        self.scaled.invalidate();
        if self.settled {
            self.mask.request_refresh(MaskTrigger::Resized, Instant::now());
        }
        self.window.request_redraw();
    }

    pub fn flush_mask(&mut self, now: Instant) {
        if !self.settled {
            return;
        }
        let size = self.window.inner_size();
        let inputs = MaskInputs {
            view: MaskView::Passthrough { hole: self.hole },
            transparency: true,
            image: None,
            placement: Rect::default(),
            window: Rect::from_size(size.width, size.height),
        };
        if let Flush::Offloaded(job) = self.mask.flush(&inputs, now) {
            debug!(generation = job.generation, "overlay never offloads; dropping job");
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.mask.next_deadline()
    }

    pub fn draw(&mut self) {
        let size = self.window.inner_size();
        let (width, height) = (size.width.max(1), size.height.max(1));
        let window_rect = Rect::from_size(width, height);
        let image_opacity = if self.native_opacity {
            1.0
        } else {
            self.state.opacity
        };
        let placement = self.state.placement_in(width, height);

        let mut buffer = match self.surface.buffer_mut() {
            Ok(buffer) => buffer,
            Err(err) => {
                warn!(error = %err, "overlay buffer unavailable");
                return;
            }
        };
        let mut frame = Frame::new(&mut buffer, width, height);
        frame.clear(Color::TRANSPARENT);
        if self.chrome {
            frame.grid(32, GRID);
        }
        if let (Some(img), Some(placement)) = (self.state.image.as_ref(), placement) {
            if let Some((visible, scaled)) = self.scaled.visible(img, placement, window_rect) {
                frame.blit(scaled, (visible.x, visible.y), image_opacity);
            }
            if self.chrome {
                frame.stroke_rect(placement, 2, BORDER);
            }
        }
        if self.chrome {
            frame.fill_rect(Rect::new(0, 0, width, BAND_HEIGHT.min(height)), BAND);
            frame.stroke_rect(window_rect, 1, BORDER);
        }
        if let Err(err) = buffer.present() {
            warn!(error = %err, "failed to present overlay frame");
        }
    }

    fn apply_opacity(&mut self) {
        let outcome = self.mask.driver_mut().set_opacity(self.state.opacity);
        self.native_opacity = outcome == ShapeOutcome::Applied;
        debug!(opacity = self.state.opacity, ?outcome, "overlay opacity");
    }
}

impl Drop for OverlayWindow {
    fn drop(&mut self) {
        self.window.set_visible(false);
        debug!("overlay window destroyed");
    }
}
