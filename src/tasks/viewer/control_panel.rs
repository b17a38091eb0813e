use std::num::NonZeroU32;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use config_model::ControlPanelConfig;
use softbuffer::{Context as SoftContext, Surface};
use tracing::{debug, warn};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowId, WindowLevel};

use crate::geometry::Rect;
use crate::platform::{self, ShapeDriver, ShapeOutcome};

use super::render::{Color, Frame};
use super::tool_window;

type WindowHandle = Arc<Window>;

const BACKGROUND: Color = Color::rgb(0x1e2227);
const EDGE: Color = Color::rgb(0x4a5058);
const EXIT: Color = Color::rgb(0xe5534b);

/// Small always-on-top window whose only job is leaving canvas mode.
pub struct ControlPanel {
    window: WindowHandle,
    _context: SoftContext<WindowHandle>,
    surface: Surface<WindowHandle, WindowHandle>,
    driver: Box<dyn ShapeDriver>,
    screen_rect: Rect,
}

impl ControlPanel {
    /// Place the panel in the top-right corner of the primary monitor.
    pub fn create(event_loop: &ActiveEventLoop, cfg: &ControlPanelConfig) -> Result<Self> {
        let screen_rect = anchor_rect(event_loop, cfg);
        let attrs = Window::default_attributes()
            .with_title("Exit canvas")
            .with_decorations(false)
            .with_resizable(false)
            .with_window_level(WindowLevel::AlwaysOnTop)
            .with_inner_size(PhysicalSize::new(cfg.width, cfg.height))
            .with_position(PhysicalPosition::new(screen_rect.x, screen_rect.y));
        let window = event_loop
            .create_window(tool_window(attrs))
            .context("failed to create control panel window")?;
        let window = WindowHandle::new(window);
        let context = SoftContext::new(window.clone())
            .map_err(|err| anyhow!("failed to create panel softbuffer context: {err}"))?;
        let mut surface = Surface::new(&context, window.clone())
            .map_err(|err| anyhow!("failed to create panel softbuffer surface: {err}"))?;
        if let (Some(w), Some(h)) = (NonZeroU32::new(cfg.width), NonZeroU32::new(cfg.height)) {
            surface
                .resize(w, h)
                .map_err(|err| anyhow!("failed to size control panel: {err}"))?;
        }
        // Exempt from passthrough.
        if let Err(err) = window.set_cursor_hittest(true) {
            debug!(error = %err, "cursor hit-test not adjustable for control panel");
        }
        let driver = platform::driver_for(&window);
        debug!(?screen_rect, backend = driver.backend(), "control panel created");
        Ok(Self {
            window,
            _context: context,
            surface,
            driver,
            screen_rect,
        })
    }

    pub fn id(&self) -> WindowId {
        self.window.id()
    }

    /// Panel bounds in screen coordinates.
    pub fn screen_rect(&self) -> Rect {
        match self.window.outer_position() {
            Ok(pos) => Rect::new(pos.x, pos.y, self.screen_rect.width, self.screen_rect.height),
            Err(_) => self.screen_rect,
        }
    }

    /// Restack above other windows. Focus stays where it is.
    pub fn raise(&mut self) {
        self.window.set_window_level(WindowLevel::AlwaysOnTop);
        keep_above(self.driver.as_mut());
    }

    pub fn draw(&mut self) {
        let size = self.window.inner_size();
        let (width, height) = (size.width.max(1), size.height.max(1));
        let mut buffer = match self.surface.buffer_mut() {
            Ok(buffer) => buffer,
            Err(err) => {
                warn!(error = %err, "control panel buffer unavailable");
                return;
            }
        };
        let mut frame = Frame::new(&mut buffer, width, height);
        frame.clear(BACKGROUND);
        frame.stroke_rect(frame.bounds(), 1, EDGE);
        let icon = height.saturating_sub(16).max(8).min(width);
        frame.cross(
            Rect::new(
                (width.saturating_sub(icon) / 2) as i32,
                (height.saturating_sub(icon) / 2) as i32,
                icon,
                icon,
            ),
            3,
            EXIT,
        );
        if let Err(err) = buffer.present() {
            warn!(error = %err, "failed to present control panel");
        }
    }
}

impl Drop for ControlPanel {
    fn drop(&mut self) {
        self.window.set_visible(false);
    }
}

fn keep_above(driver: &mut dyn ShapeDriver) -> ShapeOutcome {
    let outcome = driver.raise_above(true);
    debug!(?outcome, "control panel raised");
    outcome
}

fn anchor_rect(event_loop: &ActiveEventLoop, cfg: &ControlPanelConfig) -> Rect {
    let monitor = event_loop
        .primary_monitor()
        .or_else(|| event_loop.available_monitors().next());
    let (origin, size) = match monitor {
        Some(m) => ((m.position().x, m.position().y), (m.size().width, m.size().height)),
        None => ((0, 0), (1920, 1080)),
    };
    panel_rect(origin, size, cfg)
}

/// Top-right corner of a monitor, inset by the configured margin.
pub fn panel_rect(origin: (i32, i32), monitor: (u32, u32), cfg: &ControlPanelConfig) -> Rect {
    let x = i64::from(origin.0) + i64::from(monitor.0)
        - i64::from(cfg.width)
        - i64::from(cfg.margin);
    let y = i64::from(origin.1) + i64::from(cfg.margin);
    Rect::new(
        x.max(i64::from(origin.0)) as i32,
        y as i32,
        cfg.width,
        cfg.height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{DriverCall, RecordingDriver};

    #[test]
    fn panel_sits_in_top_right_corner() {
        let cfg = ControlPanelConfig::default();
        assert_eq!(
            panel_rect((0, 0), (1920, 1080), &cfg),
            Rect::new(1790, 10, 120, 40)
        );
        assert_eq!(
            panel_rect((1920, 0), (1280, 1024), &cfg),
            Rect::new(3070, 10, 120, 40)
        );
    }

    #[test]
    fn raising_only_restacks() {
        let recorder = RecordingDriver::new();
        let mut driver: Box<dyn ShapeDriver> = Box::new(recorder.clone());
        keep_above(driver.as_mut());
        keep_above(driver.as_mut());
        assert_eq!(
            recorder.calls(),
            vec![DriverCall::RaiseAbove(true), DriverCall::RaiseAbove(true)]
        );
    }

    #[test]
    fn panel_never_leaves_tiny_monitor() {
        let cfg = ControlPanelConfig::default();
        assert_eq!(panel_rect((0, 0), (100, 100), &cfg).x, 0);
    }
}
