pub mod canvas;
mod control_panel;
mod overlay;
pub mod render;
pub mod state;

use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use config_model::CanvasStrategy;
use image::RgbaImage;
use softbuffer::{Context as SoftContext, Surface};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::{PhysicalPosition, PhysicalSize},
    event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy},
    keyboard::{Key, NamedKey},
    window::{Window, WindowAttributes, WindowId, WindowLevel},
};

use crate::catalog::Catalog;
use crate::config::Configuration;
use crate::events::{LoadedImage, MaskTarget, Thumbnail, ViewerEvent};
use crate::geometry::{PointF, Rect};
use crate::mask_sync::{Flush, MaskImage, MaskInputs, MaskSynchronizer, MaskTrigger, MaskView};
use crate::platform;
use crate::processing::transform::Transform;
use crate::tasks::{loader, mask_worker, thumbnails};
use crate::thumbnail_cache::{LruThumbnailCache, PendingThumbnails, ThumbnailCache};
use crate::timers::Timers;
use crate::viewport::{Viewport, ZoomDirection};

use canvas::{
    CanvasChange, CanvasController, CanvasHost, DisplayState, WindowFlags, WindowSnapshot,
};
use control_panel::ControlPanel;
use overlay::OverlayWindow;
use render::{Color, Frame, ScaledCache};
use state::{ThumbGrid, ViewMode, ViewerSM};

type WindowHandle = Arc<Window>;

const BACKDROP: Color = Color::rgb(0x1b1d21);
const TILE: Color = Color::rgb(0x2a2d33);
const SELECTION: Color = Color::rgb(0x3d8bfd);
const OPACITY_STEP: f32 = 0.1;
const MIN_OPACITY: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeferredAction {
    /// Overlay is mapped; switch it to passthrough and stack the panel.
    OverlaySettle,
    OverlayRaise,
    PanelRaise,
}

/// Auxiliary windows stay out of the taskbar and window switchers.
fn tool_window(attrs: WindowAttributes) -> WindowAttributes {
    #[cfg(all(unix, not(target_os = "macos"), not(target_os = "android")))]
    {
        use winit::platform::x11::{WindowAttributesExtX11, WindowType};
        return attrs.with_x11_window_type(vec![WindowType::Utility]);
    }

    #[cfg(target_os = "windows")]
    {
        use winit::platform::windows::WindowAttributesExtWindows;
        return attrs.with_skip_taskbar(true);
    }

    #[cfg(not(any(
        target_os = "windows",
        all(unix, not(target_os = "macos"), not(target_os = "android"))
    )))]
    {
        attrs
    }
}

fn window_level(always_on_top: bool) -> WindowLevel {
    if always_on_top {
        WindowLevel::AlwaysOnTop
    } else {
        WindowLevel::Normal
    }
}

struct PrimaryWindow {
    window: WindowHandle,
    _context: SoftContext<WindowHandle>,
    surface: Surface<WindowHandle, WindowHandle>,
}

struct ViewerApp {
    cfg: Configuration,
    cancel: CancellationToken,
    proxy: EventLoopProxy<ViewerEvent>,
    catalog: Catalog,
    thumbs: Box<dyn ThumbnailCache>,
    pending_thumbs: PendingThumbnails,
    selected: usize,
    scroll: u32,
    sm: ViewerSM,
    viewport: Viewport,
    current: Option<LoadedImage>,
    rendered: Option<Arc<RgbaImage>>,
    transform: Transform,
    load_request: u64,
    flags: WindowFlags,
    canvas_opacity: f32,
    primary: Option<PrimaryWindow>,
    mask: MaskSynchronizer,
    canvas: CanvasController,
    overlay: Option<OverlayWindow>,
    overlay_cursor: PointF,
    panel: Option<ControlPanel>,
    in_place: bool,
    timers: Timers<DeferredAction>,
    cursor: PointF,
    panning: Option<PointF>,
    canvas_on_load: bool,
    scaled: ScaledCache,
    pending_redraw: bool,
}

impl ViewerApp {
    fn new(
        cfg: Configuration,
        cancel: CancellationToken,
        proxy: EventLoopProxy<ViewerEvent>,
        catalog: Catalog,
        mode: ViewMode,
        start_in_canvas: bool,
    ) -> Self {
        let flags = WindowFlags {
            decorations: cfg.viewer.title_bar,
            always_on_top: cfg.viewer.always_on_top,
            transparent: cfg.viewer.transparent_background,
        };
        Self {
            thumbs: Box::new(LruThumbnailCache::new(cfg.thumbnails.cache_capacity)),
            pending_thumbs: PendingThumbnails::new(),
            selected: catalog.current_index().unwrap_or(0),
            scroll: 0,
            sm: ViewerSM::new(mode, cfg.viewer.slideshow_interval),
            viewport: Viewport::new(
                cfg.viewer.window_width,
                cfg.viewer.window_height,
                cfg.viewer.zoom_limits(),
            ),
            current: None,
            rendered: None,
            transform: Transform::default(),
            load_request: 0,
            flags,
            canvas_opacity: cfg.canvas.overlay_opacity,
            primary: None,
            mask: MaskSynchronizer::new(&cfg.mask),
            canvas: CanvasController::new(cfg.canvas.strategy),
            overlay: None,
            overlay_cursor: PointF::ZERO,
            panel: None,
            in_place: false,
            timers: Timers::new(),
            cursor: PointF::ZERO,
            panning: None,
            canvas_on_load: start_in_canvas,
            scaled: ScaledCache::default(),
            pending_redraw: false,
            cfg,
            cancel,
            proxy,
            catalog,
        }
    }

    fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Option<WindowHandle> {
        if let Some(primary) = self.primary.as_ref() {
            return Some(primary.window.clone());
        }

        let viewer = &self.cfg.viewer;
        // Always request an alpha visual; the transparent background is a
        // paint-time choice.
        let attrs = Window::default_attributes()
            .with_title("Canvas Viewer")
            .with_inner_size(PhysicalSize::new(viewer.window_width, viewer.window_height))
            .with_transparent(true)
            .with_decorations(self.flags.decorations)
            .with_window_level(window_level(self.flags.always_on_top));
        match Self::create_primary(event_loop, attrs) {
            Ok(primary) => {
                let window = primary.window.clone();
                self.primary = Some(primary);
                self.mask.attach(platform::driver_for(&window));
                let opacity = self.cfg.viewer.window_opacity;
                if opacity < 1.0 {
                    let outcome = self.mask.driver_mut().set_opacity(opacity);
                    debug!(opacity, ?outcome, "initial window opacity");
                }
                let size = window.inner_size();
                self.viewport.on_resize(size.width, size.height);
                self.mask.request_refresh(MaskTrigger::Resized, Instant::now());
                Some(window)
            }
            Err(err) => {
                error!(error = ?err, "failed to create viewer window");
                None
            }
        }
    }

    fn create_primary(
        event_loop: &ActiveEventLoop,
        attrs: WindowAttributes,
    ) -> Result<PrimaryWindow> {
        let window = event_loop
            .create_window(attrs)
            .context("failed to create viewer window")?;
        let window = WindowHandle::new(window);
        let context = SoftContext::new(window.clone())
            .map_err(|err| anyhow!("failed to create softbuffer context: {err}"))?;
        let mut surface = Surface::new(&context, window.clone())
            .map_err(|err| anyhow!("failed to create softbuffer surface: {err}"))?;
        let size = window.inner_size();
        if let (Some(w), Some(h)) = (NonZeroU32::new(size.width), NonZeroU32::new(size.height)) {
            surface
                .resize(w, h)
                .map_err(|err| anyhow!("failed to size viewer surface: {err}"))?;
        }
        Ok(PrimaryWindow {
            window,
            _context: context,
            surface,
        })
    }

    fn window(&self) -> Option<&Window> {
        self.primary.as_ref().map(|p| p.window.as_ref())
    }

    fn request_redraw(&mut self) {
        self.pending_redraw = true;
        if let Some(window) = self.window() {
            window.request_redraw();
        }
    }

    fn refresh_mask(&mut self, trigger: MaskTrigger) {
        self.mask.request_refresh(trigger, Instant::now());
    }

    fn mask_view(&self) -> MaskView {
        if self.in_place {
            return MaskView::Passthrough { hole: None };
        }
        match self.sm.current() {
            ViewMode::Thumbnails => MaskView::Browser,
            ViewMode::Single => MaskView::SingleImage,
        }
    }

    fn mask_inputs(&self) -> MaskInputs {
        let has_alpha = self.current.as_ref().is_some_and(|c| c.has_alpha);
        MaskInputs {
            view: self.mask_view(),
            transparency: self.flags.transparent,
            image: self
                .rendered
                .clone()
                .map(|image| MaskImage { image, has_alpha }),
            placement: self.viewport.placement().unwrap_or_default(),
            window: self.viewport.window_rect(),
        }
    }

    fn display_state(&self) -> DisplayState {
        DisplayState::capture(
            self.rendered.as_ref(),
            self.current.as_ref().map(|c| &c.image),
            self.current.as_ref().is_some_and(|c| c.has_alpha),
            &self.viewport,
            self.canvas_opacity,
        )
    }

    /// Push a fresh snapshot to the overlay after the source changed.
    fn sync_overlay(&mut self) {
        let state = self.display_state();
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.set_display_state(state);
        }
    }

    fn update_title(&self) {
        let Some(window) = self.window() else {
            return;
        };
        let title = match (self.sm.current(), self.current.as_ref()) {
            (ViewMode::Single, Some(current)) => {
                let name = current
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                format!(
                    "{name} ({}/{}) {:.0}%",
                    self.catalog.current_index().map_or(0, |i| i + 1),
                    self.catalog.len(),
                    self.viewport.scale() * 100.0
                )
            }
            _ => format!("Canvas Viewer ({} images)", self.catalog.len()),
        };
        window.set_title(&title);
    }

    fn open_current(&mut self) {
        let Some(path) = self.catalog.current() else {
            return;
        };
        self.load_request += 1;
        debug!(request = self.load_request, path = %path.display(), "loading image");
        loader::spawn_load(self.load_request, path.to_path_buf(), self.proxy.clone());
    }

    fn navigate(&mut self, forward: bool) {
        if self.catalog.step(forward).is_some() {
            self.open_current();
        }
    }

    fn on_image_loaded(&mut self, event_loop: &ActiveEventLoop, image: LoadedImage) {
        info!(
            path = %image.path.display(),
            width = image.image.width(),
            height = image.image.height(),
            "image loaded"
        );
        self.transform.reset();
        self.rendered = Some(image.image.clone());
        self.viewport.set_image(Some(image.image.dimensions()));
        self.current = Some(image);
        self.scaled.invalidate();
        if let Some(index) = self.catalog.current_index() {
            self.selected = index;
        }
        if self.sm.on_open_image().is_some() {
            self.refresh_mask(MaskTrigger::ViewModeChanged);
        }
        self.refresh_mask(MaskTrigger::ImageReplaced);
        self.sync_overlay();
        self.update_title();
        self.request_redraw();

        if std::mem::take(&mut self.canvas_on_load) {
            self.set_canvas(event_loop, true);
        }
    }

    fn apply_transform(&mut self, edit: impl FnOnce(&mut Transform)) {
        let Some(current) = self.current.as_ref() else {
            return;
        };
        edit(&mut self.transform);
        let rendered = if self.transform.is_identity() {
            current.image.clone()
        } else {
            Arc::new(self.transform.apply(&current.image))
        };
        self.viewport.replace_image_size(rendered.dimensions());
        self.rendered = Some(rendered);
        self.scaled.invalidate();
        self.refresh_mask(MaskTrigger::ImageReplaced);
        self.sync_overlay();
        self.request_redraw();
    }

    fn show_thumbnails(&mut self) {
        if self.sm.on_escape().is_some() {
            self.refresh_mask(MaskTrigger::ViewModeChanged);
        }
        self.request_thumbnails();
        self.update_title();
        self.request_redraw();
    }

    /// Ask for the thumbnails on screen plus one screen either side that are
    /// neither cached nor already on their way.
    fn request_thumbnails(&mut self) {
        let count = self.catalog.len();
        let view_height = self.viewport.window_rect().height;
        let visible = self
            .thumb_grid()
            .visible_range(self.scroll, view_height, count);
        let span = visible.len();
        let start = visible.start.saturating_sub(span);
        let end = (visible.end + span)
            .min(count)
            .min(start.saturating_add(self.cfg.thumbnails.cache_capacity));
        let missing = self
            .pending_thumbs
            .claim(&self.catalog.paths()[start..end], self.thumbs.as_ref());
        if missing.is_empty() {
            return;
        }
        debug!(
            count = missing.len(),
            pending = self.pending_thumbs.len(),
            "requesting thumbnails"
        );
        thumbnails::spawn_batches(
            missing,
            self.cfg.thumbnails.size,
            self.cfg.thumbnails.batch_size,
            self.proxy.clone(),
            self.cancel.child_token(),
        );
    }

    fn on_thumbnails(&mut self, batch: Vec<Thumbnail>) {
        debug!(count = batch.len(), "thumbnails ready");
        for thumb in batch {
            self.pending_thumbs.arrived(&thumb.path);
            self.thumbs.put(thumb.path, thumb.image);
        }
        if self.sm.current() == ViewMode::Thumbnails {
            self.request_redraw();
        }
    }

    fn thumb_grid(&self) -> ThumbGrid {
        ThumbGrid::new(
            self.cfg.thumbnails.size,
            self.cfg.thumbnails.spacing,
            self.viewport.window_rect().width,
        )
    }

    fn select_thumbnail(&mut self, index: usize) {
        if self.catalog.is_empty() {
            return;
        }
        self.selected = index.min(self.catalog.len() - 1);
        let view_height = self.viewport.window_rect().height;
        self.scroll = self
            .thumb_grid()
            .scroll_to_show(self.selected, self.scroll, view_height);
        self.request_thumbnails();
        self.request_redraw();
    }

    fn open_selected(&mut self) {
        if self.catalog.select(self.selected).is_some() {
            self.open_current();
        }
    }

    fn set_canvas(&mut self, event_loop: &ActiveEventLoop, enable: bool) {
        let mut canvas = self.canvas;
        let change = {
            let mut host = Host {
                app: self,
                event_loop,
            };
            if enable {
                canvas.enable(&mut host)
            } else {
                canvas.disable(&mut host)
            }
        };
        self.canvas = canvas;
        match change {
            Some(CanvasChange::Entered(CanvasStrategy::Overlay)) => {
                self.timers.schedule_after(
                    Instant::now(),
                    self.cfg.canvas.settle_delay,
                    DeferredAction::OverlaySettle,
                );
            }
            Some(CanvasChange::Entered(CanvasStrategy::InPlace)) => {
                self.timers
                    .schedule(Instant::now(), DeferredAction::PanelRaise);
            }
            Some(CanvasChange::Exited | CanvasChange::Failed) => {
                self.timers.clear();
                self.canvas_opacity = self.cfg.canvas.overlay_opacity;
            }
            None => {}
        }
        self.request_redraw();
    }

    fn toggle_canvas(&mut self, event_loop: &ActiveEventLoop) {
        let enable = !self.canvas.is_enabled();
        self.set_canvas(event_loop, enable);
    }

    fn step_opacity(&mut self, delta: f32) {
        let Some(strategy) = self.canvas.active_strategy() else {
            return;
        };
        let opacity = (self.canvas_opacity + delta).clamp(MIN_OPACITY, 1.0);
        if (opacity - self.canvas_opacity).abs() < f32::EPSILON {
            return;
        }
        self.canvas_opacity = opacity;
        match strategy {
            CanvasStrategy::Overlay => {
                if let Some(overlay) = self.overlay.as_mut() {
                    let mut state = overlay.display_state().clone();
                    state.opacity = opacity;
                    overlay.set_display_state(state);
                }
            }
            CanvasStrategy::InPlace => {
                let outcome = self.mask.driver_mut().set_opacity(opacity);
                if !outcome.is_applied() {
                    debug!(?outcome, "window opacity unsupported");
                }
            }
        }
        info!(opacity, "canvas opacity");
    }

    fn toggle_always_on_top(&mut self) {
        self.flags.always_on_top = !self.flags.always_on_top;
        if let Some(window) = self.window() {
            window.set_window_level(window_level(self.flags.always_on_top));
        }
        let outcome = self.mask.driver_mut().raise_above(self.flags.always_on_top);
        debug!(above = self.flags.always_on_top, ?outcome, "always-on-top toggled");
        self.refresh_mask(MaskTrigger::AlwaysOnTopToggled);
    }

    fn toggle_title_bar(&mut self) {
        self.flags.decorations = !self.flags.decorations;
        if let Some(window) = self.window() {
            window.set_decorations(self.flags.decorations);
        }
        self.refresh_mask(MaskTrigger::Resized);
    }

    fn toggle_transparency(&mut self) {
        self.flags.transparent = !self.flags.transparent;
        debug!(transparent = self.flags.transparent, "transparent background toggled");
        self.refresh_mask(MaskTrigger::TransparencyToggled);
        self.request_redraw();
    }

    fn zoom(&mut self, direction: ZoomDirection) {
        if self.viewport.zoom(direction, self.cursor) {
            self.after_viewport_change(MaskTrigger::ScaleChanged);
        }
    }

    fn after_viewport_change(&mut self, trigger: MaskTrigger) {
        self.refresh_mask(trigger);
        self.update_title();
        self.request_redraw();
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        if event.state != ElementState::Pressed {
            return;
        }
        let now = Instant::now();
        let browsing = self.sm.current() == ViewMode::Thumbnails;
        let columns = self.thumb_grid().columns() as usize;
        match event.logical_key.as_ref() {
            Key::Named(NamedKey::Insert) => self.toggle_canvas(event_loop),
            Key::Named(NamedKey::Escape) => {
                if self.canvas.is_enabled() {
                    self.set_canvas(event_loop, false);
                } else {
                    self.show_thumbnails();
                }
            }
            Key::Named(NamedKey::PageUp) => self.step_opacity(OPACITY_STEP),
            Key::Named(NamedKey::PageDown) => self.step_opacity(-OPACITY_STEP),
            Key::Named(NamedKey::ArrowLeft) if browsing => {
                self.select_thumbnail(self.selected.saturating_sub(1));
            }
            Key::Named(NamedKey::ArrowRight) if browsing => {
                self.select_thumbnail(self.selected + 1);
            }
            Key::Named(NamedKey::ArrowUp) if browsing => {
                self.select_thumbnail(self.selected.saturating_sub(columns));
            }
            Key::Named(NamedKey::ArrowDown) if browsing => {
                self.select_thumbnail(self.selected + columns);
            }
            Key::Named(NamedKey::Home) if browsing => self.select_thumbnail(0),
            Key::Named(NamedKey::End) if browsing => {
                self.select_thumbnail(self.catalog.len().saturating_sub(1));
            }
            Key::Named(NamedKey::Enter) if browsing => self.open_selected(),
            Key::Named(NamedKey::ArrowLeft) => self.navigate(false),
            Key::Named(NamedKey::ArrowRight) => self.navigate(true),
            Key::Named(NamedKey::Space) => {
                let running = self.sm.toggle_slideshow(now);
                info!(running, "slideshow");
            }
            Key::Character(text) => match text {
                "+" | "=" => self.zoom(ZoomDirection::In),
                "-" => self.zoom(ZoomDirection::Out),
                "f" => {
                    if self.viewport.fit_to_window() {
                        self.after_viewport_change(MaskTrigger::ScaleChanged);
                    }
                }
                "1" => {
                    if self.viewport.actual_size(self.cursor) {
                        self.after_viewport_change(MaskTrigger::ScaleChanged);
                    }
                }
                "t" => self.toggle_transparency(),
                "a" => self.toggle_always_on_top(),
                "b" => self.toggle_title_bar(),
                "r" => self.apply_transform(Transform::rotate_cw),
                "l" => self.apply_transform(Transform::rotate_ccw),
                "h" => self.apply_transform(Transform::mirror_horizontal),
                "v" => self.apply_transform(Transform::mirror_vertical),
                "0" => self.apply_transform(Transform::reset),
                _ => {}
            },
            _ => {}
        }
    }

    fn handle_primary_event(&mut self, event_loop: &ActiveEventLoop, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("viewer window close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => self.handle_resize(size),
            WindowEvent::ScaleFactorChanged {
                mut inner_size_writer,
                ..
            } => {
                if let Some(window) = self.window() {
                    let size = window.inner_size();
                    let _ = inner_size_writer.request_inner_size(size);
                    self.handle_resize(size);
                }
            }
            WindowEvent::RedrawRequested => self.draw(),
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(event_loop, &event),
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = PointF::new(position.x, position.y);
                if let Some(last) = self.panning {
                    self.panning = Some(self.cursor);
                    if self.viewport.pan_by(self.cursor - last) {
                        self.refresh_mask(MaskTrigger::PanChanged);
                        self.request_redraw();
                    }
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.handle_primary_button(state, button);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => f64::from(y),
                    MouseScrollDelta::PixelDelta(p) => p.y / 40.0,
                };
                match self.sm.current() {
                    ViewMode::Single if lines > 0.0 => self.zoom(ZoomDirection::In),
                    ViewMode::Single if lines < 0.0 => self.zoom(ZoomDirection::Out),
                    ViewMode::Thumbnails => {
                        let grid = self.thumb_grid();
                        let max = grid
                            .content_height(self.catalog.len())
                            .saturating_sub(self.viewport.window_rect().height);
                        let step = (lines * 40.0) as i64;
                        self.scroll =
                            (i64::from(self.scroll) - step).clamp(0, i64::from(max)) as u32;
                        self.request_thumbnails();
                        self.request_redraw();
                    }
                    _ => {}
                }
            }
            WindowEvent::Focused(false) if self.in_place => {
                self.timers
                    .schedule(Instant::now(), DeferredAction::PanelRaise);
            }
            _ => {}
        }
    }

    fn handle_primary_button(&mut self, state: ElementState, button: MouseButton) {
        let (x, y) = (self.cursor.x.round() as i32, self.cursor.y.round() as i32);
        match (button, state) {
            (MouseButton::Left, ElementState::Pressed) => match self.sm.current() {
                ViewMode::Single => {
                    if self.mask.accepts_pointer(x, y) {
                        self.panning = Some(self.cursor);
                    } else {
                        debug!(x, y, "click outside hit region ignored");
                    }
                }
                ViewMode::Thumbnails => {
                    let index = self
                        .thumb_grid()
                        .index_at(x, y, self.scroll, self.catalog.len());
                    if let Some(index) = index {
                        self.selected = index;
                        self.open_selected();
                    }
                }
            },
            (MouseButton::Left, ElementState::Released) => self.panning = None,
            (MouseButton::Middle, ElementState::Pressed) => {
                if let Some(window) = self.window() {
                    if let Err(err) = window.drag_window() {
                        debug!(error = %err, "window drag unavailable");
                    }
                }
            }
            _ => {}
        }
    }

    fn handle_resize(&mut self, size: PhysicalSize<u32>) {
        if let Some(primary) = self.primary.as_mut() {
            if let (Some(w), Some(h)) =
                (NonZeroU32::new(size.width), NonZeroU32::new(size.height))
            {
                if let Err(err) = primary.surface.resize(w, h) {
                    warn!(error = %err, "failed to resize viewer surface");
                }
            }
        }
        self.viewport.on_resize(size.width, size.height);
        self.scaled.invalidate();
        let view_height = self.viewport.window_rect().height;
        self.scroll = self
            .thumb_grid()
            .scroll_to_show(self.selected, self.scroll, view_height);
        if self.sm.current() == ViewMode::Thumbnails {
            self.request_thumbnails();
        }
        self.after_viewport_change(MaskTrigger::Resized);
    }

    fn handle_overlay_event(&mut self, event_loop: &ActiveEventLoop, event: WindowEvent) {
        let Some(overlay) = self.overlay.as_mut() else {
            return;
        };
        match event {
            WindowEvent::RedrawRequested => overlay.draw(),
            WindowEvent::Resized(size) => overlay.resize(size),
            WindowEvent::Focused(false) => {
                self.timers
                    .schedule(Instant::now(), DeferredAction::OverlayRaise);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.overlay_cursor = PointF::new(position.x, position.y);
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                let (x, y) = (
                    self.overlay_cursor.x.round() as i32,
                    self.overlay_cursor.y.round() as i32,
                );
                if overlay.hits_hole(x, y) {
                    self.set_canvas(event_loop, false);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(event_loop, &event),
            WindowEvent::CloseRequested => self.set_canvas(event_loop, false),
            _ => {}
        }
    }

    fn handle_panel_event(&mut self, event_loop: &ActiveEventLoop, event: WindowEvent) {
        match event {
            WindowEvent::RedrawRequested => {
                if let Some(panel) = self.panel.as_mut() {
                    panel.draw();
                }
            }
            WindowEvent::MouseInput {
                state: ElementState::Released,
                button: MouseButton::Left,
                ..
            }
            | WindowEvent::CloseRequested => self.set_canvas(event_loop, false),
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(event_loop, &event),
            _ => {}
        }
    }

    fn run_deferred(&mut self, now: Instant) {
        for action in self.timers.take_due(now) {
            match action {
                DeferredAction::OverlaySettle => {
                    let hole = overlay_hole(self.overlay.as_ref(), self.panel.as_ref());
                    if let Some(overlay) = self.overlay.as_mut() {
                        overlay.settle(hole, now);
                        overlay.force_raise();
                    }
                    if let Some(panel) = self.panel.as_mut() {
                        panel.raise();
                    }
                }
                DeferredAction::OverlayRaise => {
                    if let Some(overlay) = self.overlay.as_mut() {
                        overlay.force_raise();
                    }
                    if let Some(panel) = self.panel.as_mut() {
                        panel.raise();
                    }
                }
                DeferredAction::PanelRaise => {
                    if self.in_place {
                        let outcome = self.mask.driver_mut().raise_above(true);
                        debug!(?outcome, "in-place canvas raised");
                    }
                    if let Some(panel) = self.panel.as_mut() {
                        panel.raise();
                    }
                }
            }
        }
    }

    fn flush_masks(&mut self, now: Instant) {
        if self.primary.is_some() && (self.mask.is_dirty() || self.mask.next_deadline().is_some()) {
            let inputs = self.mask_inputs();
            match self.mask.flush(&inputs, now) {
                Flush::Offloaded(job) => {
                    mask_worker::spawn_mask_job(MaskTarget::Primary, job, self.proxy.clone());
                }
                Flush::Applied {
                    shape,
                    outcome: Some(outcome),
                } if !outcome.is_applied() => {
                    debug!(?shape, ?outcome, "hit region not applied natively");
                }
                _ => {}
            }
        }
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.flush_mask(now);
        }
    }

    fn schedule_wakeup(&self, event_loop: &ActiveEventLoop) {
        let deadline = [
            self.timers.next_deadline(),
            self.mask.next_deadline(),
            self.overlay.as_ref().and_then(OverlayWindow::next_deadline),
            self.sm.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min();
        match deadline {
            Some(at) => event_loop.set_control_flow(ControlFlow::WaitUntil(at)),
            None => event_loop.set_control_flow(ControlFlow::Wait),
        }
    }

    fn draw(&mut self) {
        let Some(primary) = self.primary.as_mut() else {
            return;
        };
        self.pending_redraw = false;
        let size = primary.window.inner_size();
        let (width, height) = (size.width.max(1), size.height.max(1));
        let mut buffer = match primary.surface.buffer_mut() {
            Ok(buffer) => buffer,
            Err(err) => {
                warn!(error = %err, "viewer buffer unavailable");
                return;
            }
        };
        let mut frame = Frame::new(&mut buffer, width, height);
        let background = if self.flags.transparent || self.in_place {
            Color::TRANSPARENT
        } else {
            BACKDROP
        };
        frame.clear(background);

        match self.sm.current() {
            ViewMode::Single => {
                let opacity = if self.in_place { self.canvas_opacity } else { 1.0 };
                if let (Some(img), Some(placement)) =
                    (self.rendered.as_ref(), self.viewport.placement())
                {
                    let window = Rect::from_size(width, height);
                    if let Some((visible, scaled)) = self.scaled.visible(img, placement, window) {
                        frame.blit(scaled, (visible.x, visible.y), opacity);
                    }
                }
            }
            ViewMode::Thumbnails => {
                let grid = ThumbGrid::new(
                    self.cfg.thumbnails.size,
                    self.cfg.thumbnails.spacing,
                    width,
                );
                draw_thumbnails(
                    &mut frame,
                    grid,
                    &self.catalog,
                    self.thumbs.as_mut(),
                    self.selected,
                    self.scroll,
                );
            }
        }

        primary.window.pre_present_notify();
        if let Err(err) = buffer.present() {
            warn!(error = %err, "failed to present viewer frame");
        }
    }
}

fn draw_thumbnails(
    frame: &mut Frame<'_>,
    grid: ThumbGrid,
    catalog: &Catalog,
    cache: &mut dyn ThumbnailCache,
    selected: usize,
    scroll: u32,
) {
    let bounds = frame.bounds();
    for (index, path) in catalog.paths().iter().enumerate() {
        let tile = grid.tile_rect(index, scroll);
        if tile.intersect(&bounds).is_none() {
            continue;
        }
        frame.fill_rect(tile, TILE);
        if let Some(thumb) = cache.get(path) {
            let x = tile.x + (tile.width.saturating_sub(thumb.width()) / 2) as i32;
            let y = tile.y + (tile.height.saturating_sub(thumb.height()) / 2) as i32;
            frame.blit(&thumb, (x, y), 1.0);
        }
        if index == selected {
            frame.stroke_rect(tile, 3, SELECTION);
        }
    }
}

/// The control panel's footprint in overlay-local coordinates.
fn overlay_hole(overlay: Option<&OverlayWindow>, panel: Option<&ControlPanel>) -> Option<Rect> {
    let overlay = overlay?;
    let panel = panel?.screen_rect();
    let (ox, oy) = overlay.outer_position()?;
    let size = overlay.window().inner_size();
    let bounds = Rect::new(ox, oy, size.width, size.height);
    panel
        .intersect(&bounds)
        .map(|hole| hole.translated(-ox, -oy))
}

/// Canvas entry and exit as seen from the running application.
struct Host<'a> {
    app: &'a mut ViewerApp,
    event_loop: &'a ActiveEventLoop,
}

impl CanvasHost for Host<'_> {
    fn snapshot(&self) -> WindowSnapshot {
        let app = &*self.app;
        let (position, size, maximized) = match app.window() {
            Some(window) => {
                let size = window.inner_size();
                (
                    window.outer_position().ok().map(|p| (p.x, p.y)),
                    (size.width, size.height),
                    window.is_maximized(),
                )
            }
            None => {
                let rect = app.viewport.window_rect();
                (None, (rect.width, rect.height), false)
            }
        };
        WindowSnapshot {
            position,
            size,
            maximized,
            flags: app.flags,
        }
    }

    fn display_state(&self) -> DisplayState {
        self.app.display_state()
    }

    fn open_overlay(&mut self, snapshot: &WindowSnapshot, state: DisplayState) -> Result<()> {
        // Drop any stale instance before building a new one.
        self.app.overlay = None;
        let mut overlay = OverlayWindow::create(
            self.event_loop,
            snapshot,
            state,
            &self.app.cfg.canvas,
            &self.app.cfg.mask,
        )?;
        overlay.show();
        self.app.overlay = Some(overlay);
        Ok(())
    }

    fn close_overlay(&mut self) {
        if self.app.overlay.take().is_some() {
            debug!("overlay closed");
        }
    }

    fn enter_in_place(&mut self) -> Result<()> {
        let app = &mut *self.app;
        let window = app
            .window()
            .ok_or_else(|| anyhow!("viewer window not created"))?;
        window.set_decorations(false);
        window.set_window_level(WindowLevel::AlwaysOnTop);
        app.flags.decorations = false;
        app.flags.always_on_top = true;
        app.in_place = true;
        let outcome = app.mask.driver_mut().set_opacity(app.canvas_opacity);
        debug!(?outcome, opacity = app.canvas_opacity, "in-place canvas opacity");
        app.refresh_mask(MaskTrigger::CanvasChanged);
        app.refresh_mask(MaskTrigger::AlwaysOnTopToggled);
        app.request_redraw();
        Ok(())
    }

    fn leave_in_place(&mut self) {
        let app = &mut *self.app;
        if !app.in_place {
            return;
        }
        app.in_place = false;
        app.refresh_mask(MaskTrigger::CanvasChanged);
    }

    fn open_control_panel(&mut self) -> Result<()> {
        self.app.panel = None;
        let panel = ControlPanel::create(self.event_loop, &self.app.cfg.canvas.control_panel)?;
        self.app.panel = Some(panel);
        Ok(())
    }

    fn close_control_panel(&mut self) {
        self.app.panel = None;
    }

    fn hide_primary(&mut self) {
        if let Some(window) = self.app.window() {
            window.set_visible(false);
        }
    }

    fn restore_primary(&mut self, snapshot: &WindowSnapshot) {
        let app = &mut *self.app;
        app.flags = snapshot.flags;
        if let Some(window) = app.window() {
            window.set_decorations(snapshot.flags.decorations);
            window.set_window_level(window_level(snapshot.flags.always_on_top));
            window.set_maximized(snapshot.maximized);
            if !snapshot.maximized {
                let (width, height) = snapshot.size;
                let _ = window.request_inner_size(PhysicalSize::new(width, height));
                if let Some((x, y)) = snapshot.position {
                    window.set_outer_position(PhysicalPosition::new(x, y));
                }
            }
            window.set_visible(true);
            window.focus_window();
        }
        let outcome = app.mask.driver_mut().set_opacity(1.0);
        debug!(?outcome, "viewer opacity restored");
        app.refresh_mask(MaskTrigger::CanvasChanged);
        app.refresh_mask(MaskTrigger::AlwaysOnTopToggled);
        app.request_redraw();
    }
}

impl ApplicationHandler<ViewerEvent> for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.cancel.is_cancelled() {
            event_loop.exit();
            return;
        }

        if self.ensure_window(event_loop).is_none() {
            event_loop.exit();
            return;
        }

        match self.sm.current() {
            ViewMode::Single if self.current.is_none() => self.open_current(),
            ViewMode::Thumbnails => self.request_thumbnails(),
            _ => {}
        }
        self.update_title();
        self.request_redraw();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.window().is_some_and(|w| w.id() == window_id) {
            self.handle_primary_event(event_loop, event);
        } else if self.overlay.as_ref().is_some_and(|o| o.id() == window_id) {
            self.handle_overlay_event(event_loop, event);
        } else if self.panel.as_ref().is_some_and(|p| p.id() == window_id) {
            self.handle_panel_event(event_loop, event);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.cancel.is_cancelled() {
            event_loop.exit();
            return;
        }
        let now = Instant::now();
        self.run_deferred(now);
        if self.sm.on_tick(now) {
            self.navigate(true);
        }
        self.flush_masks(now);
        if self.pending_redraw {
            if let Some(window) = self.window() {
                window.request_redraw();
            }
        }
        self.schedule_wakeup(event_loop);
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Cancelled => {
                info!("viewer received cancellation event");
                event_loop.exit();
            }
            ViewerEvent::ImageLoaded { request, image } => {
                if request != self.load_request {
                    debug!(request, latest = self.load_request, "stale image load dropped");
                    return;
                }
                self.on_image_loaded(event_loop, image);
            }
            ViewerEvent::LoadFailed { request, path } => {
                warn!(request, path = %path.display(), "image could not be opened");
            }
            ViewerEvent::ThumbnailsReady(batch) => self.on_thumbnails(batch),
            ViewerEvent::MaskReady {
                target: MaskTarget::Primary,
                result,
            } => match self.mask.complete(result) {
                Some(Flush::Applied { shape, outcome }) => {
                    debug!(?shape, ?outcome, "offloaded hit region applied");
                }
                Some(Flush::Offloaded(job)) => {
                    mask_worker::spawn_mask_job(MaskTarget::Primary, job, self.proxy.clone());
                }
                _ => {}
            },
            ViewerEvent::MaskReady {
                target: MaskTarget::Overlay,
                result,
            } => {
                debug!(generation = result.generation, "overlay mask result ignored");
            }
        }
    }
}

/// Run the viewer on the calling thread until the window closes or `cancel`
/// fires. `initial` is an image file or a directory to browse.
pub fn run_windowed(
    cfg: Configuration,
    cancel: CancellationToken,
    initial: Option<PathBuf>,
    start_in_canvas: bool,
) -> Result<()> {
    let path = match initial {
        Some(path) => path,
        None => std::env::current_dir().context("no working directory")?,
    };
    let catalog =
        Catalog::open(&path).with_context(|| format!("failed to open {}", path.display()))?;
    let mode = if path.is_dir() || catalog.is_empty() {
        ViewMode::Thumbnails
    } else {
        ViewMode::Single
    };
    info!(images = catalog.len(), ?mode, "catalog ready");

    let event_loop = EventLoop::<ViewerEvent>::with_user_event()
        .build()
        .context("failed to build viewer event loop")?;
    let proxy = event_loop.create_proxy();

    let cancel_task = {
        let cancel = cancel.clone();
        let proxy = proxy.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            let _ = proxy.send_event(ViewerEvent::Cancelled);
        })
    };

    let mut app = ViewerApp::new(cfg, cancel, proxy, catalog, mode, start_in_canvas);
    let run_result = event_loop.run_app(&mut app);
    cancel_task.abort();

    run_result.context("viewer event loop failed")
}
