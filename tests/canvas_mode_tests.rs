use std::sync::Arc;

use anyhow::{Result, bail};
use canvas_viewer::geometry::PointF;
use canvas_viewer::tasks::viewer::canvas::{
    CanvasChange, CanvasController, CanvasHost, CanvasMode, DisplayState, WindowFlags,
    WindowSnapshot,
};
use config_model::CanvasStrategy;
use image::RgbaImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    OpenOverlay,
    CloseOverlay,
    EnterInPlace,
    LeaveInPlace,
    OpenPanel,
    ClosePanel,
    HidePrimary,
    RestorePrimary,
}

struct FakeHost {
    calls: Vec<Call>,
    overlays: usize,
    panels: usize,
    primary: WindowSnapshot,
    primary_visible: bool,
    overlay_state: Option<DisplayState>,
    fail_panel: bool,
    fail_overlay: bool,
    has_image: bool,
}

impl FakeHost {
    fn new() -> Self {
        Self {
            calls: Vec::new(),
            overlays: 0,
            panels: 0,
            primary: WindowSnapshot {
                position: Some((120, 80)),
                size: (1024, 768),
                maximized: false,
                flags: WindowFlags {
                    decorations: true,
                    always_on_top: false,
                    transparent: true,
                },
            },
            primary_visible: true,
            overlay_state: None,
            fail_panel: false,
            fail_overlay: false,
            has_image: true,
        }
    }
}

impl CanvasHost for FakeHost {
    fn snapshot(&self) -> WindowSnapshot {
        self.primary
    }

    fn display_state(&self) -> DisplayState {
        DisplayState {
            image: self
                .has_image
                .then(|| Arc::new(RgbaImage::new(40, 30))),
            has_alpha: true,
            scale: 2.0,
            pan: PointF::new(3.0, -4.0),
            image_rect: None,
            opacity: 0.7,
        }
    }

    fn open_overlay(&mut self, _snapshot: &WindowSnapshot, state: DisplayState) -> Result<()> {
        self.calls.push(Call::OpenOverlay);
        if self.fail_overlay {
            bail!("overlay refused");
        }
        self.overlays += 1;
        self.overlay_state = Some(state);
        Ok(())
    }

    fn close_overlay(&mut self) {
        self.calls.push(Call::CloseOverlay);
        self.overlays = 0;
        self.overlay_state = None;
    }

    fn enter_in_place(&mut self) -> Result<()> {
        self.calls.push(Call::EnterInPlace);
        self.primary.flags.decorations = false;
        self.primary.flags.always_on_top = true;
        Ok(())
    }

    fn leave_in_place(&mut self) {
        self.calls.push(Call::LeaveInPlace);
    }

    fn open_control_panel(&mut self) -> Result<()> {
        self.calls.push(Call::OpenPanel);
        if self.fail_panel {
            bail!("panel refused");
        }
        self.panels += 1;
        Ok(())
    }

    fn close_control_panel(&mut self) {
        self.calls.push(Call::ClosePanel);
        self.panels = 0;
    }

    fn hide_primary(&mut self) {
        self.calls.push(Call::HidePrimary);
        self.primary_visible = false;
    }

    fn restore_primary(&mut self, snapshot: &WindowSnapshot) {
        self.calls.push(Call::RestorePrimary);
        self.primary = *snapshot;
        self.primary_visible = true;
    }
}

#[test]
fn overlay_entry_hides_primary_and_hands_over_a_snapshot() {
    let mut host = FakeHost::new();
    let mut canvas = CanvasController::new(CanvasStrategy::Overlay);
    assert_eq!(
        canvas.enable(&mut host),
        Some(CanvasChange::Entered(CanvasStrategy::Overlay))
    );
    assert!(canvas.is_enabled());
    assert_eq!(
        host.calls,
        vec![Call::OpenOverlay, Call::OpenPanel, Call::HidePrimary]
    );
    assert!(!host.primary_visible);
    let state = host.overlay_state.as_ref().unwrap();
    assert_eq!(state.scale, 2.0);
    assert_eq!(state.opacity, 0.7);
}

#[test]
fn enabling_twice_keeps_one_overlay_and_one_panel() {
    let mut host = FakeHost::new();
    let mut canvas = CanvasController::new(CanvasStrategy::Overlay);
    canvas.enable(&mut host);
    assert_eq!(canvas.enable(&mut host), None);
    assert_eq!((host.overlays, host.panels), (1, 1));
}

#[test]
fn disable_restores_the_saved_window() {
    let mut host = FakeHost::new();
    let saved = host.primary;
    let mut canvas = CanvasController::new(CanvasStrategy::InPlace);
    canvas.enable(&mut host);
    assert!(!host.primary.flags.decorations);
    assert!(host.primary_visible);

    assert_eq!(canvas.disable(&mut host), Some(CanvasChange::Exited));
    assert_eq!(canvas.mode(), CanvasMode::Disabled);
    assert_eq!(host.primary, saved);
    assert_eq!(
        &host.calls[2..],
        &[Call::ClosePanel, Call::LeaveInPlace, Call::RestorePrimary]
    );
    assert_eq!(canvas.disable(&mut host), None);
}

#[test]
fn enabled_mode_remembers_strategy_and_snapshot() {
    let mut host = FakeHost::new();
    let mut canvas = CanvasController::new(CanvasStrategy::Overlay);
    canvas.enable(&mut host);
    assert_eq!(
        canvas.mode(),
        CanvasMode::Enabled {
            saved: FakeHost::new().primary,
            strategy: CanvasStrategy::Overlay,
        }
    );
    assert_eq!(canvas.active_strategy(), Some(CanvasStrategy::Overlay));
}

#[test]
fn panel_failure_rolls_back_to_disabled() {
    let mut host = FakeHost::new();
    host.fail_panel = true;
    let mut canvas = CanvasController::new(CanvasStrategy::Overlay);
    assert_eq!(canvas.enable(&mut host), Some(CanvasChange::Failed));
    assert!(!canvas.is_enabled());
    assert_eq!((host.overlays, host.panels), (0, 0));
    assert!(host.primary_visible);
    assert!(host.calls.ends_with(&[Call::CloseOverlay, Call::RestorePrimary]));
    assert!(!host.calls.contains(&Call::HidePrimary));
}

#[test]
fn overlay_failure_never_opens_the_panel() {
    let mut host = FakeHost::new();
    host.fail_overlay = true;
    let mut canvas = CanvasController::new(CanvasStrategy::Overlay);
    assert_eq!(canvas.enable(&mut host), Some(CanvasChange::Failed));
    assert!(!host.calls.contains(&Call::OpenPanel));
    assert_eq!(canvas.active_strategy(), None);
}

#[test]
fn toggle_alternates_between_modes() {
    let mut host = FakeHost::new();
    let mut canvas = CanvasController::new(CanvasStrategy::Overlay);
    assert!(matches!(canvas.toggle(&mut host), Some(CanvasChange::Entered(_))));
    assert_eq!(canvas.toggle(&mut host), Some(CanvasChange::Exited));
    assert!(matches!(canvas.toggle(&mut host), Some(CanvasChange::Entered(_))));
    assert_eq!((host.overlays, host.panels), (1, 1));
}

#[test]
fn overlay_opens_even_without_an_image() {
    let mut host = FakeHost::new();
    host.has_image = false;
    let mut canvas = CanvasController::new(CanvasStrategy::Overlay);
    assert_eq!(
        canvas.enable(&mut host),
        Some(CanvasChange::Entered(CanvasStrategy::Overlay))
    );
    let state = host.overlay_state.as_ref().unwrap();
    assert!(state.image.is_none());
    assert!(state.placement_in(800, 600).is_none());
    assert_eq!(host.overlays, 1);
    assert_eq!(host.panels, 1);

    assert_eq!(canvas.disable(&mut host), Some(CanvasChange::Exited));
    assert!(host.primary_visible);
}
