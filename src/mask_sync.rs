//! Hit-region synchronisation for one window.
//!
//! [`MaskSynchronizer`] is the only way a window's hit region changes. Callers
//! report what happened through [`MaskSynchronizer::request_refresh`]; the
//! event loop calls [`MaskSynchronizer::flush`] once per iteration with the
//! current [`MaskInputs`], which recomputes at most once per dirty cycle and
//! pushes the result through the attached [`ShapeDriver`].
//!
//! Toggling always-on-top remaps the window on some window managers and
//! drops its input shape, so that trigger schedules a confirmation pass
//! `confirm-delay` later that re-pushes the shape even if it looks unchanged.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use config_model::MaskConfig;
use image::RgbaImage;
use tracing::{debug, trace, warn};

use crate::geometry::Rect;
use crate::platform::{DetachedDriver, HitShape, ShapeDriver, ShapeOutcome};
use crate::processing::alpha_mask::{AlphaMaskBuilder, MaskSource, visible_pixels};
use crate::processing::region::Region;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskTrigger {
    ScaleChanged,
    PanChanged,
    Resized,
    TransparencyToggled,
    AlwaysOnTopToggled,
    ImageReplaced,
    ViewModeChanged,
    CanvasChanged,
}

/// What the window is currently used for, as far as hit-testing cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskView {
    /// Thumbnail grid or any other non-image view.
    Browser,
    SingleImage,
    /// Click-through canvas; `hole` stays clickable if set.
    Passthrough { hole: Option<Rect> },
}

#[derive(Debug, Clone)]
pub struct MaskImage {
    pub image: Arc<RgbaImage>,
    pub has_alpha: bool,
}

#[derive(Debug, Clone)]
pub struct MaskInputs {
    pub view: MaskView,
    pub transparency: bool,
    pub image: Option<MaskImage>,
    /// Where the scaled image sits in window-local coordinates.
    pub placement: Rect,
    /// The window's own client rectangle.
    pub window: Rect,
}

/// Background alpha scan for a large visible area.
#[derive(Debug, Clone)]
pub struct MaskJob {
    pub generation: u64,
    builder: AlphaMaskBuilder,
    image: Arc<RgbaImage>,
    has_alpha: bool,
    placement: Rect,
    window: Rect,
}

impl MaskJob {
    pub fn run(self) -> MaskResult {
        let region = self.builder.build(
            MaskSource {
                image: &self.image,
                has_alpha: self.has_alpha,
            },
            self.placement,
            self.window,
        );
        MaskResult {
            generation: self.generation,
            region,
            visible: self.placement.intersect(&self.window),
        }
    }
}

#[derive(Debug)]
pub struct MaskResult {
    pub generation: u64,
    pub region: Result<Region>,
    visible: Option<Rect>,
}

#[derive(Debug)]
pub enum Flush {
    /// Nothing was dirty.
    Idle,
    /// A shape was decided; `outcome` is `None` when it matched the one
    /// already applied and no push was needed.
    Applied {
        shape: HitShape,
        outcome: Option<ShapeOutcome>,
    },
    /// The scan is too large for the UI thread; run the job and hand the
    /// result to [`MaskSynchronizer::complete`].
    Offloaded(MaskJob),
}

enum Decision {
    Shape(HitShape),
    Build {
        image: MaskImage,
        placement: Rect,
        window: Rect,
    },
}

pub struct MaskSynchronizer {
    driver: Box<dyn ShapeDriver>,
    builder: AlphaMaskBuilder,
    offload_min_pixels: u64,
    confirm_delay: Duration,
    dirty: bool,
    force: bool,
    generation: u64,
    in_flight: Option<u64>,
    confirm_at: Option<Instant>,
    applied: Option<HitShape>,
    widget_mask: HitShape,
}

impl MaskSynchronizer {
    pub fn new(cfg: &MaskConfig) -> Self {
        Self {
            driver: Box::new(DetachedDriver),
            builder: AlphaMaskBuilder::from_config(cfg),
            offload_min_pixels: cfg.offload_min_pixels,
            confirm_delay: cfg.confirm_delay,
            dirty: true,
            force: false,
            generation: 0,
            in_flight: None,
            confirm_at: None,
            applied: None,
            widget_mask: HitShape::Clickable,
        }
    }

    pub fn with_driver(cfg: &MaskConfig, driver: Box<dyn ShapeDriver>) -> Self {
        let mut sync = Self::new(cfg);
        sync.attach(driver);
        sync
    }

    /// Point the synchronizer at a (new) native window.
    ///
    /// The shape is re-pushed on the next flush since a fresh window carries
    /// no input shape.
    pub fn attach(&mut self, driver: Box<dyn ShapeDriver>) {
        debug!(backend = driver.backend(), "shape driver attached");
        self.driver = driver;
        self.applied = None;
        self.dirty = true;
    }

    /// Mark the hit region stale.
    pub fn request_refresh(&mut self, trigger: MaskTrigger, now: Instant) {
        trace!(?trigger, "mask refresh requested");
        self.dirty = true;
        if trigger == MaskTrigger::AlwaysOnTopToggled {
            self.confirm_at = Some(now + self.confirm_delay);
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Deadline of the pending confirmation pass, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.confirm_at
    }

    pub fn is_computing(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Shape last accepted by the native window, if any.
    pub fn applied_shape(&self) -> Option<&HitShape> {
        self.applied.as_ref()
    }

    /// In-process hit region consulted before reacting to pointer input.
    pub fn widget_mask(&self) -> &HitShape {
        &self.widget_mask
    }

    pub fn accepts_pointer(&self, x: i32, y: i32) -> bool {
        match &self.widget_mask {
            HitShape::Clickable => true,
            HitShape::Passthrough => false,
            HitShape::Rect(rect) => rect.contains(x, y),
            HitShape::Region(region) => region.contains(x, y),
        }
    }

    /// Stacking and opacity hints go through the same driver as the shape.
    pub fn driver_mut(&mut self) -> &mut dyn ShapeDriver {
        self.driver.as_mut()
    }

    /// Recompute and apply if dirty or if the confirmation pass is due.
    pub fn flush(&mut self, inputs: &MaskInputs, now: Instant) -> Flush {
        if self.confirm_at.is_some_and(|at| at <= now) {
            debug!("mask confirmation pass");
            self.confirm_at = None;
            self.dirty = true;
            self.force = true;
        }
        if !self.dirty {
            return Flush::Idle;
        }
        self.dirty = false;
        self.generation += 1;

        match self.decide(inputs) {
            Decision::Shape(shape) => {
                self.in_flight = None;
                self.push(shape)
            }
            Decision::Build {
                image,
                placement,
                window,
            } => {
                let pixels = visible_pixels(placement, window);
                if image.has_alpha && pixels >= self.offload_min_pixels {
                    debug!(generation = self.generation, pixels, "mask scan offloaded");
                    self.in_flight = Some(self.generation);
                    return Flush::Offloaded(MaskJob {
                        generation: self.generation,
                        builder: self.builder,
                        image: image.image,
                        has_alpha: image.has_alpha,
                        placement,
                        window,
                    });
                }
                self.in_flight = None;
                let region = self.builder.build(
                    MaskSource {
                        image: &image.image,
                        has_alpha: image.has_alpha,
                    },
                    placement,
                    window,
                );
                let shape = region_shape(region, placement.intersect(&window));
                self.push(shape)
            }
        }
    }

    /// Apply a background result unless a newer request superseded it.
    pub fn complete(&mut self, result: MaskResult) -> Option<Flush> {
        if self.in_flight != Some(result.generation) || result.generation != self.generation {
            debug!(
                generation = result.generation,
                latest = self.generation,
                "stale mask result discarded"
            );
            return None;
        }
        self.in_flight = None;
        let shape = region_shape(result.region, result.visible);
        Some(self.push(shape))
    }

    fn decide(&self, inputs: &MaskInputs) -> Decision {
        match inputs.view {
            MaskView::Browser => Decision::Shape(HitShape::Clickable),
            MaskView::Passthrough { hole: None } => Decision::Shape(HitShape::Passthrough),
            MaskView::Passthrough { hole: Some(hole) } => {
                match hole.intersect(&inputs.window) {
                    Some(rect) => Decision::Shape(HitShape::Rect(rect)),
                    None => Decision::Shape(HitShape::Passthrough),
                }
            }
            MaskView::SingleImage => {
                let Some(image) = inputs.image.clone() else {
                    return Decision::Shape(HitShape::Clickable);
                };
                if !inputs.transparency {
                    return Decision::Shape(HitShape::Clickable);
                }
                Decision::Build {
                    image,
                    placement: inputs.placement,
                    window: inputs.window,
                }
            }
        }
    }

    fn push(&mut self, shape: HitShape) -> Flush {
        self.widget_mask = shape.clone();
        let force = std::mem::take(&mut self.force);
        if !force && self.applied.as_ref() == Some(&shape) {
            trace!("hit region unchanged");
            return Flush::Applied {
                shape,
                outcome: None,
            };
        }
        let outcome = self.driver.apply(&shape);
        debug!(
            generation = self.generation,
            backend = self.driver.backend(),
            ?outcome,
            shape = describe(&shape),
            "hit region applied"
        );
        self.applied = match outcome {
            ShapeOutcome::NoWindow => None,
            _ => Some(shape.clone()),
        };
        Flush::Applied {
            shape,
            outcome: Some(outcome),
        }
    }
}

fn region_shape(region: Result<Region>, visible: Option<Rect>) -> HitShape {
    let region = match region {
        Ok(region) => region,
        Err(err) => {
            warn!(error = ?err, "alpha scan failed; using the visible image rectangle");
            return visible.map_or(HitShape::Passthrough, HitShape::Rect);
        }
    };
    match region.rects() {
        [] => HitShape::Passthrough,
        [single] => HitShape::Rect(*single),
        _ => HitShape::Region(region),
    }
}

fn describe(shape: &HitShape) -> String {
    match shape {
        HitShape::Clickable => "clickable".into(),
        HitShape::Passthrough => "passthrough".into(),
        HitShape::Rect(r) => format!("rect {}x{}+{}+{}", r.width, r.height, r.x, r.y),
        HitShape::Region(region) => format!("region of {} rects", region.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::RecordingDriver;

    fn opaque(w: u32, h: u32) -> MaskImage {
        MaskImage {
            image: Arc::new(RgbaImage::from_pixel(w, h, image::Rgba([1, 2, 3, 255]))),
            has_alpha: false,
        }
    }

    fn single(image: MaskImage, placement: Rect) -> MaskInputs {
        MaskInputs {
            view: MaskView::SingleImage,
            transparency: true,
            image: Some(image),
            placement,
            window: Rect::from_size(640, 480),
        }
    }

    #[test]
    fn refreshes_coalesce_into_one_push() {
        let driver = RecordingDriver::new();
        let mut sync =
            MaskSynchronizer::with_driver(&MaskConfig::default(), Box::new(driver.clone()));
        let now = Instant::now();
        sync.request_refresh(MaskTrigger::ScaleChanged, now);
        sync.request_refresh(MaskTrigger::PanChanged, now);
        let inputs = single(opaque(10, 10), Rect::new(5, 5, 100, 100));
        sync.flush(&inputs, now);
        assert!(matches!(sync.flush(&inputs, now), Flush::Idle));
        assert_eq!(driver.shapes(), vec![HitShape::Rect(Rect::new(5, 5, 100, 100))]);
    }

    #[test]
    fn hole_is_clipped_to_window() {
        let driver = RecordingDriver::new();
        let mut sync =
            MaskSynchronizer::with_driver(&MaskConfig::default(), Box::new(driver.clone()));
        let inputs = MaskInputs {
            view: MaskView::Passthrough {
                hole: Some(Rect::new(600, -10, 100, 50)),
            },
            transparency: true,
            image: None,
            placement: Rect::default(),
            window: Rect::from_size(640, 480),
        };
        sync.flush(&inputs, Instant::now());
        assert_eq!(driver.last_shape(), Some(HitShape::Rect(Rect::new(600, 0, 40, 40))));
        assert!(sync.accepts_pointer(610, 10));
        assert!(!sync.accepts_pointer(10, 10));
    }

    #[test]
    fn detached_window_is_retried_after_attach() {
        let mut sync = MaskSynchronizer::new(&MaskConfig::default());
        let inputs = single(opaque(10, 10), Rect::new(0, 0, 10, 10));
        let now = Instant::now();
        sync.flush(&inputs, now);
        assert!(sync.applied_shape().is_none());

        let driver = RecordingDriver::new();
        sync.attach(Box::new(driver.clone()));
        sync.flush(&inputs, now);
        assert_eq!(driver.shapes().len(), 1);
    }
}
