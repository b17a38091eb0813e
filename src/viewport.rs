//! Scale and pan of the single-image view.

use crate::geometry::{PointF, Rect};
use crate::processing::layout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewFit {
    #[default]
    FitToWindow,
    ActualSize,
    /// Wheel zoom or drag moved the view away from either preset.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomLimits {
    pub step: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self {
            step: 1.15,
            min: 0.03,
            max: 8.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Viewport {
    fit: ViewFit,
    scale: f64,
    pan: PointF,
    image: Option<(u32, u32)>,
    window: (u32, u32),
    limits: ZoomLimits,
}

impl Viewport {
    pub fn new(window_w: u32, window_h: u32, limits: ZoomLimits) -> Self {
        Self {
            fit: ViewFit::FitToWindow,
            scale: 1.0,
            pan: PointF::ZERO,
            image: None,
            window: (window_w, window_h),
            limits,
        }
    }

    pub fn fit(&self) -> ViewFit {
        self.fit
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn pan(&self) -> PointF {
        self.pan
    }

    pub fn window_rect(&self) -> Rect {
        Rect::from_size(self.window.0, self.window.1)
    }

    /// Swap in a new image size and fit it to the window.
    pub fn set_image(&mut self, size: Option<(u32, u32)>) -> bool {
        self.image = size;
        if size.is_none() {
            return false;
        }
        self.fit_to_window();
        true
    }

    /// Keep scale and pan but take a new image size (rotation).
    pub fn replace_image_size(&mut self, size: (u32, u32)) -> bool {
        let changed = self.image != Some(size);
        self.image = Some(size);
        if self.fit == ViewFit::FitToWindow {
            return self.fit_to_window() || changed;
        }
        changed
    }

    pub fn fit_to_window(&mut self) -> bool {
        let Some((iw, ih)) = self.image else {
            return false;
        };
        let scale = layout::contain_scale(self.window.0, self.window.1, iw, ih);
        self.apply(ViewFit::FitToWindow, scale, PointF::ZERO)
    }

    /// 100% scale, keeping the image point under `cursor` in place.
    ///
    /// When already at 100% the pan resets instead.
    pub fn actual_size(&mut self, cursor: PointF) -> bool {
        if self.image.is_none() {
            return false;
        }
        if self.scale == 1.0 {
            return self.apply(ViewFit::ActualSize, 1.0, PointF::ZERO);
        }
        let pan = self.anchored_pan(cursor, self.scale, 1.0);
        self.apply(ViewFit::ActualSize, 1.0, pan)
    }

    pub fn zoom(&mut self, direction: ZoomDirection, cursor: PointF) -> bool {
        if self.image.is_none() {
            return false;
        }
        let old = layout::sanitize_scale(self.scale);
        let next = match direction {
            ZoomDirection::In => old * self.limits.step,
            ZoomDirection::Out => old / self.limits.step,
        };
        let next = next.clamp(self.limits.min, self.limits.max);
        let pan = self.anchored_pan(cursor, old, next);
        self.apply(ViewFit::Manual, next, pan)
    }

    pub fn pan_by(&mut self, delta: PointF) -> bool {
        if self.image.is_none() || (delta.x == 0.0 && delta.y == 0.0) {
            return false;
        }
        let pan = self.pan + delta;
        self.apply(ViewFit::Manual, self.scale, pan)
    }

    /// Track a new window size; only the fit-to-window preset re-fits.
    pub fn on_resize(&mut self, window_w: u32, window_h: u32) -> bool {
        if self.window == (window_w, window_h) {
            return false;
        }
        self.window = (window_w, window_h);
        if self.fit == ViewFit::FitToWindow {
            self.fit_to_window();
        }
        self.image.is_some()
    }

    /// Placement of the scaled image in window-local coordinates.
    pub fn placement(&self) -> Option<Rect> {
        let (iw, ih) = self.image?;
        Some(layout::placement(
            iw,
            ih,
            self.scale,
            self.pan,
            self.window.0,
            self.window.1,
        ))
    }

    fn anchored_pan(&self, cursor: PointF, old: f64, new: f64) -> PointF {
        let centre = PointF::new(f64::from(self.window.0) / 2.0, f64::from(self.window.1) / 2.0);
        let rel = cursor - centre;
        let image_x = (rel.x - self.pan.x) / old;
        let image_y = (rel.y - self.pan.y) / old;
        PointF::new(rel.x - image_x * new, rel.y - image_y * new)
    }

    fn apply(&mut self, fit: ViewFit, scale: f64, pan: PointF) -> bool {
        let scale = layout::sanitize_scale(scale);
        let changed = self.scale != scale || self.pan != pan;
        self.fit = fit;
        self.scale = scale;
        self.pan = pan;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Viewport {
        let mut vp = Viewport::new(1000, 800, ZoomLimits::default());
        vp.set_image(Some((400, 300)));
        vp
    }

    #[test]
    fn new_image_is_fitted() {
        let vp = viewport();
        assert_eq!(vp.fit(), ViewFit::FitToWindow);
        assert!((vp.scale() - 2.5).abs() < 1e-9);
        assert_eq!(vp.placement(), Some(Rect::new(0, 25, 1000, 750)));
    }

    #[test]
    fn zoom_keeps_point_under_cursor() {
        let mut vp = viewport();
        let cursor = PointF::new(800.0, 200.0);
        let before = vp.placement().unwrap();
        let img_x = (cursor.x - f64::from(before.x)) / vp.scale();
        assert!(vp.zoom(ZoomDirection::In, cursor));
        let after = vp.placement().unwrap();
        let img_x_after = (cursor.x - f64::from(after.x)) / vp.scale();
        assert!((img_x - img_x_after).abs() < 1.0);
        assert_eq!(vp.fit(), ViewFit::Manual);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut vp = viewport();
        for _ in 0..100 {
            vp.zoom(ZoomDirection::In, PointF::ZERO);
        }
        assert!((vp.scale() - 8.0).abs() < 1e-9);
        assert!(!vp.zoom(ZoomDirection::In, PointF::ZERO));
        for _ in 0..200 {
            vp.zoom(ZoomDirection::Out, PointF::ZERO);
        }
        assert!((vp.scale() - 0.03).abs() < 1e-9);
    }

    #[test]
    fn actual_size_twice_recentres() {
        let mut vp = viewport();
        vp.actual_size(PointF::new(100.0, 100.0));
        assert_eq!(vp.scale(), 1.0);
        assert_ne!(vp.pan(), PointF::ZERO);
        vp.actual_size(PointF::new(100.0, 100.0));
        assert_eq!(vp.pan(), PointF::ZERO);
        assert_eq!(vp.fit(), ViewFit::ActualSize);
    }

    #[test]
    fn resize_refits_only_in_fit_mode() {
        let mut vp = viewport();
        assert!(vp.on_resize(500, 400));
        assert!((vp.scale() - 1.25).abs() < 1e-9);

        vp.zoom(ZoomDirection::In, PointF::ZERO);
        let scale = vp.scale();
        vp.on_resize(2000, 2000);
        assert_eq!(vp.scale(), scale);
    }
}
