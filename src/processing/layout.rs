use crate::geometry::{PointF, Rect};

/// Scale that makes an image fit entirely inside the window.
pub fn contain_scale(window_w: u32, window_h: u32, src_w: u32, src_h: u32) -> f64 {
    let iw = f64::from(src_w.max(1));
    let ih = f64::from(src_h.max(1));
    let ww = f64::from(window_w.max(1));
    let wh = f64::from(window_h.max(1));
    let scale = (ww / iw).min(wh / ih);
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}

/// Size of an image after scaling, never smaller than one pixel per axis.
pub fn scaled_size(src_w: u32, src_h: u32, scale: f64) -> (u32, u32) {
    let scale = sanitize_scale(scale);
    let w = (f64::from(src_w) * scale).round().clamp(1.0, f64::from(u32::MAX));
    let h = (f64::from(src_h) * scale).round().clamp(1.0, f64::from(u32::MAX));
    (w as u32, h as u32)
}

pub fn center_offset(inner_w: u32, inner_h: u32, outer_w: u32, outer_h: u32) -> (i64, i64) {
    let ox = (i64::from(outer_w) - i64::from(inner_w)) / 2;
    let oy = (i64::from(outer_h) - i64::from(inner_h)) / 2;
    (ox, oy)
}

/// Where a scaled image lands inside a window: centred, then shifted by `pan`.
pub fn placement(
    src_w: u32,
    src_h: u32,
    scale: f64,
    pan: PointF,
    window_w: u32,
    window_h: u32,
) -> Rect {
    let (w, h) = scaled_size(src_w, src_h, scale);
    let (ox, oy) = center_offset(w, h, window_w, window_h);
    let x = (ox as f64 + finite_or_zero(pan.x)).round();
    let y = (oy as f64 + finite_or_zero(pan.y)).round();
    Rect::new(
        x.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32,
        y.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32,
        w,
        h,
    )
}

/// Non-finite or non-positive scale factors collapse to 1.0.
pub fn sanitize_scale(scale: f64) -> f64 {
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contain_scale_uses_tighter_axis() {
        let scale = contain_scale(1920, 1080, 4000, 2000);
        assert!((scale - 0.48).abs() < 1e-9);
    }

    #[test]
    fn placement_centres_and_pans() {
        let rect = placement(400, 300, 2.0, PointF::ZERO, 1000, 800);
        assert_eq!(rect, Rect::new(100, 100, 800, 600));
        let panned = placement(400, 300, 2.0, PointF::new(-30.0, 12.4), 1000, 800);
        assert_eq!(panned, Rect::new(70, 112, 800, 600));
    }

    #[test]
    fn bogus_scale_falls_back_to_identity() {
        assert_eq!(scaled_size(10, 20, f64::NAN), (10, 20));
        assert_eq!(scaled_size(10, 20, -3.0), (10, 20));
    }
}
