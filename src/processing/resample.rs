use anyhow::{Context, Result, bail};
use fast_image_resize as fir;
use image::RgbaImage;

use crate::geometry::Rect;

/// Source-space window to resample, in (possibly fractional) image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    /// Nearest source pixel, alpha untouched. Used for hit-mask sampling so
    /// every sample keeps a real source alpha value.
    Nearest,
    /// Bilinear with premultiplied alpha. Used for on-screen drawing.
    Display,
}

impl CropBox {
    /// Map the visible part of a placed image back to source pixels.
    ///
    /// `placement` is where the whole scaled image sits in the window and
    /// `visible` is the part of it inside the window.
    pub fn for_visible(
        src_w: u32,
        src_h: u32,
        placement: Rect,
        visible: Rect,
    ) -> Option<CropBox> {
        if placement.is_empty() || visible.is_empty() || src_w == 0 || src_h == 0 {
            return None;
        }
        let sx = f64::from(src_w) / f64::from(placement.width);
        let sy = f64::from(src_h) / f64::from(placement.height);
        let left = f64::from(visible.x - placement.x) * sx;
        let top = f64::from(visible.y - placement.y) * sy;
        let width = f64::from(visible.width) * sx;
        let height = f64::from(visible.height) * sy;
        let left = left.clamp(0.0, f64::from(src_w));
        let top = top.clamp(0.0, f64::from(src_h));
        let width = width.min(f64::from(src_w) - left);
        let height = height.min(f64::from(src_h) - top);
        if width <= 0.0 || height <= 0.0 {
            return None;
        }
        Some(CropBox {
            left,
            top,
            width,
            height,
        })
    }
}

/// Crop `source` to `crop` and resize the result to `target_w` x `target_h`.
pub fn resample(
    source: &RgbaImage,
    crop: CropBox,
    target_w: u32,
    target_h: u32,
    quality: Quality,
) -> Result<RgbaImage> {
    if target_w == 0 || target_h == 0 {
        bail!("resample dimensions must be positive");
    }

    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    )
    .context("failed to create source view for resample")?;
    let mut dst_image = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    let options = match quality {
        Quality::Nearest => fir::ResizeOptions::new()
            .resize_alg(fir::ResizeAlg::Nearest)
            .use_alpha(false),
        Quality::Display => fir::ResizeOptions::new()
            .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Bilinear)),
    }
    .crop(crop.left, crop.top, crop.width, crop.height);
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .context("resample failed")?;
    let buffer = dst_image.into_vec();
    RgbaImage::from_raw(target_w, target_h, buffer)
        .ok_or_else(|| anyhow::anyhow!("failed to construct resampled RGBA image"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_for_partially_visible_image() {
        // 400x300 source shown at 2x, hanging 100px off the left edge.
        let placement = Rect::new(-100, 0, 800, 600);
        let visible = Rect::new(0, 0, 700, 600);
        let crop = CropBox::for_visible(400, 300, placement, visible).unwrap();
        assert!((crop.left - 50.0).abs() < 1e-9);
        assert!((crop.width - 350.0).abs() < 1e-9);
        assert!((crop.height - 300.0).abs() < 1e-9);
    }

    #[test]
    fn nearest_resample_never_blends_alpha() {
        // Alternating columns: every output sample must be one of the inputs.
        let img = RgbaImage::from_fn(9, 9, |x, _| {
            let alpha = if x % 2 == 0 { 255 } else { 0 };
            image::Rgba([10, 20, 30, alpha])
        });
        let crop = CropBox {
            left: 0.0,
            top: 0.0,
            width: 9.0,
            height: 9.0,
        };
        let out = resample(&img, crop, 4, 4, Quality::Nearest).unwrap();
        assert_eq!(out.dimensions(), (4, 4));
        assert!(out.pixels().all(|p| p.0[3] == 0 || p.0[3] == 255));
        assert!(out.pixels().all(|p| p.0[..3] == [10, 20, 30]));
    }
}
