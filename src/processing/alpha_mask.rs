//! Alpha-threshold hit-region generation.
//!
//! The visible part of the placed image is point-sampled straight from the
//! decoded source to at most `max_sample_dim` pixels on its longest edge,
//! thresholded into a 1-bit mask, scaled back up to the visible size and
//! decomposed into rectangles. Samples are never averaged: each one is a
//! real source pixel compared against the threshold.

use anyhow::Result;
use config_model::MaskConfig;
use image::RgbaImage;
use tracing::trace;

use crate::geometry::Rect;

use super::bitmap::BitMask;
use super::region::Region;
use super::resample::{CropBox, Quality, resample};

#[derive(Debug, Clone, Copy)]
pub struct MaskSource<'a> {
    pub image: &'a RgbaImage,
    /// Whether the decoded image carries an alpha channel at all.
    pub has_alpha: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlphaMaskBuilder {
    threshold: u8,
    max_sample_dim: u32,
}

impl AlphaMaskBuilder {
    pub fn new(threshold: u8, max_sample_dim: u32) -> Self {
        Self {
            threshold,
            max_sample_dim: max_sample_dim.max(1),
        }
    }

    pub fn from_config(cfg: &MaskConfig) -> Self {
        Self::new(cfg.alpha_threshold, cfg.max_sample_dim)
    }

    /// Dimensions the visible area is sampled at, preserving aspect ratio.
    pub fn sample_size(&self, visible_w: u32, visible_h: u32) -> (u32, u32) {
        let longest = visible_w.max(visible_h);
        if longest <= self.max_sample_dim {
            return (visible_w, visible_h);
        }
        let factor = f64::from(longest) / f64::from(self.max_sample_dim);
        let w = (f64::from(visible_w) / factor).round().max(1.0) as u32;
        let h = (f64::from(visible_h) / factor).round().max(1.0) as u32;
        (w.min(self.max_sample_dim), h.min(self.max_sample_dim))
    }

    /// Clickable region of `source` placed at `placement` inside `window`.
    pub fn build(&self, source: MaskSource<'_>, placement: Rect, window: Rect) -> Result<Region> {
        let Some(visible) = placement.intersect(&window) else {
            return Ok(Region::empty());
        };
        if !source.has_alpha {
            return Ok(Region::from_rect(visible));
        }

        let (src_w, src_h) = source.image.dimensions();
        let Some(crop) = CropBox::for_visible(src_w, src_h, placement, visible) else {
            return Ok(Region::empty());
        };
        let (sample_w, sample_h) = self.sample_size(visible.width, visible.height);
        let sampled = resample(source.image, crop, sample_w, sample_h, Quality::Nearest)?;
        let mask = BitMask::from_rgba_alpha(sample_w, sample_h, sampled.as_raw(), self.threshold);

        let set = mask.count_set();
        trace!(
            sample_w,
            sample_h,
            set,
            visible_w = visible.width,
            visible_h = visible.height,
            "alpha mask sampled"
        );
        if set == 0 {
            return Ok(Region::empty());
        }
        if mask.is_full() {
            return Ok(Region::from_rect(visible));
        }

        let mask = if (sample_w, sample_h) == (visible.width, visible.height) {
            mask
        } else {
            mask.scaled_nearest(visible.width, visible.height)
        };
        Ok(Region::from_mask(&mask).translated(visible.x, visible.y))
    }
}

/// Pixel count of the image area that is actually on screen.
pub fn visible_pixels(placement: Rect, window: Rect) -> u64 {
    placement.intersect(&window).map_or(0, |r| r.area())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, alpha: u8) -> RgbaImage {
        RgbaImage::from_pixel(w, h, image::Rgba([200, 100, 50, alpha]))
    }

    #[test]
    fn sample_size_caps_longest_edge() {
        let builder = AlphaMaskBuilder::new(30, 300);
        assert_eq!(builder.sample_size(1200, 600), (300, 150));
        assert_eq!(builder.sample_size(200, 100), (200, 100));
        assert_eq!(builder.sample_size(5000, 3), (300, 1));
    }

    #[test]
    fn no_alpha_fast_path_ignores_threshold() {
        let img = solid(100, 100, 0);
        let builder = AlphaMaskBuilder::new(255, 300);
        let region = builder
            .build(
                MaskSource {
                    image: &img,
                    has_alpha: false,
                },
                Rect::new(-20, 10, 100, 100),
                Rect::from_size(50, 50),
            )
            .unwrap();
        assert_eq!(region.rects(), &[Rect::new(0, 10, 50, 40)]);
    }

    #[test]
    fn offscreen_placement_is_empty() {
        let img = solid(10, 10, 255);
        let builder = AlphaMaskBuilder::new(30, 300);
        let region = builder
            .build(
                MaskSource {
                    image: &img,
                    has_alpha: true,
                },
                Rect::new(500, 500, 10, 10),
                Rect::from_size(100, 100),
            )
            .unwrap();
        assert!(region.is_empty());
    }

    #[test]
    fn fully_opaque_alpha_image_degenerates_to_single_rect() {
        let img = solid(64, 48, 255);
        let builder = AlphaMaskBuilder::new(30, 300);
        let region = builder
            .build(
                MaskSource {
                    image: &img,
                    has_alpha: true,
                },
                Rect::new(8, 8, 64, 48),
                Rect::from_size(200, 200),
            )
            .unwrap();
        assert_eq!(region.rects(), &[Rect::new(8, 8, 64, 48)]);
    }

    #[test]
    fn visible_pixels_counts_intersection() {
        assert_eq!(
            visible_pixels(Rect::new(-10, -10, 20, 20), Rect::from_size(100, 100)),
            100
        );
        assert_eq!(
            visible_pixels(Rect::new(200, 0, 20, 20), Rect::from_size(100, 100)),
            0
        );
    }
}
