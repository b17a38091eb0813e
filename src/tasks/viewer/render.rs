//! CPU compositing into softbuffer frames.
//!
//! Pixels are packed as `0xAARRGGBB` with premultiplied colour so that
//! backends honouring the alpha byte show a translucent background.

use std::sync::Arc;

use image::RgbaImage;
use tracing::warn;

use crate::geometry::Rect;
use crate::processing::resample::{CropBox, Quality, resample};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0x000000, 0.0);

    pub const fn rgba(hex: u32, a: f32) -> Self {
        Self {
            r: ((hex >> 16) & 0xFF) as f32 / 255.0,
            g: ((hex >> 8) & 0xFF) as f32 / 255.0,
            b: (hex & 0xFF) as f32 / 255.0,
            a,
        }
    }

    pub const fn rgb(hex: u32) -> Self {
        Self::rgba(hex, 1.0)
    }
}

pub struct Frame<'a> {
    buf: &'a mut [u32],
    width: u32,
    height: u32,
}

impl<'a> Frame<'a> {
    pub fn new(buf: &'a mut [u32], width: u32, height: u32) -> Self {
        Self { buf, width, height }
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    pub fn clear(&mut self, color: Color) {
        let packed = pack(color.r, color.g, color.b, color.a);
        self.buf.fill(packed);
    }

    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        let Some(r) = rect.intersect(&self.bounds()) else {
            return;
        };
        for y in r.y..(r.y + r.height as i32) {
            for x in r.x..(r.x + r.width as i32) {
                self.blend_at(x as u32, y as u32, color.r, color.g, color.b, color.a);
            }
        }
    }

    pub fn stroke_rect(&mut self, rect: Rect, thickness: u32, color: Color) {
        if rect.is_empty() {
            return;
        }
        let t = thickness.min(rect.width / 2 + 1).min(rect.height / 2 + 1).max(1);
        let (x, y, w, h) = (rect.x, rect.y, rect.width, rect.height);
        self.fill_rect(Rect::new(x, y, w, t), color);
        self.fill_rect(Rect::new(x, y + (h - t) as i32, w, t), color);
        self.fill_rect(Rect::new(x, y, t, h), color);
        self.fill_rect(Rect::new(x + (w - t) as i32, y, t, h), color);
    }

    pub fn grid(&mut self, spacing: u32, color: Color) {
        let spacing = spacing.max(2);
        for x in (0..self.width).step_by(spacing as usize) {
            self.fill_rect(Rect::new(x as i32, 0, 1, self.height), color);
        }
        for y in (0..self.height).step_by(spacing as usize) {
            self.fill_rect(Rect::new(0, y as i32, self.width, 1), color);
        }
    }

    /// Two diagonal strokes centred in `rect`.
    pub fn cross(&mut self, rect: Rect, thickness: u32, color: Color) {
        let n = rect.width.min(rect.height);
        let ox = rect.x + (rect.width - n) as i32 / 2;
        let oy = rect.y + (rect.height - n) as i32 / 2;
        let t = thickness.max(1) as i32;
        for i in 0..n as i32 {
            for d in 0..t {
                self.fill_rect(Rect::new(ox + i, oy + i + d - t / 2, 1, 1), color);
                self.fill_rect(Rect::new(ox + n as i32 - 1 - i, oy + i + d - t / 2, 1, 1), color);
            }
        }
    }

    /// Composite an already scaled image at `origin`, multiplied by `opacity`.
    pub fn blit(&mut self, img: &RgbaImage, origin: (i32, i32), opacity: f32) {
        let dest = Rect::new(origin.0, origin.1, img.width(), img.height());
        let Some(clip) = dest.intersect(&self.bounds()) else {
            return;
        };
        let opacity = opacity.clamp(0.0, 1.0);
        for y in clip.y..(clip.y + clip.height as i32) {
            for x in clip.x..(clip.x + clip.width as i32) {
                let px = img.get_pixel((x - origin.0) as u32, (y - origin.1) as u32).0;
                let a = f32::from(px[3]) / 255.0 * opacity;
                if a <= 0.0 {
                    continue;
                }
                self.blend_at(
                    x as u32,
                    y as u32,
                    f32::from(px[0]) / 255.0,
                    f32::from(px[1]) / 255.0,
                    f32::from(px[2]) / 255.0,
                    a,
                );
            }
        }
    }

    fn blend_at(&mut self, x: u32, y: u32, r: f32, g: f32, b: f32, a: f32) {
        let idx = (y * self.width + x) as usize;
        let Some(dst) = self.buf.get_mut(idx) else {
            return;
        };
        let a = a.clamp(0.0, 1.0);
        let (dr, dg, db, da) = unpack(*dst);
        let inv = 1.0 - a;
        *dst = pack_premultiplied(
            r * a + dr * inv,
            g * a + dg * inv,
            b * a + db * inv,
            a + da * inv,
        );
    }
}

fn pack(r: f32, g: f32, b: f32, a: f32) -> u32 {
    pack_premultiplied(r * a, g * a, b * a, a)
}

fn pack_premultiplied(r: f32, g: f32, b: f32, a: f32) -> u32 {
    let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u32;
    (c(a) << 24) | (c(r) << 16) | (c(g) << 8) | c(b)
}

fn unpack(value: u32) -> (f32, f32, f32, f32) {
    let a = ((value >> 24) & 0xFF) as f32 / 255.0;
    let r = ((value >> 16) & 0xFF) as f32 / 255.0;
    let g = ((value >> 8) & 0xFF) as f32 / 255.0;
    let b = (value & 0xFF) as f32 / 255.0;
    (r, g, b, a)
}

#[derive(Debug, Clone, PartialEq)]
struct ScaledKey {
    image: usize,
    placement: Rect,
    window: Rect,
}

/// Last on-screen rendition of an image, reused while nothing moved.
#[derive(Debug, Default)]
pub struct ScaledCache {
    key: Option<ScaledKey>,
    visible: Option<(Rect, RgbaImage)>,
}

impl ScaledCache {
    /// Visible part of `img` placed at `placement`, scaled to screen pixels.
    pub fn visible(
        &mut self,
        img: &Arc<RgbaImage>,
        placement: Rect,
        window: Rect,
    ) -> Option<(Rect, &RgbaImage)> {
        let key = ScaledKey {
            image: Arc::as_ptr(img) as usize,
            placement,
            window,
        };
        if self.key.as_ref() != Some(&key) {
            self.visible = scale_visible(img, placement, window);
            self.key = Some(key);
        }
        self.visible.as_ref().map(|(rect, img)| (*rect, img))
    }

    pub fn invalidate(&mut self) {
        self.key = None;
        self.visible = None;
    }
}

fn scale_visible(img: &RgbaImage, placement: Rect, window: Rect) -> Option<(Rect, RgbaImage)> {
    let visible = placement.intersect(&window)?;
    let crop = CropBox::for_visible(img.width(), img.height(), placement, visible)?;
    match resample(img, crop, visible.width, visible.height, Quality::Display) {
        Ok(scaled) => Some((visible, scaled)),
        Err(err) => {
            warn!(error = ?err, "failed to scale image for display");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_fill_overwrites_transparent_clear() {
        let mut buf = vec![0u32; 4 * 4];
        let mut frame = Frame::new(&mut buf, 4, 4);
        frame.clear(Color::TRANSPARENT);
        frame.fill_rect(Rect::new(1, 1, 2, 2), Color::rgb(0xff0000));
        assert_eq!(buf[0], 0);
        assert_eq!(buf[5], 0xFFFF_0000);
    }

    #[test]
    fn blit_clips_to_frame() {
        let mut buf = vec![0u32; 3 * 3];
        let img = RgbaImage::from_pixel(4, 4, image::Rgba([0, 0, 255, 255]));
        let mut frame = Frame::new(&mut buf, 3, 3);
        frame.blit(&img, (-2, 1), 1.0);
        assert_eq!(buf[3], 0xFF00_00FF);
        assert_eq!(buf[2], 0);
    }

    #[test]
    fn scaled_cache_reuses_rendition() {
        let img = Arc::new(RgbaImage::from_pixel(10, 10, image::Rgba([1, 1, 1, 255])));
        let mut cache = ScaledCache::default();
        let window = Rect::from_size(100, 100);
        let (rect, scaled) = cache.visible(&img, Rect::new(90, 0, 20, 20), window).unwrap();
        assert_eq!(rect, Rect::new(90, 0, 10, 20));
        assert_eq!(scaled.dimensions(), (10, 20));
        assert!(cache.visible(&img, Rect::new(200, 0, 20, 20), window).is_none());
    }
}
