use image::RgbaImage;
use image::imageops;

/// User-applied orientation on top of the decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Transform {
    /// Clockwise quarter turns, 0..=3.
    quarter_turns: u8,
    flip_h: bool,
    flip_v: bool,
}

impl Transform {
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    pub fn rotate_cw(&mut self) {
        self.quarter_turns = (self.quarter_turns + 1) % 4;
    }

    pub fn rotate_ccw(&mut self) {
        self.quarter_turns = (self.quarter_turns + 3) % 4;
    }

    pub fn mirror_horizontal(&mut self) {
        self.flip_h = !self.flip_h;
    }

    pub fn mirror_vertical(&mut self) {
        self.flip_v = !self.flip_v;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Mirrors apply first, then the rotation.
    pub fn apply(&self, src: &RgbaImage) -> RgbaImage {
        let mut img = match (self.flip_h, self.flip_v) {
            (false, false) => src.clone(),
            (true, false) => imageops::flip_horizontal(src),
            (false, true) => imageops::flip_vertical(src),
            (true, true) => imageops::rotate180(src),
        };
        img = match self.quarter_turns {
            1 => imageops::rotate90(&img),
            2 => imageops::rotate180(&img),
            3 => imageops::rotate270(&img),
            _ => img,
        };
        img
    }
}

/// Apply an EXIF orientation tag (1..=8) to a decoded image.
pub fn apply_exif_orientation(img: RgbaImage, orientation: u16) -> RgbaImage {
    match orientation {
        2 => imageops::flip_horizontal(&img),
        3 => imageops::rotate180(&img),
        4 => imageops::flip_vertical(&img),
        5 => imageops::flip_horizontal(&imageops::rotate90(&img)),
        6 => imageops::rotate90(&img),
        7 => imageops::flip_horizontal(&imageops::rotate270(&img)),
        8 => imageops::rotate270(&img),
        _ => img,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marked() -> RgbaImage {
        let mut img = RgbaImage::new(3, 2);
        img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        img
    }

    #[test]
    fn quarter_turn_swaps_dimensions() {
        let mut t = Transform::default();
        t.rotate_cw();
        let out = t.apply(&marked());
        assert_eq!(out.dimensions(), (2, 3));
        assert_eq!(out.get_pixel(1, 0).0, [255, 0, 0, 255]);
    }

    #[test]
    fn four_turns_are_identity() {
        let mut t = Transform::default();
        for _ in 0..4 {
            t.rotate_ccw();
        }
        assert!(t.is_identity());
    }

    #[test]
    fn double_mirror_matches_half_turn() {
        let mut t = Transform::default();
        t.mirror_horizontal();
        t.mirror_vertical();
        let out = t.apply(&marked());
        assert_eq!(out.get_pixel(2, 1).0, [255, 0, 0, 255]);
    }
}
