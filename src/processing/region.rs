use crate::geometry::Rect;

use super::bitmap::BitMask;

/// Union of non-overlapping rectangles in window-local coordinates.
///
/// Regions built from a [`BitMask`] are y-x banded: rectangles are sorted by
/// `y` then `x`, and every rectangle in a band shares the same `y` and height.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Region {
    rects: Vec<Rect>,
}

impl Region {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_rect(rect: Rect) -> Self {
        if rect.is_empty() {
            return Self::empty();
        }
        Self { rects: vec![rect] }
    }

    /// Decompose the set pixels of `mask` into banded rectangles.
    ///
    /// Consecutive rows with identical run lists are merged into a single band.
    pub fn from_mask(mask: &BitMask) -> Self {
        let mut rects: Vec<Rect> = Vec::new();
        let mut prev_runs: Vec<(u32, u32)> = Vec::new();
        let mut band_start = 0usize;
        for y in 0..mask.height() {
            let runs = mask.row_runs(y);
            if !runs.is_empty() && runs == prev_runs {
                for rect in &mut rects[band_start..] {
                    rect.height += 1;
                }
                continue;
            }
            band_start = rects.len();
            rects.extend(
                runs.iter()
                    .map(|&(x0, x1)| Rect::new(x0 as i32, y as i32, x1 - x0, 1)),
            );
            prev_runs = runs;
        }
        Self { rects }
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn area(&self) -> u64 {
        self.rects.iter().map(Rect::area).sum()
    }

    pub fn bounding_box(&self) -> Option<Rect> {
        let mut iter = self.rects.iter();
        let first = *iter.next()?;
        Some(iter.fold(first, |acc, r| acc.union(r)))
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.rects.iter().any(|r| r.contains(x, y))
    }

    pub fn translated(mut self, dx: i32, dy: i32) -> Self {
        for rect in &mut self.rects {
            *rect = rect.translated(dx, dy);
        }
        self
    }

    /// Sorted copy of the rectangles, for order-independent comparison.
    pub fn canonical(&self) -> Vec<Rect> {
        let mut rects = self.rects.clone();
        rects.sort_by_key(|r| (r.y, r.x, r.height, r.width));
        rects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_identical_rows_into_bands() {
        let mut mask = BitMask::new(8, 6);
        for y in 1..4 {
            for x in 2..5 {
                mask.set(x, y);
            }
            mask.set(7, y);
        }
        mask.set(0, 5);
        let region = Region::from_mask(&mask);
        assert_eq!(
            region.rects(),
            &[
                Rect::new(2, 1, 3, 3),
                Rect::new(7, 1, 1, 3),
                Rect::new(0, 5, 1, 1),
            ]
        );
        assert_eq!(region.area(), mask.count_set());
    }

    #[test]
    fn empty_mask_yields_empty_region() {
        let region = Region::from_mask(&BitMask::new(10, 10));
        assert!(region.is_empty());
        assert_eq!(region.bounding_box(), None);
    }

    #[test]
    fn translation_moves_every_rect() {
        let region = Region::from_rect(Rect::new(1, 1, 2, 2)).translated(10, -1);
        assert_eq!(region.rects(), &[Rect::new(11, 0, 2, 2)]);
        assert!(region.contains(12, 1));
        assert!(!region.contains(13, 1));
    }
}
