//! Packed 1-bit bitmap used as the intermediate hit-test mask.

const WORD_BITS: u32 = u64::BITS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMask {
    width: u32,
    height: u32,
    words_per_row: usize,
    words: Vec<u64>,
}

impl BitMask {
    pub fn new(width: u32, height: u32) -> Self {
        let words_per_row = width.div_ceil(WORD_BITS) as usize;
        Self {
            width,
            height,
            words_per_row,
            words: vec![0; words_per_row * height as usize],
        }
    }

    /// Threshold the alpha channel of a tightly packed RGBA8 buffer.
    ///
    /// A pixel is set when its alpha is strictly greater than `threshold`.
    pub fn from_rgba_alpha(width: u32, height: u32, rgba: &[u8], threshold: u8) -> Self {
        let mut mask = Self::new(width, height);
        let row_bytes = width as usize * 4;
        for (y, row) in rgba.chunks_exact(row_bytes).take(height as usize).enumerate() {
            for (x, px) in row.chunks_exact(4).enumerate() {
                if px[3] > threshold {
                    mask.set(x as u32, y as u32);
                }
            }
        }
        mask
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn set(&mut self, x: u32, y: u32) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = self.word_index(x, y);
        self.words[idx] |= 1 << (x % WORD_BITS);
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.words[self.word_index(x, y)] & (1 << (x % WORD_BITS)) != 0
    }

    pub fn count_set(&self) -> u64 {
        self.words.iter().map(|w| u64::from(w.count_ones())).sum()
    }

    pub fn is_full(&self) -> bool {
        self.count_set() == u64::from(self.width) * u64::from(self.height)
    }

    /// Nearest-neighbour rescale to the requested dimensions.
    pub fn scaled_nearest(&self, width: u32, height: u32) -> Self {
        if width == self.width && height == self.height {
            return self.clone();
        }
        let mut out = Self::new(width, height);
        if self.width == 0 || self.height == 0 {
            return out;
        }
        let src_cols: Vec<u32> = (0..width)
            .map(|x| source_index(x, width, self.width))
            .collect();
        for y in 0..height {
            let sy = source_index(y, height, self.height);
            for (x, &sx) in src_cols.iter().enumerate() {
                if self.get(sx, sy) {
                    out.set(x as u32, y);
                }
            }
        }
        out
    }

    /// Horizontal runs of set pixels in row `y`, as half-open `[start, end)` spans.
    pub fn row_runs(&self, y: u32) -> Vec<(u32, u32)> {
        let mut runs = Vec::new();
        let mut start = None;
        for x in 0..self.width {
            match (self.get(x, y), start) {
                (true, None) => start = Some(x),
                (false, Some(s)) => {
                    runs.push((s, x));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            runs.push((s, self.width));
        }
        runs
    }

    fn word_index(&self, x: u32, y: u32) -> usize {
        y as usize * self.words_per_row + (x / WORD_BITS) as usize
    }
}

fn source_index(dst: u32, dst_len: u32, src_len: u32) -> u32 {
    let centre = (u64::from(dst) * 2 + 1) * u64::from(src_len) / (u64::from(dst_len) * 2);
    (centre as u32).min(src_len - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_strict() {
        let rgba = [0, 0, 0, 30, 0, 0, 0, 31];
        let mask = BitMask::from_rgba_alpha(2, 1, &rgba, 30);
        assert!(!mask.get(0, 0));
        assert!(mask.get(1, 0));
    }

    #[test]
    fn runs_cover_word_boundaries() {
        let mut mask = BitMask::new(130, 1);
        for x in 60..70 {
            mask.set(x, 0);
        }
        mask.set(129, 0);
        assert_eq!(mask.row_runs(0), vec![(60, 70), (129, 130)]);
    }

    #[test]
    fn nearest_upscale_preserves_blocks() {
        let mut mask = BitMask::new(2, 2);
        mask.set(1, 0);
        let big = mask.scaled_nearest(6, 4);
        assert_eq!(big.count_set(), 6);
        assert!(big.get(3, 0) && big.get(5, 1));
        assert!(!big.get(2, 0) && !big.get(3, 2));
    }
}
