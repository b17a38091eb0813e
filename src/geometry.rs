//! Integer rectangles in window-local pixel space.

/// Axis-aligned rectangle with a signed origin and unsigned extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Real-valued 2D vector used for pan offsets and cursor positions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointF {
    pub x: f64,
    pub y: f64,
}

/// Rectangle in the window server's native field widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireRect {
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
}

impl PointF {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl std::ops::Add for PointF {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for PointF {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle anchored at the origin, as used for a window's own client area.
    pub const fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn right(&self) -> i64 {
        i64::from(self.x) + i64::from(self.width)
    }

    pub fn bottom(&self) -> i64 {
        i64::from(self.y) + i64::from(self.height)
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x
            && y >= self.y
            && i64::from(x) < self.right()
            && i64::from(y) < self.bottom()
    }

    /// Overlap of two rectangles; `None` when they do not share any pixel.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let left = i64::from(self.x.max(other.x));
        let top = i64::from(self.y.max(other.y));
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= left || bottom <= top {
            return None;
        }
        Some(Rect::new(
            left as i32,
            top as i32,
            (right - left) as u32,
            (bottom - top) as u32,
        ))
    }

    pub fn translated(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.width,
            self.height,
        )
    }

    /// Smallest rectangle covering both inputs. Empty inputs are ignored.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let left = i64::from(self.x.min(other.x));
        let top = i64::from(self.y.min(other.y));
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(
            left as i32,
            top as i32,
            (right - left) as u32,
            (bottom - top) as u32,
        )
    }

    /// Clamp to the shape protocol's 16-bit origin/extent fields.
    ///
    /// Rectangles that cannot be represented at all (empty, or lying
    /// completely beyond the signed 16-bit coordinate space) yield `None`.
    pub fn to_wire(&self) -> Option<WireRect> {
        let min = i64::from(i16::MIN);
        let max = i64::from(i16::MAX);
        let left = i64::from(self.x).clamp(min, max);
        let top = i64::from(self.y).clamp(min, max);
        let right = self.right().clamp(min, max);
        let bottom = self.bottom().clamp(min, max);
        let width = (right - left).min(i64::from(u16::MAX));
        let height = (bottom - top).min(i64::from(u16::MAX));
        if width <= 0 || height <= 0 {
            return None;
        }
        Some(WireRect {
            x: left as i16,
            y: top as i16,
            width: width as u16,
            height: height as u16,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_clips_to_overlap() {
        let window = Rect::from_size(640, 480);
        let image = Rect::new(-100, 40, 800, 600);
        assert_eq!(window.intersect(&image), Some(Rect::new(0, 40, 640, 440)));
    }

    #[test]
    fn touching_edges_do_not_intersect() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(10, 0, 10, 10);
        assert_eq!(a.intersect(&b), None);
    }

    #[test]
    fn union_ignores_empty() {
        let a = Rect::new(5, 5, 0, 10);
        let b = Rect::new(1, 2, 3, 4);
        assert_eq!(a.union(&b), b);
        assert_eq!(b.union(&Rect::new(10, 10, 2, 2)), Rect::new(1, 2, 11, 10));
    }

    #[test]
    fn wire_clamps_huge_extent() {
        let rect = Rect::new(-40_000, 10, 100_000, 20);
        let wire = rect.to_wire().expect("partially representable");
        assert_eq!(wire.x, i16::MIN);
        assert_eq!(wire.y, 10);
        assert_eq!(wire.width, u16::MAX);
        assert_eq!(wire.height, 20);
    }

    #[test]
    fn wire_drops_unrepresentable() {
        assert!(Rect::new(40_000, 0, 10, 10).to_wire().is_none());
        assert!(Rect::new(0, 0, 0, 10).to_wire().is_none());
    }
}
