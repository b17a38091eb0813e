use std::ops::Range;
use std::time::{Duration, Instant};

use crate::geometry::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Thumbnails,
    Single,
}

#[derive(Debug, Clone, Copy)]
pub struct ViewModeChange {
    pub from: ViewMode,
    pub to: ViewMode,
}

/// Thumbnail/single-view switching plus the slideshow clock.
pub struct ViewerSM {
    mode: ViewMode,
    slideshow: Option<Instant>,
    interval: Duration,
}

impl ViewerSM {
    pub fn new(mode: ViewMode, interval: Duration) -> Self {
        Self {
            mode,
            slideshow: None,
            interval,
        }
    }

    pub fn current(&self) -> ViewMode {
        self.mode
    }

    pub fn on_open_image(&mut self) -> Option<ViewModeChange> {
        self.goto(ViewMode::Single)
    }

    /// Escape outside canvas mode backs out of single view.
    pub fn on_escape(&mut self) -> Option<ViewModeChange> {
        self.goto(ViewMode::Thumbnails)
    }

    pub fn toggle_slideshow(&mut self, now: Instant) -> bool {
        if self.slideshow.take().is_some() {
            return false;
        }
        if self.mode != ViewMode::Single {
            return false;
        }
        self.slideshow = Some(now);
        true
    }

    pub fn slideshow_running(&self) -> bool {
        self.slideshow.is_some()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.slideshow.map(|since| since + self.interval)
    }

    /// True when the slideshow should advance; restarts the interval.
    pub fn on_tick(&mut self, now: Instant) -> bool {
        match self.slideshow {
            Some(since) if now.duration_since(since) >= self.interval => {
                self.slideshow = Some(now);
                true
            }
            _ => false,
        }
    }

    fn goto(&mut self, to: ViewMode) -> Option<ViewModeChange> {
        if self.mode == to {
            return None;
        }
        let ch = ViewModeChange {
            from: self.mode,
            to,
        };
        self.mode = to;
        if to != ViewMode::Single {
            self.slideshow = None;
        }
        Some(ch)
    }
}

/// Row-major tile layout of the thumbnail browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbGrid {
    tile: u32,
    spacing: u32,
    columns: u32,
}

impl ThumbGrid {
    pub fn new(tile: u32, spacing: u32, window_width: u32) -> Self {
        let tile = tile.max(1);
        let columns = (window_width.saturating_sub(spacing) / (tile + spacing)).max(1);
        Self {
            tile,
            spacing,
            columns,
        }
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    fn pitch(&self) -> u32 {
        self.tile + self.spacing
    }

    /// Tile bounds in window coordinates, `scroll` pixels down the list.
    pub fn tile_rect(&self, index: usize, scroll: u32) -> Rect {
        let col = index as u32 % self.columns;
        let row = index as u32 / self.columns;
        let y = i64::from(self.spacing) + i64::from(row) * i64::from(self.pitch())
            - i64::from(scroll);
        Rect::new(
            (self.spacing + col * self.pitch()) as i32,
            y as i32,
            self.tile,
            self.tile,
        )
    }

    pub fn index_at(&self, x: i32, y: i32, scroll: u32, count: usize) -> Option<usize> {
        if x < 0 || y < 0 {
            return None;
        }
        let row = (y as u32 + scroll) / self.pitch();
        let col = x as u32 / self.pitch();
        if col >= self.columns {
            return None;
        }
        let index = (row * self.columns + col) as usize;
        if index >= count || !self.tile_rect(index, scroll).contains(x, y) {
            return None;
        }
        Some(index)
    }

    /// Indices of the tiles at least partly inside a view of `view_height`.
    pub fn visible_range(&self, scroll: u32, view_height: u32, count: usize) -> Range<usize> {
        let first_row = scroll / self.pitch();
        let last_row = (scroll + view_height.max(1) - 1) / self.pitch();
        let columns = self.columns as usize;
        let start = (first_row as usize * columns).min(count);
        let end = ((last_row as usize + 1) * columns).min(count);
        start..end
    }

    pub fn content_height(&self, count: usize) -> u32 {
        let rows = (count as u32).div_ceil(self.columns);
        self.spacing + rows * self.pitch()
    }

    /// Smallest scroll change that brings tile `index` fully into view.
    pub fn scroll_to_show(&self, index: usize, scroll: u32, view_height: u32) -> u32 {
        let rect = self.tile_rect(index, 0);
        let top = rect.y.max(0) as u32;
        let bottom = top + rect.height + self.spacing;
        if top < scroll {
            top.saturating_sub(self.spacing)
        } else if bottom > scroll + view_height {
            bottom.saturating_sub(view_height)
        } else {
            scroll
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_from_single_returns_to_thumbnails() {
        let mut sm = ViewerSM::new(ViewMode::Single, Duration::from_secs(3));
        let ch = sm.on_escape().unwrap();
        assert_eq!((ch.from, ch.to), (ViewMode::Single, ViewMode::Thumbnails));
        assert!(sm.on_escape().is_none());
    }

    #[test]
    fn slideshow_ticks_on_interval_and_stops_on_leave() {
        let now = Instant::now();
        let mut sm = ViewerSM::new(ViewMode::Single, Duration::from_secs(3));
        assert!(sm.toggle_slideshow(now));
        assert!(!sm.on_tick(now + Duration::from_secs(1)));
        assert!(sm.on_tick(now + Duration::from_secs(3)));
        assert_eq!(sm.next_deadline(), Some(now + Duration::from_secs(6)));
        sm.on_escape();
        assert!(!sm.slideshow_running());
    }

    #[test]
    fn slideshow_needs_single_view() {
        let mut sm = ViewerSM::new(ViewMode::Thumbnails, Duration::from_secs(3));
        assert!(!sm.toggle_slideshow(Instant::now()));
    }

    #[test]
    fn grid_maps_points_back_to_tiles() {
        let grid = ThumbGrid::new(100, 10, 345);
        assert_eq!(grid.columns(), 3);
        assert_eq!(grid.tile_rect(4, 0), Rect::new(120, 120, 100, 100));
        assert_eq!(grid.index_at(125, 125, 0, 10), Some(4));
        assert_eq!(grid.index_at(5, 5, 0, 10), None);
        assert_eq!(grid.index_at(125, 15, 110, 10), Some(4));
        assert_eq!(grid.index_at(125, 125, 0, 4), None);
    }

    #[test]
    fn grid_scrolls_selection_into_view() {
        let grid = ThumbGrid::new(100, 10, 345);
        assert_eq!(grid.content_height(7), 340);
        assert_eq!(grid.scroll_to_show(0, 0, 200), 0);
        assert_eq!(grid.scroll_to_show(6, 0, 200), 140);
        assert_eq!(grid.scroll_to_show(0, 240, 200), 0);
    }

    #[test]
    fn visible_range_follows_scroll() {
        let grid = ThumbGrid::new(100, 10, 345);
        assert_eq!(grid.visible_range(0, 200, 20), 0..6);
        assert_eq!(grid.visible_range(230, 200, 20), 6..12);
        assert_eq!(grid.visible_range(230, 200, 10), 6..10);
        assert_eq!(grid.visible_range(0, 200, 4), 0..4);
    }
}
