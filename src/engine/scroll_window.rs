//! Fixed-size visible window over a price series.
//!
//! The window stores only its position; the series length is passed in on
//! every call so the same window can follow whichever series is active.

use super::PriceSeries;
use crate::types::Sample;
use std::ops::Range;

/// Samples in one day at the feed's five-minute cadence.
pub const DEFAULT_WINDOW_SIZE: usize = 288;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollWindow {
    scroll_index: usize,
    window_size: usize,
}

impl Default for ScrollWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

impl ScrollWindow {
    pub fn new(window_size: usize) -> Self {
        Self {
            scroll_index: 0,
            window_size: window_size.max(1),
        }
    }

    pub fn scroll_index(&self) -> usize {
        self.scroll_index
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Largest valid scroll index for a series of `len` samples.
    pub fn max_scroll(&self, len: usize) -> usize {
        len.saturating_sub(self.window_size)
    }

    /// Move to `scroll_index`, clamped into `[0, max_scroll]`.
    pub fn set_window(&mut self, scroll_index: usize, len: usize) -> usize {
        self.scroll_index = scroll_index.min(self.max_scroll(len));
        self.scroll_index
    }

    /// Shift by `delta` samples, clamping at both ends.
    pub fn scroll_by(&mut self, delta: isize, len: usize) -> usize {
        let target = if delta < 0 {
            self.scroll_index.saturating_sub(delta.unsigned_abs())
        } else {
            self.scroll_index.saturating_add(delta as usize)
        };
        self.set_window(target, len)
    }

    /// Jump to the most recent data.
    pub fn jump_to_end(&mut self, len: usize) -> usize {
        self.set_window(usize::MAX, len)
    }

    /// True when the window shows (or is one step away from) the newest data.
    pub fn is_at_end(&self, len: usize) -> bool {
        self.scroll_index >= self.max_scroll(len).saturating_sub(1)
    }

    /// Index range of the visible samples.
    pub fn visible_range(&self, len: usize) -> Range<usize> {
        let start = self.scroll_index.min(len);
        let end = (start + self.window_size).min(len);
        start..end
    }

    pub fn visible_slice<'a>(&self, series: &'a PriceSeries) -> &'a [Sample] {
        &series.samples()[self.visible_range(series.len())]
    }

    /// Index of the right-most visible sample.
    pub fn right_edge(&self, len: usize) -> Option<usize> {
        let range = self.visible_range(len);
        range.end.checked_sub(1).filter(|&i| i >= range.start)
    }

    /// Scroll position as a fraction of the scrollable range.
    pub fn to_ratio(&self, len: usize) -> f64 {
        let max = self.max_scroll(len);
        if max == 0 {
            0.0
        } else {
            self.scroll_index as f64 / max as f64
        }
    }

    /// Move to the position matching `ratio` (clamped into `[0, 1]`).
    pub fn from_ratio(&mut self, ratio: f64, len: usize) -> usize {
        let ratio = if ratio.is_finite() { ratio.clamp(0.0, 1.0) } else { 0.0 };
        let index = (ratio * self.max_scroll(len) as f64).round() as usize;
        self.set_window(index, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamps_out_of_range() {
        let mut window = ScrollWindow::new(10);
        assert_eq!(window.set_window(500, 25), 15);
        assert_eq!(window.scroll_by(-100, 25), 0);
    }

    #[test]
    fn test_set_window_idempotent_in_range() {
        let mut window = ScrollWindow::new(10);
        assert_eq!(window.set_window(7, 25), 7);
        assert_eq!(window.set_window(7, 25), 7);
    }

    #[test]
    fn test_short_series_has_no_scroll() {
        let mut window = ScrollWindow::new(288);
        assert_eq!(window.max_scroll(100), 0);
        assert_eq!(window.jump_to_end(100), 0);
        assert_eq!(window.visible_range(100), 0..100);
        assert_eq!(window.to_ratio(100), 0.0);
    }

    #[test]
    fn test_ratio_round_trip() {
        let mut window = ScrollWindow::new(288);
        let len = 2016;
        for index in [0, 1, 2, 863, 1000, 1727, 1728] {
            window.set_window(index, len);
            let ratio = window.to_ratio(len);
            let mut other = ScrollWindow::new(288);
            let back = other.from_ratio(ratio, len);
            assert!((back as i64 - index.min(1728) as i64).abs() <= 1);
        }
    }

    #[test]
    fn test_right_edge() {
        let mut window = ScrollWindow::new(5);
        assert_eq!(window.right_edge(0), None);
        window.set_window(2, 20);
        assert_eq!(window.right_edge(20), Some(6));
        window.jump_to_end(20);
        assert_eq!(window.right_edge(20), Some(19));
    }

    #[test]
    fn test_is_at_end() {
        let mut window = ScrollWindow::new(5);
        window.jump_to_end(20);
        assert!(window.is_at_end(20));
        window.set_window(14, 20);
        assert!(window.is_at_end(20));
        window.set_window(3, 20);
        assert!(!window.is_at_end(20));
    }
}
