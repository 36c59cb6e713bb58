//! Resize detection
//!
//! Resizes are never handled mid-frame. The tracker collects resize events
//! and out-of-date results and the driver acts on them before the next
//! acquire.

use ash::vk;

/// Pending swapchain rebuild and the latest window size
#[derive(Debug, Clone, Copy, Default)]
pub struct ResizeTracker {
    pending: bool,
    window: vk::Extent2D,
}

impl ResizeTracker {
    /// Tracker for a window of `window` size with nothing pending
    pub fn new(window: vk::Extent2D) -> Self {
        Self { pending: false, window }
    }

    /// Record the window size for this iteration; `resized` is the window's
    /// resize callback flag
    pub fn observe(&mut self, resized: bool, window: vk::Extent2D) {
        if resized || window != self.window {
            self.pending = true;
        }
        self.window = window;
    }

    /// Ask for a rebuild without a size change, e.g. after an out-of-date
    /// or suboptimal result
    pub fn request(&mut self) {
        self.pending = true;
    }

    /// Whether a rebuild is waiting
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Whether the window has zero area
    pub fn is_minimized(&self) -> bool {
        self.window.width == 0 || self.window.height == 0
    }

    /// Latest window size
    pub fn window(&self) -> vk::Extent2D {
        self.window
    }

    /// Consume the pending rebuild, returning the size to rebuild for
    ///
    /// Nothing is returned while minimized; the request stays pending.
    pub fn take(&mut self) -> Option<vk::Extent2D> {
        if !self.pending || self.is_minimized() {
            return None;
        }
        self.pending = false;
        Some(self.window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    #[test]
    fn test_resize_event_is_taken_once() {
        let mut tracker = ResizeTracker::new(extent(800, 600));
        assert_eq!(tracker.take(), None);

        tracker.observe(true, extent(1024, 768));
        assert!(tracker.is_pending());
        assert_eq!(tracker.take(), Some(extent(1024, 768)));
        assert_eq!(tracker.take(), None);
    }

    #[test]
    fn test_size_change_without_event_counts() {
        let mut tracker = ResizeTracker::new(extent(800, 600));
        tracker.observe(false, extent(800, 600));
        assert!(!tracker.is_pending());

        tracker.observe(false, extent(640, 480));
        assert_eq!(tracker.take(), Some(extent(640, 480)));
    }

    #[test]
    fn test_minimized_defers_rebuild() {
        let mut tracker = ResizeTracker::new(extent(800, 600));
        tracker.observe(true, extent(0, 0));
        assert!(tracker.is_minimized());
        assert_eq!(tracker.take(), None);
        assert!(tracker.is_pending());

        tracker.observe(false, extent(300, 200));
        assert!(!tracker.is_minimized());
        assert_eq!(tracker.take(), Some(extent(300, 200)));
    }

    #[test]
    fn test_request_keeps_size() {
        let mut tracker = ResizeTracker::new(extent(800, 600));
        tracker.request();
        assert_eq!(tracker.take(), Some(extent(800, 600)));
    }
}
