//! Frame timing

use std::time::Instant;

/// Per-iteration timer feeding the simulation step.
///
/// Delta times are capped so a long stall (window drag, breakpoint, minimized
/// window) does not turn into one enormous integration step.
pub struct Timer {
    last_frame: Instant,
    delta_time: f32,
    total_time: f32,
    frame_count: u64,
    max_delta: f32,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Create a new timer
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            delta_time: 0.0,
            total_time: 0.0,
            frame_count: 0,
            max_delta: 0.25,
        }
    }

    /// Set the largest delta a single update may report
    pub fn with_max_delta(mut self, max_delta: f32) -> Self {
        self.max_delta = max_delta;
        self
    }

    /// Update the timer (call once per frame)
    pub fn update(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_frame).as_secs_f32();
        self.advance(elapsed);
        self.last_frame = now;
    }

    /// Restart delta measurement without counting the elapsed gap
    pub fn resume(&mut self) {
        self.last_frame = Instant::now();
    }

    fn advance(&mut self, elapsed: f32) {
        self.delta_time = elapsed.min(self.max_delta);
        self.total_time += self.delta_time;
        self.frame_count += 1;
    }

    /// Time since the last update in seconds
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Accumulated delta time
    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    /// Number of updates so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Average frames per second since creation
    pub fn average_fps(&self) -> f32 {
        if self.total_time > 0.0 {
            self.frame_count as f32 / self.total_time
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_advance_caps_long_stalls() {
        let mut timer = Timer::new().with_max_delta(0.1);
        timer.advance(3.0);

        assert_relative_eq!(timer.delta_time(), 0.1);
        assert_relative_eq!(timer.total_time(), 0.1);
        assert_eq!(timer.frame_count(), 1);
    }

    #[test]
    fn test_average_fps() {
        let mut timer = Timer::new();
        for _ in 0..60 {
            timer.advance(1.0 / 60.0);
        }

        assert_relative_eq!(timer.average_fps(), 60.0, epsilon = 1e-3);
    }
}
