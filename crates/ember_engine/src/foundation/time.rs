//! Time management utilities

use std::time::{Duration, Instant};

/// High-precision timer for frame timing
pub struct Timer {
    last_frame: Instant,
    delta_time: f32,
    total_time: f32,
    frame_count: u64,
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
        }
    }

    /// Update the timer (should be called once per frame)
    pub fn update(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_frame);
        self.delta_time = elapsed.as_secs_f32();
        self.total_time += self.delta_time;
        self.last_frame = now;
        self.frame_count += 1;
    }

    /// Get the time since the last frame in seconds
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Get the total elapsed time since timer creation
    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    /// Get the current frame count
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

/// Sleep the calling thread for the given number of milliseconds
///
/// Used to keep frame pacing steady while rendering is suspended, e.g.
/// during resize debouncing.
pub fn sleep_ms(ms: u64) {
    std::thread::sleep(Duration::from_millis(ms));
}
