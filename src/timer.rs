use std::time::{Duration, Instant};

/// Render clock. Simulation time advances in fixed `timeStep` chunks per substep and is
/// tracked by the controller; this only measures wall clock frames for display purposes.
pub struct Timer {
    timestamp_last_frame: Instant,
    last_frame_duration: Duration,
    total_passed: Duration,
    frame_count: u64,
}

impl Timer {
    pub fn new() -> Timer {
        Timer {
            timestamp_last_frame: Instant::now(),
            last_frame_duration: Duration::from_millis(0),
            total_passed: Duration::from_millis(0),
            frame_count: 0,
        }
    }

    pub fn on_frame_submitted(&mut self) {
        self.last_frame_duration = self.timestamp_last_frame.elapsed();
        self.total_passed += self.last_frame_duration;
        self.timestamp_last_frame = Instant::now();
        self.frame_count += 1;
    }

    pub fn duration_last_frame(&self) -> Duration {
        self.last_frame_duration
    }

    pub fn total_passed(&self) -> Duration {
        self.total_passed
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}
