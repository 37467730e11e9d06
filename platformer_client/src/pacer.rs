//! Fixed-rate frame pacing for the render loop.

use std::time::{Duration, Instant};

/// Sleeps the calling thread so frames start on a fixed cadence.
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Duration,
    next: Instant,
}

impl FramePacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    pub fn from_hz(hz: u32) -> Self {
        Self::new(Duration::from_secs_f64(1.0 / hz.max(1) as f64))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Blocks until the next frame is due and returns its start time.
    ///
    /// A loop that fell more than a frame behind resynchronises instead of
    /// running a burst of catch-up frames.
    pub fn wait(&mut self) -> Instant {
        let now = Instant::now();
        if self.next > now {
            std::thread::sleep(self.next - now);
        } else if now - self.next > self.interval {
            self.next = now;
        }
        self.next += self.interval;
        Instant::now()
    }
}
