//! Outbound update throttling.
//!
//! Local state is published on a fixed cadence independent of frame rate.
//! The clock is always supplied by the caller.

use std::time::{Duration, Instant};

/// Default publish cadence: 20 Hz.
pub const DEFAULT_PUBLISH_INTERVAL: Duration = Duration::from_millis(50);

/// True when at least `interval` has passed since `last_publish`, or when
/// nothing was published yet.
pub fn should_publish(now: Instant, last_publish: Option<Instant>, interval: Duration) -> bool {
    match last_publish {
        None => true,
        Some(last) => now.saturating_duration_since(last) >= interval,
    }
}

/// Tracks the last publish attempt.
#[derive(Debug, Clone)]
pub struct PublishThrottle {
    interval: Duration,
    last_publish: Option<Instant>,
}

impl PublishThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_publish: None,
        }
    }

    /// Returns whether to publish now and, if so, records the attempt.
    ///
    /// The attempt counts whether or not the transport is connected, so an
    /// outage never builds up a burst of sends for when it ends.
    pub fn poll(&mut self, now: Instant) -> bool {
        if should_publish(now, self.last_publish, self.interval) {
            self.last_publish = Some(now);
            true
        } else {
            false
        }
    }

    pub fn last_publish(&self) -> Option<Instant> {
        self.last_publish
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for PublishThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_PUBLISH_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publishes_on_cadence() {
        let t0 = Instant::now();
        let interval = Duration::from_millis(50);

        assert!(should_publish(t0, None, interval));
        for ms in [1, 10, 25, 49] {
            assert!(!should_publish(t0 + Duration::from_millis(ms), Some(t0), interval));
        }
        assert!(!should_publish(t0 + Duration::from_micros(49_999), Some(t0), interval));
        assert!(should_publish(t0 + Duration::from_micros(50_001), Some(t0), interval));
    }

    #[test]
    fn clock_going_backwards_does_not_publish() {
        let t0 = Instant::now() + Duration::from_secs(1);
        assert!(!should_publish(t0 - Duration::from_millis(500), Some(t0), DEFAULT_PUBLISH_INTERVAL));
    }

    #[test]
    fn throttle_records_attempts() {
        let t0 = Instant::now();
        let mut throttle = PublishThrottle::default();

        assert!(throttle.poll(t0));
        assert!(!throttle.poll(t0 + Duration::from_millis(16)));
        assert!(!throttle.poll(t0 + Duration::from_millis(33)));
        assert!(throttle.poll(t0 + Duration::from_millis(50)));
        assert_eq!(throttle.last_publish(), Some(t0 + Duration::from_millis(50)));
    }

    #[test]
    fn sixty_frames_yield_twenty_publishes() {
        let t0 = Instant::now();
        let mut throttle = PublishThrottle::default();
        let frame = Duration::from_micros(16_667);

        let sent = (0..60).filter(|i| throttle.poll(t0 + frame * *i)).count();
        assert!((15..=20).contains(&sent), "sent {sent}");
    }
}
