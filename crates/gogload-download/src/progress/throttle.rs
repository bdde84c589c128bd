//! Persistence throttling.
//!
//! Rate-limits record-level progress writes so every chunk does not turn into
//! a database round trip. Events are never throttled.

use std::time::{Duration, Instant};

/// Rate-limiter for periodic side effects.
pub struct ProgressThrottle {
    last_fire: Option<Instant>,
    min_interval: Duration,
}

impl ProgressThrottle {
    /// Create a new throttle with the specified minimum interval.
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            last_fire: None,
            min_interval,
        }
    }

    /// Whether enough time has passed to fire again. Firing is recorded.
    pub fn ready(&mut self) -> bool {
        self.ready_at(Instant::now())
    }

    /// [`ready`](Self::ready) with an explicit clock reading.
    pub fn ready_at(&mut self, now: Instant) -> bool {
        match self.last_fire {
            Some(last) if now.saturating_duration_since(last) < self.min_interval => false,
            _ => {
                self.last_fire = Some(now);
                true
            }
        }
    }

    /// Force the next check to return true.
    pub const fn reset(&mut self) {
        self.last_fire = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_check_fires() {
        let mut throttle = ProgressThrottle::new(Duration::from_secs(1));
        assert!(throttle.ready());
    }

    #[test]
    fn test_respects_interval() {
        let mut throttle = ProgressThrottle::new(Duration::from_millis(50));
        let t0 = Instant::now();
        assert!(throttle.ready_at(t0));
        assert!(!throttle.ready_at(t0 + Duration::from_millis(10)));
        assert!(throttle.ready_at(t0 + Duration::from_millis(60)));
    }

    #[test]
    fn test_reset() {
        let mut throttle = ProgressThrottle::new(Duration::from_secs(1));
        throttle.ready();
        assert!(!throttle.ready());

        throttle.reset();
        assert!(throttle.ready());
    }
}
