//! Throughput and ETA estimation.

use std::time::{Duration, Instant};

/// Interval-sampled speed estimator.
///
/// Speed is recomputed at most once per interval as `Δbytes / Δtime` between
/// consecutive samples. Calls in between return the last computed value.
#[derive(Debug, Clone)]
pub struct SpeedMeter {
    interval: Duration,
    last_sample: Option<(Instant, u64)>,
    speed_bps: f64,
}

impl SpeedMeter {
    /// Create a meter sampling at most once per `interval`.
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sample: None,
            speed_bps: 0.0,
        }
    }

    /// Feed the running byte total and get the current speed in bytes/second.
    pub fn update(&mut self, total_bytes: u64) -> f64 {
        self.update_at(total_bytes, Instant::now())
    }

    /// [`update`](Self::update) with an explicit clock reading.
    #[allow(clippy::cast_precision_loss)]
    pub fn update_at(&mut self, total_bytes: u64, now: Instant) -> f64 {
        match self.last_sample {
            None => self.last_sample = Some((now, total_bytes)),
            Some((at, bytes)) => {
                let elapsed = now.saturating_duration_since(at);
                if elapsed >= self.interval && !elapsed.is_zero() {
                    let delta = total_bytes.saturating_sub(bytes);
                    self.speed_bps = delta as f64 / elapsed.as_secs_f64();
                    self.last_sample = Some((now, total_bytes));
                }
            }
        }
        self.speed_bps
    }

    /// Last computed speed in bytes/second.
    pub const fn speed(&self) -> f64 {
        self.speed_bps
    }

    /// Time left at the current speed, or `None` when it cannot be estimated.
    #[allow(clippy::cast_precision_loss)]
    pub fn eta(&self, downloaded: u64, total: u64) -> Option<Duration> {
        if self.speed_bps <= 0.0 || downloaded >= total {
            return None;
        }
        Duration::try_from_secs_f64((total - downloaded) as f64 / self.speed_bps).ok()
    }

    /// Forget all samples (a resumed download starts a fresh window).
    pub const fn reset(&mut self) {
        self.last_sample = None;
        self.speed_bps = 0.0;
    }
}
