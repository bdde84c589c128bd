//! Engine configuration.
//!
//! Tuning knobs for segmentation, retries, timeouts and the shared worker pool.
//! Built with `with_*` methods and checked with [`EngineConfig::validate`].

use std::time::Duration;

use thiserror::Error;

/// Default number of segments per file.
pub const DEFAULT_SEGMENT_COUNT: u32 = 4;

/// Default size of the shared worker pool.
pub const DEFAULT_MAX_WORKERS: u32 = 3;

/// Default streaming buffer size (128 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 128 * 1024;

/// Configuration for the download engine.
///
/// # Example
///
/// ```
/// use gogload_core::EngineConfig;
/// use std::time::Duration;
///
/// let config = EngineConfig::new()
///     .with_segment_count(8)
///     .with_retry_base_delay(Duration::from_millis(250));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Segments per file.
    pub segment_count: u32,
    /// Concurrent segment transfers allowed system-wide.
    pub max_workers: u32,
    /// Bytes buffered before each write + progress update.
    pub chunk_size: usize,
    /// Attempts per segment (first try included).
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each further attempt.
    pub retry_base_delay: Duration,
    /// TCP/TLS connect timeout per request.
    pub connect_timeout: Duration,
    /// Maximum wait for the next body chunk before the attempt is abandoned.
    pub read_timeout: Duration,
    /// Minimum interval between speed samples.
    pub speed_sample_interval: Duration,
    /// Minimum interval between record-level progress writes.
    pub persist_interval: Duration,
    /// Buffer size of the broadcast event channel.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            segment_count: DEFAULT_SEGMENT_COUNT,
            max_workers: DEFAULT_MAX_WORKERS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_attempts: 3,
            retry_base_delay: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(15),
            read_timeout: Duration::from_secs(30),
            speed_sample_interval: Duration::from_millis(500),
            persist_interval: Duration::from_secs(1),
            event_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of segments per file.
    ///
    /// Defaults to 4.
    #[must_use]
    pub const fn with_segment_count(mut self, count: u32) -> Self {
        self.segment_count = count;
        self
    }

    /// Set the size of the shared worker pool.
    ///
    /// Defaults to 3.
    #[must_use]
    pub const fn with_max_workers(mut self, workers: u32) -> Self {
        self.max_workers = workers;
        self
    }

    /// Set the streaming buffer size.
    #[must_use]
    pub const fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    /// Set the number of attempts per segment.
    ///
    /// Defaults to 3.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the base delay for exponential backoff.
    ///
    /// Defaults to 2 seconds.
    #[must_use]
    pub const fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-read timeout.
    #[must_use]
    pub const fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the speed sampling interval.
    #[must_use]
    pub const fn with_speed_sample_interval(mut self, interval: Duration) -> Self {
        self.speed_sample_interval = interval;
        self
    }

    /// Set the minimum interval between record progress writes.
    #[must_use]
    pub const fn with_persist_interval(mut self, interval: Duration) -> Self {
        self.persist_interval = interval;
        self
    }

    /// Set the event channel capacity.
    #[must_use]
    pub const fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Backoff before attempt `attempt + 1`, given that `attempt` (1-based) just failed.
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.retry_base_delay.saturating_mul(1 << exponent)
    }

    /// Check that every knob is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=64).contains(&self.segment_count) {
            return Err(ConfigError::InvalidSegmentCount(self.segment_count));
        }
        if !(1..=64).contains(&self.max_workers) {
            return Err(ConfigError::InvalidWorkerCount(self.max_workers));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize);
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidAttempts);
        }
        if self.read_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("read"));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("connect"));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidEventCapacity);
        }
        Ok(())
    }
}

/// Errors from engine configuration validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Segment count must be between 1 and 64, got {0}")]
    InvalidSegmentCount(u32),

    #[error("Worker count must be between 1 and 64, got {0}")]
    InvalidWorkerCount(u32),

    #[error("Chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("At least one attempt per segment is required")]
    InvalidAttempts,

    #[error("The {0} timeout must be greater than zero")]
    InvalidTimeout(&'static str),

    #[error("Event channel capacity must be greater than zero")]
    InvalidEventCapacity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.segment_count, 4);
        assert_eq!(config.max_workers, 3);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.retry_base_delay, Duration::from_secs(2));
        assert_eq!(config.speed_sample_interval, Duration::from_millis(500));
        assert!((128 * 1024..=256 * 1024).contains(&config.chunk_size));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = EngineConfig::new()
            .with_segment_count(2)
            .with_max_workers(8)
            .with_max_attempts(5)
            .with_chunk_size(4096);
        assert_eq!(config.segment_count, 2);
        assert_eq!(config.max_workers, 8);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.chunk_size, 4096);
    }

    #[test]
    fn backoff_starts_at_base_and_doubles() {
        let config = EngineConfig::default();
        assert_eq!(config.backoff_for(1), Duration::from_secs(2));
        assert_eq!(config.backoff_for(2), Duration::from_secs(4));
        assert_eq!(config.backoff_for(3), Duration::from_secs(8));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        assert_eq!(
            EngineConfig::new().with_segment_count(0).validate(),
            Err(ConfigError::InvalidSegmentCount(0))
        );
        assert_eq!(
            EngineConfig::new().with_max_workers(0).validate(),
            Err(ConfigError::InvalidWorkerCount(0))
        );
        assert_eq!(
            EngineConfig::new().with_max_attempts(0).validate(),
            Err(ConfigError::InvalidAttempts)
        );
        assert_eq!(
            EngineConfig::new().with_read_timeout(Duration::ZERO).validate(),
            Err(ConfigError::InvalidTimeout("read"))
        );
    }
}
