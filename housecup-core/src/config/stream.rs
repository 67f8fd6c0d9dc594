use rand::Rng;
use std::time::Duration;
use thiserror::Error;

/// Pacing of the event stream.
///
/// Each cycle waits a uniformly random delay in `[min_delay, max_delay]`
/// before producing the next event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    min_delay: Duration,
    max_delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamConfigError {
    #[error("min delay {min:?} exceeds max delay {max:?}")]
    InvertedDelayRange { min: Duration, max: Duration },
}

impl StreamConfig {
    pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(500);
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(2000);

    pub fn new(min_delay: Duration, max_delay: Duration) -> Result<Self, StreamConfigError> {
        if min_delay > max_delay {
            return Err(StreamConfigError::InvertedDelayRange {
                min: min_delay,
                max: max_delay,
            });
        }
        Ok(Self {
            min_delay,
            max_delay,
        })
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Draw the wait before the next event.
    pub fn sample_delay(&self) -> Duration {
        if self.min_delay == self.max_delay {
            return self.min_delay;
        }
        rand::rng().random_range(self.min_delay..=self.max_delay)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            min_delay: Self::DEFAULT_MIN_DELAY,
            max_delay: Self::DEFAULT_MAX_DELAY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StreamConfig::default();
        assert_eq!(config.min_delay(), Duration::from_millis(500));
        assert_eq!(config.max_delay(), Duration::from_millis(2000));
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let err = StreamConfig::new(Duration::from_secs(3), Duration::from_secs(1)).unwrap_err();
        assert_eq!(
            err,
            StreamConfigError::InvertedDelayRange {
                min: Duration::from_secs(3),
                max: Duration::from_secs(1),
            }
        );
    }

    #[test]
    fn test_sample_delay_stays_in_range() {
        let config = StreamConfig::new(Duration::from_millis(10), Duration::from_millis(20)).unwrap();
        for _ in 0..200 {
            let delay = config.sample_delay();
            assert!(delay >= config.min_delay() && delay <= config.max_delay());
        }

        let fixed = StreamConfig::new(Duration::from_millis(7), Duration::from_millis(7)).unwrap();
        assert_eq!(fixed.sample_delay(), Duration::from_millis(7));
    }
}
