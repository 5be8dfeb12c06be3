//! Randomized delay applied to denied authentication and verification attempts.

use rand::Rng;
use std::time::Duration;

pub const DEFAULT_MIN_DELAY_MS: u64 = 250;
pub const DEFAULT_MAX_DELAY_MS: u64 = 1_500;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FailureDelay {
    min: Duration,
    max: Duration,
}

impl Default for FailureDelay {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_MIN_DELAY_MS),
            Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        )
    }
}

impl FailureDelay {
    /// Bounds are reordered if given backwards.
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// No delay at all.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    /// A fresh draw from `[min, max]`.
    #[must_use]
    pub fn sample(&self) -> Duration {
        let min = u64::try_from(self.min.as_millis()).unwrap_or(u64::MAX);
        let max = u64::try_from(self.max.as_millis()).unwrap_or(u64::MAX);
        if min == max {
            return self.min;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    pub async fn wait(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn samples_stay_in_range_and_vary() {
        let delay = FailureDelay::new(Duration::from_millis(10), Duration::from_millis(500));
        let samples: HashSet<Duration> = (0..200).map(|_| delay.sample()).collect();
        assert!(samples
            .iter()
            .all(|d| *d >= Duration::from_millis(10) && *d <= Duration::from_millis(500)));
        assert!(samples.len() > 1);
    }

    #[test]
    fn reversed_bounds_are_reordered() {
        let delay = FailureDelay::new(Duration::from_millis(9), Duration::from_millis(3));
        assert_eq!(
            delay,
            FailureDelay::new(Duration::from_millis(3), Duration::from_millis(9))
        );
    }

    #[tokio::test]
    async fn none_returns_immediately() {
        let started = std::time::Instant::now();
        FailureDelay::none().wait().await;
        assert!(started.elapsed() < Duration::from_millis(50));
        assert_eq!(FailureDelay::none().sample(), Duration::ZERO);
    }
}
