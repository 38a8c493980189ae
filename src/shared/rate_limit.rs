//! Randomized pause between consecutive chat pages.
//!
//! Used only between pages, never between retry attempts of the same page.

use crate::domain::FetchError;
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiter {
    min: Duration,
    max: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_millis(50), Duration::from_millis(500))
    }
}

impl RateLimiter {
    /// Bounds are swapped if given in the wrong order.
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// No pause at all.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn bounds(&self) -> (Duration, Duration) {
        (self.min, self.max)
    }

    /// Uniform draw from `[min, max]`.
    pub fn next_delay(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let lo = u64::try_from(self.min.as_millis()).unwrap_or(u64::MAX);
        let hi = u64::try_from(self.max.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }

    /// Sleep for one randomized interval, aborting early on cancellation.
    pub async fn pause(&self, cancel: &CancellationToken) -> Result<(), FetchError> {
        let delay = self.next_delay();
        if delay.is_zero() {
            return if cancel.is_cancelled() {
                Err(FetchError::Cancelled)
            } else {
                Ok(())
            };
        }
        tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_is_drawn_within_bounds() {
        let limiter = RateLimiter::new(Duration::from_millis(50), Duration::from_millis(500));
        for _ in 0..64 {
            let d = limiter.next_delay();
            assert!(d >= Duration::from_millis(50));
            assert!(d <= Duration::from_millis(500));
        }
    }

    #[test]
    fn reversed_bounds_are_normalized() {
        let limiter = RateLimiter::new(Duration::from_millis(900), Duration::from_millis(100));
        assert_eq!(
            limiter.bounds(),
            (Duration::from_millis(100), Duration::from_millis(900))
        );
    }

    #[tokio::test]
    async fn disabled_limiter_returns_immediately() {
        let token = CancellationToken::new();
        assert_eq!(RateLimiter::disabled().pause(&token).await, Ok(()));
    }

    #[tokio::test]
    async fn pause_is_cancellable() {
        let limiter = RateLimiter::new(Duration::from_secs(3600), Duration::from_secs(3600));
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(limiter.pause(&token).await, Err(FetchError::Cancelled));
    }
}
