//! Retry bounds and backoff schedule for model invocations

use std::time::Duration;

use rand::Rng;

/// Two-level retry policy
///
/// - `validation_attempts`: model calls allowed per invocation while the
///   response keeps failing its schema
/// - `request_attempts`: calls allowed per validation attempt while the
///   service keeps failing transiently
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub validation_attempts: usize,
    pub request_attempts: usize,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            validation_attempts: 2,
            request_attempts: 2,
            base_delay: Duration::from_secs(2),
            max_jitter: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Same bounds, no sleeping between transient retries
    pub fn without_delay() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Delay before retry `retry` (0-indexed): `2^retry * base + jitter_fraction * max_jitter`
    ///
    /// `jitter_fraction` is clamped to `[0, 1)`.
    pub fn backoff_delay(&self, retry: u32, jitter_fraction: f64) -> Duration {
        let fraction = jitter_fraction.clamp(0.0, 1.0 - f64::EPSILON);
        let exponential = self.base_delay.saturating_mul(2u32.saturating_pow(retry));
        exponential + self.max_jitter.mul_f64(fraction)
    }

    /// Delay before retry `retry` with uniform random jitter
    pub fn sample_delay(&self, retry: u32) -> Duration {
        let fraction: f64 = rand::thread_rng().gen_range(0.0..1.0);
        self.backoff_delay(retry, fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bounds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.validation_attempts, 2);
        assert_eq!(policy.request_attempts, 2);
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.backoff_delay(0, 0.0), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(1, 0.0), Duration::from_secs(4));
        assert_eq!(policy.backoff_delay(2, 0.0), Duration::from_secs(8));
        assert_eq!(policy.backoff_delay(0, 0.5), Duration::from_millis(2500));
    }

    #[test]
    fn test_sampled_jitter_stays_in_range() {
        let policy = RetryPolicy::default();

        for retry in 0..3 {
            let floor = policy.backoff_delay(retry, 0.0);
            for _ in 0..50 {
                let delay = policy.sample_delay(retry);
                assert!(delay >= floor);
                assert!(delay < floor + Duration::from_secs(1));
            }
        }
    }

    #[test]
    fn test_without_delay_is_zero() {
        let policy = RetryPolicy::without_delay();
        assert_eq!(policy.sample_delay(3), Duration::ZERO);
    }
}
