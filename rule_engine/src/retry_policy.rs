// Retry budget for optimistic rule writes
//
// A rule append is retried from a fresh read whenever the conditional write
// loses a race or the store errors. The default policy retries up to five times
// back to back; a backoff can be configured to space attempts out.

use rand::Rng;
use std::time::Duration;

/// Attempts made by the rule writer before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Retry policy for the read-modify-write cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_ms: u64,
    exponential_backoff: bool,
    jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_ms,
            exponential_backoff: false,
            jitter: false,
        }
    }

    /// Five attempts, no delay between them.
    pub fn immediate() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, 0)
    }

    pub fn with_exponential_backoff(mut self) -> Self {
        self.exponential_backoff = true;
        self
    }

    /// Draw each delay uniformly from `[0, delay]`.
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn has_backoff(&self) -> bool {
        self.backoff_ms > 0
    }

    /// Upper bound of the delay after the given zero-based failed attempt.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let ms = if self.exponential_backoff {
            self.backoff_ms
                .saturating_mul(2_u64.saturating_pow(attempt.min(16)))
        } else {
            self.backoff_ms
        };
        Duration::from_millis(ms)
    }

    /// Delay to wait after the given zero-based failed attempt.
    pub fn delay_for<G: Rng>(&self, attempt: u32, rng: &mut G) -> Duration {
        let base = self.base_delay(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let ms = base.as_millis() as u64;
        Duration::from_millis(rng.gen_range(0..=ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::immediate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn default_is_five_immediate_attempts() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 5);
        assert!(!policy.has_backoff());
        assert_eq!(policy.base_delay(3), Duration::ZERO);
    }

    #[test]
    fn exponential_backoff_doubles() {
        let policy = RetryPolicy::new(4, 10).with_exponential_backoff();
        assert_eq!(policy.base_delay(0), Duration::from_millis(10));
        assert_eq!(policy.base_delay(1), Duration::from_millis(20));
        assert_eq!(policy.base_delay(3), Duration::from_millis(80));
    }

    #[test]
    fn jitter_stays_below_base_delay() {
        let policy = RetryPolicy::new(5, 50).with_jitter();
        let mut rng = StdRng::seed_from_u64(7);
        for attempt in 0..5 {
            assert!(policy.delay_for(attempt, &mut rng) <= Duration::from_millis(50));
        }
    }

    #[test]
    fn at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, 0).max_attempts(), 1);
    }
}
