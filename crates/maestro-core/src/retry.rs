// Retry policy with exponential backoff and jitter

use rand::Rng;
use std::time::Duration;

/// Exponential backoff with jitter to avoid thundering herd
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_interval: Duration,
    /// Ceiling on the delay between retries
    pub max_interval: Duration,
    /// Backoff multiplier (2.0 doubles the delay each retry)
    pub backoff_coefficient: f64,
    /// Jitter factor in [0, 1]; 0.1 means up to ±10% randomness
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
            backoff_coefficient: 2.0,
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Policy with `retries` retries after the initial attempt
    pub fn with_retries(retries: u32, initial: Duration, max: Duration) -> Self {
        Self {
            max_attempts: retries + 1,
            initial_interval: initial,
            max_interval: max,
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (1-based); `None` once the
    /// attempt budget is spent
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let exponent = attempt.saturating_sub(1) as i32;
        let base = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);
        let capped = base.min(self.max_interval.as_secs_f64());

        let jittered = if self.jitter > 0.0 {
            let spread = capped * self.jitter;
            let offset = rand::thread_rng().gen_range(-spread..=spread);
            (capped + offset).max(0.0)
        } else {
            capped
        };
        Some(Duration::from_secs_f64(jittered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(4),
            backoff_coefficient: 2.0,
            jitter: 0.0,
        };
        assert_eq!(policy.delay_for(1), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_secs(4)));
        // Capped
        assert_eq!(policy.delay_for(4), Some(Duration::from_secs(4)));
    }

    #[test]
    fn budget_is_bounded() {
        let policy = RetryPolicy {
            max_attempts: 3,
            jitter: 0.0,
            ..Default::default()
        };
        assert!(policy.delay_for(2).is_some());
        assert!(policy.delay_for(3).is_none());
    }

    #[test]
    fn jitter_stays_within_spread() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(60),
            backoff_coefficient: 1.0,
            jitter: 0.5,
        };
        for _ in 0..100 {
            let delay = policy.delay_for(1).unwrap().as_secs_f64();
            assert!((0.5..=1.5).contains(&delay), "delay {} out of range", delay);
        }
    }
}
