//! Exponential backoff with jitter for push retries (§5: "push retry uses
//! exponential backoff with jitter").

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
    pub jitter: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self { base: Duration::from_millis(500), max: Duration::from_secs(60), jitter: Duration::from_millis(250) }
    }
}

impl BackoffPolicy {
    /// Delay before retry attempt `attempt` (0-indexed): `base * 2^attempt`,
    /// capped at `max`, plus uniform jitter in `[0, jitter)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let doubled = self.base.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
        let capped = doubled.min(self.max);
        let jitter_ms = if self.jitter.is_zero() { 0 } else { rand::thread_rng().gen_range(0..self.jitter.as_millis() as u64) };
        capped + Duration::from_millis(jitter_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_and_is_capped() {
        let policy = BackoffPolicy { base: Duration::from_millis(100), max: Duration::from_secs(1), jitter: Duration::from_millis(0) };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(10), Duration::from_secs(1));
    }

    #[test]
    fn jitter_never_pushes_delay_below_the_base_tier() {
        let policy = BackoffPolicy { base: Duration::from_millis(100), max: Duration::from_secs(1), jitter: Duration::from_millis(50) };
        for attempt in 0..5 {
            let delay = policy.delay_for(attempt);
            assert!(delay >= Duration::from_millis(100) * 2u32.pow(attempt));
        }
    }
}
