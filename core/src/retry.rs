use async_trait::async_trait;
use std::time::Duration;

/// Fixed, ordered backoff for transient text2sql failures (503, timeout)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before retry N; the last entry repeats
    pub backoff: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: vec![
                Duration::from_secs(5),
                Duration::from_secs(15),
                Duration::from_secs(30),
            ],
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Vec::new(),
        }
    }

    /// Delay to wait after the `retry_index`-th failed attempt (0-based).
    pub fn delay_before_retry(&self, retry_index: usize) -> Duration {
        match self.backoff.len() {
            0 => Duration::ZERO,
            len => self.backoff[retry_index.min(len - 1)],
        }
    }

    /// Whether another attempt is allowed after `attempt` (1-based) failed.
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Suspends the caller between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Default sleeper backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_delay_repeats() {
        let policy = RetryPolicy {
            max_attempts: 6,
            ..RetryPolicy::default()
        };
        let delays: Vec<u64> = (0..5)
            .map(|i| policy.delay_before_retry(i).as_secs())
            .collect();
        assert_eq!(delays, vec![5, 15, 30, 30, 30]);
    }

    #[test]
    fn empty_backoff_means_immediate_retry() {
        let policy = RetryPolicy {
            max_attempts: 2,
            backoff: Vec::new(),
        };
        assert_eq!(policy.delay_before_retry(3), Duration::ZERO);
    }

    #[test]
    fn attempts_are_bounded() {
        let policy = RetryPolicy::default();
        assert!(policy.allows_retry_after(1));
        assert!(policy.allows_retry_after(2));
        assert!(!policy.allows_retry_after(3));
        assert!(!RetryPolicy::none().allows_retry_after(1));
    }
}
