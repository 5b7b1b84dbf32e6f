//! Retry policy for failed caption jobs.

use crate::config::QueueConfig;
use std::time::Duration;

/// What to do with a job after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Reinsert after the given delay, carrying the new retry count.
    Retry { retry_count: u32, delay: Duration },
    /// Retry budget exhausted.
    GiveUp { attempts: u32 },
}

/// Fixed-table backoff policy.
///
/// Delays are looked up by the retry count *after* it has been incremented,
/// clamped to the last entry. With the default table the first retry waits
/// 2s, the second 5s and the third 10s.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}

impl RetryPolicy {
    /// Creates a policy from explicit values.
    pub fn new(max_retries: u32, backoff: Vec<Duration>) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Creates a policy from queue configuration.
    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(
            config.max_retries,
            config
                .backoff_ms
                .iter()
                .copied()
                .map(Duration::from_millis)
                .collect(),
        )
    }

    /// Maximum number of retries.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns true if a job with `retry_count` retries may be retried again.
    pub fn should_retry(&self, retry_count: u32) -> bool {
        retry_count < self.max_retries
    }

    /// Delay for the given (post-increment) retry count.
    pub fn delay_for_retry(&self, retry_count: u32) -> Duration {
        let Some(last) = self.backoff.len().checked_sub(1) else {
            return Duration::ZERO;
        };
        let index = usize::try_from(retry_count).map_or(last, |i| i.min(last));
        self.backoff[index]
    }

    /// Decide the fate of a job that just failed with `retry_count` retries used.
    pub fn decide(&self, retry_count: u32) -> RetryDecision {
        if self.should_retry(retry_count) {
            let next = retry_count + 1;
            RetryDecision::Retry {
                retry_count: next,
                delay: self.delay_for_retry(next),
            }
        } else {
            RetryDecision::GiveUp {
                attempts: retry_count + 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_increment_indexing() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_retry(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_retry(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_retry(2), Duration::from_secs(5));
        assert_eq!(policy.delay_for_retry(3), Duration::from_secs(10));
        assert_eq!(policy.delay_for_retry(4), Duration::from_secs(30));
    }

    #[test]
    fn test_delay_clamped_to_last_entry() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_retry(9), Duration::from_secs(30));
        assert_eq!(policy.delay_for_retry(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_decide_sequence() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.decide(0),
            RetryDecision::Retry {
                retry_count: 1,
                delay: Duration::from_secs(2)
            }
        );
        assert_eq!(
            policy.decide(2),
            RetryDecision::Retry {
                retry_count: 3,
                delay: Duration::from_secs(10)
            }
        );
        assert_eq!(policy.decide(3), RetryDecision::GiveUp { attempts: 4 });
    }

    #[test]
    fn test_zero_retries() {
        let policy = RetryPolicy::new(0, vec![Duration::from_millis(100)]);
        assert!(!policy.should_retry(0));
        assert_eq!(policy.decide(0), RetryDecision::GiveUp { attempts: 1 });
    }

    #[test]
    fn test_empty_table_yields_zero_delay() {
        let policy = RetryPolicy::new(2, Vec::new());
        assert_eq!(policy.delay_for_retry(1), Duration::ZERO);
    }
}
