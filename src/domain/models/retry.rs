//! Retry budget for items and the synthesis run.

use serde::{Deserialize, Serialize};

/// Bounded retry policy shared read-only by every item of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

impl RetryPolicy {
    /// Policy allowing `max_retries` retries.
    pub const fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Whether an item that has used `retry_count` retries may try again.
    pub const fn allows_retry(&self, retry_count: u32) -> bool {
        retry_count < self.max_retries
    }

    /// Upper bound on attempts for one item, first attempt included.
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allows_three_retries() {
        let policy = RetryPolicy::default();
        assert!(policy.allows_retry(0));
        assert!(policy.allows_retry(2));
        assert!(!policy.allows_retry(3));
        assert_eq!(policy.max_attempts(), 4);
    }

    #[test]
    fn test_zero_retries() {
        let policy = RetryPolicy::new(0);
        assert!(!policy.allows_retry(0));
        assert_eq!(policy.max_attempts(), 1);
    }
}
