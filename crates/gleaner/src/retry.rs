/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Retry policies for chunk execution.
//!
//! A [`RetryPolicy`] bounds how many times the same chunk is re-attempted and
//! how long to wait between attempts. Retry conditions decide whether a given
//! error is worth re-attempting at all; the common configuration retries
//! transient errors only.

use crate::error::ItemError;
use std::time::Duration;

/// Conditions under which a failed chunk is retried.
///
/// All configured conditions must be satisfied for a retry to happen.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryCondition {
    /// Never retry
    Never,
    /// Retry on any error
    AllErrors,
    /// Retry only transient-classified errors
    TransientOnly,
    /// Retry when the error message contains one of the patterns
    /// (case-insensitive)
    ErrorPattern { patterns: Vec<String> },
}

/// Backoff strategy between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackoffStrategy {
    /// Same delay every attempt
    Fixed,
    /// Delay grows linearly with the attempt number
    Linear,
    /// Delay doubles each attempt
    Exponential,
}

/// Retry policy for a chunked step.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts for one chunk (first attempt included)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound on any computed delay
    pub max_delay: Duration,
    pub backoff: BackoffStrategy,
    /// Whether to add up to 10% random jitter to computed delays
    pub with_jitter: bool,
    pub retry_conditions: Vec<RetryCondition>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff: BackoffStrategy::Exponential,
            with_jitter: true,
            retry_conditions: vec![RetryCondition::TransientOnly],
        }
    }
}

impl RetryPolicy {
    /// Computes the delay before the given retry attempt (1-based: attempt 1
    /// is the first retry).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as u64;
        let millis = match self.backoff {
            BackoffStrategy::Fixed => base,
            BackoffStrategy::Linear => base.saturating_mul(attempt as u64),
            BackoffStrategy::Exponential => {
                base.saturating_mul(1u64 << attempt.saturating_sub(1).min(20))
            }
        };
        let capped = millis.min(self.max_delay.as_millis() as u64);
        let final_millis = if self.with_jitter {
            let jitter = (capped / 10).max(1);
            capped + (rand::random::<u64>() % jitter)
        } else {
            capped
        };
        Duration::from_millis(final_millis)
    }

    /// Decides whether a failed attempt should be retried.
    ///
    /// `attempt` is the attempt that just failed (1-based). All configured
    /// conditions must hold.
    pub fn should_retry(&self, attempt: u32, error: &ItemError) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }

        self.retry_conditions.iter().all(|condition| match condition {
            RetryCondition::Never => false,
            RetryCondition::AllErrors => true,
            RetryCondition::TransientOnly => matches!(error, ItemError::Transient(_)),
            RetryCondition::ErrorPattern { patterns } => {
                let message = error.to_string().to_lowercase();
                patterns
                    .iter()
                    .any(|pattern| message.contains(&pattern.to_lowercase()))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy_without_jitter(backoff: BackoffStrategy) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff,
            with_jitter: false,
            retry_conditions: vec![RetryCondition::TransientOnly],
        }
    }

    #[test]
    fn test_exponential_backoff_doubles() {
        let policy = policy_without_jitter(BackoffStrategy::Exponential);
        assert_eq!(policy.calculate_delay(1), Duration::from_millis(100));
        assert_eq!(policy.calculate_delay(2), Duration::from_millis(200));
        assert_eq!(policy.calculate_delay(3), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = policy_without_jitter(BackoffStrategy::Exponential);
        assert_eq!(policy.calculate_delay(20), Duration::from_secs(5));
    }

    #[test]
    fn test_transient_only_condition() {
        let policy = policy_without_jitter(BackoffStrategy::Fixed);
        assert!(policy.should_retry(1, &ItemError::Transient("timeout".into())));
        assert!(!policy.should_retry(1, &ItemError::Fatal("bad config".into())));
        assert!(!policy.should_retry(1, &ItemError::BadItem("garbage".into())));
    }

    #[test]
    fn test_max_attempts_exhausts_retries() {
        let policy = policy_without_jitter(BackoffStrategy::Fixed);
        assert!(policy.should_retry(2, &ItemError::Transient("blip".into())));
        assert!(!policy.should_retry(3, &ItemError::Transient("blip".into())));
    }

    #[test]
    fn test_error_pattern_condition() {
        let policy = RetryPolicy {
            retry_conditions: vec![RetryCondition::ErrorPattern {
                patterns: vec!["Timeout".to_string(), "connection".to_string()],
            }],
            with_jitter: false,
            ..RetryPolicy::default()
        };
        assert!(policy.should_retry(1, &ItemError::Transient("read timeout".into())));
        assert!(!policy.should_retry(1, &ItemError::Transient("quota exceeded".into())));
    }

    #[test]
    fn test_never_condition_wins() {
        let policy = RetryPolicy {
            retry_conditions: vec![RetryCondition::AllErrors, RetryCondition::Never],
            ..RetryPolicy::default()
        };
        assert!(!policy.should_retry(1, &ItemError::Transient("blip".into())));
    }
}
