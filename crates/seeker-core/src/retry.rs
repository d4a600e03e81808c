use std::future::Future;
use std::time::Duration;

use crate::error::is_transient_message;
use crate::models::{ProbeOutcome, ProbeStatus};

/// Bounded exponential backoff for transient probe failures.
///
/// Delay schedule: `base_delay`, `2 * base_delay`, `4 * base_delay`, ...
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total tries, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay after the given failed attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Only transient `Error` outcomes are worth another try.
    pub fn should_retry(outcome: &ProbeOutcome) -> bool {
        outcome.status == ProbeStatus::Error
            && outcome
                .error_message
                .as_deref()
                .is_some_and(is_transient_message)
    }

    /// Run `probe` until it yields a definitive or non-transient outcome, or
    /// the attempt budget is spent. The last outcome is returned.
    ///
    /// `probe` receives the 0-indexed attempt number.
    pub async fn with_retry<F, Fut>(&self, mut probe: F) -> ProbeOutcome
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = ProbeOutcome>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            let outcome = probe(attempt).await;
            attempt += 1;

            if attempt >= max_attempts || !Self::should_retry(&outcome) {
                return outcome;
            }

            let delay = self.delay_for_attempt(attempt - 1);
            tracing::debug!(
                site = %outcome.site_name,
                attempt,
                delay_ms = %delay.as_millis(),
                error = outcome.error_message.as_deref().unwrap_or_default(),
                "Transient probe failure, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
