use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::retry::RetryPolicy;
use crate::throttle::ThrottleConfig;

/// Tuning knobs for a [`SearchService`](crate::search::SearchService).
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Global cap on in-flight probe requests.
    pub max_concurrency: usize,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub throttle: ThrottleConfig,
    /// How long the drain loop waits for an event before re-checking
    /// whether the run is finished.
    pub poll_interval: Duration,
    /// Capacity of the consumer-facing event channel.
    pub event_buffer: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 30,
            request_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            throttle: ThrottleConfig::default(),
            poll_interval: Duration::from_secs(1),
            event_buffer: 256,
        }
    }
}

impl SearchConfig {
    /// Read configuration from environment variables, falling back to the
    /// defaults for unset ones.
    ///
    /// - `SEEKER_MAX_CONCURRENCY` (30)
    /// - `SEEKER_REQUEST_TIMEOUT_SECS` (10)
    /// - `SEEKER_MAX_ATTEMPTS` (2)
    /// - `SEEKER_RETRY_BASE_DELAY_MS` (100)
    /// - `SEEKER_RATE_LIMIT` (100) per `SEEKER_RATE_WINDOW_SECS` (60)
    /// - `SEEKER_POLL_INTERVAL_MS` (1000)
    /// - `SEEKER_EVENT_BUFFER` (256)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_concurrency = positive(&lookup, "SEEKER_MAX_CONCURRENCY", defaults.max_concurrency)?;
        let timeout_secs = positive(
            &lookup,
            "SEEKER_REQUEST_TIMEOUT_SECS",
            defaults.request_timeout.as_secs(),
        )?;
        let max_attempts = positive(&lookup, "SEEKER_MAX_ATTEMPTS", defaults.retry.max_attempts)?;
        let base_delay_ms = parse(
            &lookup,
            "SEEKER_RETRY_BASE_DELAY_MS",
            defaults.retry.base_delay.as_millis() as u64,
        )?;
        let rate_limit = positive(&lookup, "SEEKER_RATE_LIMIT", defaults.throttle.max_requests)?;
        let window_secs = positive(
            &lookup,
            "SEEKER_RATE_WINDOW_SECS",
            defaults.throttle.window.as_secs(),
        )?;
        let poll_ms = positive(
            &lookup,
            "SEEKER_POLL_INTERVAL_MS",
            defaults.poll_interval.as_millis() as u64,
        )?;
        let event_buffer = positive(&lookup, "SEEKER_EVENT_BUFFER", defaults.event_buffer)?;

        Ok(Self {
            max_concurrency,
            request_timeout: Duration::from_secs(timeout_secs),
            retry: RetryPolicy::new(max_attempts, Duration::from_millis(base_delay_ms)),
            throttle: ThrottleConfig::new(rate_limit, Duration::from_secs(window_secs)),
            poll_interval: Duration::from_millis(poll_ms),
            event_buffer,
        })
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_throttle(mut self, throttle: ThrottleConfig) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

fn parse<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            AppError::ConfigError(format!(
                "Invalid {key} '{raw}': must be a non-negative integer"
            ))
        }),
    }
}

/// Like [`parse`], rejecting zero.
fn positive<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialEq + Default,
{
    let value = parse(lookup, key, default)?;
    if value == T::default() {
        return Err(AppError::ConfigError(format!("{key} must be at least 1")));
    }
    Ok(value)
}
