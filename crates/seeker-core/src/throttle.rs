//! Per-target sliding-window rate limiting.
//!
//! Each target (hostname) keeps the timestamps of the calls admitted within
//! the trailing window. A call is admitted immediately while fewer than
//! `max_requests` timestamps remain in the window; otherwise the caller
//! sleeps until the oldest one leaves it.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use seeker_core::throttle::{RateLimiter, ThrottleConfig};
//!
//! # async fn run() {
//! let limiter = RateLimiter::new(ThrottleConfig::new(100, Duration::from_secs(60)));
//! let waited = limiter.await_or_record("github.com").await;
//! # let _ = waited;
//! # }
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

/// Configuration for the per-target rate limiter.
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Maximum admitted calls per target within `window`.
    pub max_requests: usize,

    /// Length of the trailing window.
    pub window: Duration,
}

impl ThrottleConfig {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
        }
    }
}

impl Default for ThrottleConfig {
    /// 100 requests per target per minute.
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(60),
        }
    }
}

type Window = Arc<tokio::sync::Mutex<VecDeque<Instant>>>;

/// Sliding-window limiter keyed by target.
///
/// The outer map lock is only held to look up a target's window; the
/// per-target lock serialises callers of the same target, including while
/// one of them waits for room. Different targets never contend.
#[derive(Clone)]
pub struct RateLimiter {
    config: ThrottleConfig,
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl RateLimiter {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    fn lock_windows(&self) -> MutexGuard<'_, HashMap<String, Window>> {
        self.windows.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned rate limiter mutex");
            poisoned.into_inner()
        })
    }

    fn window_for(&self, target: &str) -> Window {
        self.lock_windows()
            .entry(target.to_string())
            .or_default()
            .clone()
    }

    /// Wait until `target` has room in its window, then record the call.
    ///
    /// Returns how long the caller was held back.
    pub async fn await_or_record(&self, target: &str) -> Duration {
        let window = self.window_for(target);
        let cap = self.config.max_requests.max(1);
        let started = Instant::now();
        let mut stamps = window.lock().await;

        loop {
            let now = Instant::now();
            while stamps
                .front()
                .is_some_and(|&t| now.duration_since(t) >= self.config.window)
            {
                stamps.pop_front();
            }

            if stamps.len() < cap {
                stamps.push_back(now);
                break;
            }

            // Full window: the front entry is the next to expire.
            let Some(&oldest) = stamps.front() else {
                continue;
            };
            // An unrepresentable expiry means the entry never leaves the window.
            let wait = oldest
                .checked_add(self.config.window)
                .map_or(self.config.window, |expiry| expiry.saturating_duration_since(now));
            tracing::debug!(
                target = %target,
                wait_ms = %wait.as_millis(),
                "Rate limit reached, waiting"
            );
            tokio::time::sleep(wait).await;
        }

        started.elapsed()
    }

    /// Number of calls currently recorded for `target` (stale entries included).
    pub async fn recorded(&self, target: &str) -> usize {
        let window = self.lock_windows().get(target).cloned();
        match window {
            Some(w) => w.lock().await.len(),
            None => 0,
        }
    }
}
