//! Single-site probing: request, decode, classify, extract.

use std::time::Duration;

use tokio::time::Instant;

use crate::classify::{PATTERN_MISMATCH, Verdict, classify, decode_body};
use crate::error::AppError;
use crate::gate::ConcurrencyGate;
use crate::models::{ProbeOutcome, SiteDescriptor, target_key};
use crate::throttle::RateLimiter;
use crate::traits::{ProfileExtractor, Transport};

/// Probes one site template for one query value.
///
/// Every request first takes a [`ConcurrencyGate`] permit, then waits for
/// room in the target's [`RateLimiter`] window. Both are released when the
/// probe returns or its task is aborted.
#[derive(Clone)]
pub struct SiteProber<T: Transport, P: ProfileExtractor> {
    transport: T,
    extractor: P,
    gate: ConcurrencyGate,
    limiter: RateLimiter,
    request_timeout: Duration,
}

impl<T: Transport, P: ProfileExtractor> SiteProber<T, P> {
    pub fn new(
        transport: T,
        extractor: P,
        gate: ConcurrencyGate,
        limiter: RateLimiter,
        request_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            extractor,
            gate,
            limiter,
            request_timeout,
        }
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// Probe `site` for `query`. Never fails: I/O problems become
    /// `Error` outcomes.
    pub async fn probe(
        &self,
        site: &SiteDescriptor,
        query: &str,
        extract_profile: bool,
    ) -> ProbeOutcome {
        let url = site.resolve_url(query);
        let started = Instant::now();

        let Some(target) = target_key(&url) else {
            return ProbeOutcome::error(site, url, None, "invalid probe URL", started.elapsed());
        };

        let _permit = self.gate.acquire().await;
        let waited = self.limiter.await_or_record(&target).await;
        if !waited.is_zero() {
            tracing::debug!(
                site = %site.name,
                target = %target,
                wait_ms = %waited.as_millis(),
                "Rate limited, waited before probing"
            );
        }

        // The transport carries its own timeout; this bounds it regardless.
        let request = self.transport.get(&url, &site.extra_headers);
        let response = match tokio::time::timeout(self.request_timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::debug!(site = %site.name, %url, error = %e, "Probe request failed");
                return ProbeOutcome::error(site, url, None, e.to_string(), started.elapsed());
            }
            Err(_) => {
                let e = AppError::Timeout(self.request_timeout.as_secs());
                tracing::debug!(site = %site.name, %url, "Probe request timed out");
                return ProbeOutcome::error(site, url, None, e.to_string(), started.elapsed());
            }
        };

        let body = decode_body(&response.body);
        let elapsed = started.elapsed();

        match classify(site, response.status, &body) {
            Verdict::Found => {
                let outcome = ProbeOutcome::found(site, url, response.status, elapsed);
                if extract_profile {
                    outcome.with_profile(self.extractor.extract(&body))
                } else {
                    outcome
                }
            }
            Verdict::NotFound => ProbeOutcome::not_found(site, url, response.status, elapsed),
            Verdict::Ambiguous => ProbeOutcome::error(
                site,
                url,
                Some(response.status),
                mismatch_message(response.status),
                elapsed,
            ),
        }
    }
}

/// Ambiguous answers from throttling or overloaded servers are flagged so
/// the retry policy picks them up.
fn mismatch_message(status: u16) -> String {
    match status {
        429 => format!("{PATTERN_MISMATCH} (HTTP 429 too many requests)"),
        502 => format!("{PATTERN_MISMATCH} (HTTP 502 bad gateway)"),
        503 => format!("{PATTERN_MISMATCH} (HTTP 503 service unavailable)"),
        504 => format!("{PATTERN_MISMATCH} (HTTP 504 gateway timeout)"),
        _ => PATTERN_MISMATCH.to_string(),
    }
}
