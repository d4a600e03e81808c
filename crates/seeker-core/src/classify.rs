//! Response decoding and presence classification.

use std::sync::LazyLock;

use moka::sync::Cache;
use regex::{Regex, RegexBuilder};

use crate::models::SiteDescriptor;

/// Characters that make a catalog pattern a regular expression.
const REGEX_METACHARS: &[char] = &['*', '+', '?', '[', ']', '(', ')'];

/// Compiled patterns keyed by source text. `None` marks patterns that
/// failed to compile so they are not retried on every probe.
static PATTERN_CACHE: LazyLock<Cache<String, Option<Regex>>> =
    LazyLock::new(|| Cache::new(4096));

/// What a response says about the queried account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Found,
    NotFound,
    /// Neither the presence nor the absence signature matched.
    Ambiguous,
}

/// Message attached to ambiguous responses.
pub const PATTERN_MISMATCH: &str = "pattern mismatch";

/// Decode a response body: UTF-8, then ISO-8859-1, then lossy UTF-8.
pub fn decode_body(bytes: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }
    if let Some(text) = decode_latin1(bytes) {
        return text;
    }
    String::from_utf8_lossy(bytes).into_owned()
}

/// ISO-8859-1 maps bytes straight to code points. The C1 control range
/// never shows up in real Latin-1 text, so its presence rejects the body.
fn decode_latin1(bytes: &[u8]) -> Option<String> {
    if bytes.iter().any(|b| (0x80..=0x9F).contains(b)) {
        return None;
    }
    Some(bytes.iter().map(|&b| b as char).collect())
}

/// Classify a decoded response against a site's signatures.
pub fn classify(site: &SiteDescriptor, status: u16, body: &str) -> Verdict {
    let body_lower = body.to_lowercase();

    if status == site.expected_status && matches_pattern(&site.expected_pattern, body, &body_lower)
    {
        return Verdict::Found;
    }

    if let (Some(miss_status), Some(miss_pattern)) = (site.miss_status, &site.miss_pattern) {
        if status == miss_status && matches_pattern(miss_pattern, body, &body_lower) {
            return Verdict::NotFound;
        }
    }

    Verdict::Ambiguous
}

/// Case-insensitive match of a catalog pattern. Empty patterns never match.
fn matches_pattern(pattern: &str, body: &str, body_lower: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }

    if pattern.contains(REGEX_METACHARS) {
        if let Some(re) = compiled(pattern) {
            return re.is_match(body);
        }
    }

    body_lower.contains(&pattern.to_lowercase())
}

fn compiled(pattern: &str) -> Option<Regex> {
    PATTERN_CACHE.get_with(pattern.to_string(), || {
        match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::debug!(%pattern, error = %e, "Pattern is not a valid regex, matching literally");
                None
            }
        }
    })
}
