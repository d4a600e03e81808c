//! Events delivered to the consumer of a search run.
//!
//! Every event serializes to `{"type": ..., "data": {...}, "timestamp": ...}`.
//! Framing (SSE, JSON lines, websockets) is left to the caller.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{ProbeOutcome, Progress, ProbeStatus};

/// A timestamped event of a search run.
#[derive(Debug, Clone, Serialize)]
pub struct StreamEvent {
    #[serde(flatten)]
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
}

impl StreamEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
        }
    }

    /// Wire name of the event kind (`site_result`, `search_completed`, ...).
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl From<EventKind> for StreamEvent {
    fn from(kind: EventKind) -> Self {
        Self::new(kind)
    }
}

/// Closed set of event kinds with their payloads.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventKind {
    SearchStarted(SearchStarted),
    SiteChecking(SiteChecking),
    SiteResult(SiteResult),
    SecondarySourceStarted(SecondarySourceStarted),
    SecondarySourceResult(SecondarySourceResult),
    SearchCompleted(SearchCompleted),
}

impl EventKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            EventKind::SearchStarted(_) => "search_started",
            EventKind::SiteChecking(_) => "site_checking",
            EventKind::SiteResult(_) => "site_result",
            EventKind::SecondarySourceStarted(_) => "secondary_source_started",
            EventKind::SecondarySourceResult(_) => "secondary_source_result",
            EventKind::SearchCompleted(_) => "search_completed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchStarted {
    pub search_id: Uuid,
    pub username: String,
    pub total_sites: usize,
    pub categories: Option<Vec<String>>,
    pub priority_sites: Option<Vec<String>>,
    pub include_secondary_source: bool,
    pub extract_profile: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteChecking {
    pub site_name: String,
    pub category: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteResult {
    #[serde(flatten)]
    pub outcome: ProbeOutcome,
    /// Filled in by the draining task, never by producers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
}

impl SiteResult {
    pub fn status(&self) -> ProbeStatus {
        self.outcome.status
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SecondarySourceStarted {
    pub source: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecondarySourceResult {
    pub source: String,
    pub url: String,
    pub domain: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchCompleted {
    pub search_id: Uuid,
    pub username: String,
    pub total_checked: usize,
    pub total_found: usize,
    pub total_not_found: usize,
    pub total_errors: usize,
    pub search_time_seconds: f64,
    /// `found / checked` in percent.
    pub success_rate: f64,
}
