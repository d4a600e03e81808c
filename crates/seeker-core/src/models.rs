use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use url::Url;

/// Placeholder substituted with the query value in a site's URL template.
pub const ACCOUNT_PLACEHOLDER: &str = "{account}";

/// Catalog entry describing how to probe one site and read its answer.
///
/// Loaded once and shared behind an `Arc` by every concurrent probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteDescriptor {
    pub name: String,
    pub category: String,
    /// Probe URL containing [`ACCOUNT_PLACEHOLDER`].
    pub url_template: String,
    pub expected_status: u16,
    pub expected_pattern: String,
    #[serde(default)]
    pub miss_status: Option<u16>,
    #[serde(default)]
    pub miss_pattern: Option<String>,
    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,
}

impl SiteDescriptor {
    /// Substitute the (percent-encoded) query value into the URL template.
    pub fn resolve_url(&self, query: &str) -> String {
        self.url_template
            .replace(ACCOUNT_PLACEHOLDER, &urlencoding::encode(query))
    }
}

/// Extract the rate-limiter partition key (hostname) from a URL.
pub fn target_key(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    url.host_str().map(str::to_ascii_lowercase)
}

/// Classification of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Found,
    NotFound,
    Error,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Found => "found",
            ProbeStatus::NotFound => "not_found",
            ProbeStatus::Error => "error",
        }
    }

    /// Found and NotFound are final answers; Error may be retried.
    pub fn is_definitive(&self) -> bool {
        matches!(self, ProbeStatus::Found | ProbeStatus::NotFound)
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of one completed probe-attempt sequence against one site.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeOutcome {
    pub site_name: String,
    pub category: String,
    #[serde(rename = "url")]
    pub resolved_url: String,
    pub status: ProbeStatus,
    #[serde(rename = "status_code")]
    pub http_status: Option<u16>,
    pub profile_data: Option<serde_json::Map<String, serde_json::Value>>,
    pub error_message: Option<String>,
    /// Wall time of the final attempt, serialized in seconds.
    #[serde(serialize_with = "serialize_secs")]
    pub response_time: Duration,
    pub checked_at: DateTime<Utc>,
}

impl ProbeOutcome {
    fn new(
        site: &SiteDescriptor,
        resolved_url: impl Into<String>,
        status: ProbeStatus,
        response_time: Duration,
    ) -> Self {
        Self {
            site_name: site.name.clone(),
            category: site.category.clone(),
            resolved_url: resolved_url.into(),
            status,
            http_status: None,
            profile_data: None,
            error_message: None,
            response_time,
            checked_at: Utc::now(),
        }
    }

    pub fn found(
        site: &SiteDescriptor,
        url: impl Into<String>,
        http_status: u16,
        response_time: Duration,
    ) -> Self {
        let mut outcome = Self::new(site, url, ProbeStatus::Found, response_time);
        outcome.http_status = Some(http_status);
        outcome
    }

    pub fn not_found(
        site: &SiteDescriptor,
        url: impl Into<String>,
        http_status: u16,
        response_time: Duration,
    ) -> Self {
        let mut outcome = Self::new(site, url, ProbeStatus::NotFound, response_time);
        outcome.http_status = Some(http_status);
        outcome
    }

    pub fn error(
        site: &SiteDescriptor,
        url: impl Into<String>,
        http_status: Option<u16>,
        message: impl Into<String>,
        response_time: Duration,
    ) -> Self {
        let mut outcome = Self::new(site, url, ProbeStatus::Error, response_time);
        outcome.http_status = http_status;
        outcome.error_message = Some(message.into());
        outcome
    }

    pub fn with_profile(
        mut self,
        profile: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Self {
        self.profile_data = profile;
        self
    }
}

fn serialize_secs<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round2(value.as_secs_f64()))
}

/// Round to two decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Running counters for one search run.
///
/// Owned by the draining task only; producers never touch it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunAggregate {
    pub checked: usize,
    pub found: usize,
    pub not_found: usize,
    pub errored: usize,
    pub total: usize,
}

impl RunAggregate {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record(&mut self, status: ProbeStatus) {
        self.checked += 1;
        match status {
            ProbeStatus::Found => self.found += 1,
            ProbeStatus::NotFound => self.not_found += 1,
            ProbeStatus::Error => self.errored += 1,
        }
    }

    /// `found / checked` as a percentage, `0` when nothing was checked.
    pub fn success_rate(&self) -> f64 {
        if self.checked == 0 {
            return 0.0;
        }
        round2(self.found as f64 / self.checked as f64 * 100.0)
    }

    pub fn progress(&self) -> Progress {
        let percentage = if self.total == 0 {
            0.0
        } else {
            round2(self.checked as f64 / self.total as f64 * 100.0)
        };
        Progress {
            checked: self.checked,
            total: self.total,
            found: self.found,
            not_found: self.not_found,
            errors: self.errored,
            percentage,
        }
    }
}

/// Snapshot of the aggregate attached to each forwarded site result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub checked: usize,
    pub total: usize,
    pub found: usize,
    pub not_found: usize,
    pub errors: usize,
    pub percentage: f64,
}
