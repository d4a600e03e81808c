use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use seeker_core::SearchRequest;
use seeker_core::catalog::{CatalogSummary, SiteSummary};

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Username to look for
    #[serde(default)]
    pub username: String,
    /// Also run a full-text web search
    #[serde(default)]
    pub include_secondary_source: bool,
    /// Extract public profile data from found pages
    #[serde(default)]
    pub extract_profile: bool,
    /// Comma-separated category filter
    pub categories: Option<String>,
    /// Comma-separated site names probed first
    pub priority_sites: Option<String>,
}

impl SearchQuery {
    pub fn into_request(self) -> SearchRequest {
        let mut request = SearchRequest::new(self.username)
            .with_secondary_source(self.include_secondary_source)
            .with_profile_extraction(self.extract_profile);
        if let Some(categories) = split_list(self.categories.as_deref()) {
            request = request.with_categories(categories);
        }
        if let Some(sites) = split_list(self.priority_sites.as_deref()) {
            request = request.with_priority_sites(sites);
        }
        request
    }
}

/// `"a, b,,c"` -> `["a", "b", "c"]`; nothing left means no filter.
fn split_list(raw: Option<&str>) -> Option<Vec<String>> {
    let items: Vec<String> = raw?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    (!items.is_empty()).then_some(items)
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct MetadataResponse {
    pub total_sites: usize,
    /// Site count per category
    pub categories: BTreeMap<String, usize>,
    /// First catalog entries
    pub sample: Vec<SiteSummaryResponse>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SiteSummaryResponse {
    pub name: String,
    pub category: String,
    pub url: String,
}

impl From<SiteSummary> for SiteSummaryResponse {
    fn from(site: SiteSummary) -> Self {
        Self {
            name: site.name,
            category: site.category,
            url: site.url,
        }
    }
}

impl From<CatalogSummary> for MetadataResponse {
    fn from(summary: CatalogSummary) -> Self {
        Self {
            total_sites: summary.total_sites,
            categories: summary.categories,
            sample: summary.sample.into_iter().map(Into::into).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_lists_become_filters() {
        let query = SearchQuery {
            username: "alice".into(),
            categories: Some("social, coding,,".into()),
            priority_sites: Some(" ".into()),
            ..Default::default()
        };
        let request = query.into_request();

        assert_eq!(request.username, "alice");
        assert_eq!(
            request.categories,
            Some(vec!["social".to_string(), "coding".to_string()])
        );
        assert_eq!(request.priority_sites, None);
        assert!(!request.include_secondary_source);
    }
}
