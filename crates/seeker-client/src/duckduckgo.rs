use std::time::Duration;

use reqwest::Client;
use scraper::{Html, Selector};
use seeker_core::error::AppError;
use seeker_core::traits::{SearchHit, SecondarySource};
use url::Url;

use crate::transport::random_user_agent;

const SEARCH_ENDPOINT: &str = "https://duckduckgo.com/html/";

/// Full-text search through DuckDuckGo's HTML endpoint.
#[derive(Clone)]
pub struct DuckDuckGoSource {
    client: Client,
    endpoint: String,
}

impl DuckDuckGoSource {
    pub fn new() -> Result<Self, AppError> {
        Self::with_endpoint(SEARCH_ENDPOINT, Duration::from_secs(10))
    }

    /// Point the source at another endpoint serving the same markup.
    pub fn with_endpoint(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl SecondarySource for DuckDuckGoSource {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, AppError> {
        let url = Url::parse_with_params(&self.endpoint, &[("q", query)])
            .map_err(|e| AppError::HttpError(format!("Invalid search endpoint: {e}")))?;

        let response = self
            .client
            .get(url)
            .header("User-Agent", random_user_agent())
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .send()
            .await
            .map_err(|e| AppError::NetworkError(format!("Search request failed: {e}")))?;

        let status = response.status();
        if status.as_u16() != 200 {
            return Err(AppError::HttpError(format!(
                "HTTP {} from search endpoint",
                status.as_u16()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read search results: {e}")))?;
        Ok(parse_results(&html))
    }
}

/// Extract result links from a results page.
///
/// Redirect links carry the target in their `uddg` parameter; other links
/// back to duckduckgo.com are ads or navigation and are skipped.
pub fn parse_results(html: &str) -> Vec<SearchHit> {
    let Ok(selector) = Selector::parse("a.result__a[href]") else {
        return vec![];
    };
    let document = Html::parse_document(html);

    document
        .select(&selector)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?;
            let url = real_url(href)?;
            let title = anchor
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            Some(SearchHit { url, title })
        })
        .collect()
}

fn real_url(href: &str) -> Option<String> {
    // Result hrefs are often protocol-relative.
    let base = Url::parse(SEARCH_ENDPOINT).ok()?;
    let parsed = base.join(href).ok()?;
    let is_ddg = parsed
        .host_str()
        .is_some_and(|h| h == "duckduckgo.com" || h.ends_with(".duckduckgo.com"));

    if !is_ddg {
        return Some(parsed.to_string());
    }
    if parsed.path().starts_with("/l/") {
        return parsed
            .query_pairs()
            .find(|(key, _)| key == "uddg")
            .map(|(_, value)| value.into_owned())
            .filter(|target| Url::parse(target).is_ok());
    }
    None
}
