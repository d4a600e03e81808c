//! Catalog sources reading the WhatsMyName `wmn-data.json` document.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use seeker_core::error::AppError;
use seeker_core::models::{ACCOUNT_PLACEHOLDER, SiteDescriptor};
use seeker_core::traits::CatalogSource;

/// Upstream WhatsMyName catalog.
pub const DEFAULT_CATALOG_URL: &str =
    "https://raw.githubusercontent.com/WebBreacher/WhatsMyName/refs/heads/main/wmn-data.json";

const UNKNOWN_CATEGORY: &str = "unknown";

#[derive(Debug, Deserialize)]
struct WmnDocument {
    #[serde(default)]
    sites: Vec<WmnSite>,
}

/// One raw catalog record. Only the fields the prober needs are kept.
#[derive(Debug, Deserialize)]
struct WmnSite {
    name: Option<String>,
    uri_check: Option<String>,
    e_code: Option<u16>,
    #[serde(default)]
    e_string: String,
    m_code: Option<u16>,
    m_string: Option<String>,
    cat: Option<String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

impl WmnSite {
    fn into_descriptor(self) -> Option<SiteDescriptor> {
        let name = self.name.filter(|n| !n.trim().is_empty())?;
        let Some(url_template) = self
            .uri_check
            .filter(|uri| uri.contains(ACCOUNT_PLACEHOLDER))
        else {
            tracing::debug!(site = %name, "Skipping catalog entry without a probe URL");
            return None;
        };

        Some(SiteDescriptor {
            name,
            category: self
                .cat
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()),
            url_template,
            expected_status: self.e_code.unwrap_or(200),
            expected_pattern: self.e_string,
            miss_status: self.m_code,
            miss_pattern: self.m_string,
            extra_headers: self.headers,
        })
    }
}

/// Parse a WhatsMyName document into descriptors, dropping unusable entries.
pub fn parse_catalog(json: &str) -> Result<Vec<SiteDescriptor>, AppError> {
    let document: WmnDocument = serde_json::from_str(json)?;
    let total = document.sites.len();
    let sites: Vec<SiteDescriptor> = document
        .sites
        .into_iter()
        .filter_map(WmnSite::into_descriptor)
        .collect();

    if sites.len() < total {
        tracing::debug!(kept = sites.len(), total, "Dropped malformed catalog entries");
    }
    Ok(sites)
}

/// Fetches the catalog over HTTP.
#[derive(Clone)]
pub struct HttpCatalogSource {
    client: Client,
    url: String,
}

impl HttpCatalogSource {
    pub fn new(url: impl Into<String>) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl CatalogSource for HttpCatalogSource {
    async fn fetch(&self) -> Result<Vec<SiteDescriptor>, AppError> {
        tracing::info!(url = %self.url, "Fetching site catalog");
        let response = self.client.get(&self.url).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(30)
            } else {
                AppError::NetworkError(format!("Catalog fetch failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} for {}",
                status.as_u16(),
                self.url
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read catalog body: {e}")))?;
        parse_catalog(&body)
    }
}

/// Reads the catalog from a local file.
#[derive(Debug, Clone)]
pub struct FileCatalogSource {
    path: PathBuf,
}

impl FileCatalogSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CatalogSource for FileCatalogSource {
    async fn fetch(&self) -> Result<Vec<SiteDescriptor>, AppError> {
        let json = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            AppError::Generic(format!("Cannot read catalog {}: {e}", self.path.display()))
        })?;
        parse_catalog(&json)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SAMPLE: &str = r#"{
        "license": ["CC BY-SA 4.0"],
        "categories": ["coding", "social"],
        "sites": [
            {
                "name": "GitHub",
                "uri_check": "https://github.com/{account}",
                "e_code": 200,
                "e_string": "Repositories",
                "m_code": 404,
                "m_string": "Not Found",
                "cat": "coding"
            },
            {
                "name": "Example API",
                "uri_check": "https://api.example.com/users/{account}",
                "e_code": 200,
                "e_string": "\"id\":",
                "headers": {"Accept": "application/json"}
            },
            {
                "name": "Broken",
                "uri_check": "https://broken.example.com/",
                "e_code": 200,
                "e_string": "x"
            }
        ]
    }"#;

    #[test]
    fn parses_records_into_descriptors() {
        let sites = parse_catalog(SAMPLE).unwrap();
        assert_eq!(sites.len(), 2);

        let github = &sites[0];
        assert_eq!(github.name, "GitHub");
        assert_eq!(github.category, "coding");
        assert_eq!(github.expected_status, 200);
        assert_eq!(github.expected_pattern, "Repositories");
        assert_eq!(github.miss_status, Some(404));
        assert_eq!(github.miss_pattern.as_deref(), Some("Not Found"));
    }

    #[test]
    fn missing_category_defaults_to_unknown() {
        let sites = parse_catalog(SAMPLE).unwrap();
        let api = &sites[1];
        assert_eq!(api.category, "unknown");
        assert_eq!(api.miss_status, None);
        assert_eq!(api.extra_headers["Accept"], "application/json");
    }

    #[test]
    fn invalid_json_is_serialization_error() {
        let err = parse_catalog("{not json").unwrap_err();
        assert!(matches!(err, AppError::SerializationError(_)));
    }

    #[tokio::test]
    async fn file_source_reads_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let sites = FileCatalogSource::new(file.path()).fetch().await.unwrap();
        assert_eq!(sites.len(), 2);
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileCatalogSource::new(dir.path().join("absent.json"));

        let err = source.fetch().await.unwrap_err();
        assert!(err.to_string().contains("absent.json"));
    }
}
