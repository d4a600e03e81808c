use std::collections::BTreeMap;
use std::future::Future;

use crate::error::AppError;
use crate::models::SiteDescriptor;

/// Raw HTTP answer handed back by a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Issues probe GET requests.
///
/// Implementations follow redirects, pick a browser user agent and apply
/// the descriptor-supplied headers on top of their defaults. Timeouts map to
/// [`AppError::Timeout`], connection failures to [`AppError::NetworkError`].
pub trait Transport: Send + Sync + Clone + 'static {
    fn get(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> impl Future<Output = Result<HttpResponse, AppError>> + Send;
}

/// Supplies the raw site catalog.
pub trait CatalogSource: Send + Sync + Clone + 'static {
    fn fetch(&self) -> impl Future<Output = Result<Vec<SiteDescriptor>, AppError>> + Send;
}

/// A link discovered by a secondary full-text search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
}

/// Auxiliary full-text search run next to the site probes.
pub trait SecondarySource: Send + Sync + Clone + 'static {
    /// Short identifier used in events and logs (e.g. `"duckduckgo"`).
    fn name(&self) -> &str;

    fn search(&self, query: &str) -> impl Future<Output = Result<Vec<SearchHit>, AppError>> + Send;
}

/// Best-effort structured data extraction from a profile page.
pub trait ProfileExtractor: Send + Sync + Clone + 'static {
    /// Returns `None` when nothing useful could be extracted.
    fn extract(&self, body: &str) -> Option<serde_json::Map<String, serde_json::Value>>;
}

/// A no-op SecondarySource for deployments without web search.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSecondarySource;

impl SecondarySource for NoSecondarySource {
    fn name(&self) -> &str {
        "none"
    }

    async fn search(&self, _query: &str) -> Result<Vec<SearchHit>, AppError> {
        Ok(vec![])
    }
}

/// A no-op ProfileExtractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProfileExtractor;

impl ProfileExtractor for NoProfileExtractor {
    fn extract(&self, _body: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
        None
    }
}
