//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit and integration tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AppError;
use crate::models::SiteDescriptor;
use crate::traits::{
    CatalogSource, HttpResponse, ProfileExtractor, SearchHit, SecondarySource, Transport,
};

/// Descriptor with a 200 + `"profile"` presence signature and no miss signature.
pub fn make_site(name: &str, category: &str, template: &str) -> SiteDescriptor {
    SiteDescriptor {
        name: name.to_string(),
        category: category.to_string(),
        url_template: template.to_string(),
        expected_status: 200,
        expected_pattern: "profile".to_string(),
        miss_status: None,
        miss_pattern: None,
        extra_headers: BTreeMap::new(),
    }
}

// ---------------------------------------------------------------------------
// MockTransport
// ---------------------------------------------------------------------------

/// Scripted answer for one request.
#[derive(Debug, Clone)]
pub enum MockReply {
    Status(u16, String),
    /// Fails like a transport-level timeout.
    Timeout,
    NetworkError(String),
    /// Answers after sleeping for the given duration.
    Delayed(Duration, u16, String),
    /// Never answers.
    Hang,
    /// Panics inside the transport call.
    Panic,
}

impl MockReply {
    pub fn ok(status: u16, body: &str) -> Self {
        MockReply::Status(status, body.to_string())
    }
}

/// A request seen by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

/// Mock transport answering from per-URL reply queues.
///
/// Each call pops the front reply of its URL; the last reply repeats.
/// Unrouted URLs get the fallback (404 by default).
#[derive(Clone)]
pub struct MockTransport {
    routes: Arc<Mutex<HashMap<String, VecDeque<MockReply>>>>,
    fallback: MockReply,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            routes: Arc::new(Mutex::new(HashMap::new())),
            fallback: MockReply::ok(404, "not found"),
            requests: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn route(self, url: &str, reply: MockReply) -> Self {
        self.route_sequence(url, vec![reply])
    }

    /// Replies served in order; the last one repeats.
    pub fn route_sequence(self, url: &str, replies: Vec<MockReply>) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), replies.into());
        self
    }

    pub fn with_fallback(mut self, reply: MockReply) -> Self {
        self.fallback = reply;
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url == url)
            .count()
    }

    /// Highest number of requests that were in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, url: &str) -> MockReply {
        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(MockReply::Hang),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| self.fallback.clone()),
            None => self.fallback.clone(),
        }
    }
}

/// Decrements the in-flight counter when the request ends or is dropped.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Transport for MockTransport {
    async fn get(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<HttpResponse, AppError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            url: url.to_string(),
            headers: headers.clone(),
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(self.in_flight.clone());

        // Give other probes a chance to overlap with this one.
        tokio::task::yield_now().await;

        match self.next_reply(url) {
            MockReply::Status(status, body) => Ok(HttpResponse::new(status, body)),
            MockReply::Timeout => Err(AppError::Timeout(10)),
            MockReply::NetworkError(msg) => Err(AppError::NetworkError(msg)),
            MockReply::Delayed(delay, status, body) => {
                tokio::time::sleep(delay).await;
                Ok(HttpResponse::new(status, body))
            }
            MockReply::Hang => std::future::pending().await,
            MockReply::Panic => panic!("mock transport panic for {url}"),
        }
    }
}

// ---------------------------------------------------------------------------
// MockCatalogSource
// ---------------------------------------------------------------------------

/// Mock catalog source with a swappable site list and injectable failures.
#[derive(Clone)]
pub struct MockCatalogSource {
    sites: Arc<Mutex<Vec<SiteDescriptor>>>,
    /// Returned by the next fetch only.
    next_error: Arc<Mutex<Option<AppError>>>,
    /// Returned by every fetch while set.
    always_error: Arc<Mutex<Option<String>>>,
    fetches: Arc<AtomicUsize>,
}

impl MockCatalogSource {
    pub fn new(sites: Vec<SiteDescriptor>) -> Self {
        Self {
            sites: Arc::new(Mutex::new(sites)),
            next_error: Arc::new(Mutex::new(None)),
            always_error: Arc::new(Mutex::new(None)),
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Source whose every fetch fails with `error`'s message.
    pub fn failing(error: AppError) -> Self {
        let source = Self::new(Vec::new());
        *source.always_error.lock().unwrap() = Some(error.to_string());
        source
    }

    pub fn fail_next(&self, error: AppError) {
        *self.next_error.lock().unwrap() = Some(error);
    }

    pub fn set_sites(&self, sites: Vec<SiteDescriptor>) {
        *self.sites.lock().unwrap() = sites;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl CatalogSource for MockCatalogSource {
    async fn fetch(&self) -> Result<Vec<SiteDescriptor>, AppError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        // Lets concurrent first loads pile up on the cache.
        tokio::task::yield_now().await;

        if let Some(e) = self.next_error.lock().unwrap().take() {
            return Err(e);
        }
        if let Some(msg) = self.always_error.lock().unwrap().clone() {
            return Err(AppError::NetworkError(msg));
        }
        Ok(self.sites.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// MockSecondarySource
// ---------------------------------------------------------------------------

/// Mock secondary source returning canned hits or an error.
#[derive(Clone)]
pub struct MockSecondarySource {
    result: Arc<Mutex<Result<Vec<SearchHit>, String>>>,
    pub queries: Arc<Mutex<Vec<String>>>,
}

impl MockSecondarySource {
    pub fn with_hits(hits: Vec<(&str, &str)>) -> Self {
        let hits = hits
            .into_iter()
            .map(|(url, title)| SearchHit {
                url: url.to_string(),
                title: title.to_string(),
            })
            .collect();
        Self {
            result: Arc::new(Mutex::new(Ok(hits))),
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Arc::new(Mutex::new(Err(message.to_string()))),
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl SecondarySource for MockSecondarySource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, AppError> {
        self.queries.lock().unwrap().push(query.to_string());
        self.result
            .lock()
            .unwrap()
            .clone()
            .map_err(AppError::NetworkError)
    }
}

// ---------------------------------------------------------------------------
// MockProfileExtractor
// ---------------------------------------------------------------------------

/// Mock extractor returning a fixed map (or nothing).
#[derive(Clone)]
pub struct MockProfileExtractor {
    data: Option<serde_json::Map<String, serde_json::Value>>,
}

impl MockProfileExtractor {
    pub fn with_field(key: &str, value: &str) -> Self {
        let mut map = serde_json::Map::new();
        map.insert(key.to_string(), serde_json::Value::String(value.to_string()));
        Self { data: Some(map) }
    }

    pub fn empty() -> Self {
        Self { data: None }
    }
}

impl ProfileExtractor for MockProfileExtractor {
    fn extract(&self, _body: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
        self.data.clone()
    }
}
