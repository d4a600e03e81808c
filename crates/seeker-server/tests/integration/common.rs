use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::Response;
use http_body_util::BodyExt;

use seeker_core::models::SiteDescriptor;
use seeker_core::retry::RetryPolicy;
use seeker_core::testutil::{
    MockCatalogSource, MockProfileExtractor, MockReply, MockSecondarySource, MockTransport,
    make_site,
};
use seeker_core::{SearchConfig, SearchService, SiteCatalog};
use seeker_server::routes;
use seeker_server::state::AppState;

/// GitHub has the account, Twitter does not, Reddit answers ambiguously.
pub fn alice_sites() -> Vec<SiteDescriptor> {
    let mut github = make_site("GitHub", "coding", "https://github.com/{account}");
    github.expected_pattern = "alice123".into();

    let mut twitter = make_site("Twitter", "social", "https://twitter.com/{account}");
    twitter.miss_status = Some(404);
    twitter.miss_pattern = Some("doesn't exist".into());

    let reddit = make_site("Reddit", "social", "https://www.reddit.com/user/{account}");

    vec![github, twitter, reddit]
}

pub fn alice_transport() -> MockTransport {
    MockTransport::new()
        .route(
            "https://github.com/alice123",
            MockReply::ok(200, "<title>alice123 (Alice)</title>"),
        )
        .route(
            "https://twitter.com/alice123",
            MockReply::ok(404, "This account doesn't exist"),
        )
        .route(
            "https://www.reddit.com/user/alice123",
            MockReply::ok(200, "<html>Log in to continue</html>"),
        )
}

pub fn setup_test_app(catalog: MockCatalogSource, transport: MockTransport) -> Router {
    let config = SearchConfig::default()
        .with_max_concurrency(4)
        .with_retry(RetryPolicy::new(1, Duration::ZERO));
    let service = SearchService::new(
        SiteCatalog::new(catalog),
        transport,
        MockProfileExtractor::empty(),
        MockSecondarySource::with_hits(vec![(
            "https://keybase.io/alice123",
            "alice123 on Keybase",
        )]),
        config,
    );
    routes::router(Arc::new(AppState::new(service)))
}

pub fn alice_app() -> Router {
    setup_test_app(MockCatalogSource::new(alice_sites()), alice_transport())
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

/// Read an SSE body to the end and decode every `data:` frame.
pub async fn sse_events(response: Response<Body>) -> Vec<serde_json::Value> {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();
    text.split("\n\n")
        .filter_map(|frame| {
            frame
                .lines()
                .find_map(|line| line.strip_prefix("data:"))
                .map(|data| serde_json::from_str(data.trim_start()).unwrap())
        })
        .collect()
}
