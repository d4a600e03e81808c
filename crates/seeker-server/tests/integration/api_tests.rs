use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use seeker_core::error::AppError;
use seeker_core::testutil::{MockCatalogSource, MockTransport};

use crate::common::{alice_app, alice_sites, body_json, setup_test_app, sse_events};

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn unavailable_app() -> axum::Router {
    setup_test_app(
        MockCatalogSource::failing(AppError::NetworkError("connection refused".into())),
        MockTransport::new(),
    )
}

#[tokio::test]
async fn health_returns_200() {
    let response = alice_app().oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn search_stream_sets_sse_headers() {
    let response = alice_app()
        .oneshot(get("/v1/username/search/stream?username=alice123"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert!(
        headers["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );
    assert_eq!(headers["cache-control"], "no-cache");
    assert_eq!(headers["x-accel-buffering"], "no");
}

#[tokio::test]
async fn search_stream_delivers_full_run() {
    let response = alice_app()
        .oneshot(get("/v1/username/search/stream?username=alice123"))
        .await
        .unwrap();
    let events = sse_events(response).await;

    assert_eq!(events.first().unwrap()["type"], "search_started");
    assert_eq!(events[0]["data"]["total_sites"], 3);

    let results: Vec<_> = events
        .iter()
        .filter(|e| e["type"] == "site_result")
        .collect();
    assert_eq!(results.len(), 3);
    let github = results
        .iter()
        .find(|e| e["data"]["site_name"] == "GitHub")
        .unwrap();
    assert_eq!(github["data"]["status"], "found");
    assert_eq!(github["data"]["url"], "https://github.com/alice123");
    assert_eq!(github["data"]["status_code"], 200);

    let done = events.last().unwrap();
    assert_eq!(done["type"], "search_completed");
    assert_eq!(done["data"]["total_checked"], 3);
    assert_eq!(done["data"]["total_found"], 1);
    assert_eq!(done["data"]["total_not_found"], 1);
    assert_eq!(done["data"]["total_errors"], 1);
    assert_eq!(done["data"]["success_rate"], 33.33);
    assert!(events.iter().all(|e| e["timestamp"].is_string()));
}

#[tokio::test]
async fn search_stream_applies_query_filters() {
    let response = alice_app()
        .oneshot(get(
            "/v1/username/search/stream?username=alice123&categories=social&priority_sites=Reddit",
        ))
        .await
        .unwrap();
    let events = sse_events(response).await;

    let started = &events[0]["data"];
    assert_eq!(started["total_sites"], 2);
    assert_eq!(started["categories"], serde_json::json!(["social"]));
    assert_eq!(started["priority_sites"], serde_json::json!(["Reddit"]));
    assert_eq!(events.last().unwrap()["data"]["total_checked"], 2);
}

#[tokio::test]
async fn search_stream_includes_secondary_source_on_request() {
    let response = alice_app()
        .oneshot(get(
            "/v1/username/search/stream?username=alice123&include_secondary_source=true",
        ))
        .await
        .unwrap();
    let events = sse_events(response).await;

    assert!(events.iter().any(|e| e["type"] == "secondary_source_started"));
    let hit = events
        .iter()
        .find(|e| e["type"] == "secondary_source_result")
        .unwrap();
    assert_eq!(hit["data"]["url"], "https://keybase.io/alice123");
    assert_eq!(hit["data"]["domain"], "keybase.io");
}

#[tokio::test]
async fn blank_username_returns_400() {
    for uri in [
        "/v1/username/search/stream?username=%20%20",
        "/v1/username/search/stream",
    ] {
        let response = alice_app().oneshot(get(uri)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        let json = body_json(response).await;
        assert_eq!(json["error"], "invalid_request");
    }
}

#[tokio::test]
async fn unavailable_catalog_returns_503() {
    let response = unavailable_app()
        .oneshot(get("/v1/username/search/stream?username=alice123"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["error"], "catalog_unavailable");
    assert!(json["message"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn metadata_summarizes_catalog() {
    let response = alice_app()
        .oneshot(get("/v1/username/metadata"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["total_sites"], alice_sites().len());
    assert_eq!(json["categories"]["social"], 2);
    assert_eq!(json["categories"]["coding"], 1);
    assert_eq!(json["sample"][0]["name"], "GitHub");
    assert_eq!(json["sample"][0]["url"], "https://github.com/{account}");
}

#[tokio::test]
async fn metadata_with_unavailable_catalog_returns_503() {
    let response = unavailable_app()
        .oneshot(get("/v1/username/metadata"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let response = alice_app()
        .oneshot(get("/api-docs/openapi.json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["paths"]["/v1/username/search/stream"].is_object());
}
