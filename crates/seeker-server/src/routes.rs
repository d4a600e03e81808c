use std::convert::Infallible;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::header::{self, HeaderName};
use axum::response::IntoResponse;
use axum::response::sse::{Event, Sse};
use axum::routing::get;
use futures::StreamExt;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::dto::{HealthResponse, MetadataResponse, SearchQuery};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// Build the full router with all routes.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/v1/username/search/stream", get(search_stream))
        .route("/v1/username/metadata", get(metadata));

    let public = Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(api).with_state(state)
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Stream a username search as Server-Sent Events.
///
/// Each frame is `data: <event json>`. Closing the connection cancels the
/// run.
#[utoipa::path(
    get,
    path = "/v1/username/search/stream",
    params(SearchQuery),
    responses(
        (status = 200, description = "Event stream", content_type = "text/event-stream", body = String),
        (status = 400, description = "Blank username", body = crate::dto::ErrorResponse),
        (status = 503, description = "Site catalog unavailable", body = crate::dto::ErrorResponse),
    ),
    tag = "search"
)]
pub async fn search_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let request = query.into_request();
    let username = request.username.clone();
    let stream = state.search.stream_search(request).await?;
    tracing::info!(search_id = %stream.search_id(), username = %username, "Streaming search");

    let frames = stream
        .map(|event| Ok::<_, Infallible>(Event::default().data(event.to_json().to_string())));

    let headers = [
        (header::CACHE_CONTROL, "no-cache"),
        (X_ACCEL_BUFFERING, "no"),
    ];
    Ok((headers, Sse::new(frames)))
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/username/metadata",
    responses(
        (status = 200, description = "Catalog summary", body = MetadataResponse),
        (status = 503, description = "Site catalog unavailable", body = crate::dto::ErrorResponse),
    ),
    tag = "search"
)]
pub async fn metadata(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let summary = state.search.catalog_summary().await?;
    Ok(axum::Json(MetadataResponse::from(summary)))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health() -> impl IntoResponse {
    axum::Json(HealthResponse { status: "healthy" })
}
