use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use seeker_client::{
    DEFAULT_CATALOG_URL, DuckDuckGoSource, HtmlProfileExtractor, HttpCatalogSource,
    ReqwestTransport,
};
use seeker_core::{SearchConfig, SearchService, SiteCatalog};
use seeker_server::routes;
use seeker_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("seeker=info".parse()?))
        .with_target(false)
        .init();

    let config = SearchConfig::from_env().context("Invalid SEEKER_* configuration")?;
    let catalog_url =
        std::env::var("SEEKER_CATALOG_URL").unwrap_or_else(|_| DEFAULT_CATALOG_URL.to_string());
    let port = std::env::var("SEEKER_SERVER_PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");

    let catalog = SiteCatalog::new(HttpCatalogSource::new(catalog_url)?);
    // Warm the cache; a failure here is retried on the first request.
    if let Err(e) = catalog.load().await {
        tracing::warn!(error = %e, "Site catalog not loaded at startup");
    }

    let service = SearchService::new(
        catalog,
        ReqwestTransport::with_timeout(config.request_timeout)?,
        HtmlProfileExtractor,
        DuckDuckGoSource::new()?,
        config,
    );
    let state = Arc::new(AppState::new(service));

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
