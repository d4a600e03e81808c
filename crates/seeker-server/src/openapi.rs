use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Seeker API",
        version = "0.1.0",
        description = "Concurrent username presence search streamed over Server-Sent Events."
    ),
    paths(
        crate::routes::search_stream,
        crate::routes::metadata,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::MetadataResponse,
        crate::dto::SiteSummaryResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "search", description = "Username search and catalog metadata"),
        (name = "system", description = "Health and system status"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        assert!(paths.contains(&"/health"));
        assert!(paths.contains(&"/v1/username/search/stream"));
        assert!(paths.contains(&"/v1/username/metadata"));
    }
}
