use futures::future::BoxFuture;

use seeker_core::catalog::CatalogSummary;
use seeker_core::error::AppError;
use seeker_core::traits::{CatalogSource, ProfileExtractor, SecondarySource, Transport};
use seeker_core::{SearchRequest, SearchService, SearchStream};

/// Object-safe view of a [`SearchService`], so handlers don't carry its
/// four type parameters.
pub trait UsernameSearch: Send + Sync {
    fn stream_search(&self, request: SearchRequest) -> BoxFuture<'_, Result<SearchStream, AppError>>;

    fn catalog_summary(&self) -> BoxFuture<'_, Result<CatalogSummary, AppError>>;
}

impl<C, T, P, S> UsernameSearch for SearchService<C, T, P, S>
where
    C: CatalogSource,
    T: Transport,
    P: ProfileExtractor,
    S: SecondarySource,
{
    fn stream_search(&self, request: SearchRequest) -> BoxFuture<'_, Result<SearchStream, AppError>> {
        Box::pin(SearchService::stream_search(self, request))
    }

    fn catalog_summary(&self) -> BoxFuture<'_, Result<CatalogSummary, AppError>> {
        Box::pin(self.catalog().summary())
    }
}

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    pub search: Box<dyn UsernameSearch>,
}

impl AppState {
    pub fn new(search: impl UsernameSearch + 'static) -> Self {
        Self {
            search: Box::new(search),
        }
    }
}
