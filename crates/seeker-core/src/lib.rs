pub mod catalog;
pub mod classify;
pub mod config;
pub mod error;
pub mod events;
pub mod gate;
pub mod models;
pub mod probe;
pub mod retry;
pub mod search;
pub mod secondary;
pub mod throttle;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use catalog::{CatalogSummary, SiteCatalog};
pub use config::SearchConfig;
pub use error::AppError;
pub use events::{EventKind, StreamEvent};
pub use models::{ProbeOutcome, ProbeStatus, SiteDescriptor};
pub use search::{SearchRequest, SearchService, SearchStream};
pub use traits::{CatalogSource, ProfileExtractor, SecondarySource, Transport};
