pub mod catalog_source;
pub mod duckduckgo;
pub mod profile;
pub mod transport;

pub use catalog_source::{DEFAULT_CATALOG_URL, FileCatalogSource, HttpCatalogSource};
pub use duckduckgo::DuckDuckGoSource;
pub use profile::HtmlProfileExtractor;
pub use transport::ReqwestTransport;
