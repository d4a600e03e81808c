//! Process-wide site catalog with explicit refresh.
//!
//! The first [`SiteCatalog::load`] fetches from the [`CatalogSource`]; later
//! calls reuse the cached copy until [`SiteCatalog::refresh`] succeeds.
//! Concurrent first loads share one fetch.

use std::collections::BTreeMap;
use std::sync::Arc;

use moka::future::Cache;
use serde::Serialize;

use crate::error::AppError;
use crate::models::SiteDescriptor;
use crate::traits::CatalogSource;

/// Immutable, shareable list of descriptors.
pub type Sites = Arc<[Arc<SiteDescriptor>]>;

/// How many descriptors [`CatalogSummary::sample`] carries.
const SUMMARY_SAMPLE_SIZE: usize = 10;

#[derive(Clone)]
pub struct SiteCatalog<S: CatalogSource> {
    source: S,
    cache: Cache<(), Sites>,
}

impl<S: CatalogSource> SiteCatalog<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: Cache::builder().initial_capacity(1).build(),
        }
    }

    /// Return the cached catalog, fetching it on first use.
    pub async fn load(&self) -> Result<Sites, AppError> {
        let source = self.source.clone();
        self.cache
            .try_get_with((), async move { fetch_sites(&source).await })
            .await
            .map_err(|e| catalog_unavailable(&e))
    }

    /// Re-fetch the catalog. On failure the previous copy stays cached.
    pub async fn refresh(&self) -> Result<Sites, AppError> {
        match fetch_sites(&self.source).await {
            Ok(sites) => {
                self.cache.insert((), sites.clone()).await;
                Ok(sites)
            }
            Err(e) => {
                let kept = self.cache.get(&()).await.is_some();
                tracing::warn!(error = %e, kept_cached = kept, "Catalog refresh failed");
                Err(catalog_unavailable(&e))
            }
        }
    }

    /// Load, then apply [`filter_sites`].
    pub async fn filtered(
        &self,
        categories: Option<&[String]>,
        priority_names: Option<&[String]>,
    ) -> Result<Vec<Arc<SiteDescriptor>>, AppError> {
        let sites = self.load().await?;
        Ok(filter_sites(&sites, categories, priority_names))
    }

    pub async fn summary(&self) -> Result<CatalogSummary, AppError> {
        let sites = self.load().await?;
        Ok(CatalogSummary::from_sites(&sites))
    }
}

async fn fetch_sites<S: CatalogSource>(source: &S) -> Result<Sites, AppError> {
    let sites = source.fetch().await?;
    tracing::info!(sites = sites.len(), "Loaded site catalog");
    Ok(sites.into_iter().map(Arc::new).collect())
}

fn catalog_unavailable(error: &AppError) -> AppError {
    match error {
        AppError::CatalogUnavailable(msg) => AppError::CatalogUnavailable(msg.clone()),
        other => AppError::CatalogUnavailable(other.to_string()),
    }
}

/// Keep descriptors in the given categories, then move priority names first.
///
/// Empty filters are ignored. Catalog order is preserved inside both the
/// priority group and the remainder.
pub fn filter_sites(
    sites: &[Arc<SiteDescriptor>],
    categories: Option<&[String]>,
    priority_names: Option<&[String]>,
) -> Vec<Arc<SiteDescriptor>> {
    let categories = categories.filter(|c| !c.is_empty());
    let selected = sites
        .iter()
        .filter(|site| categories.is_none_or(|cats| cats.contains(&site.category)))
        .cloned();

    match priority_names.filter(|p| !p.is_empty()) {
        None => selected.collect(),
        Some(names) => {
            let (mut priority, regular): (Vec<_>, Vec<_>) =
                selected.partition(|site| names.contains(&site.name));
            priority.extend(regular);
            priority
        }
    }
}

/// Catalog overview for metadata endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogSummary {
    pub total_sites: usize,
    pub categories: BTreeMap<String, usize>,
    pub sample: Vec<SiteSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteSummary {
    pub name: String,
    pub category: String,
    pub url: String,
}

impl CatalogSummary {
    pub fn from_sites(sites: &[Arc<SiteDescriptor>]) -> Self {
        let mut categories = BTreeMap::new();
        for site in sites {
            *categories.entry(site.category.clone()).or_insert(0) += 1;
        }

        let sample = sites
            .iter()
            .take(SUMMARY_SAMPLE_SIZE)
            .map(|site| SiteSummary {
                name: site.name.clone(),
                category: site.category.clone(),
                url: site.url_template.clone(),
            })
            .collect();

        Self {
            total_sites: sites.len(),
            categories,
            sample,
        }
    }
}
