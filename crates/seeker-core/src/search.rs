//! Search orchestration: fan probes out, fan events back in.
//!
//! A run moves through `Started → Running → Draining → Completed`:
//! the catalog is loaded and filtered before [`SearchService::stream_search`]
//! returns, a driver task then spawns one probe task per site (plus the
//! optional secondary search), forwards their events in receipt order while
//! keeping the [`RunAggregate`], and finishes with `SearchCompleted` once
//! every producer is done.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::{Id, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use uuid::Uuid;

use crate::catalog::SiteCatalog;
use crate::config::SearchConfig;
use crate::error::AppError;
use crate::events::{
    EventKind, SearchCompleted, SearchStarted, SiteChecking, SiteResult, StreamEvent,
};
use crate::gate::ConcurrencyGate;
use crate::models::{ProbeOutcome, RunAggregate, SiteDescriptor, round2};
use crate::probe::SiteProber;
use crate::retry::RetryPolicy;
use crate::secondary::run_secondary;
use crate::throttle::RateLimiter;
use crate::traits::{CatalogSource, ProfileExtractor, SecondarySource, Transport};

/// Message of the synthesized result for a probe task that panicked.
pub const PROBE_TASK_FAILED: &str = "probe task failed";

/// Parameters of one search run.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub username: String,
    pub include_secondary_source: bool,
    pub extract_profile: bool,
    /// Only probe sites in these categories. Empty or `None` means all.
    pub categories: Option<Vec<String>>,
    /// Site names probed first.
    pub priority_sites: Option<Vec<String>>,
}

impl SearchRequest {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    pub fn with_secondary_source(mut self, include: bool) -> Self {
        self.include_secondary_source = include;
        self
    }

    pub fn with_profile_extraction(mut self, extract: bool) -> Self {
        self.extract_profile = extract;
        self
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = Some(categories);
        self
    }

    pub fn with_priority_sites(mut self, sites: Vec<String>) -> Self {
        self.priority_sites = Some(sites);
        self
    }
}

/// Ordered event stream of one run.
///
/// Dropping the stream cancels the run: every probe task is aborted and
/// its gate permit released. Not restartable.
pub struct SearchStream {
    search_id: Uuid,
    events: mpsc::Receiver<StreamEvent>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl SearchStream {
    pub fn search_id(&self) -> Uuid {
        self.search_id
    }

    /// Stop the run. Events already queued are still delivered.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this run when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Stream for SearchStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<StreamEvent>> {
        self.events.poll_recv(cx)
    }
}

/// Runs username searches against a site catalog.
///
/// Generic over every external dependency via traits, so runs can be driven
/// entirely by in-memory mocks. Cheap to clone: clones share the catalog
/// cache, the concurrency gate and the rate limiter.
#[derive(Clone)]
pub struct SearchService<C, T, P, S>
where
    C: CatalogSource,
    T: Transport,
    P: ProfileExtractor,
    S: SecondarySource,
{
    catalog: SiteCatalog<C>,
    prober: SiteProber<T, P>,
    secondary: S,
    config: SearchConfig,
}

impl<C, T, P, S> SearchService<C, T, P, S>
where
    C: CatalogSource,
    T: Transport,
    P: ProfileExtractor,
    S: SecondarySource,
{
    pub fn new(
        catalog: SiteCatalog<C>,
        transport: T,
        extractor: P,
        secondary: S,
        config: SearchConfig,
    ) -> Self {
        let prober = SiteProber::new(
            transport,
            extractor,
            ConcurrencyGate::new(config.max_concurrency),
            RateLimiter::new(config.throttle.clone()),
            config.request_timeout,
        );
        Self {
            catalog,
            prober,
            secondary,
            config,
        }
    }

    pub fn catalog(&self) -> &SiteCatalog<C> {
        &self.catalog
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        self.prober.gate()
    }

    /// Start a run and return its event stream.
    ///
    /// Fails before any event exists if the username is blank or the catalog
    /// cannot be loaded.
    pub async fn stream_search(&self, request: SearchRequest) -> Result<SearchStream, AppError> {
        let username = request.username.trim().to_string();
        if username.is_empty() {
            return Err(AppError::InvalidRequest("username must not be empty".into()));
        }

        let sites = self
            .catalog
            .filtered(
                request.categories.as_deref(),
                request.priority_sites.as_deref(),
            )
            .await?;

        let search_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(self.config.event_buffer.max(1));

        let run = SearchRun {
            search_id,
            request: SearchRequest {
                username,
                ..request
            },
            sites,
            prober: self.prober.clone(),
            retry: self.config.retry.clone(),
            secondary: self.secondary.clone(),
            poll_interval: self.config.poll_interval,
            out: tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(run.drive());

        Ok(SearchStream {
            search_id,
            events: rx,
            cancel: cancel.clone(),
            _guard: cancel.drop_guard(),
        })
    }
}

/// Everything the driver task owns for one run.
struct SearchRun<T: Transport, P: ProfileExtractor, S: SecondarySource> {
    search_id: Uuid,
    request: SearchRequest,
    sites: Vec<Arc<SiteDescriptor>>,
    prober: SiteProber<T, P>,
    retry: RetryPolicy,
    secondary: S,
    poll_interval: Duration,
    out: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
}

impl<T: Transport, P: ProfileExtractor, S: SecondarySource> SearchRun<T, P, S> {
    async fn drive(self) {
        let started = Instant::now();
        let username: Arc<str> = Arc::from(self.request.username.as_str());
        let total = self.sites.len();

        tracing::info!(
            search_id = %self.search_id,
            username = %username,
            sites = total,
            secondary = self.request.include_secondary_source,
            "Search started"
        );

        let start_event = EventKind::SearchStarted(SearchStarted {
            search_id: self.search_id,
            username: username.to_string(),
            total_sites: total,
            categories: self.request.categories.clone(),
            priority_sites: self.request.priority_sites.clone(),
            include_secondary_source: self.request.include_secondary_source,
            extract_profile: self.request.extract_profile,
        });
        if !self.forward(start_event.into()).await {
            return;
        }

        // Running: one task per site, each holding a sender clone.
        let (tx, mut rx) = mpsc::unbounded_channel::<StreamEvent>();
        let mut tasks = JoinSet::new();
        let mut task_sites: HashMap<Id, Arc<SiteDescriptor>> = HashMap::with_capacity(total);

        for site in &self.sites {
            let handle = tasks.spawn(probe_task(
                self.prober.clone(),
                self.retry.clone(),
                site.clone(),
                username.clone(),
                self.request.extract_profile,
                tx.clone(),
            ));
            task_sites.insert(handle.id(), site.clone());
        }

        if self.request.include_secondary_source {
            let source = self.secondary.clone();
            let query = username.clone();
            let tx = tx.clone();
            tasks.spawn(async move {
                run_secondary(&source, &query, &tx).await;
            });
        }
        drop(tx);

        // Draining: forward until every sender is gone, reaping tasks as
        // they finish so panics still produce a result.
        let mut aggregate = RunAggregate::new(total);
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    tasks.abort_all();
                    tracing::info!(search_id = %self.search_id, checked = aggregate.checked, "Search cancelled");
                    return;
                }
                received = tokio::time::timeout(self.poll_interval, rx.recv()) => match received {
                    Ok(Some(event)) => {
                        if !self.forward(with_progress(event, &mut aggregate)).await {
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(_) => {
                        tracing::debug!(
                            search_id = %self.search_id,
                            pending = tasks.len(),
                            checked = aggregate.checked,
                            "Waiting for probes"
                        );
                    }
                },
                Some(joined) = tasks.join_next_with_id() => {
                    if let Some(event) = failed_task_result(joined, &task_sites, &username) {
                        if !self.forward(with_progress(event, &mut aggregate)).await {
                            return;
                        }
                    }
                }
            }
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            if let Some(event) = failed_task_result(joined, &task_sites, &username) {
                if !self.forward(with_progress(event, &mut aggregate)).await {
                    return;
                }
            }
        }

        let elapsed = started.elapsed();
        let completed = SearchCompleted {
            search_id: self.search_id,
            username: username.to_string(),
            total_checked: aggregate.checked,
            total_found: aggregate.found,
            total_not_found: aggregate.not_found,
            total_errors: aggregate.errored,
            search_time_seconds: round2(elapsed.as_secs_f64()),
            success_rate: aggregate.success_rate(),
        };
        tracing::info!(
            search_id = %self.search_id,
            checked = completed.total_checked,
            found = completed.total_found,
            errors = completed.total_errors,
            elapsed_ms = %elapsed.as_millis(),
            "Search completed"
        );
        self.forward(EventKind::SearchCompleted(completed).into()).await;
    }

    /// Push one event to the consumer. Returns `false` once the run should
    /// stop (consumer gone or cancelled).
    async fn forward(&self, event: StreamEvent) -> bool {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            sent = self.out.send(event) => {
                if sent.is_err() {
                    tracing::debug!(search_id = %self.search_id, "Consumer dropped the event stream");
                    self.cancel.cancel();
                }
                sent.is_ok()
            }
        }
    }
}

/// Probe one site with retries, reporting through `events`.
async fn probe_task<T: Transport, P: ProfileExtractor>(
    prober: SiteProber<T, P>,
    retry: RetryPolicy,
    site: Arc<SiteDescriptor>,
    username: Arc<str>,
    extract_profile: bool,
    events: mpsc::UnboundedSender<StreamEvent>,
) {
    let checking = EventKind::SiteChecking(SiteChecking {
        site_name: site.name.clone(),
        category: site.category.clone(),
        url: site.resolve_url(&username),
    });
    if events.send(checking.into()).is_err() {
        return;
    }

    let outcome = retry
        .with_retry(|_| prober.probe(&site, &username, extract_profile))
        .await;
    tracing::debug!(site = %site.name, status = %outcome.status, "Probe finished");

    let _ = events.send(
        EventKind::SiteResult(SiteResult {
            outcome,
            progress: None,
        })
        .into(),
    );
}

/// Turn a panicked probe task into its `Error` result. Normal completions
/// and the secondary task yield nothing.
fn failed_task_result(
    joined: Result<(Id, ()), tokio::task::JoinError>,
    task_sites: &HashMap<Id, Arc<SiteDescriptor>>,
    username: &str,
) -> Option<StreamEvent> {
    let err = joined.err()?;
    if err.is_cancelled() {
        return None;
    }
    let Some(site) = task_sites.get(&err.id()) else {
        tracing::error!(error = %err, "Secondary source task failed");
        return None;
    };

    tracing::error!(site = %site.name, error = %err, "Probe task panicked");
    let outcome = ProbeOutcome::error(
        site,
        site.resolve_url(username),
        None,
        PROBE_TASK_FAILED,
        Duration::ZERO,
    );
    Some(
        EventKind::SiteResult(SiteResult {
            outcome,
            progress: None,
        })
        .into(),
    )
}

/// Count site results and attach the progress snapshot.
fn with_progress(mut event: StreamEvent, aggregate: &mut RunAggregate) -> StreamEvent {
    if let EventKind::SiteResult(result) = &mut event.kind {
        aggregate.record(result.status());
        result.progress = Some(aggregate.progress());
    }
    event
}
