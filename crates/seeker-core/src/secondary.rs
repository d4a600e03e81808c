//! Secondary full-text search run alongside the site probes.

use std::collections::HashSet;

use tokio::sync::mpsc::UnboundedSender;
use url::Url;

use crate::events::{EventKind, SecondarySourceResult, SecondarySourceStarted, StreamEvent};
use crate::traits::{SearchHit, SecondarySource};

/// Query `source` for `query` and push its events into `events`.
///
/// Emits one `SecondarySourceStarted`, then one `SecondarySourceResult` per
/// unique host. A failing source is logged and yields no results.
/// Returns the number of result events emitted.
pub async fn run_secondary<S: SecondarySource>(
    source: &S,
    query: &str,
    events: &UnboundedSender<StreamEvent>,
) -> usize {
    let name = source.name().to_string();
    let _ = events.send(
        EventKind::SecondarySourceStarted(SecondarySourceStarted {
            source: name.clone(),
            message: format!("Starting {name} search"),
        })
        .into(),
    );

    let hits = match source.search(&format!("\"{query}\"")).await {
        Ok(hits) => hits,
        Err(e) => {
            tracing::warn!(source = %name, error = %e, "Secondary source search failed");
            return 0;
        }
    };

    let results = dedupe_by_host(&name, hits);
    let count = results.len();
    for result in results {
        if events.send(EventKind::SecondarySourceResult(result).into()).is_err() {
            break;
        }
    }
    tracing::debug!(source = %name, results = count, "Secondary source finished");
    count
}

/// Keep the first hit per host, in order. Hits without a parseable host are
/// dropped.
pub fn dedupe_by_host(source: &str, hits: Vec<SearchHit>) -> Vec<SecondarySourceResult> {
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter_map(|hit| {
            let domain = Url::parse(&hit.url).ok()?.host_str()?.to_ascii_lowercase();
            seen.insert(domain.clone()).then(|| SecondarySourceResult {
                source: source.to_string(),
                url: hit.url,
                domain,
                title: hit.title,
            })
        })
        .collect()
}
