use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

use seeker_client::{
    DEFAULT_CATALOG_URL, DuckDuckGoSource, FileCatalogSource, HtmlProfileExtractor,
    HttpCatalogSource, ReqwestTransport,
};
use seeker_core::events::{EventKind, StreamEvent};
use seeker_core::models::ProbeStatus;
use seeker_core::retry::RetryPolicy;
use seeker_core::{CatalogSource, SearchConfig, SearchRequest, SearchService, SiteCatalog};

#[derive(Parser)]
#[command(name = "seeker", version, about = "Concurrent username presence search")]
struct Cli {
    /// Site catalog URL (WhatsMyName format)
    #[arg(long, global = true, env = "SEEKER_CATALOG_URL", default_value = DEFAULT_CATALOG_URL)]
    catalog_url: String,

    /// Read the catalog from a local file instead of the URL
    #[arg(long, global = true, env = "SEEKER_CATALOG_FILE")]
    catalog_file: Option<PathBuf>,

    /// Maximum probe requests in flight
    #[arg(long, global = true, env = "SEEKER_MAX_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, env = "SEEKER_REQUEST_TIMEOUT_SECS")]
    timeout: Option<u64>,

    /// Attempts per site for transient failures
    #[arg(long, global = true, env = "SEEKER_MAX_ATTEMPTS")]
    attempts: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search every catalog site for a username
    Search {
        /// Username to look for
        username: String,

        /// Also run a DuckDuckGo full-text search
        #[arg(long, default_value_t = false)]
        secondary: bool,

        /// Extract public profile data from found pages
        #[arg(long, default_value_t = false)]
        extract_profile: bool,

        /// Only probe sites in this category (repeatable)
        #[arg(long = "category")]
        categories: Vec<String>,

        /// Probe this site first (repeatable)
        #[arg(long = "priority")]
        priority: Vec<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,

        /// Only print sites where the username was found
        #[arg(long, default_value_t = false)]
        found_only: bool,
    },

    /// Print a summary of the site catalog
    Sites,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// One JSON event per line
    Json,
    /// Human-readable lines
    Pretty,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout carries only results
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("seeker=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    match cli.catalog_file.clone() {
        Some(path) => run(cli, FileCatalogSource::new(path), config).await,
        None => {
            let source = HttpCatalogSource::new(&cli.catalog_url)
                .context("Failed to create catalog client")?;
            run(cli, source, config).await
        }
    }
}

/// Environment defaults, overridden by explicit flags.
fn build_config(cli: &Cli) -> Result<SearchConfig> {
    let mut config = SearchConfig::from_env().context("Invalid SEEKER_* configuration")?;
    if let Some(concurrency) = cli.concurrency {
        config = config.with_max_concurrency(concurrency);
    }
    if let Some(timeout) = cli.timeout {
        config = config.with_request_timeout(Duration::from_secs(timeout.max(1)));
    }
    if let Some(attempts) = cli.attempts {
        let base_delay = config.retry.base_delay;
        config = config.with_retry(RetryPolicy::new(attempts, base_delay));
    }
    Ok(config)
}

async fn run<C: CatalogSource>(cli: Cli, source: C, config: SearchConfig) -> Result<()> {
    let catalog = SiteCatalog::new(source);

    match cli.command {
        Commands::Sites => {
            let summary = catalog.summary().await.map_err(|e| anyhow::anyhow!(e))?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Search {
            username,
            secondary,
            extract_profile,
            categories,
            priority,
            format,
            found_only,
        } => {
            let transport = ReqwestTransport::with_timeout(config.request_timeout)
                .context("Failed to create HTTP client")?;
            let web_search = DuckDuckGoSource::new().context("Failed to create search client")?;
            let service = SearchService::new(
                catalog,
                transport,
                HtmlProfileExtractor,
                web_search,
                config,
            );

            let mut request = SearchRequest::new(username)
                .with_secondary_source(secondary)
                .with_profile_extraction(extract_profile);
            if !categories.is_empty() {
                request = request.with_categories(categories);
            }
            if !priority.is_empty() {
                request = request.with_priority_sites(priority);
            }

            cmd_search(&service, request, format, found_only).await?;
        }
    }

    Ok(())
}

async fn cmd_search<C, T, P, S>(
    service: &SearchService<C, T, P, S>,
    request: SearchRequest,
    format: OutputFormat,
    found_only: bool,
) -> Result<()>
where
    C: CatalogSource,
    T: seeker_core::Transport,
    P: seeker_core::ProfileExtractor,
    S: seeker_core::SecondarySource,
{
    let mut stream = service
        .stream_search(request)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    let mut interrupted = false;
    loop {
        let event = tokio::select! {
            event = stream.next() => event,
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                tracing::warn!("Interrupted, cancelling search");
                interrupted = true;
                stream.cancel();
                continue;
            }
        };
        let Some(event) = event else { break };

        if !should_print(&event, found_only) {
            continue;
        }
        match format {
            OutputFormat::Json => println!("{}", event.to_json()),
            OutputFormat::Pretty => {
                if let Some(line) = render_pretty(&event) {
                    println!("{line}");
                }
            }
        }
    }

    if interrupted {
        tracing::info!(search_id = %stream.search_id(), "Search cancelled");
    }
    Ok(())
}

/// `--found-only` hides progress noise and every non-found site result.
fn should_print(event: &StreamEvent, found_only: bool) -> bool {
    if !found_only {
        return true;
    }
    match &event.kind {
        EventKind::SiteChecking(_) => false,
        EventKind::SiteResult(result) => result.status() == ProbeStatus::Found,
        _ => true,
    }
}

fn render_pretty(event: &StreamEvent) -> Option<String> {
    let line = match &event.kind {
        EventKind::SearchStarted(s) => format!(
            "Searching {} sites for '{}' (search {})",
            s.total_sites, s.username, s.search_id
        ),
        EventKind::SiteChecking(_) => return None,
        EventKind::SiteResult(r) => {
            let o = &r.outcome;
            match o.status {
                ProbeStatus::Found => format!("[+] {} ({}): {}", o.site_name, o.category, o.resolved_url),
                ProbeStatus::NotFound => format!("[-] {} ({})", o.site_name, o.category),
                ProbeStatus::Error => format!(
                    "[!] {} ({}): {}",
                    o.site_name,
                    o.category,
                    o.error_message.as_deref().unwrap_or("error")
                ),
            }
        }
        EventKind::SecondarySourceStarted(s) => format!("[~] {}", s.message),
        EventKind::SecondarySourceResult(r) => format!("[web] {} {} ({})", r.domain, r.url, r.title),
        EventKind::SearchCompleted(c) => format!(
            "Done: {} checked, {} found, {} not found, {} errors in {:.2}s ({:.2}% found)",
            c.total_checked,
            c.total_found,
            c.total_not_found,
            c.total_errors,
            c.search_time_seconds,
            c.success_rate
        ),
    };
    Some(line)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use seeker_core::events::{SiteChecking, SiteResult};
    use seeker_core::models::{ProbeOutcome, SiteDescriptor};

    use super::*;

    fn site() -> SiteDescriptor {
        SiteDescriptor {
            name: "GitHub".into(),
            category: "coding".into(),
            url_template: "https://github.com/{account}".into(),
            expected_status: 200,
            expected_pattern: "alice".into(),
            miss_status: Some(404),
            miss_pattern: Some("Not Found".into()),
            extra_headers: Default::default(),
        }
    }

    fn result(outcome: ProbeOutcome) -> StreamEvent {
        EventKind::SiteResult(SiteResult {
            outcome,
            progress: None,
        })
        .into()
    }

    #[test]
    fn found_only_filters_misses_and_checking() {
        let s = site();
        let found = result(ProbeOutcome::found(&s, "https://github.com/alice", 200, Duration::ZERO));
        let missing = result(ProbeOutcome::not_found(&s, "https://github.com/bob", 404, Duration::ZERO));
        let checking: StreamEvent = EventKind::SiteChecking(SiteChecking {
            site_name: "GitHub".into(),
            category: "coding".into(),
            url: "https://github.com/alice".into(),
        })
        .into();

        assert!(should_print(&found, true));
        assert!(!should_print(&missing, true));
        assert!(!should_print(&checking, true));
        assert!(should_print(&missing, false));
    }

    #[test]
    fn pretty_lines() {
        let s = site();
        let found = result(ProbeOutcome::found(&s, "https://github.com/alice", 200, Duration::ZERO));
        assert_eq!(
            render_pretty(&found).unwrap(),
            "[+] GitHub (coding): https://github.com/alice"
        );

        let failed = result(ProbeOutcome::error(
            &s,
            "https://github.com/alice",
            None,
            "Request timed out after 10 seconds",
            Duration::ZERO,
        ));
        assert!(render_pretty(&failed).unwrap().starts_with("[!] GitHub"));
    }

    #[test]
    fn cli_parses_repeatable_filters() {
        let cli = Cli::try_parse_from([
            "seeker",
            "search",
            "alice",
            "--category",
            "social",
            "--category",
            "coding",
            "--priority",
            "GitHub",
            "--format",
            "json",
            "--concurrency",
            "5",
        ])
        .unwrap();

        assert_eq!(cli.concurrency, Some(5));
        match cli.command {
            Commands::Search {
                username,
                categories,
                priority,
                format,
                ..
            } => {
                assert_eq!(username, "alice");
                assert_eq!(categories, ["social", "coding"]);
                assert_eq!(priority, ["GitHub"]);
                assert_eq!(format, OutputFormat::Json);
            }
            Commands::Sites => panic!("expected search"),
        }
    }
}
