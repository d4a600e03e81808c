use std::collections::BTreeMap;
use std::error::Error;
use std::io;
use std::time::Duration;

use reqwest::Client;
use reqwest::redirect::Policy;
use seeker_core::error::AppError;
use seeker_core::traits::{HttpResponse, Transport};

/// Browser user agents rotated across probe requests.
const BROWSER_USER_AGENTS: &[&str] = &[
    // Chrome on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    // Chrome on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    // Chrome on Linux
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    // Firefox on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
];

/// Headers sent with every probe before the site's own headers.
const DEFAULT_HEADERS: &[(&str, &str)] = &[
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    ),
    ("Accept-Language", "en-US,en;q=0.5"),
    ("DNT", "1"),
    ("Upgrade-Insecure-Requests", "1"),
];

const MAX_REDIRECTS: usize = 10;

/// Probe transport backed by reqwest.
///
/// Follows redirects, relaxes TLS verification (many probed sites have
/// broken chains) and picks a random browser user agent per request.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    timeout_secs: u64,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(10))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs: timeout.as_secs(),
        })
    }
}

impl Transport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<HttpResponse, AppError> {
        let mut request = self.client.get(url);
        for (name, value) in request_headers(headers) {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read response body: {e}")))?;

        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

impl ReqwestTransport {
    fn map_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            return AppError::Timeout(self.timeout_secs);
        }

        let detail = error_chain(&e);
        if e.is_connect() {
            AppError::NetworkError(format!("Connection failed: {detail}"))
        } else if dropped_connection(&e) {
            AppError::NetworkError(detail)
        } else {
            AppError::HttpError(detail)
        }
    }
}

/// The error followed by each distinct cause. reqwest's own message stops
/// at "error sending request", leaving out the io reason underneath.
fn error_chain(e: &(dyn Error + 'static)) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Peer reset or closed the connection mid-exchange.
fn dropped_connection(e: &(dyn Error + 'static)) -> bool {
    let mut source = e.source();
    while let Some(cause) = source {
        if let Some(err) = cause.downcast_ref::<io::Error>() {
            if matches!(
                err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

/// Default browser headers, a random user agent, then the site's headers
/// (which win on conflict).
fn request_headers(extra: &BTreeMap<String, String>) -> Vec<(String, String)> {
    let mut merged: BTreeMap<String, (String, String)> = BTreeMap::new();
    let mut put = |name: &str, value: &str| {
        merged.insert(
            name.to_ascii_lowercase(),
            (name.to_string(), value.to_string()),
        );
    };

    put("User-Agent", random_user_agent());
    for (name, value) in DEFAULT_HEADERS {
        put(name, value);
    }
    for (name, value) in extra {
        put(name, value);
    }
    merged.into_values().collect()
}

pub(crate) fn random_user_agent() -> &'static str {
    BROWSER_USER_AGENTS[rand_index(BROWSER_USER_AGENTS.len())]
}

fn rand_index(len: usize) -> usize {
    // Seed from high-resolution clock: fine for UA rotation, not crypto.
    let mut x = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    // xorshift64
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    (x % len as u64) as usize
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    use seeker_core::error::is_transient_message;
    use seeker_core::gate::ConcurrencyGate;
    use seeker_core::models::{ProbeStatus, SiteDescriptor};
    use seeker_core::probe::SiteProber;
    use seeker_core::retry::RetryPolicy;
    use seeker_core::throttle::{RateLimiter, ThrottleConfig};
    use seeker_core::traits::NoProfileExtractor;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    fn local_site(base: &str) -> SiteDescriptor {
        SiteDescriptor {
            name: "Local".into(),
            category: "test".into(),
            url_template: format!("{base}/{{account}}"),
            expected_status: 200,
            expected_pattern: "profile".into(),
            miss_status: Some(404),
            miss_pattern: Some("no such user".into()),
            extra_headers: BTreeMap::new(),
        }
    }

    fn prober() -> SiteProber<ReqwestTransport, NoProfileExtractor> {
        SiteProber::new(
            ReqwestTransport::with_timeout(Duration::from_secs(5)).unwrap(),
            NoProfileExtractor,
            ConcurrencyGate::new(4),
            RateLimiter::new(ThrottleConfig::default()),
            Duration::from_secs(5),
        )
    }

    /// Accept connections, read the request, then reset the socket.
    async fn resetting_server() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = vec![0u8; 8192];
                let _ = socket.read(&mut buf).await;
                let _ = socket.set_linger(Some(Duration::ZERO));
                drop(socket);
            }
        });
        (format!("http://{addr}"), accepted)
    }

    /// Serve one canned HTTP response and hand back the raw request.
    async fn one_shot_server(response: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn site_headers_override_defaults() {
        let mut extra = BTreeMap::new();
        extra.insert("accept".to_string(), "application/json".to_string());
        extra.insert("X-Requested-With".to_string(), "XMLHttpRequest".to_string());

        let headers = request_headers(&extra);
        let accept: Vec<_> = headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("accept"))
            .collect();
        assert_eq!(accept.len(), 1);
        assert_eq!(accept[0].1, "application/json");
        assert!(headers.iter().any(|(k, _)| k == "X-Requested-With"));
        assert!(headers.iter().any(|(k, _)| k == "User-Agent"));
    }

    #[test]
    fn user_agent_comes_from_browser_list() {
        for _ in 0..20 {
            assert!(BROWSER_USER_AGENTS.contains(&random_user_agent()));
        }
    }

    #[tokio::test]
    async fn returns_status_and_body_for_non_success() {
        let (base, server) =
            one_shot_server("HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\nConnection: close\r\n\r\nno user!!").await;
        let transport = ReqwestTransport::new().unwrap();

        let mut extra = BTreeMap::new();
        extra.insert("X-Probe".to_string(), "1".to_string());
        let response = transport.get(&format!("{base}/alice"), &extra).await.unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(response.body, b"no user!!");

        let raw = server.await.unwrap().to_lowercase();
        assert!(raw.starts_with("get /alice"));
        assert!(raw.contains("x-probe: 1"));
        assert!(raw.contains("user-agent: mozilla/5.0"));
    }

    #[tokio::test]
    async fn refused_connection_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = ReqwestTransport::new().unwrap();
        let err = transport
            .get(&format!("http://{addr}/"), &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NetworkError(_)), "got {err:?}");
        assert!(err.to_string().to_lowercase().contains("refused"), "got {err}");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn refused_connection_is_retried_by_policy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let site = local_site(&format!("http://{addr}"));
        let prober = prober();
        let attempts = AtomicU32::new(0);
        let outcome = RetryPolicy::new(3, Duration::from_millis(1))
            .with_retry(|_| {
                attempts.fetch_add(1, Ordering::SeqCst);
                prober.probe(&site, "alice", false)
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.status, ProbeStatus::Error);
        let message = outcome.error_message.unwrap();
        assert!(is_transient_message(&message), "got {message}");
    }

    #[tokio::test]
    async fn reset_connection_is_retried_by_policy() {
        let (base, accepted) = resetting_server().await;
        let site = local_site(&base);
        let prober = prober();

        let outcome = RetryPolicy::new(3, Duration::from_millis(1))
            .with_retry(|_| prober.probe(&site, "alice", false))
            .await;

        assert_eq!(accepted.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.status, ProbeStatus::Error);
        let message = outcome.error_message.unwrap();
        assert!(is_transient_message(&message), "got {message}");
    }

    #[test]
    fn error_chain_appends_distinct_causes() {
        #[derive(Debug)]
        struct Wrapper(io::Error);
        impl std::fmt::Display for Wrapper {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("error sending request")
            }
        }
        impl Error for Wrapper {
            fn source(&self) -> Option<&(dyn Error + 'static)> {
                Some(&self.0)
            }
        }

        let wrapped = Wrapper(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "Connection reset by peer",
        ));
        assert_eq!(
            error_chain(&wrapped),
            "error sending request: Connection reset by peer"
        );
        assert!(dropped_connection(&wrapped));
    }
}
