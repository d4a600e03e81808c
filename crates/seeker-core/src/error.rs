use thiserror::Error;

/// Application-wide error types for Seeker.
#[derive(Error, Debug)]
pub enum AppError {
    /// The site catalog could not be fetched and nothing is cached.
    #[error("Site catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Remote side asked us to slow down (HTTP 429 or equivalent).
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The caller asked for something unusable (e.g. a blank username).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) | AppError::RateLimitExceeded => true,
            AppError::HttpError(msg) => is_transient_message(msg),
            _ => false,
        }
    }
}

/// Markers of a transient failure in a probe error message.
const TRANSIENT_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "rate limit",
    "too many requests",
    "429",
    "connection reset",
    "connection refused",
    "connection closed",
    "connection aborted",
    "broken pipe",
    "temporarily unavailable",
    "service unavailable",
    "bad gateway",
    "gateway timeout",
];

/// Classify a free-form error message as transient (retry) or definite.
///
/// Probe outcomes only carry a message, so the retry policy relies on this
/// rather than on the error variant.
pub fn is_transient_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(AppError::NetworkError("reset".into()).is_retryable());
        assert!(AppError::Timeout(10).is_retryable());
        assert!(AppError::RateLimitExceeded.is_retryable());
        assert!(AppError::HttpError("Connection reset by peer".into()).is_retryable());
        assert!(!AppError::HttpError("HTTP 404".into()).is_retryable());
        assert!(!AppError::CatalogUnavailable("offline".into()).is_retryable());
        assert!(!AppError::ConfigError("bad".into()).is_retryable());
    }

    #[test]
    fn test_transient_messages() {
        assert!(is_transient_message("Timeout"));
        assert!(is_transient_message("Request timed out after 10 seconds"));
        assert!(is_transient_message("HTTP 429 Too Many Requests"));
        assert!(is_transient_message("Network error: Connection refused"));
        assert!(is_transient_message("503 Service Unavailable"));
        assert!(!is_transient_message("pattern mismatch"));
        assert!(!is_transient_message("invalid URL"));
    }
}
