//! Typed errors for the search pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling. Only [`PipelineError::FallbackExhausted`]
//! ever reaches a caller as a failed response; everything else is recovered at
//! the stage boundary and recorded.

use std::time::Duration;

use thiserror::Error;

/// Errors from a structured-extraction round trip.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Model output could not be coerced to the schema (after the repair attempt)
    #[error("schema validation failed: {reason}")]
    SchemaValidation { reason: String },

    /// Model call did not finish within the caller's timeout
    #[error("model call timed out after {after:?}")]
    Timeout { after: Duration },

    /// Language model provider failed
    #[error("model provider error: {0}")]
    Provider(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl ExtractionError {
    /// Build a schema validation error.
    pub fn schema(reason: impl Into<String>) -> Self {
        Self::SchemaValidation {
            reason: reason.into(),
        }
    }

    /// Whether a clarified re-prompt could plausibly fix this failure.
    pub fn is_repairable(&self) -> bool {
        matches!(self, Self::SchemaValidation { .. } | Self::JsonParse(_))
    }
}

/// Errors from the content source.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network failure or per-call timeout
    #[error("unreachable: {target}: {reason}")]
    Unreachable { target: String, reason: String },

    /// Remote source rate-limited or denied access (retryable)
    #[error("blocked by remote source: {target} (status {status})")]
    Blocked { target: String, status: u16 },

    /// Page body was empty after retrieval (not retried)
    #[error("empty content: {url}")]
    EmptyContent { url: String },

    /// Invalid URL format
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// URL rejected by the guard
    #[error("security error: {0}")]
    Security(#[from] SecurityError),

    /// Provider returned something we could not interpret
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl FetchError {
    /// Build an unreachable error from any displayable cause.
    pub fn unreachable(target: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unreachable {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the caller should retry with backoff.
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}

/// Security-related errors, primarily for SSRF protection.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// URL scheme not allowed (e.g., file://, ftp://)
    #[error("disallowed URL scheme: {0}")]
    DisallowedScheme(String),

    /// Host is blocked (e.g., localhost, metadata services)
    #[error("blocked host: {0}")]
    BlockedHost(String),

    /// IP in blocked CIDR range (e.g., 10.0.0.0/8)
    #[error("blocked IP range: {0}")]
    BlockedCidr(String),

    /// URL has no host
    #[error("URL has no host")]
    NoHost,

    /// Host name could not be resolved for the address check
    #[error("DNS resolution failed: {0}")]
    DnsResolution(String),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Errors surfaced by the pipeline itself.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Request failed validation before any stage ran
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Even generated placeholders could not reach the required count
    #[error("fallback exhausted: required {required} records, could produce {produced}")]
    FallbackExhausted { required: usize, produced: usize },

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

/// Result type alias for extraction operations.
pub type ExtractionResult<T> = std::result::Result<T, ExtractionError>;

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for security operations.
pub type SecurityResult<T> = std::result::Result<T, SecurityError>;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repairable_errors() {
        assert!(ExtractionError::schema("bad").is_repairable());
        assert!(!ExtractionError::Timeout {
            after: Duration::from_secs(1)
        }
        .is_repairable());
        assert!(!ExtractionError::Provider("down".into()).is_repairable());
    }

    #[test]
    fn test_blocked_is_retryable() {
        let blocked = FetchError::Blocked {
            target: "https://example.com".into(),
            status: 429,
        };
        assert!(blocked.is_blocked());
        assert!(!FetchError::EmptyContent {
            url: "https://example.com".into()
        }
        .is_blocked());
    }

    #[test]
    fn test_fallback_exhausted_message() {
        let err = PipelineError::FallbackExhausted {
            required: 500,
            produced: 50,
        };
        assert_eq!(
            err.to_string(),
            "fallback exhausted: required 500 records, could produce 50"
        );
    }
}
