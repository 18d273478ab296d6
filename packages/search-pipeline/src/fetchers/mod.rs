//! Source fetcher implementations and wrappers.
//!
//! # Available Fetchers
//!
//! - `WebFetcher` - Tavily search plus page scraping (HTTP or Firecrawl)
//! - `RetryingFetcher` - Backoff on `Blocked`, per-call timeout
//! - `RateLimitedFetcher` - Outbound request rate limiting
//!
//! # Example
//!
//! ```rust,ignore
//! use search_pipeline::fetchers::{FetcherExt, HttpScraper, TavilySearch, WebFetcher};
//!
//! let fetcher = WebFetcher::new(TavilySearch::from_env()?, HttpScraper::new()?)
//!     .with_retry(RetryPolicy::default(), Duration::from_secs(30))
//!     .rate_limited(nonzero!(5u32));
//! ```

mod http;
mod rate_limited;
mod retry;
mod tavily;
mod web;

#[cfg(feature = "firecrawl")]
mod firecrawl;

pub use http::{html_to_text, HttpScraper};
pub use rate_limited::RateLimitedFetcher;
pub use retry::RetryingFetcher;
pub use tavily::TavilySearch;
pub use web::{PageScraper, WebFetcher};

#[cfg(feature = "firecrawl")]
pub use firecrawl::FirecrawlScraper;

use std::num::NonZeroU32;
use std::time::Duration;

use crate::error::FetchError;
use crate::traits::fetcher::SourceFetcher;
use crate::types::config::RetryPolicy;

/// Map a non-success HTTP status to the fetch error taxonomy.
///
/// 403 and 429 mean the remote side is pushing back and are worth retrying
/// later; 5xx is treated as the source being unreachable.
pub(crate) fn status_error(target: &str, status: reqwest::StatusCode) -> FetchError {
    match status.as_u16() {
        403 | 429 => FetchError::Blocked {
            target: target.to_string(),
            status: status.as_u16(),
        },
        code if code >= 500 => FetchError::unreachable(target, format!("HTTP {code}")),
        code => FetchError::Http(format!("HTTP {code} from {target}").into()),
    }
}

/// Map a transport error. Timeouts and connection failures are `Unreachable`.
pub(crate) fn transport_error(target: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        FetchError::unreachable(target, err)
    } else {
        FetchError::Http(Box::new(err))
    }
}

/// Composition helpers for any [`SourceFetcher`].
pub trait FetcherExt: SourceFetcher + Sized {
    /// Retry `Blocked` with backoff and bound every call by `timeout`.
    fn with_retry(self, policy: RetryPolicy, timeout: Duration) -> RetryingFetcher<Self> {
        RetryingFetcher::new(self, policy, timeout)
    }

    /// Allow at most `per_second` outbound calls.
    fn rate_limited(self, per_second: NonZeroU32) -> RateLimitedFetcher<Self> {
        RateLimitedFetcher::new(self, per_second)
    }
}

impl<F: SourceFetcher + Sized> FetcherExt for F {}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_status_mapping() {
        assert!(status_error("u", StatusCode::TOO_MANY_REQUESTS).is_blocked());
        assert!(status_error("u", StatusCode::FORBIDDEN).is_blocked());
        assert!(matches!(
            status_error("u", StatusCode::BAD_GATEWAY),
            FetchError::Unreachable { .. }
        ));
        assert!(matches!(
            status_error("u", StatusCode::NOT_FOUND),
            FetchError::Http(_)
        ));
    }
}
