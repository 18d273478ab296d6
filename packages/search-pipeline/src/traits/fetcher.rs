//! Source fetcher trait for retrieving raw web content.
//!
//! Abstracts over search providers (Tavily, SerpAPI, ...) and page retrieval
//! providers (Firecrawl, plain HTTP, ...). Both are opaque remote calls; the
//! pipeline only depends on the error taxonomy in [`FetchError`](crate::error::FetchError).

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::FetchResult;
use crate::types::content::RawContent;

/// Retrieves raw content by search or by URL.
///
/// # Implementations
///
/// - `WebFetcher` - Tavily search + Firecrawl scraping
/// - `RetryingFetcher` - Backoff on blocked responses, per-call timeout
/// - `RateLimitedFetcher` - Outbound request rate limiting
/// - `MockFetcher` - For testing
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Search for content relevant to the query.
    ///
    /// An empty vector is a valid result ("nothing found") and is distinct
    /// from an error (transport failure).
    async fn fetch_by_search(&self, query: &str, locale: &str) -> FetchResult<Vec<RawContent>>;

    /// Retrieve a single page.
    ///
    /// Fails with `Unreachable` on network errors or timeouts, `Blocked` when
    /// the remote side rate-limits or denies access, and `EmptyContent` when
    /// the body is empty.
    async fn fetch_by_url(&self, url: &str) -> FetchResult<RawContent>;
}

#[async_trait]
impl<F: SourceFetcher + ?Sized> SourceFetcher for Arc<F> {
    async fn fetch_by_search(&self, query: &str, locale: &str) -> FetchResult<Vec<RawContent>> {
        (**self).fetch_by_search(query, locale).await
    }

    async fn fetch_by_url(&self, url: &str) -> FetchResult<RawContent> {
        (**self).fetch_by_url(url).await
    }
}
