//! Rate-limited fetcher wrapper.
//!
//! Wraps any SourceFetcher with rate limiting using the governor crate.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::error::FetchResult;
use crate::traits::fetcher::SourceFetcher;
use crate::types::content::RawContent;

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A fetcher wrapper that waits for a permit before every outbound call.
///
/// The limiter is shared across clones of the inner `Arc`, so one wrapper can
/// sit in front of both search and page fetches for a provider.
pub struct RateLimitedFetcher<F> {
    inner: F,
    limiter: Arc<DirectRateLimiter>,
}

impl<F: SourceFetcher> RateLimitedFetcher<F> {
    /// Allow `per_second` sustained calls.
    pub fn new(inner: F, per_second: NonZeroU32) -> Self {
        Self::with_quota(inner, Quota::per_second(per_second))
    }

    /// Sustained rate with a larger burst allowance.
    pub fn with_burst(inner: F, per_second: NonZeroU32, burst: NonZeroU32) -> Self {
        Self::with_quota(inner, Quota::per_second(per_second).allow_burst(burst))
    }

    pub fn with_quota(inner: F, quota: Quota) -> Self {
        Self {
            inner,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

#[async_trait]
impl<F: SourceFetcher> SourceFetcher for RateLimitedFetcher<F> {
    async fn fetch_by_search(&self, query: &str, locale: &str) -> FetchResult<Vec<RawContent>> {
        self.limiter.until_ready().await;
        self.inner.fetch_by_search(query, locale).await
    }

    async fn fetch_by_url(&self, url: &str) -> FetchResult<RawContent> {
        self.limiter.until_ready().await;
        self.inner.fetch_by_url(url).await
    }
}
