//! Retry wrapper: backoff on `Blocked`, hard timeout on every call.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{FetchError, FetchResult};
use crate::traits::fetcher::SourceFetcher;
use crate::types::config::RetryPolicy;
use crate::types::content::RawContent;

/// Wraps a fetcher with the pipeline's retry policy.
///
/// - `Blocked` is retried after `base_delay * 2^n` (1s then 2s by default),
///   at most `max_retries` times; the final `Blocked` is returned as is.
/// - A call exceeding `timeout` becomes `Unreachable` and is not retried.
/// - Every other error passes through untouched.
pub struct RetryingFetcher<F> {
    inner: F,
    policy: RetryPolicy,
    timeout: Duration,
}

impl<F: SourceFetcher> RetryingFetcher<F> {
    pub fn new(inner: F, policy: RetryPolicy, timeout: Duration) -> Self {
        Self {
            inner,
            policy,
            timeout,
        }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }

    async fn run<T, Fut>(&self, target: &str, mut call: impl FnMut() -> Fut) -> FetchResult<T>
    where
        Fut: Future<Output = FetchResult<T>>,
    {
        let mut retry = 0;
        loop {
            let result = match tokio::time::timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(FetchError::unreachable(
                        target,
                        format!("timed out after {:?}", self.timeout),
                    ))
                }
            };

            match result {
                Err(e) if e.is_blocked() && retry < self.policy.max_retries => {
                    let delay = self.policy.delay_for(retry);
                    warn!(source = %target, retry = retry + 1, delay_ms = delay.as_millis() as u64, "Blocked, backing off");
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => {
                    debug!(source = %target, error = %e, retries = retry, "Fetch failed");
                    return Err(e);
                }
                Ok(value) => return Ok(value),
            }
        }
    }
}

#[async_trait]
impl<F: SourceFetcher> SourceFetcher for RetryingFetcher<F> {
    async fn fetch_by_search(&self, query: &str, locale: &str) -> FetchResult<Vec<RawContent>> {
        self.run(query, || self.inner.fetch_by_search(query, locale))
            .await
    }

    async fn fetch_by_url(&self, url: &str) -> FetchResult<RawContent> {
        self.run(url, || self.inner.fetch_by_url(url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetchers::FetcherExt;
    use crate::testing::MockFetcher;
    use tokio::time::Instant;

    fn blocked(url: &str) -> FetchError {
        FetchError::Blocked {
            target: url.to_string(),
            status: 429,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_is_retried_with_backoff() {
        let url = "https://example.com/page";
        let fetcher = MockFetcher::new()
            .with_page(url, "hello")
            .with_url_errors(url, vec![blocked(url), blocked(url)])
            .with_retry(RetryPolicy::default(), Duration::from_secs(30));

        let start = Instant::now();
        let page = fetcher.fetch_by_url(url).await.unwrap();

        assert_eq!(page.text, "hello");
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert_eq!(fetcher.inner().url_calls(url), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_gives_up_after_max_retries() {
        let url = "https://example.com/page";
        let fetcher = MockFetcher::new()
            .with_url_errors(url, vec![blocked(url), blocked(url), blocked(url)])
            .with_retry(RetryPolicy::default(), Duration::from_secs(30));

        let err = fetcher.fetch_by_url(url).await.unwrap_err();
        assert!(err.is_blocked());
        assert_eq!(fetcher.inner().url_calls(url), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_content_is_not_retried() {
        let url = "https://example.com/empty";
        let fetcher = MockFetcher::new()
            .with_url_errors(url, vec![FetchError::EmptyContent { url: url.into() }])
            .with_retry(RetryPolicy::default(), Duration::from_secs(30));

        let err = fetcher.fetch_by_url(url).await.unwrap_err();
        assert!(matches!(err, FetchError::EmptyContent { .. }));
        assert_eq!(fetcher.inner().url_calls(url), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_unreachable() {
        let url = "https://slow.example.com";
        let fetcher = MockFetcher::new()
            .with_page(url, "eventually")
            .with_delay(Duration::from_secs(60))
            .with_retry(RetryPolicy::default(), Duration::from_secs(5));

        let err = fetcher.fetch_by_url(url).await.unwrap_err();
        assert!(matches!(err, FetchError::Unreachable { .. }));
        assert_eq!(fetcher.inner().url_calls(url), 1);
    }
}
