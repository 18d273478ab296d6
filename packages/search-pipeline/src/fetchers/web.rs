//! Production fetcher: Tavily for search, a scraper for pages.

use async_trait::async_trait;
use tracing::warn;

use crate::error::FetchResult;
use crate::fetchers::{HttpScraper, TavilySearch};
use crate::security::UrlGuard;
use crate::traits::fetcher::SourceFetcher;
use crate::types::content::RawContent;

#[cfg(feature = "firecrawl")]
use crate::fetchers::FirecrawlScraper;

/// Backend used for `fetch_by_url`.
pub enum PageScraper {
    Http(HttpScraper),
    #[cfg(feature = "firecrawl")]
    Firecrawl(FirecrawlScraper),
}

impl PageScraper {
    async fn scrape(&self, url: &str) -> FetchResult<RawContent> {
        match self {
            Self::Http(scraper) => scraper.scrape(url).await,
            #[cfg(feature = "firecrawl")]
            Self::Firecrawl(scraper) => scraper.scrape(url).await,
        }
    }
}

impl From<HttpScraper> for PageScraper {
    fn from(scraper: HttpScraper) -> Self {
        Self::Http(scraper)
    }
}

#[cfg(feature = "firecrawl")]
impl From<FirecrawlScraper> for PageScraper {
    fn from(scraper: FirecrawlScraper) -> Self {
        Self::Firecrawl(scraper)
    }
}

/// [`SourceFetcher`] over real providers.
///
/// Every page URL passes the [`UrlGuard`] (including DNS resolution) before
/// it is fetched, and search hits pointing at internal hosts are dropped.
pub struct WebFetcher {
    search: TavilySearch,
    scraper: PageScraper,
    guard: UrlGuard,
}

impl WebFetcher {
    pub fn new(search: TavilySearch, scraper: impl Into<PageScraper>) -> Self {
        Self {
            search,
            scraper: scraper.into(),
            guard: UrlGuard::new(),
        }
    }

    pub fn with_guard(mut self, guard: UrlGuard) -> Self {
        self.guard = guard;
        self
    }
}

#[async_trait]
impl SourceFetcher for WebFetcher {
    async fn fetch_by_search(&self, query: &str, _locale: &str) -> FetchResult<Vec<RawContent>> {
        let results = self.search.search(query).await?;
        Ok(results
            .into_iter()
            .filter(|r| {
                let allowed = self.guard.is_allowed(&r.url);
                if !allowed {
                    warn!(url = %r.url, "Dropping search result with blocked URL");
                }
                allowed
            })
            .collect())
    }

    async fn fetch_by_url(&self, url: &str) -> FetchResult<RawContent> {
        self.guard.validate_with_dns(url).await?;
        self.scraper.scrape(url).await
    }
}
