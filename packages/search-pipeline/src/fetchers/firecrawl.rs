//! Firecrawl page scraper.
//!
//! Renders JavaScript and returns markdown, which makes it the better choice
//! for social platforms and storefronts. Requires the `firecrawl` feature.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{FetchError, FetchResult};
use crate::fetchers::{status_error, transport_error};
use crate::security::ProviderCredentials;
use crate::types::content::RawContent;

const FIRECRAWL_API_URL: &str = "https://api.firecrawl.dev/v1";

#[derive(Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: [&'a str; 1],
    #[serde(rename = "onlyMainContent")]
    only_main_content: bool,
}

#[derive(Deserialize)]
struct ScrapeResponse {
    success: bool,
    data: Option<ScrapeData>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ScrapeData {
    markdown: Option<String>,
    metadata: Option<PageMetadata>,
}

#[derive(Deserialize)]
struct PageMetadata {
    title: Option<String>,
    #[serde(rename = "statusCode")]
    status_code: Option<u16>,
}

/// Scraper backed by the Firecrawl API.
pub struct FirecrawlScraper {
    client: Client,
    credentials: ProviderCredentials,
}

impl FirecrawlScraper {
    pub fn new(credentials: ProviderCredentials) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| FetchError::Http(Box::new(e)))?;

        Ok(Self {
            client,
            credentials,
        })
    }

    /// Create from the `FIRECRAWL_API_KEY` environment variable.
    pub fn from_env() -> FetchResult<Self> {
        let credentials = ProviderCredentials::from_env("FIRECRAWL_API_KEY").ok_or_else(|| {
            FetchError::Http("FIRECRAWL_API_KEY environment variable not set".into())
        })?;
        Self::new(credentials)
    }

    /// Scrape a single URL as markdown.
    pub async fn scrape(&self, url: &str) -> FetchResult<RawContent> {
        let request = ScrapeRequest {
            url,
            formats: ["markdown"],
            only_main_content: true,
        };

        let endpoint = format!("{}/scrape", self.credentials.base_url_or(FIRECRAWL_API_URL));
        let response = self
            .client
            .post(&endpoint)
            .header("Authorization", self.credentials.bearer())
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        if !response.status().is_success() {
            return Err(status_error(url, response.status()));
        }

        let body: ScrapeResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Http(Box::new(e)))?;

        if !body.success {
            let reason = body.error.unwrap_or_else(|| "scrape failed".to_string());
            return Err(FetchError::unreachable(url, reason));
        }

        let data = body.data.ok_or_else(|| FetchError::EmptyContent {
            url: url.to_string(),
        })?;
        let metadata = data.metadata;

        // Firecrawl reports the target's status separately from its own.
        if let Some(status) = metadata.as_ref().and_then(|m| m.status_code) {
            if let Ok(code) = reqwest::StatusCode::from_u16(status) {
                if !code.is_success() {
                    return Err(status_error(url, code));
                }
            }
        }

        let markdown = data
            .markdown
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| FetchError::EmptyContent {
                url: url.to_string(),
            })?;

        debug!(url = %url, chars = markdown.len(), "Firecrawl scrape complete");

        let mut content = RawContent::scrape(url, markdown);
        if let Some(title) = metadata.and_then(|m| m.title) {
            content = content.with_title(title);
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Requires a real Firecrawl API key
    #[tokio::test]
    #[ignore]
    async fn test_firecrawl_scrape() {
        let scraper = FirecrawlScraper::from_env().unwrap();
        let page = scraper.scrape("https://example.com").await.unwrap();
        assert!(page.has_content());
    }
}
