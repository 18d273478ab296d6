//! Tavily-powered web search.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{FetchError, FetchResult};
use crate::fetchers::{status_error, transport_error};
use crate::security::ProviderCredentials;
use crate::types::content::RawContent;

const TAVILY_API_URL: &str = "https://api.tavily.com";

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    search_depth: &'a str,
    max_results: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    include_domains: Vec<String>,
}

/// Search client for the Tavily API.
///
/// Tavily has no locale parameter; geography travels in the query text.
pub struct TavilySearch {
    client: reqwest::Client,
    credentials: ProviderCredentials,
    search_depth: String,
    max_results: usize,
}

impl TavilySearch {
    pub fn new(credentials: ProviderCredentials) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FetchError::Http(Box::new(e)))?;

        Ok(Self {
            client,
            credentials,
            search_depth: "basic".to_string(),
            max_results: 10,
        })
    }

    /// Create from the `TAVILY_API_KEY` environment variable.
    pub fn from_env() -> FetchResult<Self> {
        let credentials = ProviderCredentials::from_env("TAVILY_API_KEY")
            .ok_or_else(|| FetchError::Http("TAVILY_API_KEY environment variable not set".into()))?;
        Self::new(credentials)
    }

    /// Set search depth ("basic" or "advanced").
    pub fn with_search_depth(mut self, depth: impl Into<String>) -> Self {
        self.search_depth = depth.into();
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Run one search. `site:` operators are lifted into `include_domains`.
    pub async fn search(&self, query: &str) -> FetchResult<Vec<RawContent>> {
        let (query, include_domains) = split_site_operators(query);
        let request = TavilyRequest {
            query: &query,
            search_depth: &self.search_depth,
            max_results: self.max_results,
            include_domains,
        };

        let url = format!("{}/search", self.credentials.base_url_or(TAVILY_API_URL));
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", self.credentials.bearer())
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error("tavily", e))?;

        if !response.status().is_success() {
            return Err(status_error("tavily", response.status()));
        }

        let body: TavilyResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Http(Box::new(e)))?;

        debug!(query = %query, results = body.results.len(), "Tavily search complete");

        Ok(body
            .results
            .into_iter()
            .filter(|r| !r.content.trim().is_empty())
            .map(|r| {
                let content = RawContent::search(r.url, r.content);
                if r.title.trim().is_empty() {
                    content
                } else {
                    content.with_title(r.title)
                }
            })
            .collect())
    }
}

/// Pull `site:domain` terms out of a query.
fn split_site_operators(query: &str) -> (String, Vec<String>) {
    let mut domains = Vec::new();
    let mut terms = Vec::new();
    for term in query.split_whitespace() {
        match term.strip_prefix("site:") {
            Some(domain) if !domain.is_empty() => domains.push(domain.to_lowercase()),
            _ => terms.push(term),
        }
    }
    (terms.join(" "), domains)
}
