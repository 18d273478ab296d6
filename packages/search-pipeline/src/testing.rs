//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the pipeline without
//! making real model or network calls.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::error::{ExtractionError, ExtractionResult, FetchError, FetchResult};
use crate::traits::{
    fetcher::SourceFetcher,
    model::{LanguageModel, StructuredRequest},
};
use crate::types::content::RawContent;

type Handler = Arc<dyn Fn(&StructuredRequest) -> ExtractionResult<String> + Send + Sync>;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

/// A mock language model for testing.
///
/// Responses are configured per schema name. For each call the mock uses, in
/// order: the next queued response, the fixed response, the handler, and
/// finally an empty `{"records": []}`.
#[derive(Default)]
pub struct MockModel {
    queued: RwLock<HashMap<String, VecDeque<ExtractionResult<String>>>>,
    fixed: RwLock<HashMap<String, String>>,
    handlers: RwLock<HashMap<String, Handler>>,
    failures: RwLock<HashMap<String, String>>,
    delay: Option<Duration>,
    calls: RwLock<Vec<StructuredRequest>>,
}

impl MockModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `schema` with `response`.
    pub fn with_response(self, schema: impl Into<String>, response: impl Into<String>) -> Self {
        write(&self.fixed).insert(schema.into(), response.into());
        self
    }

    /// Queue one-shot responses for `schema`, consumed in order.
    pub fn with_responses(
        self,
        schema: impl Into<String>,
        responses: impl IntoIterator<Item = ExtractionResult<String>>,
    ) -> Self {
        write(&self.queued)
            .entry(schema.into())
            .or_default()
            .extend(responses);
        self
    }

    /// Compute responses for `schema` from the request.
    pub fn with_handler(
        self,
        schema: impl Into<String>,
        handler: impl Fn(&StructuredRequest) -> ExtractionResult<String> + Send + Sync + 'static,
    ) -> Self {
        write(&self.handlers).insert(schema.into(), Arc::new(handler));
        self
    }

    /// Fail every call for `schema` with a provider error.
    pub fn with_failure(self, schema: impl Into<String>, message: impl Into<String>) -> Self {
        write(&self.failures).insert(schema.into(), message.into());
        self
    }

    /// Sleep before every response (use with paused tokio time).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// All requests received so far.
    pub fn calls(&self) -> Vec<StructuredRequest> {
        read(&self.calls).clone()
    }

    /// Number of calls for one schema.
    pub fn calls_for(&self, schema: &str) -> usize {
        read(&self.calls)
            .iter()
            .filter(|c| c.schema_name == schema)
            .count()
    }

    pub fn clear_calls(&self) {
        write(&self.calls).clear();
    }

    fn respond(&self, request: &StructuredRequest) -> ExtractionResult<String> {
        let schema = &request.schema_name;

        if let Some(message) = read(&self.failures).get(schema) {
            return Err(ExtractionError::Provider(message.clone().into()));
        }
        if let Some(next) = write(&self.queued).get_mut(schema).and_then(VecDeque::pop_front) {
            return next;
        }
        if let Some(fixed) = read(&self.fixed).get(schema) {
            return Ok(fixed.clone());
        }
        let handler = read(&self.handlers).get(schema).cloned();
        match handler {
            Some(handler) => handler(request),
            None => Ok(r#"{"records": []}"#.to_string()),
        }
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn generate_structured(&self, request: &StructuredRequest) -> ExtractionResult<String> {
        write(&self.calls).push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.respond(request)
    }
}

/// Record of a call made to the mock fetcher.
#[derive(Debug, Clone, PartialEq)]
pub enum MockFetchCall {
    Search { query: String, locale: String },
    Url { url: String },
}

/// A mock content source for testing.
///
/// Unknown searches return no results; unknown URLs are unreachable.
#[derive(Default)]
pub struct MockFetcher {
    searches: RwLock<HashMap<String, Vec<RawContent>>>,
    default_search: RwLock<Option<Vec<RawContent>>>,
    search_errors: RwLock<HashMap<String, VecDeque<FetchError>>>,
    pages: RwLock<HashMap<String, RawContent>>,
    url_errors: RwLock<HashMap<String, VecDeque<FetchError>>>,
    delay: Option<Duration>,
    calls: RwLock<Vec<MockFetchCall>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results for an exact search query.
    pub fn with_search_results(self, query: impl Into<String>, results: Vec<RawContent>) -> Self {
        write(&self.searches).insert(query.into(), results);
        self
    }

    /// Results for any search query without its own entry.
    pub fn with_default_search(self, results: Vec<RawContent>) -> Self {
        *write(&self.default_search) = Some(results);
        self
    }

    /// Errors returned by the next searches for `query`, before any results.
    pub fn with_search_errors(self, query: impl Into<String>, errors: Vec<FetchError>) -> Self {
        write(&self.search_errors)
            .entry(query.into())
            .or_default()
            .extend(errors);
        self
    }

    /// A page served by `fetch_by_url`.
    pub fn with_page(self, url: impl Into<String>, text: impl Into<String>) -> Self {
        let url = url.into();
        let page = RawContent::scrape(url.clone(), text);
        write(&self.pages).insert(url, page);
        self
    }

    /// Errors returned by the next fetches of `url`, before the page.
    pub fn with_url_errors(self, url: impl Into<String>, errors: Vec<FetchError>) -> Self {
        write(&self.url_errors)
            .entry(url.into())
            .or_default()
            .extend(errors);
        self
    }

    /// Sleep before every response (use with paused tokio time).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<MockFetchCall> {
        read(&self.calls).clone()
    }

    /// Queries passed to `fetch_by_search`, in call order.
    pub fn search_queries(&self) -> Vec<String> {
        read(&self.calls)
            .iter()
            .filter_map(|c| match c {
                MockFetchCall::Search { query, .. } => Some(query.clone()),
                MockFetchCall::Url { .. } => None,
            })
            .collect()
    }

    /// Number of `fetch_by_url` calls for one URL.
    pub fn url_calls(&self, url: &str) -> usize {
        read(&self.calls)
            .iter()
            .filter(|c| matches!(c, MockFetchCall::Url { url: u } if u == url))
            .count()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl SourceFetcher for MockFetcher {
    async fn fetch_by_search(&self, query: &str, locale: &str) -> FetchResult<Vec<RawContent>> {
        write(&self.calls).push(MockFetchCall::Search {
            query: query.to_string(),
            locale: locale.to_string(),
        });
        self.pause().await;

        if let Some(err) = write(&self.search_errors)
            .get_mut(query)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        if let Some(results) = read(&self.searches).get(query) {
            return Ok(results.clone());
        }
        Ok(read(&self.default_search).clone().unwrap_or_default())
    }

    async fn fetch_by_url(&self, url: &str) -> FetchResult<RawContent> {
        write(&self.calls).push(MockFetchCall::Url {
            url: url.to_string(),
        });
        self.pause().await;

        if let Some(err) = write(&self.url_errors)
            .get_mut(url)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        read(&self.pages)
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::unreachable(url, "no such page"))
    }
}
