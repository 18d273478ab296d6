//! Pipeline orchestrator.
//!
//! Sequences one request through the stages:
//!
//! ```text
//! prepare → classify → route → fetch → normalize → fallback ladder → response
//! ```
//!
//! Stage failures are recorded on the state and replaced by a safe default
//! (unknown intent, no content, no records). Only an exhausted fallback ladder
//! produces `success: false`. When the request deadline passes or the caller
//! cancels, remaining stages are skipped and the ladder runs on whatever
//! content was gathered.

use futures::future::join_all;
use std::collections::HashSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::cache::IntentCache;
use crate::error::Result;
use crate::extractor::StructuredExtractor;
use crate::fetchers::RetryingFetcher;
use crate::pipeline::{
    deadline::Deadline,
    fallback::FallbackLadder,
    intent,
    normalize::{finalize, CandidateBatch, Normalizer, Scorer, Strictness},
    policy::{prepare, search_query, site_query, PreparedRequest},
    router::{route, FetchPlan},
};
use crate::security::UrlGuard;
use crate::traits::{fetcher::SourceFetcher, model::LanguageModel};
use crate::types::{
    config::PipelineConfig,
    content::RawContent,
    intent::Classification,
    platform::domain_for_source,
    record::url_identity,
    request::{SearchRequest, SearchResponse},
    state::{FallbackTier, PipelineState, Stage},
};

/// Content gathered by one fetch branch.
#[derive(Debug, Default)]
struct BranchOutcome {
    items: Vec<RawContent>,
    errors: Vec<String>,
}

impl BranchOutcome {
    fn failed(error: impl ToString) -> Self {
        Self {
            items: Vec::new(),
            errors: vec![error.to_string()],
        }
    }

    fn record(self, state: &mut PipelineState, stage: Stage) {
        if !self.errors.is_empty() {
            state.record_error(stage, self.errors.join("; "));
        }
        state.append_content(self.items);
    }
}

/// The result-guarantee search pipeline.
///
/// # Example
///
/// ```rust,ignore
/// use search_pipeline::{Pipeline, PipelineConfig, SearchRequest};
///
/// let pipeline = Pipeline::new(model, fetcher, PipelineConfig::default())?;
/// let response = pipeline
///     .run(&SearchRequest::new("tech reviewers on YouTube").with_min_results(3))
///     .await;
/// assert!(response.records.len() >= 3);
/// ```
pub struct Pipeline<M, F> {
    extractor: StructuredExtractor<M>,
    fetcher: RetryingFetcher<F>,
    config: PipelineConfig,
    cache: Option<IntentCache>,
    guard: UrlGuard,
}

impl<M, F> std::fmt::Debug for Pipeline<M, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

impl<M: LanguageModel, F: SourceFetcher> Pipeline<M, F> {
    /// Build a pipeline. The fetcher is wrapped with the configured retry
    /// policy and per-call timeout.
    pub fn new(model: M, fetcher: F, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            extractor: StructuredExtractor::new(model).with_timeout(config.extractor_timeout),
            fetcher: RetryingFetcher::new(fetcher, config.retry, config.fetch_timeout),
            cache: IntentCache::new(config.intent_cache_capacity),
            guard: UrlGuard::new(),
            config,
        })
    }

    /// Replace the guard applied to query URLs and scrape targets.
    pub fn with_url_guard(mut self, guard: UrlGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Disable the intent cache.
    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn model(&self) -> &M {
        self.extractor.model()
    }

    pub fn fetcher(&self) -> &F {
        self.fetcher.inner()
    }

    pub fn cache(&self) -> Option<&IntentCache> {
        self.cache.as_ref()
    }

    /// Run one request to completion.
    pub async fn run(&self, request: &SearchRequest) -> SearchResponse {
        self.run_with_cancel(request, CancellationToken::new()).await
    }

    /// Run one request; cancelling `cancel` behaves like hitting the deadline.
    pub async fn run_with_cancel(
        &self,
        request: &SearchRequest,
        cancel: CancellationToken,
    ) -> SearchResponse {
        let prepared = match prepare(request) {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(error = %e, "Request rejected");
                return SearchResponse::rejected(e.to_string());
            }
        };

        let span = info_span!(
            "pipeline",
            request_id = %prepared.state.request_id,
            query = %prepared.state.query,
        );
        let deadline = Deadline::new(self.config.request_deadline, cancel);
        self.execute(prepared, deadline).instrument(span).await
    }

    async fn execute(&self, prepared: PreparedRequest, deadline: Deadline) -> SearchResponse {
        let PreparedRequest {
            mut state,
            caller_locale,
        } = prepared;
        let started = Instant::now();
        info!(
            min = state.hints.min_results_required,
            max = state.hints.max_results,
            sources = ?state.hints.target_sources,
            "Pipeline started"
        );

        self.classify_intent(&mut state, caller_locale, &deadline).await;

        let mut batch = CandidateBatch::default();
        if deadline.expired() {
            warn!(reason = deadline.reason(), "Skipping fetch and normalization");
        } else {
            let plan = route(&state, self.config.confidence_threshold, &self.guard);
            debug!(plan = plan.name(), intent = %state.intent, "Routed request");
            self.fetch(&mut state, plan, &deadline).await;

            if !state.raw_content().is_empty() && !deadline.expired() {
                batch = self.normalizer()
                    .extract_candidates(&state.query, state.raw_content(), &deadline)
                    .await;
                if !batch.errors.is_empty() {
                    state.record_error(Stage::Normalize, batch.errors.join("; "));
                }
            }
        }

        let scorer = Scorer::new(&state.query, &state.hints.target_sources, self.config.weights);
        let schema = &self.config.schema;
        let strict = finalize(
            &batch.candidates,
            schema,
            &scorer,
            Strictness::strict(self.config.relevance_floor),
        );
        debug!(candidates = batch.candidates.len(), records = strict.len(), "Normalized");

        let relaxed_floor = self.config.relaxed_relevance_floor;
        let outcome = FallbackLadder::new(&self.config).run(&mut state, strict, || {
            finalize(&batch.candidates, schema, &scorer, Strictness::relaxed(relaxed_floor))
        });

        let success = match outcome {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Fallback exhausted");
                state.record_error(Stage::Fallback, &e);
                false
            }
        };

        let summary = summarize(&state, success);
        info!(
            records = state.records().len(),
            tier = state.fallback_tier().as_u8(),
            success,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pipeline finished"
        );
        SearchResponse::from_state(&state, success, summary)
    }

    fn normalizer(&self) -> Normalizer<'_, M> {
        Normalizer::new(&self.extractor, &self.config.schema, self.config.chunk_char_budget)
    }

    async fn classify_intent(
        &self,
        state: &mut PipelineState,
        caller_locale: bool,
        deadline: &Deadline,
    ) {
        let cached = self.cache.as_ref().and_then(|cache| cache.get(&state.query));
        let classification = match cached {
            Some(classification) => {
                debug!(intent = %classification.intent, "Intent cache hit");
                classification
            }
            None => match deadline.run(intent::classify(&self.extractor, &state.query)).await {
                Some(Ok(classification)) => {
                    if let Some(cache) = &self.cache {
                        cache.insert(&state.query, classification.clone());
                    }
                    classification
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Intent classification failed, continuing as unknown");
                    state.record_error(Stage::Intent, &e);
                    Classification::unknown()
                }
                None => {
                    state.record_error(Stage::Intent, deadline.reason());
                    Classification::unknown()
                }
            },
        };
        state.apply_classification(&classification, caller_locale);
    }

    async fn fetch(&self, state: &mut PipelineState, plan: FetchPlan, deadline: &Deadline) {
        match plan {
            FetchPlan::SearchOnly => {
                let search = self.search(state, deadline).await;
                search.record(state, Stage::Search);
                self.follow_up(state, deadline).await;
            }
            FetchPlan::ScrapeOnly(urls) => {
                let scrape = self.scrape(&urls, deadline).await;
                scrape.record(state, Stage::Scrape);
            }
            FetchPlan::Both { sources } => {
                let view = &*state;
                let (search, scrape) = tokio::join!(
                    self.search(view, deadline),
                    self.discover(view, &sources, deadline),
                );
                // search results first, then scraped pages, regardless of completion order
                search.record(state, Stage::Search);
                scrape.record(state, Stage::Scrape);
            }
        }
        debug!(items = state.raw_content().len(), "Fetch complete");
    }

    async fn search(&self, state: &PipelineState, deadline: &Deadline) -> BranchOutcome {
        let query = search_query(state);
        match deadline
            .run(self.fetcher.fetch_by_search(&query, &state.hints.locale))
            .await
        {
            Some(Ok(items)) => {
                debug!(results = items.len(), "Search returned");
                BranchOutcome {
                    items,
                    errors: Vec::new(),
                }
            }
            Some(Err(e)) => {
                warn!(error = %e, "Search failed");
                BranchOutcome::failed(e)
            }
            None => BranchOutcome::failed(deadline.reason()),
        }
    }

    /// Fetch pages directly, keeping the order given.
    async fn scrape(&self, urls: &[String], deadline: &Deadline) -> BranchOutcome {
        let pages = join_all(
            urls.iter()
                .map(|url| deadline.run(self.fetcher.fetch_by_url(url))),
        )
        .await;

        let mut outcome = BranchOutcome::default();
        for (url, page) in urls.iter().zip(pages) {
            match page {
                Some(Ok(page)) => outcome.items.push(page),
                Some(Err(e)) => {
                    warn!(url = %url, error = %e, "Page fetch failed");
                    outcome.errors.push(e.to_string());
                }
                None => outcome.errors.push(format!("{url}: {}", deadline.reason())),
            }
        }
        outcome
    }

    /// Per-source discovery: a site-scoped search per source, then the top
    /// hits of each are scraped. A hit whose page cannot be fetched is kept as
    /// its search snippet.
    async fn discover(
        &self,
        state: &PipelineState,
        sources: &[String],
        deadline: &Deadline,
    ) -> BranchOutcome {
        let locale = state.hints.locale.as_str();
        let searches = join_all(sources.iter().filter_map(|s| domain_for_source(s)).map(|domain| {
            let query = site_query(state, &domain);
            async move { deadline.run(self.fetcher.fetch_by_search(&query, locale)).await }
        }))
        .await;

        let mut outcome = BranchOutcome::default();
        let mut seen = HashSet::new();
        let mut hits = Vec::new();
        for result in searches {
            match result {
                Some(Ok(found)) => hits.extend(
                    found
                        .into_iter()
                        .filter(|hit| !hit.url.is_empty() && self.guard.is_allowed(&hit.url))
                        .filter(|hit| seen.insert(url_identity(&hit.url)))
                        .take(self.config.scrape_per_source),
                ),
                Some(Err(e)) => outcome.errors.push(e.to_string()),
                None => outcome.errors.push(deadline.reason().to_string()),
            }
        }

        let pages = join_all(
            hits.iter()
                .map(|hit| deadline.run(self.fetcher.fetch_by_url(&hit.url))),
        )
        .await;

        for (hit, page) in hits.into_iter().zip(pages) {
            match page {
                Some(Ok(page)) => outcome.items.push(page),
                Some(Err(e)) => {
                    debug!(url = %hit.url, error = %e, "Scrape failed, keeping snippet");
                    outcome.errors.push(e.to_string());
                    outcome.items.push(hit);
                }
                None => {
                    outcome.errors.push(format!("{}: {}", hit.url, deadline.reason()));
                    outcome.items.push(hit);
                }
            }
        }
        outcome
    }

    /// After a plain search, scrape hits that landed on targeted platforms.
    async fn follow_up(&self, state: &mut PipelineState, deadline: &Deadline) {
        if deadline.expired() {
            return;
        }
        let FetchPlan::ScrapeOnly(urls) = route(state, self.config.confidence_threshold, &self.guard)
        else {
            return;
        };

        let limit = self.config.scrape_per_source * state.hints.target_sources.len().max(1);
        let urls: Vec<String> = urls.into_iter().take(limit).collect();
        debug!(pages = urls.len(), "Scraping search hits on target platforms");
        let scrape = self.scrape(&urls, deadline).await;
        scrape.record(state, Stage::Scrape);
    }
}

/// One-line description of the outcome.
fn summarize(state: &PipelineState, success: bool) -> String {
    let count = state.records().len();
    if !success {
        return format!(
            "Could not produce {} results for \"{}\" (found {count})",
            state.hints.min_results_required, state.query
        );
    }

    let base = format!("Found {count} results for \"{}\" ({})", state.query, state.intent);
    match state.fallback_tier() {
        FallbackTier::Full => base,
        FallbackTier::PartialInference => format!("{base}, including partial matches"),
        FallbackTier::Generated => {
            let suggested = state.records().iter().filter(|r| r.synthetic).count();
            format!("{base}, {suggested} suggested")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::testing::{MockFetchCall, MockFetcher, MockModel};
    use crate::types::intent::Intent;

    fn classification(intent: &str, confidence: f32) -> String {
        format!(
            r#"{{"records": [{{"intent": "{intent}", "confidence": {confidence}, "reasoning": null, "target_sources": null, "locale": null}}]}}"#
        )
    }

    fn config() -> PipelineConfig {
        PipelineConfig::default().with_intent_cache_capacity(0)
    }

    #[tokio::test]
    async fn test_both_plan_keeps_snippet_when_scrape_fails() {
        let hit = RawContent::search("https://www.youtube.com/@mkbhd", "MKBHD tech reviews")
            .with_title("MKBHD");
        let model = MockModel::new().with_response("intent", classification("influencer_search", 0.9));
        let fetcher = MockFetcher::new()
            .with_search_results(
                "tech reviewers on youtube site:youtube.com",
                vec![hit.clone()],
            )
            .with_url_errors(
                "https://www.youtube.com/@mkbhd",
                vec![FetchError::EmptyContent {
                    url: "https://www.youtube.com/@mkbhd".into(),
                }],
            );

        let pipeline = Pipeline::new(model, fetcher, config()).unwrap();
        let mut state = PipelineState::new("tech reviewers on youtube", Default::default()).unwrap();
        state.intent = Intent::InfluencerSearch;
        let deadline = Deadline::new(std::time::Duration::from_secs(5), CancellationToken::new());

        let outcome = pipeline.discover(&state, &["youtube".to_string()], &deadline).await;
        assert_eq!(outcome.items, vec![hit]);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_follow_up_scrapes_target_platform_hits() {
        let fetcher = MockFetcher::new()
            .with_default_search(vec![
                RawContent::search("https://www.tiktok.com/@chef", "cooking creator"),
                RawContent::search("https://blog.example.com/chefs", "list of chefs"),
            ])
            .with_page("https://www.tiktok.com/@chef", "full profile");
        // low confidence keeps the plan on plain search
        let model = MockModel::new().with_response("intent", classification("influencer_search", 0.2));

        let pipeline = Pipeline::new(model, fetcher, config()).unwrap();
        let response = pipeline
            .run(&SearchRequest::new("cooking creators on tiktok").with_min_results(0))
            .await;

        assert!(response.success);
        let calls = pipeline.fetcher().calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[1],
            MockFetchCall::Url {
                url: "https://www.tiktok.com/@chef".into()
            }
        );
    }

    #[tokio::test]
    async fn test_rejected_request_makes_no_calls() {
        let pipeline = Pipeline::new(MockModel::new(), MockFetcher::new(), config()).unwrap();
        let response = pipeline.run(&SearchRequest::new("   ")).await;

        assert!(!response.success);
        assert!(response.errors.contains_key("request"));
        assert!(pipeline.model().calls().is_empty());
        assert!(pipeline.fetcher().calls().is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = PipelineConfig::default().with_relevance_floors(0.3, 0.0);
        assert!(Pipeline::new(MockModel::new(), MockFetcher::new(), config).is_err());
    }

    #[test]
    fn test_summary_mentions_suggestions() {
        let mut state = PipelineState::new("tech", Default::default()).unwrap();
        state.replace_records(vec![
            crate::types::record::CanonicalRecord::new("web", "https://a.com").synthetic(),
        ]);
        state.advance_tier(FallbackTier::Generated);
        assert_eq!(summarize(&state, true), "Found 1 results for \"tech\" (unknown), 1 suggested");
    }
}
