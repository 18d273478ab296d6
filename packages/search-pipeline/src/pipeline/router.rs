//! Query router: picks the fetch strategy for a request.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::extractor::normalize_url;
use crate::security::UrlGuard;
use crate::types::{
    content::SEARCH_SOURCE,
    intent::Intent,
    platform::{domain_for_source, platform_for_host},
    record::url_identity,
    state::PipelineState,
};

static RE_URL_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:https?://\S+|www\.\S+|(?:[a-z0-9-]+\.)+[a-z]{2,}/\S*)$").unwrap()
});

/// Which fetch strategy to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPlan {
    /// One general search
    SearchOnly,

    /// Fetch these pages directly
    ScrapeOnly(Vec<String>),

    /// General search plus per-source discovery and scraping, concurrently
    Both { sources: Vec<String> },
}

impl FetchPlan {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SearchOnly => "search_only",
            Self::ScrapeOnly(_) => "scrape_only",
            Self::Both { .. } => "both",
        }
    }
}

/// Decide the plan. Pure and synchronous: uses only the classification
/// already on `state`, its hints, and content fetched so far.
///
/// 1. URLs named in the query are scraped directly.
/// 2. Search hits already on hand from a targeted platform are scraped directly.
/// 3. A confident discovery intent with scopeable target sources runs both branches.
/// 4. Everything else (unknown or low-confidence intent, no hints) searches.
pub fn route(state: &PipelineState, confidence_threshold: f32, guard: &UrlGuard) -> FetchPlan {
    let urls = explicit_urls(&state.query, guard);
    if !urls.is_empty() {
        return FetchPlan::ScrapeOnly(urls);
    }

    let pending = scrapeable_content_urls(state, guard);
    if !pending.is_empty() {
        return FetchPlan::ScrapeOnly(pending);
    }

    if state.intent == Intent::Unknown || state.intent_confidence < confidence_threshold {
        return FetchPlan::SearchOnly;
    }

    if state.intent.is_discovery() {
        let sources: Vec<String> = state
            .hints
            .target_sources
            .iter()
            .filter(|s| domain_for_source(s).is_some())
            .cloned()
            .collect();
        if !sources.is_empty() {
            return FetchPlan::Both { sources };
        }
    }

    FetchPlan::SearchOnly
}

/// Absolute URLs (or bare `host/path` references) in the query that pass the guard.
pub fn explicit_urls(query: &str, guard: &UrlGuard) -> Vec<String> {
    let mut seen = HashSet::new();
    query
        .split_whitespace()
        .filter(|token| !token.to_lowercase().starts_with("site:"))
        .map(|token| token.trim_matches(|c: char| matches!(c, '"' | '\'' | '(' | ')' | '<' | '>')))
        .map(|token| token.trim_end_matches(['.', ',', ';', ':', '!', '?']))
        .filter(|token| RE_URL_TOKEN.is_match(token))
        .filter_map(normalize_url)
        .filter(|url| guard.is_allowed(url))
        .filter(|url| seen.insert(url_identity(url)))
        .collect()
}

/// Search results whose host belongs to a targeted platform, when nothing has
/// been scraped yet.
fn scrapeable_content_urls(state: &PipelineState, guard: &UrlGuard) -> Vec<String> {
    let content = state.raw_content();
    if content.is_empty() || content.iter().any(|c| c.source_id != SEARCH_SOURCE) {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    content
        .iter()
        .filter(|c| {
            c.host()
                .and_then(|h| platform_for_host(&h))
                .is_some_and(|p| state.hints.target_sources.contains(p.name))
        })
        .map(|c| c.url.clone())
        .filter(|url| guard.is_allowed(url))
        .filter(|url| seen.insert(url_identity(url)))
        .collect()
}
