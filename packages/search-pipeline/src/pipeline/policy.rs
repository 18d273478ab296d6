//! Request policy: turns an inbound request into initial pipeline state and
//! builds the concrete search queries the fetch stage sends.

use chrono::{Duration as ChronoDuration, Utc};
use std::collections::BTreeSet;

use crate::error::{PipelineError, Result};
use crate::types::{
    platform::{canonical_source, detect_platforms},
    request::SearchRequest,
    state::{Hints, PipelineState},
};

/// Validated request, ready for the first stage.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub state: PipelineState,

    /// Whether the caller set a locale (an inferred one must not override it)
    pub caller_locale: bool,
}

/// Validate and normalize an inbound request.
///
/// Whitespace in the query is collapsed, keywords not already present are
/// appended, and platforms named in the query join the caller's target sources.
pub fn prepare(request: &SearchRequest) -> Result<PreparedRequest> {
    let mut query = collapse_whitespace(&request.query);
    if query.is_empty() {
        return Err(PipelineError::InvalidRequest {
            reason: "query must not be empty".into(),
        });
    }

    let lowered = query.to_lowercase();
    for keyword in &request.keywords {
        let keyword = collapse_whitespace(keyword);
        if !keyword.is_empty() && !lowered.contains(&keyword.to_lowercase()) {
            query.push(' ');
            query.push_str(&keyword);
        }
    }

    let mut target_sources: BTreeSet<String> = request
        .target_sources
        .iter()
        .map(|s| canonical_source(s))
        .filter(|s| !s.is_empty())
        .collect();
    target_sources.extend(detect_platforms(&query).into_iter().map(String::from));

    let caller_locale = request
        .locale
        .as_deref()
        .is_some_and(|l| !l.trim().is_empty());

    let mut hints = Hints {
        target_sources,
        max_results: request.max_results,
        min_results_required: request.min_results_required,
        geo: request
            .geo
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(String::from),
        recency_days: request.recency_days.filter(|d| *d > 0),
        ..Hints::default()
    };
    if let Some(locale) = request.locale.as_deref().filter(|_| caller_locale) {
        hints.locale = locale.trim().to_string();
    }

    Ok(PreparedRequest {
        state: PipelineState::new(query, hints)?,
        caller_locale,
    })
}

/// Query for the general search branch: the query plus geo and recency hints.
pub fn search_query(state: &PipelineState) -> String {
    let mut query = state.query.clone();
    if let Some(geo) = &state.hints.geo {
        if !query.to_lowercase().contains(&geo.to_lowercase()) {
            query.push_str(&format!(" in {geo}"));
        }
    }
    if let Some(days) = state.hints.recency_days {
        let since = Utc::now() - ChronoDuration::days(i64::from(days));
        query.push_str(&format!(" after:{}", since.format("%Y-%m-%d")));
    }
    query
}

/// Query scoped to one domain, used to discover pages worth scraping.
pub fn site_query(state: &PipelineState, domain: &str) -> String {
    format!("{} site:{}", search_query(state), domain)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
