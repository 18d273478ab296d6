//! Inbound request and outbound response shapes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{record::CanonicalRecord, state::PipelineState};

fn default_max_results() -> usize {
    10
}

fn default_min_results() -> usize {
    3
}

/// A search request from the caller (e.g. an HTTP handler).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default = "default_min_results")]
    pub min_results_required: usize,

    #[serde(default)]
    pub target_sources: Vec<String>,

    /// Caller locale; when absent the classifier may infer one, else `en-US`
    #[serde(default)]
    pub locale: Option<String>,

    /// Extra free-text keywords appended to the query
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Country/region preference
    #[serde(default)]
    pub geo: Option<String>,

    /// Prefer content from the last N days
    #[serde(default)]
    pub recency_days: Option<u32>,
}

impl SearchRequest {
    /// Create a request with default limits.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_results: default_max_results(),
            min_results_required: default_min_results(),
            target_sources: Vec::new(),
            locale: None,
            keywords: Vec::new(),
            geo: None,
            recency_days: None,
        }
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    pub fn with_min_results(mut self, min: usize) -> Self {
        self.min_results_required = min;
        self
    }

    pub fn with_target_sources(
        mut self,
        sources: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.target_sources = sources.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_keywords(mut self, keywords: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_geo(mut self, geo: impl Into<String>) -> Self {
        self.geo = Some(geo.into());
        self
    }

    pub fn with_recency_days(mut self, days: u32) -> Self {
        self.recency_days = Some(days);
        self
    }
}

/// The response returned for every request, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    /// False only on terminal failure
    pub success: bool,

    pub records: Vec<CanonicalRecord>,

    /// One-line human-readable description
    pub summary: String,

    pub intent: String,

    /// 0 = full, 1 = partial inference, 2 = generated
    pub fallback_tier: u8,

    /// Stage name to last error message
    pub errors: BTreeMap<String, String>,
}

impl SearchResponse {
    /// Assemble a response from final pipeline state.
    pub fn from_state(state: &PipelineState, success: bool, summary: String) -> Self {
        Self {
            success,
            records: state.records().to_vec(),
            summary,
            intent: state.intent.as_str().to_string(),
            fallback_tier: state.fallback_tier().as_u8(),
            errors: state
                .errors()
                .iter()
                .map(|(stage, msg)| (stage.as_str().to_string(), msg.clone()))
                .collect(),
        }
    }

    /// Response for a request rejected before any stage ran.
    pub fn rejected(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            success: false,
            records: Vec::new(),
            summary: format!("Request rejected: {reason}"),
            intent: crate::types::intent::Intent::Unknown.as_str().to_string(),
            fallback_tier: 0,
            errors: BTreeMap::from([("request".to_string(), reason)]),
        }
    }
}
