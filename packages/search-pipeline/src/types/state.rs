//! Per-request pipeline state.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::types::{
    content::RawContent,
    intent::{Classification, Intent},
    record::CanonicalRecord,
};

/// Pipeline stage names used as error keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Request,
    Intent,
    Search,
    Scrape,
    Normalize,
    Fallback,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Intent => "intent",
            Self::Search => "search",
            Self::Scrape => "scrape",
            Self::Normalize => "normalize",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Highest fallback tier reached. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum FallbackTier {
    /// Normal normalization satisfied the minimum
    #[default]
    Full = 0,

    /// Relaxed re-normalization of real content
    PartialInference = 1,

    /// Generated placeholders were added
    Generated = 2,
}

impl FallbackTier {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

/// Caller and classifier hints that steer routing and scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct Hints {
    /// Canonical target source names (platforms or domains)
    pub target_sources: BTreeSet<String>,

    pub locale: String,

    /// Upper bound on returned records (> 0)
    pub max_results: usize,

    /// Records the response must contain
    pub min_results_required: usize,

    /// Country/region preference for search
    pub geo: Option<String>,

    /// Prefer content from the last N days
    pub recency_days: Option<u32>,
}

impl Default for Hints {
    fn default() -> Self {
        Self {
            target_sources: BTreeSet::new(),
            locale: "en-US".to_string(),
            max_results: 10,
            min_results_required: 3,
            geo: None,
            recency_days: None,
        }
    }
}

/// State threaded through one orchestration.
///
/// Created per request and discarded once the response is emitted.
#[derive(Debug, Clone)]
pub struct PipelineState {
    /// Correlates log lines for one request
    pub request_id: Uuid,

    pub query: String,

    pub intent: Intent,

    pub intent_confidence: f32,

    pub hints: Hints,

    raw_content: Vec<RawContent>,

    records: Vec<CanonicalRecord>,

    errors: BTreeMap<Stage, String>,

    fallback_tier: FallbackTier,
}

impl PipelineState {
    /// Create state for a query. The query must not be blank.
    pub fn new(query: impl Into<String>, hints: Hints) -> Result<Self> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(PipelineError::InvalidRequest {
                reason: "query must not be empty".into(),
            });
        }
        if hints.max_results == 0 {
            return Err(PipelineError::InvalidRequest {
                reason: "maxResults must be greater than zero".into(),
            });
        }
        if hints.min_results_required > hints.max_results {
            return Err(PipelineError::InvalidRequest {
                reason: format!(
                    "minResultsRequired ({}) exceeds maxResults ({})",
                    hints.min_results_required, hints.max_results
                ),
            });
        }

        Ok(Self {
            request_id: Uuid::now_v7(),
            query,
            intent: Intent::Unknown,
            intent_confidence: 0.0,
            hints,
            raw_content: Vec::new(),
            records: Vec::new(),
            errors: BTreeMap::new(),
            fallback_tier: FallbackTier::Full,
        })
    }

    /// Integrate a classification result.
    ///
    /// Classifier-suggested sources are merged into the hints; the caller's
    /// locale wins over an inferred one.
    pub fn apply_classification(&mut self, classification: &Classification, caller_locale: bool) {
        self.intent = classification.intent;
        self.intent_confidence = classification.confidence.clamp(0.0, 1.0);
        self.hints.target_sources.extend(
            classification
                .target_sources
                .iter()
                .map(|s| crate::types::platform::canonical_source(s))
                .filter(|s| !s.is_empty()),
        );
        if !caller_locale {
            if let Some(locale) = &classification.locale {
                if !locale.trim().is_empty() {
                    self.hints.locale = locale.trim().to_string();
                }
            }
        }
    }

    /// Content fetched so far, in arrival order.
    pub fn raw_content(&self) -> &[RawContent] {
        &self.raw_content
    }

    /// Append fetched content. Existing items are never touched.
    pub fn append_content(&mut self, items: impl IntoIterator<Item = RawContent>) {
        self.raw_content.extend(items);
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    /// Replace the record set (ladder tiers replace, they never merge).
    pub fn replace_records(&mut self, records: Vec<CanonicalRecord>) {
        self.records = records;
    }

    /// Record the latest error for a stage.
    pub fn record_error(&mut self, stage: Stage, error: impl fmt::Display) {
        self.errors.insert(stage, error.to_string());
    }

    pub fn error(&self, stage: Stage) -> Option<&str> {
        self.errors.get(&stage).map(String::as_str)
    }

    pub fn errors(&self) -> &BTreeMap<Stage, String> {
        &self.errors
    }

    pub fn fallback_tier(&self) -> FallbackTier {
        self.fallback_tier
    }

    /// Move to `tier` if it is higher than the current one.
    pub fn advance_tier(&mut self, tier: FallbackTier) {
        self.fallback_tier = self.fallback_tier.max(tier);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> PipelineState {
        PipelineState::new("tech reviewers", Hints::default()).unwrap()
    }

    #[test]
    fn test_blank_query_is_rejected() {
        assert!(matches!(
            PipelineState::new("   ", Hints::default()),
            Err(PipelineError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_zero_max_results_is_rejected() {
        let hints = Hints {
            max_results: 0,
            ..Hints::default()
        };
        assert!(PipelineState::new("q", hints).is_err());
    }

    #[test]
    fn test_tier_never_moves_backward() {
        let mut state = state();
        state.advance_tier(FallbackTier::Generated);
        state.advance_tier(FallbackTier::PartialInference);
        assert_eq!(state.fallback_tier(), FallbackTier::Generated);
        assert_eq!(state.fallback_tier().as_u8(), 2);
    }

    #[test]
    fn test_errors_keep_latest_per_stage() {
        let mut state = state();
        state.record_error(Stage::Search, "first");
        state.record_error(Stage::Search, "second");
        assert_eq!(state.error(Stage::Search), Some("second"));
        assert_eq!(state.errors().len(), 1);
    }

    #[test]
    fn test_apply_classification_merges_sources() {
        let mut state = state();
        state.hints.target_sources.insert("youtube".into());

        let classification = Classification {
            intent: Intent::InfluencerSearch,
            confidence: 1.4,
            reasoning: String::new(),
            target_sources: vec!["YT".into(), "Instagram".into()],
            locale: Some("de-DE".into()),
        };
        state.apply_classification(&classification, true);

        assert_eq!(state.intent, Intent::InfluencerSearch);
        assert_eq!(state.intent_confidence, 1.0);
        assert_eq!(
            state.hints.target_sources.iter().collect::<Vec<_>>(),
            vec!["instagram", "youtube"]
        );
        assert_eq!(state.hints.locale, "en-US");

        state.apply_classification(&classification, false);
        assert_eq!(state.hints.locale, "de-DE");
    }
}
