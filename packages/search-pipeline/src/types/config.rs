//! Configuration types for the pipeline.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{PipelineError, Result};
use crate::types::schema::RecordSchema;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "SEARCH_PIPELINE_";

/// Weights of the relevance score components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Query/record term overlap
    pub lexical: f32,

    /// Record source matches a hinted target source
    pub source: f32,

    /// Fraction of required fields present
    pub completeness: f32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            lexical: 0.4,
            source: 0.3,
            completeness: 0.3,
        }
    }
}

/// Backoff policy for blocked (rate-limited / denied) fetches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Additional attempts after the first
    pub max_retries: u32,

    /// Delay before the first retry; doubles each time
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }

    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Configuration for one pipeline instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Classifier confidence below which routing prefers the cheaper plan.
    ///
    /// Default: 0.5.
    pub confidence_threshold: f32,

    /// Minimum relevance for a record at tier 0. Default: 0.3.
    pub relevance_floor: f32,

    /// Minimum relevance for a record at tier 1. Default: 0.1.
    pub relaxed_relevance_floor: f32,

    /// Relevance score weights.
    pub weights: ScoreWeights,

    /// Maximum characters of raw content per extractor call.
    ///
    /// Chunks split at item boundaries; an item larger than the budget
    /// travels alone. Default: 12,000.
    pub chunk_char_budget: usize,

    /// Timeout per structured-extractor round trip. Default: 20s.
    pub extractor_timeout: Duration,

    /// Timeout per source-fetcher call. Default: 30s.
    pub fetch_timeout: Duration,

    /// Overall deadline for classification, fetching and normalization.
    ///
    /// When it passes, in-flight work is dropped and the fallback ladder
    /// runs on whatever was produced. Default: 90s.
    pub request_deadline: Duration,

    /// Retry policy for blocked fetches.
    pub retry: RetryPolicy,

    /// Score of the first generated placeholder. Default: 0.3.
    pub synthetic_base_score: f32,

    /// Multiplier applied per placeholder rank. Default: 0.9.
    pub synthetic_rank_decay: f32,

    /// Most placeholders tier 2 will generate for one request. Default: 50.
    pub max_synthetic: usize,

    /// Entries in the intent cache (0 disables it). Default: 256.
    pub intent_cache_capacity: usize,

    /// Pages scraped per target source in the `Both` plan. Default: 2.
    pub scrape_per_source: usize,

    /// Target record schema.
    #[serde(default)]
    pub schema: RecordSchema,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            relevance_floor: 0.3,
            relaxed_relevance_floor: 0.1,
            weights: ScoreWeights::default(),
            chunk_char_budget: 12_000,
            extractor_timeout: Duration::from_secs(20),
            fetch_timeout: Duration::from_secs(30),
            request_deadline: Duration::from_secs(90),
            retry: RetryPolicy::default(),
            synthetic_base_score: 0.3,
            synthetic_rank_decay: 0.9,
            max_synthetic: 50,
            intent_cache_capacity: 256,
            scrape_per_source: 2,
            schema: RecordSchema::result_card(),
        }
    }
}

impl PipelineConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load defaults, then apply `SEARCH_PIPELINE_*` overrides from the
    /// environment (and `.env` when present).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        override_with(&get, "CONFIDENCE_THRESHOLD", &mut config.confidence_threshold)?;
        override_with(&get, "RELEVANCE_FLOOR", &mut config.relevance_floor)?;
        override_with(&get, "RELAXED_RELEVANCE_FLOOR", &mut config.relaxed_relevance_floor)?;
        override_with(&get, "CHUNK_CHAR_BUDGET", &mut config.chunk_char_budget)?;
        override_with(&get, "MAX_SYNTHETIC", &mut config.max_synthetic)?;
        override_with(&get, "INTENT_CACHE_CAPACITY", &mut config.intent_cache_capacity)?;
        override_with(&get, "SCRAPE_PER_SOURCE", &mut config.scrape_per_source)?;
        override_with(&get, "BLOCKED_RETRIES", &mut config.retry.max_retries)?;
        override_millis(&get, "BLOCKED_BASE_DELAY_MS", &mut config.retry.base_delay)?;
        override_millis(&get, "EXTRACTOR_TIMEOUT_MS", &mut config.extractor_timeout)?;
        override_millis(&get, "FETCH_TIMEOUT_MS", &mut config.fetch_timeout)?;
        override_millis(&get, "REQUEST_DEADLINE_MS", &mut config.request_deadline)?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would break ranking or fallback guarantees.
    pub fn validate(&self) -> Result<()> {
        let w = &self.weights;
        if w.lexical < 0.0 || w.source < 0.0 || w.completeness < 0.0 {
            return Err(PipelineError::Config("score weights must be non-negative".into()));
        }
        if (w.lexical + w.source + w.completeness - 1.0).abs() > 1e-3 {
            return Err(PipelineError::Config("score weights must sum to 1".into()));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(PipelineError::Config("confidence_threshold must be in [0, 1]".into()));
        }
        // Generated placeholders rank strictly below real records, which needs a positive floor.
        if !(self.relaxed_relevance_floor > 0.0
            && self.relaxed_relevance_floor <= self.relevance_floor
            && self.relevance_floor <= 1.0)
        {
            return Err(PipelineError::Config(
                "relevance floors must satisfy 0 < relaxed <= strict <= 1".into(),
            ));
        }
        if !(self.synthetic_base_score > 0.0 && self.synthetic_base_score <= 1.0) {
            return Err(PipelineError::Config("synthetic_base_score must be in (0, 1]".into()));
        }
        if !(self.synthetic_rank_decay > 0.0 && self.synthetic_rank_decay < 1.0) {
            return Err(PipelineError::Config("synthetic_rank_decay must be in (0, 1)".into()));
        }
        if self.chunk_char_budget == 0 {
            return Err(PipelineError::Config("chunk_char_budget must be > 0".into()));
        }
        if self.extractor_timeout.is_zero()
            || self.fetch_timeout.is_zero()
            || self.request_deadline.is_zero()
        {
            return Err(PipelineError::Config("timeouts must be > 0".into()));
        }
        Ok(())
    }

    pub fn with_schema(mut self, schema: RecordSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_relevance_floors(mut self, strict: f32, relaxed: f32) -> Self {
        self.relevance_floor = strict;
        self.relaxed_relevance_floor = relaxed;
        self
    }

    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_chunk_char_budget(mut self, budget: usize) -> Self {
        self.chunk_char_budget = budget;
        self
    }

    pub fn with_extractor_timeout(mut self, timeout: Duration) -> Self {
        self.extractor_timeout = timeout;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_request_deadline(mut self, deadline: Duration) -> Self {
        self.request_deadline = deadline;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_synthetic(mut self, max: usize) -> Self {
        self.max_synthetic = max;
        self
    }

    pub fn with_intent_cache_capacity(mut self, capacity: usize) -> Self {
        self.intent_cache_capacity = capacity;
        self
    }

    pub fn with_scrape_per_source(mut self, count: usize) -> Self {
        self.scrape_per_source = count;
        self
    }
}

fn override_with<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &str,
    target: &mut T,
) -> Result<()> {
    if let Some(raw) = get(name) {
        *target = raw
            .trim()
            .parse()
            .map_err(|_| PipelineError::Config(format!("{ENV_PREFIX}{name}: cannot parse {raw:?}")))?;
    }
    Ok(())
}

fn override_millis(
    get: &impl Fn(&str) -> Option<String>,
    name: &str,
    target: &mut Duration,
) -> Result<()> {
    let mut millis = target.as_millis() as u64;
    override_with(get, name, &mut millis)?;
    *target = Duration::from_millis(millis);
    Ok(())
}
