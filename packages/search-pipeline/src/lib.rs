//! Result-Guarantee Search Pipeline
//!
//! Turns a free-text query into a ranked list of structured records, and
//! always returns at least the number of records the caller asked for.
//!
//! # Design Philosophy
//!
//! **"Degrade, don't fail"**
//!
//! - Every stage failure is recorded and replaced by a safe default
//! - The model is a black box behind one schema-guided call
//! - Content sources are black boxes behind search and page retrieval
//! - A three-tier fallback ladder guarantees the minimum result count
//! - Callers see degraded quality through `fallbackTier` and `errors`, never
//!   through exceptions
//!
//! # Usage
//!
//! ```rust,ignore
//! use search_pipeline::{Pipeline, PipelineConfig, SearchRequest};
//! use search_pipeline::testing::{MockFetcher, MockModel};
//!
//! let pipeline = Pipeline::new(MockModel::new(), MockFetcher::new(), PipelineConfig::default())?;
//!
//! let response = pipeline
//!     .run(&SearchRequest::new("tech reviewers on YouTube").with_min_results(3))
//!     .await;
//!
//! assert!(response.success);
//! assert_eq!(response.records.len(), 3); // placeholders, since the mocks find nothing
//! ```
//!
//! # Modules
//!
//! - [`traits`] - External collaborators (LanguageModel, SourceFetcher)
//! - [`types`] - Requests, responses, records, state and configuration
//! - [`extractor`] - Schema-guided extraction with one repair retry
//! - [`pipeline`] - Classification, routing, normalization, fallback, orchestration
//! - [`fetchers`] - Tavily, Firecrawl and HTTP fetchers plus retry/rate-limit wrappers
//! - [`security`] - Credential handling and SSRF protection
//! - [`testing`] - Mock implementations for testing

pub mod cache;
pub mod error;
pub mod extractor;
pub mod fetchers;
pub mod pipeline;
pub mod security;
pub mod testing;
pub mod traits;
pub mod types;

#[cfg(feature = "openai")]
pub mod ai;

// Re-export core types at crate root
pub use error::{
    ExtractionError, ExtractionResult, FetchError, FetchResult, PipelineError, Result,
    SecurityError,
};
pub use traits::{
    fetcher::SourceFetcher,
    model::{LanguageModel, StructuredRequest},
};
pub use types::{
    config::{PipelineConfig, RetryPolicy, ScoreWeights},
    content::RawContent,
    intent::{Classification, Intent},
    platform::{Platform, KNOWN_PLATFORMS},
    record::CanonicalRecord,
    request::{SearchRequest, SearchResponse},
    schema::{FieldKind, FieldSpec, RecordSchema},
    state::{FallbackTier, Hints, PipelineState, Stage},
};

pub use cache::IntentCache;
pub use extractor::{ExtractedRecord, StructuredExtractor};

// Re-export pipeline components
pub use pipeline::{Deadline, FallbackLadder, FetchPlan, Normalizer, Pipeline, Scorer, Strictness};

// Re-export fetchers
pub use fetchers::{
    FetcherExt, HttpScraper, PageScraper, RateLimitedFetcher, RetryingFetcher, TavilySearch,
    WebFetcher,
};

#[cfg(feature = "firecrawl")]
pub use fetchers::FirecrawlScraper;

#[cfg(feature = "openai")]
pub use ai::OpenAiModel;

pub use security::{ProviderCredentials, UrlGuard};

// Re-export testing utilities
pub use testing::{MockFetcher, MockModel};
