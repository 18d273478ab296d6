//! Search pipeline - the core of the library.
//!
//! The pipeline orchestrates:
//! - Request policy (query normalization, hints)
//! - Intent classification
//! - Routing to a fetch plan (search, scrape, or both)
//! - Normalization of raw content into ranked records
//! - The fallback ladder that guarantees a minimum result count

pub mod deadline;
pub mod fallback;
pub mod intent;
pub mod normalize;
pub mod orchestrator;
pub mod policy;
pub mod prompts;
pub mod router;

pub use deadline::Deadline;
pub use fallback::{FallbackLadder, WEB_CATEGORY};
pub use intent::{classify, intent_schema, INTENT_SCHEMA};
pub use normalize::{
    chunk_content, finalize, query_terms, Candidate, CandidateBatch, Normalizer, Scorer,
    Strictness,
};
pub use orchestrator::Pipeline;
pub use policy::{prepare, search_query, site_query, PreparedRequest};
pub use prompts::{
    format_classify_prompt, format_content_chunk, format_records_instructions,
    format_repair_prompt, format_system_prompt, CLASSIFY_INSTRUCTIONS, EXTRACT_SYSTEM_PROMPT,
    RECORDS_INSTRUCTIONS, REPAIR_PROMPT,
};
pub use router::{explicit_urls, route, FetchPlan};
