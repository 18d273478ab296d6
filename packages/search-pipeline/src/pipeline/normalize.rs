//! Result normalizer: raw content in, ranked canonical records out.
//!
//! Normalization is split in two so the fallback ladder can relax the rules
//! without paying for another model call:
//!
//! 1. [`Normalizer::extract_candidates`] chunks the content at item
//!    boundaries, runs the extractor on every chunk concurrently and resolves
//!    each record's URL and category.
//! 2. [`finalize`] turns candidates into scored, deduplicated, sorted records
//!    under a [`Strictness`] (tier 0 strict, tier 1 relaxed).

use futures::future::join_all;
use indexmap::IndexMap;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, warn};

use crate::extractor::{ExtractedRecord, StructuredExtractor};
use crate::pipeline::deadline::Deadline;
use crate::pipeline::prompts::{format_content_chunk, format_records_instructions};
use crate::traits::model::LanguageModel;
use crate::types::{
    config::ScoreWeights,
    content::RawContent,
    platform::{canonical_source, domain_for_source, platform_by_name, platform_for_host},
    record::{url_identity, CanonicalRecord},
    schema::RecordSchema,
};

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "at", "by", "for", "from", "in", "is", "of", "on", "or", "the",
    "to", "vs", "with",
];

/// An extracted record with its URL and category resolved, not yet scored.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub fields: IndexMap<String, String>,
    pub url: String,
    pub category: String,
}

/// Candidates from one normalization pass, plus per-chunk failures.
#[derive(Debug, Clone, Default)]
pub struct CandidateBatch {
    pub candidates: Vec<Candidate>,
    pub errors: Vec<String>,
}

/// How strictly [`finalize`] treats incomplete and weak records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Strictness {
    /// Drop records missing required fields (otherwise fill with "")
    pub require_complete: bool,

    /// Minimum relevance score kept
    pub floor: f32,
}

impl Strictness {
    pub fn strict(floor: f32) -> Self {
        Self {
            require_complete: true,
            floor,
        }
    }

    pub fn relaxed(floor: f32) -> Self {
        Self {
            require_complete: false,
            floor,
        }
    }
}

/// Relevance scoring for one request.
#[derive(Debug, Clone)]
pub struct Scorer {
    terms: Vec<String>,
    target_sources: BTreeSet<String>,
    weights: ScoreWeights,
}

impl Scorer {
    pub fn new(query: &str, target_sources: &BTreeSet<String>, weights: ScoreWeights) -> Self {
        Self {
            terms: query_terms(query),
            target_sources: target_sources.clone(),
            weights,
        }
    }

    /// Weighted sum of lexical overlap, source match and required-field
    /// completeness, clamped to [0, 1].
    pub fn score(&self, record: &CanonicalRecord, schema: &RecordSchema) -> f32 {
        let w = &self.weights;
        let score = w.lexical * self.lexical_overlap(record, schema)
            + w.source * self.source_match(record)
            + w.completeness * completeness(record, schema);
        score.clamp(0.0, 1.0)
    }

    fn lexical_overlap(&self, record: &CanonicalRecord, schema: &RecordSchema) -> f32 {
        if self.terms.is_empty() {
            return 0.0;
        }
        let words: HashSet<String> = record
            .fields
            .iter()
            .filter(|(name, _)| schema.url_field.as_deref() != Some(name.as_str()))
            .flat_map(|(_, value)| tokenize(value))
            .collect();

        let hits = self.terms.iter().filter(|t| words.contains(*t)).count();
        hits as f32 / self.terms.len() as f32
    }

    fn source_match(&self, record: &CanonicalRecord) -> f32 {
        if self.target_sources.is_empty() || self.target_sources.contains(&record.category) {
            return 1.0;
        }

        let host = url::Url::parse(&record.primary_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_lowercase));
        let Some(host) = host else {
            return 0.0;
        };

        let matched = self.target_sources.iter().any(|source| {
            match platform_by_name(source) {
                Some(platform) => platform_for_host(&host).is_some_and(|p| p.name == platform.name),
                None => domain_for_source(source)
                    .is_some_and(|d| host == d || host.ends_with(&format!(".{d}"))),
            }
        });
        if matched {
            1.0
        } else {
            0.0
        }
    }
}

fn completeness(record: &CanonicalRecord, schema: &RecordSchema) -> f32 {
    let required: Vec<&str> = schema.required_fields().collect();
    if required.is_empty() {
        return 1.0;
    }
    let present = required.iter().filter(|f| record.field(f).is_some()).count();
    present as f32 / required.len() as f32
}

/// Lowercase word stems with light plural folding ("reviewers" ~ "reviewer").
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| {
            if w.len() > 3 && w.ends_with('s') && !w.ends_with("ss") {
                w[..w.len() - 1].to_string()
            } else {
                w.to_string()
            }
        })
        .collect()
}

/// Distinct, meaningful query terms in order.
pub fn query_terms(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(query)
        .into_iter()
        .filter(|t| t.chars().count() >= 2 && !STOPWORDS.contains(&t.as_str()))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Split content into chunks of at most `budget` prompt characters.
///
/// Boundaries fall between items, never inside one; an item larger than the
/// budget forms a chunk of its own. Order is preserved.
pub fn chunk_content(items: &[RawContent], budget: usize) -> Vec<&[RawContent]> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut size = 0;

    for (i, item) in items.iter().enumerate() {
        let len = item.prompt_len();
        if i > start && size + len > budget {
            chunks.push(&items[start..i]);
            start = i;
            size = 0;
        }
        size += len;
    }
    if start < items.len() {
        chunks.push(&items[start..]);
    }
    chunks
}

/// Runs the extractor over raw content.
pub struct Normalizer<'a, M> {
    extractor: &'a StructuredExtractor<M>,
    schema: &'a RecordSchema,
    chunk_char_budget: usize,
}

impl<'a, M: LanguageModel> Normalizer<'a, M> {
    pub fn new(
        extractor: &'a StructuredExtractor<M>,
        schema: &'a RecordSchema,
        chunk_char_budget: usize,
    ) -> Self {
        Self {
            extractor,
            schema,
            chunk_char_budget,
        }
    }

    /// Extract candidates from every chunk concurrently.
    ///
    /// Results merge in chunk order regardless of completion order. A failed
    /// (or cut-off) chunk contributes nothing and adds an error entry.
    pub async fn extract_candidates(
        &self,
        query: &str,
        items: &[RawContent],
        deadline: &Deadline,
    ) -> CandidateBatch {
        let usable: Vec<RawContent> = items.iter().filter(|i| i.has_content()).cloned().collect();
        let chunks = chunk_content(&usable, self.chunk_char_budget);
        let instructions = format_records_instructions(query);

        debug!(items = usable.len(), chunks = chunks.len(), "Normalizing content");

        let results = join_all(chunks.iter().map(|chunk| {
            let instructions = instructions.as_str();
            async move {
                let prompt = format_content_chunk(chunk);
                deadline
                    .run(
                        self.extractor
                            .extract_with_instructions(self.schema, instructions, &prompt),
                    )
                    .await
            }
        }))
        .await;

        let mut batch = CandidateBatch::default();
        for (i, (chunk, result)) in chunks.iter().zip(results).enumerate() {
            match result {
                Some(Ok(records)) => batch
                    .candidates
                    .extend(records.into_iter().filter_map(|r| self.candidate(r, chunk))),
                Some(Err(e)) => {
                    warn!(chunk = i + 1, error = %e, "Chunk extraction failed");
                    batch.errors.push(format!("chunk {}: {}", i + 1, e));
                }
                None => batch
                    .errors
                    .push(format!("chunk {}: {}", i + 1, deadline.reason())),
            }
        }
        batch
    }

    /// Full strict normalization: extract, then [`finalize`] at `floor`.
    pub async fn normalize(
        &self,
        query: &str,
        items: &[RawContent],
        scorer: &Scorer,
        floor: f32,
        deadline: &Deadline,
    ) -> (Vec<CanonicalRecord>, Vec<String>) {
        let batch = self.extract_candidates(query, items, deadline).await;
        let records = finalize(&batch.candidates, self.schema, scorer, Strictness::strict(floor));
        (records, batch.errors)
    }

    fn candidate(&self, record: ExtractedRecord, chunk: &[RawContent]) -> Option<Candidate> {
        let first = chunk.first()?;
        let url = match self.schema.url_field.as_deref().and_then(|f| record.get(f)) {
            Some(url) => url.to_string(),
            // Only a single-item chunk pins the record to a source unambiguously.
            None if chunk.len() == 1 && !first.url.is_empty() => first.url.clone(),
            None => {
                debug!("Dropping record without a resolvable URL");
                return None;
            }
        };

        let identity = url_identity(&url);
        let source = chunk
            .iter()
            .find(|c| url_identity(&c.url) == identity)
            .unwrap_or(first);

        let category = self
            .schema
            .category_field
            .as_deref()
            .and_then(|f| record.get(f))
            .map(canonical_source)
            .filter(|c| !c.is_empty())
            .or_else(|| {
                url::Url::parse(&url)
                    .ok()
                    .and_then(|u| u.host_str().and_then(platform_for_host))
                    .map(|p| p.name.to_string())
            })
            .unwrap_or_else(|| source.source_id.clone());

        Some(Candidate {
            fields: record.fields,
            url,
            category,
        })
    }
}

/// Score, filter, deduplicate and sort candidates.
///
/// Deduplication is by URL identity among surviving records, first occurrence
/// winning. The sort is stable, so equal scores keep arrival order. Calling
/// this twice on the same input yields the same output.
pub fn finalize(
    candidates: &[Candidate],
    schema: &RecordSchema,
    scorer: &Scorer,
    strictness: Strictness,
) -> Vec<CanonicalRecord> {
    let mut seen = HashSet::new();
    let mut records: Vec<CanonicalRecord> = candidates
        .iter()
        .filter_map(|c| build_record(c, schema, strictness.require_complete))
        .filter_map(|record| {
            let score = scorer.score(&record, schema);
            (score >= strictness.floor).then(|| record.with_score(score))
        })
        .filter(|record| seen.insert(record.id.clone()))
        .collect();

    records.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
    records
}

fn build_record(candidate: &Candidate, schema: &RecordSchema, require_complete: bool) -> Option<CanonicalRecord> {
    let mut record = CanonicalRecord::new(&candidate.category, &candidate.url);
    let mut missing = Vec::new();

    for spec in &schema.fields {
        let name = spec.name.as_str();
        let value = if schema.url_field.as_deref() == Some(name) {
            Some(candidate.url.clone())
        } else if schema.category_field.as_deref() == Some(name) {
            candidate
                .fields
                .get(name)
                .cloned()
                .or_else(|| Some(candidate.category.clone()))
        } else {
            candidate.fields.get(name).cloned()
        };

        match value.filter(|v| !v.trim().is_empty()) {
            Some(v) => {
                record.fields.insert(spec.name.clone(), v);
            }
            None => {
                if spec.required {
                    missing.push(spec.name.clone());
                }
                if !require_complete {
                    record.fields.insert(spec.name.clone(), String::new());
                }
            }
        }
    }

    if require_complete && !missing.is_empty() {
        return None;
    }
    record.missing_fields = missing;
    Some(record)
}
