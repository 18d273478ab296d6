//! Fallback ladder: guarantees a minimum record count.
//!
//! Tiers only move forward within one request:
//!
//! - **Full (0)**: strictly normalized records already satisfy the minimum.
//! - **Partial inference (1)**: the same candidates re-finalized with relaxed
//!   rules. No new model call; the candidates are already captured.
//! - **Generated (2)**: deterministic placeholders derived from the query fill
//!   the remainder, always ranked below every real record.

use std::collections::HashSet;
use tracing::{debug, info, warn};
use url::form_urlencoded;

use crate::error::{PipelineError, Result};
use crate::types::{
    config::PipelineConfig,
    platform::{platform_by_name, Platform, WEB_SEARCH_URL},
    record::CanonicalRecord,
    schema::{FieldKind, RecordSchema},
    state::{FallbackTier, PipelineState},
};

/// Category for placeholders not tied to a platform.
pub const WEB_CATEGORY: &str = "web";

pub struct FallbackLadder<'a> {
    schema: &'a RecordSchema,
    base_score: f32,
    rank_decay: f32,
    max_synthetic: usize,
}

impl<'a> FallbackLadder<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self {
            schema: &config.schema,
            base_score: config.synthetic_base_score,
            rank_decay: config.synthetic_rank_decay,
            max_synthetic: config.max_synthetic,
        }
    }

    /// Settle the final record set on `state`.
    ///
    /// `normalized` is the strict result; `relax` produces the tier-1 set and is
    /// only called when tier 0 underfills and there is content to relax. Errors
    /// only with [`PipelineError::FallbackExhausted`], in which case the real
    /// records are still left on the state.
    pub fn run(
        &self,
        state: &mut PipelineState,
        normalized: Vec<CanonicalRecord>,
        relax: impl FnOnce() -> Vec<CanonicalRecord>,
    ) -> Result<()> {
        let min = state.hints.min_results_required;
        let limit = state.hints.max_results.max(min);

        if normalized.len() >= min {
            debug!(records = normalized.len(), min, "Tier 0 satisfied");
            state.replace_records(truncate(normalized, limit));
            return Ok(());
        }

        let real = if state.raw_content().is_empty() {
            debug!("No content fetched, skipping partial inference");
            normalized
        } else {
            state.advance_tier(FallbackTier::PartialInference);
            let relaxed = relax();
            info!(strict = normalized.len(), relaxed = relaxed.len(), min, "Tier 1 partial inference");
            if relaxed.len() >= min {
                state.replace_records(truncate(relaxed, limit));
                return Ok(());
            }
            // relaxing never loses records in practice, but keep whichever set is larger
            if relaxed.len() >= normalized.len() {
                relaxed
            } else {
                normalized
            }
        };

        state.advance_tier(FallbackTier::Generated);
        let needed = min - real.len();
        if needed > self.max_synthetic {
            warn!(needed, cap = self.max_synthetic, "Cannot synthesize enough placeholders");
            let produced = real.len() + self.max_synthetic;
            state.replace_records(real);
            return Err(PipelineError::FallbackExhausted {
                required: min,
                produced,
            });
        }

        let sources: Vec<String> = state.hints.target_sources.iter().cloned().collect();
        let synthetic = self.synthesize(&state.query, &sources, &real, needed);
        info!(real = real.len(), synthetic = synthetic.len(), "Tier 2 generated placeholders");

        let mut records = real;
        records.extend(synthetic);
        state.replace_records(truncate(records, limit));
        Ok(())
    }

    /// Generate `count` placeholders for `query`.
    ///
    /// Output depends only on the arguments. Scores decay geometrically from
    /// below the lowest score in `existing`, and ids never collide with it.
    pub fn synthesize(
        &self,
        query: &str,
        target_sources: &[String],
        existing: &[CanonicalRecord],
        count: usize,
    ) -> Vec<CanonicalRecord> {
        let platforms: Vec<&Platform> = target_sources
            .iter()
            .filter_map(|s| platform_by_name(s))
            .collect();

        let floor = existing
            .iter()
            .map(|r| r.relevance_score)
            .fold(f32::INFINITY, f32::min);
        let mut score = if floor.is_finite() {
            self.base_score.min(floor * self.rank_decay)
        } else {
            self.base_score
        };

        let mut seen: HashSet<String> = existing.iter().map(|r| r.id.clone()).collect();
        let mut out = Vec::with_capacity(count);
        let mut n = 0;

        while out.len() < count {
            n += 1;
            let platform = (!platforms.is_empty()).then(|| platforms[(n - 1) % platforms.len()]);
            let record = self.placeholder(query, platform, n);
            if !seen.insert(record.id.clone()) {
                continue;
            }
            out.push(record.with_score(score));
            score *= self.rank_decay;
        }
        out
    }

    fn placeholder(&self, query: &str, platform: Option<&Platform>, n: usize) -> CanonicalRecord {
        let template = platform.map_or(WEB_SEARCH_URL, |p| p.search_url);
        let encoded: String = form_urlencoded::byte_serialize(query.as_bytes()).collect();
        let url = format!("{}&suggestion={n}", template.replace("{q}", &encoded));
        let category = platform.map_or(WEB_CATEGORY, |p| p.name);

        let mut record = CanonicalRecord::new(category, &url).synthetic();
        for spec in &self.schema.fields {
            let name = spec.name.as_str();
            let value = if self.schema.url_field.as_deref() == Some(name) {
                url.clone()
            } else if self.schema.category_field.as_deref() == Some(name) {
                category.to_string()
            } else if !spec.required {
                String::new()
            } else {
                match &spec.kind {
                    FieldKind::Text => text_default(name, query, category, n),
                    FieldKind::Url => url.clone(),
                    FieldKind::Number => "0".to_string(),
                    FieldKind::Bool => "false".to_string(),
                    FieldKind::Enum { allowed } => allowed.first().cloned().unwrap_or_default(),
                }
            };
            record.fields.insert(spec.name.clone(), value);
        }
        record
    }
}

fn text_default(field: &str, query: &str, category: &str, n: usize) -> String {
    match field {
        "name" | "title" => format!("{} #{n}", title_case(query)),
        "description" | "summary" | "snippet" => {
            format!("Suggested starting point for \"{query}\" on {category}.")
        }
        _ => query.to_lowercase(),
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn truncate(mut records: Vec<CanonicalRecord>, limit: usize) -> Vec<CanonicalRecord> {
    records.truncate(limit);
    records
}
