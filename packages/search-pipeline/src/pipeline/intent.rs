//! Intent classification on top of the structured extractor.

use tracing::debug;

use crate::error::{ExtractionError, ExtractionResult};
use crate::extractor::{parse_number, ExtractedRecord, StructuredExtractor};
use crate::pipeline::prompts::{format_classify_prompt, CLASSIFY_INSTRUCTIONS};
use crate::traits::model::LanguageModel;
use crate::types::{
    intent::{Classification, Intent},
    schema::{FieldSpec, RecordSchema},
};

/// Schema name used for classification calls.
pub const INTENT_SCHEMA: &str = "intent";

/// Fixed enumerated schema for one classification record.
pub fn intent_schema() -> RecordSchema {
    let labels: Vec<&str> = Intent::CLASSIFIABLE.iter().map(|i| i.as_str()).collect();
    RecordSchema::new(INTENT_SCHEMA)
        .with_description("Classification of one search query")
        .with_field(FieldSpec::one_of("intent", labels).required())
        .with_field(
            FieldSpec::number("confidence")
                .required()
                .describe("Confidence between 0 and 1"),
        )
        .with_field(FieldSpec::text("reasoning").describe("One sentence"))
        .with_field(
            FieldSpec::text("target_sources")
                .describe("Comma-separated platforms or sites worth targeting"),
        )
        .with_field(FieldSpec::text("locale").describe("Locale such as en-US, if evident"))
}

/// Classify a query.
///
/// Adds no randomness of its own: identical model output yields an identical
/// classification. Low confidence is still a usable label; only an extraction
/// failure produces an error (callers substitute [`Classification::unknown`]).
pub async fn classify<M: LanguageModel>(
    extractor: &StructuredExtractor<M>,
    query: &str,
) -> ExtractionResult<Classification> {
    let records = extractor
        .extract_with_instructions(&intent_schema(), CLASSIFY_INSTRUCTIONS, &format_classify_prompt(query))
        .await?;

    let record = records
        .into_iter()
        .next()
        .ok_or_else(|| ExtractionError::schema("no classification returned"))?;
    let classification = classification_from_record(&record)?;

    debug!(
        intent = %classification.intent,
        confidence = classification.confidence,
        sources = ?classification.target_sources,
        "Query classified"
    );
    Ok(classification)
}

fn classification_from_record(record: &ExtractedRecord) -> ExtractionResult<Classification> {
    let intent = record
        .get("intent")
        .and_then(Intent::from_label)
        .ok_or_else(|| ExtractionError::schema("classification is missing an intent"))?;

    let confidence = record
        .get("confidence")
        .and_then(parse_number)
        .map(|c| if c > 1.0 { c / 100.0 } else { c })
        .ok_or_else(|| ExtractionError::schema("classification is missing a confidence"))?;

    let target_sources = record
        .get("target_sources")
        .map(|s| {
            s.split([',', ';'])
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    Ok(Classification {
        intent,
        confidence: (confidence as f32).clamp(0.0, 1.0),
        reasoning: record.get("reasoning").unwrap_or_default().to_string(),
        target_sources,
        locale: record.get("locale").map(String::from),
    })
}
