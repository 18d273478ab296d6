//! LLM prompts for the pipeline.
//!
//! Prompts carry most of the domain "logic" the model sees; the code around
//! them only validates what comes back.

use crate::types::{content::RawContent, intent::Intent, schema::RecordSchema};

/// System prompt for every structured-extraction call.
pub const EXTRACT_SYSTEM_PROMPT: &str = r#"You extract structured records from unstructured web content.

{instructions}

Record fields:
{fields}
Rules:
- Only use information present in the content. Do not invent URLs.
- Leave a field null when the content does not mention it.
- Respond with JSON only: {"records": [ ... ]}"#;

/// Instructions for turning fetched content into result records.
pub const RECORDS_INSTRUCTIONS: &str = r#"The user searched for: "{query}"

Identify every distinct item in the content below that is relevant to this search
(a creator profile, a product, an article, a listing). Produce one record per item.
Merge duplicates that point at the same URL."#;

/// Instructions for classifying query intent.
pub const CLASSIFY_INSTRUCTIONS: &str = r#"Classify the intent of a search query for a unified search system.

Categories:
- general_search: news, facts, definitions, how-to questions, explanations
- product_search: products, shopping, prices, reviews, buying recommendations
- influencer_search: creators, channels, streamers or profiles on social platforms
- web_scraping: extracting data from specific websites the query names
- comparison: comparing multiple items, services or options

Examples:
- "latest news about AI" -> general_search
- "best laptops under $1000" -> product_search
- "tech reviewers on YouTube" -> influencer_search
- "extract contact info from linkedin.com/company/acme" -> web_scraping
- "iPhone vs Samsung Galaxy comparison" -> comparison

Also list the platforms or sites worth targeting (comma-separated, may be empty)
and the locale the query is written for if it is evident (e.g. en-US, de-DE).
Return exactly one record."#;

/// Appended to the user prompt on the single repair attempt.
pub const REPAIR_PROMPT: &str = r#"Your previous response could not be used: {error}

Respond again with JSON only, exactly matching the schema. Use null for unknown
fields instead of guessing, and only use the allowed values for enumerated fields."#;

/// Format the extraction system prompt.
pub fn format_system_prompt(instructions: &str, schema: &RecordSchema) -> String {
    EXTRACT_SYSTEM_PROMPT
        .replace("{instructions}", instructions.trim())
        .replace("{fields}", &schema.describe())
}

/// Format the record-extraction instructions for a query.
pub fn format_records_instructions(query: &str) -> String {
    RECORDS_INSTRUCTIONS.replace("{query}", query)
}

/// Format the repair suffix for a failed attempt.
pub fn format_repair_prompt(original: &str, error: &str) -> String {
    format!("{}\n\n{}", original, REPAIR_PROMPT.replace("{error}", error))
}

/// Render a chunk of raw content as the extractor's user prompt.
pub fn format_content_chunk(items: &[RawContent]) -> String {
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        out.push_str(&format!("--- Item {} ---\n", i + 1));
        if !item.url.is_empty() {
            out.push_str(&format!("URL: {}\n", item.url));
        }
        if let Some(title) = &item.title {
            out.push_str(&format!("Title: {title}\n"));
        }
        out.push_str(&format!("Source: {}\n", item.source_id));
        out.push_str(item.text.trim());
        out.push_str("\n\n");
    }
    out
}

/// Render the classification user prompt.
pub fn format_classify_prompt(query: &str) -> String {
    let labels: Vec<&str> = Intent::CLASSIFIABLE.iter().map(|i| i.as_str()).collect();
    format!(
        "Allowed intents: {}\n\nClassify this query: \"{}\"",
        labels.join(", "),
        query
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_includes_schema_fields() {
        let prompt = format_system_prompt("Do the thing.", &RecordSchema::result_card());
        assert!(prompt.contains("Do the thing."));
        assert!(prompt.contains("- profile_url (string, required)"));
        assert!(!prompt.contains("{fields}"));
    }

    #[test]
    fn test_content_chunk_numbering() {
        let items = vec![
            RawContent::search("https://a.com", "alpha").with_title("A"),
            RawContent::scrape("https://b.com", "beta"),
        ];
        let rendered = format_content_chunk(&items);
        assert!(rendered.contains("--- Item 1 ---\nURL: https://a.com\nTitle: A\nSource: search\nalpha"));
        assert!(rendered.contains("--- Item 2 ---\nURL: https://b.com\nSource: scrape\nbeta"));
    }

    #[test]
    fn test_repair_prompt_keeps_original() {
        let prompt = format_repair_prompt("original content", "missing field");
        assert!(prompt.starts_with("original content"));
        assert!(prompt.contains("could not be used: missing field"));
    }
}
