//! Structured extractor: schema in, validated records out.
//!
//! Wraps a [`LanguageModel`] with the parts the model cannot be trusted with:
//! a timeout, JSON parsing, per-field type checking/coercion, and exactly one
//! repair attempt with a clarified prompt. The extractor never touches caller
//! state; callers integrate the returned records themselves.

use indexmap::IndexMap;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ExtractionError, ExtractionResult};
use crate::pipeline::prompts::{format_repair_prompt, format_system_prompt};
use crate::traits::model::{LanguageModel, StructuredRequest};
use crate::types::schema::{FieldKind, FieldSpec, RecordSchema};

/// Default timeout per model round trip.
pub const DEFAULT_EXTRACTOR_TIMEOUT: Duration = Duration::from_secs(20);

/// A record that passed type checking.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractedRecord {
    /// Coerced field values in schema order (absent fields omitted)
    pub fields: IndexMap<String, String>,

    /// Required fields the model left out
    pub missing: Vec<String>,
}

impl ExtractedRecord {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Schema-guided extraction over a language model.
pub struct StructuredExtractor<M> {
    model: M,
    timeout: Duration,
}

impl<M: LanguageModel> StructuredExtractor<M> {
    /// Create an extractor with the default timeout.
    pub fn new(model: M) -> Self {
        Self {
            model,
            timeout: DEFAULT_EXTRACTOR_TIMEOUT,
        }
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Extract records matching `schema` from `context`.
    pub async fn extract(
        &self,
        schema: &RecordSchema,
        context: &str,
    ) -> ExtractionResult<Vec<ExtractedRecord>> {
        self.extract_with_instructions(schema, "", context).await
    }

    /// Extract with task-specific instructions in the system prompt.
    ///
    /// A response that fails parsing or validation is retried once with the
    /// failure explained; a second failure is a `SchemaValidation` error.
    /// Timeouts and provider failures are not retried.
    pub async fn extract_with_instructions(
        &self,
        schema: &RecordSchema,
        instructions: &str,
        context: &str,
    ) -> ExtractionResult<Vec<ExtractedRecord>> {
        let request = StructuredRequest {
            schema_name: schema.name.clone(),
            system: format_system_prompt(instructions, schema),
            user: context.to_string(),
            schema: schema.json_schema(),
        };

        match self.attempt(&request, schema).await {
            Ok(records) => Ok(records),
            Err(e) if e.is_repairable() => {
                warn!(schema = %schema.name, error = %e, "Structured output rejected, retrying once");
                let repaired = StructuredRequest {
                    user: format_repair_prompt(context, &e.to_string()),
                    ..request
                };
                self.attempt(&repaired, schema).await.map_err(|e| match e {
                    ExtractionError::JsonParse(err) => ExtractionError::schema(err.to_string()),
                    other => other,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn attempt(
        &self,
        request: &StructuredRequest,
        schema: &RecordSchema,
    ) -> ExtractionResult<Vec<ExtractedRecord>> {
        let raw = tokio::time::timeout(self.timeout, self.model.generate_structured(request))
            .await
            .map_err(|_| ExtractionError::Timeout {
                after: self.timeout,
            })??;

        let records = parse_records(&raw, schema)?;
        debug!(schema = %schema.name, count = records.len(), "Extracted records");
        Ok(records)
    }
}

/// Parse and validate a raw model response.
///
/// Accepts `{"records": [...]}`, a bare array, or a single record object,
/// optionally wrapped in a markdown code fence.
pub fn parse_records(raw: &str, schema: &RecordSchema) -> ExtractionResult<Vec<ExtractedRecord>> {
    let value: Value = serde_json::from_str(strip_code_fence(raw))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("records") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) => Vec::new(),
            Some(_) => return Err(ExtractionError::schema("\"records\" must be an array")),
            None if schema.fields.iter().any(|f| map.contains_key(&f.name)) => {
                vec![Value::Object(map)]
            }
            None => return Err(ExtractionError::schema("expected an object with \"records\"")),
        },
        _ => return Err(ExtractionError::schema("expected a JSON object or array")),
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            validate_record(item, schema)
                .map_err(|reason| ExtractionError::schema(format!("record {i}: {reason}")))
        })
        .collect()
}

fn validate_record(item: &Value, schema: &RecordSchema) -> Result<ExtractedRecord, String> {
    let object = item
        .as_object()
        .ok_or_else(|| "record is not an object".to_string())?;

    let mut record = ExtractedRecord::default();
    for spec in &schema.fields {
        match coerce_field(spec, object.get(&spec.name))? {
            Some(value) => {
                record.fields.insert(spec.name.clone(), value);
            }
            None if spec.required => record.missing.push(spec.name.clone()),
            None => {}
        }
    }
    Ok(record)
}

/// Type-check and coerce one field. `Ok(None)` means absent.
pub fn coerce_field(spec: &FieldSpec, value: Option<&Value>) -> Result<Option<String>, String> {
    let value = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(v) => v,
    };
    let name = &spec.name;

    match &spec.kind {
        FieldKind::Text => match value {
            Value::String(s) => Ok(non_empty(s)),
            Value::Number(n) => Ok(Some(n.to_string())),
            Value::Bool(b) => Ok(Some(b.to_string())),
            Value::Array(parts) => {
                let joined: Vec<String> = parts
                    .iter()
                    .filter_map(|p| match p {
                        Value::String(s) => non_empty(s),
                        Value::Null => None,
                        other => Some(other.to_string()),
                    })
                    .collect();
                Ok((!joined.is_empty()).then(|| joined.join(", ")))
            }
            _ => Err(format!("{name}: expected text")),
        },
        FieldKind::Number => match value {
            Value::Number(n) => n
                .as_f64()
                .map(|v| Some(format_number(v)))
                .ok_or_else(|| format!("{name}: number out of range")),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => parse_number(s)
                .map(|v| Some(format_number(v)))
                .ok_or_else(|| format!("{name}: {s:?} is not a number")),
            _ => Err(format!("{name}: expected a number")),
        },
        FieldKind::Url => match value {
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => normalize_url(s)
                .map(Some)
                .ok_or_else(|| format!("{name}: {s:?} is not an http(s) URL")),
            _ => Err(format!("{name}: expected a URL string")),
        },
        FieldKind::Bool => match value {
            Value::Bool(b) => Ok(Some(b.to_string())),
            Value::Number(n) if n.as_f64() == Some(0.0) => Ok(Some("false".into())),
            Value::Number(n) if n.as_f64() == Some(1.0) => Ok(Some("true".into())),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "" => Ok(None),
                "true" | "yes" | "y" | "1" => Ok(Some("true".into())),
                "false" | "no" | "n" | "0" => Ok(Some("false".into())),
                _ => Err(format!("{name}: {s:?} is not a boolean")),
            },
            _ => Err(format!("{name}: expected a boolean")),
        },
        FieldKind::Enum { allowed } => match value {
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => {
                let wanted = enum_key(s);
                allowed
                    .iter()
                    .find(|a| enum_key(a) == wanted)
                    .map(|a| Some(a.clone()))
                    .ok_or_else(|| {
                        format!("{name}: {s:?} is not one of [{}]", allowed.join(", "))
                    })
            }
            _ => Err(format!("{name}: expected one of [{}]", allowed.join(", "))),
        },
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn enum_key(s: &str) -> String {
    s.trim().to_lowercase().replace([' ', '-'], "_")
}

/// Parse human-formatted numbers: `1,234`, `3.2%`, `18.5M`, `12k`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | ' ' | '%' | '+'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let (digits, multiplier) = match cleaned.chars().last()? {
        'k' | 'K' => (&cleaned[..cleaned.len() - 1], 1e3),
        'm' | 'M' => (&cleaned[..cleaned.len() - 1], 1e6),
        'b' | 'B' => (&cleaned[..cleaned.len() - 1], 1e9),
        _ => (cleaned.as_str(), 1.0),
    };

    digits
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v * multiplier)
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

/// Accept absolute http(s) URLs, adding `https://` to bare hosts.
pub fn normalize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let parsed = url::Url::parse(trimmed)
        .or_else(|_| url::Url::parse(&format!("https://{trimmed}")))
        .ok()?;

    let valid = matches!(parsed.scheme(), "http" | "https")
        && parsed.host_str().is_some_and(|h| h.contains('.'));
    valid.then(|| parsed.to_string())
}

/// Strip a surrounding markdown code fence, if any.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.strip_prefix("json").unwrap_or(rest);
    body.strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockModel;
    use crate::traits::model::MockLanguageModel;
    use serde_json::json;

    fn schema() -> RecordSchema {
        RecordSchema::new("test")
            .with_field(FieldSpec::text("name").required())
            .with_field(FieldSpec::url("url").required())
            .with_field(FieldSpec::number("followers"))
            .with_field(FieldSpec::one_of("kind", ["creator", "brand"]))
            .with_field(FieldSpec::boolean("verified"))
    }

    #[test]
    fn test_parse_wrapped_records() {
        let raw = r#"{"records": [{"name": "MKBHD", "url": "youtube.com/@mkbhd", "followers": "18.5M", "kind": "Creator", "verified": "yes"}]}"#;
        let records = parse_records(raw, &schema()).unwrap();

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.get("name"), Some("MKBHD"));
        assert_eq!(r.get("url"), Some("https://youtube.com/@mkbhd"));
        assert_eq!(r.get("followers"), Some("18500000"));
        assert_eq!(r.get("kind"), Some("creator"));
        assert_eq!(r.get("verified"), Some("true"));
        assert!(r.missing.is_empty());
    }

    #[test]
    fn test_parse_tracks_missing_required_fields() {
        let raw = r#"[{"name": "No Link", "url": null}]"#;
        let records = parse_records(raw, &schema()).unwrap();
        assert_eq!(records[0].missing, vec!["url"]);
    }

    #[test]
    fn test_parse_rejects_bad_enum() {
        let raw = r#"{"records": [{"name": "A", "url": "https://a.com", "kind": "robot"}]}"#;
        let err = parse_records(raw, &schema()).unwrap_err();
        assert!(matches!(err, ExtractionError::SchemaValidation { .. }));
        assert!(err.to_string().contains("kind"));
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        let raw = r#"{"records": [{"name": "A", "url": "https://a.com", "followers": "lots"}]}"#;
        assert!(parse_records(raw, &schema()).is_err());
    }

    #[test]
    fn test_parse_strips_code_fence() {
        let raw = "```json\n{\"records\": []}\n```";
        assert!(parse_records(raw, &schema()).unwrap().is_empty());
    }

    #[test]
    fn test_parse_number_formats() {
        assert_eq!(parse_number("1,234"), Some(1234.0));
        assert_eq!(parse_number("3.2%"), Some(3.2));
        assert_eq!(parse_number("12k"), Some(12_000.0));
        assert_eq!(parse_number("n/a"), None);
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("example.com/a").as_deref(), Some("https://example.com/a"));
        assert_eq!(normalize_url("ftp://example.com"), None);
        assert_eq!(normalize_url("not a url"), None);
    }

    #[test]
    fn test_text_field_joins_arrays() {
        let spec = FieldSpec::text("tags");
        assert_eq!(
            coerce_field(&spec, Some(&json!(["a", "b"]))).unwrap().as_deref(),
            Some("a, b")
        );
        assert!(coerce_field(&spec, Some(&json!({"a": 1}))).is_err());
    }

    #[tokio::test]
    async fn test_extract_repairs_once() {
        let model = MockModel::new().with_responses(
            "test",
            vec![
                Ok("not json at all".to_string()),
                Ok(r#"{"records": [{"name": "A", "url": "https://a.com"}]}"#.to_string()),
            ],
        );
        let extractor = StructuredExtractor::new(model);

        let records = extractor.extract(&schema(), "content").await.unwrap();
        assert_eq!(records.len(), 1);

        let calls = extractor.model().calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].user.contains("could not be used"));
    }

    #[tokio::test]
    async fn test_second_failure_is_schema_validation() {
        let mut model = MockLanguageModel::new();
        model
            .expect_generate_structured()
            .times(2)
            .returning(|_| Ok("{\"records\": \"nope\"}".to_string()));
        let extractor = StructuredExtractor::new(model);

        let err = extractor.extract(&schema(), "content").await.unwrap_err();
        assert!(matches!(err, ExtractionError::SchemaValidation { .. }));
    }

    #[tokio::test]
    async fn test_provider_errors_are_not_retried() {
        let mut model = MockLanguageModel::new();
        model
            .expect_generate_structured()
            .times(1)
            .returning(|_| Err(ExtractionError::Provider("503".into())));
        let extractor = StructuredExtractor::new(model);

        let err = extractor.extract(&schema(), "content").await.unwrap_err();
        assert!(matches!(err, ExtractionError::Provider(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let model = MockModel::new()
            .with_response("test", r#"{"records": []}"#)
            .with_delay(Duration::from_secs(60));
        let extractor = StructuredExtractor::new(model).with_timeout(Duration::from_secs(5));

        let err = extractor.extract(&schema(), "content").await.unwrap_err();
        assert!(matches!(err, ExtractionError::Timeout { after } if after == Duration::from_secs(5)));
        assert_eq!(extractor.model().calls().len(), 1);
    }
}
