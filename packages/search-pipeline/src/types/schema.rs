//! Target record schema - what the structured extractor is asked to produce.
//!
//! Record shapes differ per deployment (influencer cards, product listings,
//! articles). Rather than a Rust type per deployment, a [`RecordSchema`] lists
//! field names, kinds and whether they are required. The extractor type-checks
//! model output against it; the normalizer uses it for completeness scoring.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Value kind of a schema field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text
    Text,
    /// Numeric value; strings like "18.5M" or "3.2%" are coerced
    Number,
    /// Absolute http(s) URL
    Url,
    /// Boolean; "yes"/"no" strings are coerced
    Bool,
    /// One of a fixed set of labels (matched case-insensitively)
    Enum { allowed: Vec<String> },
}

impl FieldKind {
    fn json_type(&self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Bool => "boolean",
            Self::Text | Self::Url | Self::Enum { .. } => "string",
        }
    }
}

/// A single field in a [`RecordSchema`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

impl FieldSpec {
    fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            description: String::new(),
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Number)
    }

    pub fn url(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Url)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Bool)
    }

    pub fn one_of(
        name: impl Into<String>,
        allowed: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::new(
            name,
            FieldKind::Enum {
                allowed: allowed.into_iter().map(Into::into).collect(),
            },
        )
    }

    /// Mark the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Attach a description shown to the model.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Schema for the records the extractor must return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSchema {
    /// Schema name (also used as the structured-output name)
    pub name: String,

    /// What one record represents
    #[serde(default)]
    pub description: String,

    pub fields: Vec<FieldSpec>,

    /// Field holding the record's primary URL
    #[serde(default)]
    pub url_field: Option<String>,

    /// Field holding the record's category/type tag
    #[serde(default)]
    pub category_field: Option<String>,
}

impl RecordSchema {
    /// Create an empty schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            fields: Vec::new(),
            url_field: None,
            category_field: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_url_field(mut self, name: impl Into<String>) -> Self {
        self.url_field = Some(name.into());
        self
    }

    pub fn with_category_field(mut self, name: impl Into<String>) -> Self {
        self.category_field = Some(name.into());
        self
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of the required fields, in declaration order.
    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
    }

    /// The default deployment schema: one card per discovered profile or result.
    pub fn result_card() -> Self {
        Self::new("result_card")
            .with_description("One discovered creator, product or page relevant to the query")
            .with_field(FieldSpec::text("name").required().describe("Display name or title"))
            .with_field(
                FieldSpec::text("platform")
                    .required()
                    .describe("Platform or site the result lives on"),
            )
            .with_field(
                FieldSpec::url("profile_url")
                    .required()
                    .describe("Canonical URL of the profile or page"),
            )
            .with_field(FieldSpec::text("niche").required().describe("Topic or category"))
            .with_field(
                FieldSpec::text("description")
                    .required()
                    .describe("One or two sentence description"),
            )
            .with_field(FieldSpec::number("follower_count").describe("Audience size"))
            .with_field(FieldSpec::number("engagement_rate").describe("Engagement rate in percent"))
            .with_field(FieldSpec::text("location"))
            .with_field(FieldSpec::boolean("verified"))
            .with_url_field("profile_url")
            .with_category_field("platform")
    }

    /// JSON schema for strict structured output.
    ///
    /// Responses are wrapped as `{"records": [...]}`. Strict mode wants every
    /// property listed in `required`, so optional fields are made nullable instead.
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut prop = Map::new();
            let ty = field.kind.json_type();
            if field.required {
                prop.insert("type".into(), json!(ty));
            } else {
                prop.insert("type".into(), json!([ty, "null"]));
            }
            if let FieldKind::Enum { allowed } = &field.kind {
                let mut values: Vec<Value> = allowed.iter().map(|a| json!(a)).collect();
                if !field.required {
                    values.push(Value::Null);
                }
                prop.insert("enum".into(), Value::Array(values));
            }
            if !field.description.is_empty() {
                prop.insert("description".into(), json!(field.description));
            }
            properties.insert(field.name.clone(), Value::Object(prop));
        }

        let all_fields: Vec<&str> = self.fields.iter().map(|f| f.name.as_str()).collect();

        json!({
            "type": "object",
            "properties": {
                "records": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": properties,
                        "required": all_fields,
                        "additionalProperties": false
                    }
                }
            },
            "required": ["records"],
            "additionalProperties": false
        })
    }

    /// Plain-text rendering of the schema for prompts.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        if !self.description.is_empty() {
            out.push_str(&format!("Each record: {}\n", self.description));
        }
        for field in &self.fields {
            let kind = match &field.kind {
                FieldKind::Enum { allowed } => format!("one of [{}]", allowed.join(", ")),
                other => other.json_type().to_string(),
            };
            let presence = if field.required { "required" } else { "optional" };
            out.push_str(&format!("- {} ({}, {})", field.name, kind, presence));
            if !field.description.is_empty() {
                out.push_str(&format!(": {}", field.description));
            }
            out.push('\n');
        }
        out
    }
}

impl Default for RecordSchema {
    fn default() -> Self {
        Self::result_card()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_card_required_fields() {
        let schema = RecordSchema::result_card();
        let required: Vec<_> = schema.required_fields().collect();
        assert_eq!(
            required,
            vec!["name", "platform", "profile_url", "niche", "description"]
        );
        assert_eq!(schema.url_field.as_deref(), Some("profile_url"));
    }

    #[test]
    fn test_json_schema_lists_every_property_as_required() {
        let schema = RecordSchema::new("s")
            .with_field(FieldSpec::text("title").required())
            .with_field(FieldSpec::one_of("kind", ["a", "b"]));
        let value = schema.json_schema();
        let items = &value["properties"]["records"]["items"];

        assert_eq!(items["required"], json!(["title", "kind"]));
        assert_eq!(items["properties"]["title"]["type"], json!("string"));
        assert_eq!(items["properties"]["kind"]["type"], json!(["string", "null"]));
        assert_eq!(items["properties"]["kind"]["enum"], json!(["a", "b", null]));
        assert_eq!(items["additionalProperties"], json!(false));
    }

    #[test]
    fn test_describe_mentions_enum_values() {
        let schema = RecordSchema::new("s").with_field(FieldSpec::one_of("kind", ["a", "b"]).required());
        assert!(schema.describe().contains("kind (one of [a, b], required)"));
    }
}
