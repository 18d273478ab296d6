//! Canonical records - the externally visible unit of output.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A normalized, schema-validated result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    /// Stable id derived from the record's source identity
    pub id: String,

    /// Domain label (platform, source kind)
    pub category: String,

    pub primary_url: String,

    /// Extracted attributes in schema order
    pub fields: IndexMap<String, String>,

    /// Estimated match to the query, in [0, 1]
    pub relevance_score: f32,

    /// True only for generated placeholders
    #[serde(default)]
    pub synthetic: bool,

    /// Required schema fields that were absent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,
}

impl CanonicalRecord {
    /// Create a record whose id derives from its URL.
    pub fn new(category: impl Into<String>, primary_url: impl Into<String>) -> Self {
        let primary_url = primary_url.into();
        Self {
            id: record_id(&url_identity(&primary_url)),
            category: category.into(),
            primary_url,
            fields: IndexMap::new(),
            relevance_score: 0.0,
            synthetic: false,
            missing_fields: Vec::new(),
        }
    }

    /// Set a field value.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Set the relevance score (clamped to [0, 1]).
    pub fn with_score(mut self, score: f32) -> Self {
        self.relevance_score = score.clamp(0.0, 1.0);
        self
    }

    /// Mark as a generated placeholder.
    pub fn synthetic(mut self) -> Self {
        self.synthetic = true;
        self
    }

    /// Field value, treating empty strings as absent.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Whether every required field was present.
    pub fn is_complete(&self) -> bool {
        self.missing_fields.is_empty()
    }
}

/// Short stable id for an identity string.
pub fn record_id(identity: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identity.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// Identity key for a URL: case-insensitive and scheme-normalized.
///
/// `https://WWW.Example.com/Path/` and `http://www.example.com/path` share a key.
/// Fragments and trailing slashes are ignored; query strings are kept.
pub fn url_identity(url: &str) -> String {
    let trimmed = url.trim();
    match url::Url::parse(trimmed) {
        Ok(parsed) if parsed.host_str().is_some() => {
            let host = parsed.host_str().unwrap_or_default().to_lowercase();
            let path = parsed.path().trim_end_matches('/').to_lowercase();
            let port = parsed
                .port()
                .map(|p| format!(":{p}"))
                .unwrap_or_default();
            let query = parsed
                .query()
                .map(|q| format!("?{}", q.to_lowercase()))
                .unwrap_or_default();
            format!("{host}{port}{path}{query}")
        }
        _ => {
            let lowered = trimmed.to_lowercase();
            let without_scheme = lowered
                .strip_prefix("https://")
                .or_else(|| lowered.strip_prefix("http://"))
                .unwrap_or(&lowered);
            let without_fragment = without_scheme.split('#').next().unwrap_or_default();
            without_fragment.trim_end_matches('/').to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_identity_ignores_case_and_scheme() {
        assert_eq!(
            url_identity("https://WWW.Example.com/Path/"),
            url_identity("http://www.example.com/path")
        );
        assert_eq!(
            url_identity("https://example.com/a#section"),
            url_identity("https://example.com/a")
        );
        assert_ne!(
            url_identity("https://example.com/a?page=1"),
            url_identity("https://example.com/a?page=2")
        );
    }

    #[test]
    fn test_url_identity_for_unparseable_input() {
        assert_eq!(url_identity("Example.com/Foo/"), "example.com/foo");
    }

    #[test]
    fn test_record_id_is_stable() {
        let a = CanonicalRecord::new("youtube", "https://youtube.com/@mkbhd");
        let b = CanonicalRecord::new("web", "HTTP://YouTube.com/@MKBHD/");
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.len(), 16);
    }

    #[test]
    fn test_field_treats_blank_as_missing() {
        let record = CanonicalRecord::new("web", "https://a.com")
            .with_field("name", "A")
            .with_field("niche", "  ");
        assert_eq!(record.field("name"), Some("A"));
        assert_eq!(record.field("niche"), None);
    }

    #[test]
    fn test_score_is_clamped() {
        assert_eq!(CanonicalRecord::new("web", "https://a.com").with_score(1.7).relevance_score, 1.0);
    }
}
