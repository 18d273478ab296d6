//! Raw content - what the source fetcher hands to the normalizer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source id for items produced by the search branch.
pub const SEARCH_SOURCE: &str = "search";

/// Source id for items produced by direct page retrieval.
pub const SCRAPE_SOURCE: &str = "scrape";

/// One unit of fetched, unstructured content.
///
/// Appended to [`PipelineState`](crate::types::state::PipelineState) and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawContent {
    /// Which fetch branch produced this item (`search`, `scrape`, ...)
    pub source_id: String,

    /// Page URL (may be empty for provider-level answers)
    pub url: String,

    /// Raw text (markdown, snippet, or plain text)
    pub text: String,

    /// Title if the provider gave one
    #[serde(default)]
    pub title: Option<String>,

    /// When the content was fetched
    pub fetched_at: DateTime<Utc>,
}

impl RawContent {
    /// Create a new content item.
    pub fn new(
        source_id: impl Into<String>,
        url: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            url: url.into(),
            text: text.into(),
            title: None,
            fetched_at: Utc::now(),
        }
    }

    /// Content from a search result.
    pub fn search(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(SEARCH_SOURCE, url, text)
    }

    /// Content from a scraped page.
    pub fn scrape(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(SCRAPE_SOURCE, url, text)
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Check if this item has any text.
    pub fn has_content(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// Lowercased host of the item's URL, if it parses.
    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
    }

    /// Size of this item as rendered into a prompt.
    pub fn prompt_len(&self) -> usize {
        self.url.len() + self.text.len() + self.title.as_ref().map_or(0, |t| t.len())
    }
}
