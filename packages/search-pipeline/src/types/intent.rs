//! Query intent labels and classification results.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classified category of a caller's query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Classification failed or has not run yet
    #[default]
    Unknown,

    /// News, facts, definitions, how-to questions
    GeneralSearch,

    /// Products, prices, reviews, buying advice
    ProductSearch,

    /// Creators, channels and profiles on social platforms
    InfluencerSearch,

    /// Data extraction from specific websites
    WebScraping,

    /// Comparing multiple items, services or options
    Comparison,
}

impl Intent {
    /// Labels the classifier may return (everything except `unknown`).
    pub const CLASSIFIABLE: [Intent; 5] = [
        Intent::GeneralSearch,
        Intent::ProductSearch,
        Intent::InfluencerSearch,
        Intent::WebScraping,
        Intent::Comparison,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::GeneralSearch => "general_search",
            Self::ProductSearch => "product_search",
            Self::InfluencerSearch => "influencer_search",
            Self::WebScraping => "web_scraping",
            Self::Comparison => "comparison",
        }
    }

    /// Parse a label (case-insensitive; spaces and dashes read as underscores).
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase().replace([' ', '-'], "_");
        Self::CLASSIFIABLE
            .into_iter()
            .chain(std::iter::once(Self::Unknown))
            .find(|i| i.as_str() == normalized)
    }

    /// Discovery intents look for things without naming an explicit target.
    pub fn is_discovery(&self) -> bool {
        matches!(
            self,
            Self::GeneralSearch | Self::ProductSearch | Self::InfluencerSearch | Self::Comparison
        )
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,

    /// Confidence in the classification (0.0 to 1.0)
    pub confidence: f32,

    /// Reasoning for the classification
    #[serde(default)]
    pub reasoning: String,

    /// Source types the model thinks are worth targeting
    #[serde(default)]
    pub target_sources: Vec<String>,

    /// Locale inferred from the query, if any
    #[serde(default)]
    pub locale: Option<String>,
}

impl Classification {
    /// The safe default substituted when classification fails.
    pub fn unknown() -> Self {
        Self {
            intent: Intent::Unknown,
            confidence: 0.0,
            reasoning: String::new(),
            target_sources: Vec::new(),
            locale: None,
        }
    }

    /// Whether confidence meets the routing threshold.
    pub fn is_confident(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_round_trip() {
        for intent in Intent::CLASSIFIABLE {
            assert_eq!(Intent::from_label(intent.as_str()), Some(intent));
        }
        assert_eq!(Intent::from_label("Product Search"), Some(Intent::ProductSearch));
        assert_eq!(Intent::from_label("web-scraping"), Some(Intent::WebScraping));
        assert_eq!(Intent::from_label("shopping"), None);
    }

    #[test]
    fn test_discovery_intents() {
        assert!(Intent::InfluencerSearch.is_discovery());
        assert!(Intent::Comparison.is_discovery());
        assert!(!Intent::WebScraping.is_discovery());
        assert!(!Intent::Unknown.is_discovery());
    }

    #[test]
    fn test_unknown_classification() {
        let c = Classification::unknown();
        assert_eq!(c.intent, Intent::Unknown);
        assert_eq!(c.confidence, 0.0);
        assert!(!c.is_confident(0.5));
    }
}
