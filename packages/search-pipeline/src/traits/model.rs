//! Language model trait - the black box behind the structured extractor.
//!
//! The pipeline assumes nothing about the provider beyond this contract:
//! a prompt and a JSON schema go in, raw text (hopefully JSON) comes out.
//! Parsing, validation and repair live in [`crate::extractor`].

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ExtractionResult;

/// One structured-output request.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredRequest {
    /// Schema name (providers use it to label the response format)
    pub schema_name: String,

    /// System prompt
    pub system: String,

    /// User prompt with the content to process
    pub user: String,

    /// JSON schema the response should satisfy
    pub schema: serde_json::Value,
}

/// Language model capable of schema-guided generation.
///
/// # Implementations
///
/// - `OpenAiModel` - OpenAI chat completions (feature `openai`)
/// - `MockModel` - For testing
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a response for the request.
    ///
    /// Returns the raw response text. A single round trip; no retries.
    async fn generate_structured(&self, request: &StructuredRequest) -> ExtractionResult<String>;
}

#[async_trait]
impl<M: LanguageModel + ?Sized> LanguageModel for Arc<M> {
    async fn generate_structured(&self, request: &StructuredRequest) -> ExtractionResult<String> {
        (**self).generate_structured(request).await
    }
}
