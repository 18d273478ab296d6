//! OpenAI implementation of the language model trait.
//!
//! Uses chat completions with the `json_schema` response format in strict
//! mode, so well-behaved responses already match the record schema.
//!
//! # Example
//!
//! ```rust,ignore
//! use search_pipeline::ai::OpenAiModel;
//!
//! let model = OpenAiModel::from_env()?.with_model("gpt-4o-mini");
//! let pipeline = Pipeline::new(model, fetcher, PipelineConfig::default())?;
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{ExtractionError, ExtractionResult};
use crate::security::ProviderCredentials;
use crate::traits::model::{LanguageModel, StructuredRequest};

const OPENAI_API_URL: &str = "https://api.openai.com/v1";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat<'a>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'a str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    strict: bool,
    schema: &'a serde_json::Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

/// OpenAI-backed language model.
///
/// Temperature is pinned to 0 so identical prompts give the pipeline the
/// most stable output the provider offers.
#[derive(Clone)]
pub struct OpenAiModel {
    client: Client,
    credentials: ProviderCredentials,
    model: String,
    max_tokens: u32,
}

impl OpenAiModel {
    pub fn new(credentials: ProviderCredentials) -> Self {
        Self {
            client: Client::new(),
            credentials,
            model: "gpt-4o".to_string(),
            max_tokens: 4096,
        }
    }

    /// Create from the `OPENAI_API_KEY` environment variable.
    ///
    /// `OPENAI_BASE_URL` overrides the endpoint (Azure, proxies, ...).
    pub fn from_env() -> ExtractionResult<Self> {
        let credentials = ProviderCredentials::from_env("OPENAI_API_KEY")
            .ok_or_else(|| ExtractionError::Provider("OPENAI_API_KEY not set".into()))?;
        let credentials = match std::env::var("OPENAI_BASE_URL") {
            Ok(url) if !url.trim().is_empty() => credentials.with_base_url(url),
            _ => credentials,
        };
        Ok(Self::new(credentials))
    }

    /// Set the chat model (default: gpt-4o).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Get the current model name.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    async fn generate_structured(&self, request: &StructuredRequest) -> ExtractionResult<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: 0.0,
            max_tokens: self.max_tokens,
            response_format: ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: &request.schema_name,
                    strict: true,
                    schema: &request.schema,
                },
            },
        };

        let url = format!(
            "{}/chat/completions",
            self.credentials.base_url_or(OPENAI_API_URL)
        );
        let response = self
            .client
            .post(url)
            .header("Authorization", self.credentials.bearer())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ExtractionError::Provider(Box::new(e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Provider(
                format!("OpenAI API error ({status}): {error_text}").into(),
            ));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::Provider(Box::new(e)))?;

        let message = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| ExtractionError::Provider("No response from OpenAI".into()))?;

        if let Some(refusal) = message.refusal {
            return Err(ExtractionError::schema(format!("model refused: {refusal}")));
        }
        message
            .content
            .ok_or_else(|| ExtractionError::schema("empty response content"))
    }
}
