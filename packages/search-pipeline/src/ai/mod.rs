//! Language model implementations.
//!
//! This module provides reference implementations of the `LanguageModel`
//! trait. Users can use these directly or implement their own.

#[cfg(feature = "openai")]
mod openai;

#[cfg(feature = "openai")]
pub use openai::OpenAiModel;
