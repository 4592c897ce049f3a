//! LLM collaborator boundary.
//!
//! Everything that talks to the generation API goes through the
//! [`TextGenerator`] trait: one free-text prompt in, free text out. The
//! production implementation is [`GenAiGenerator`]; tests use
//! `testing::ScriptedGenerator` (behind the `testing` feature).

pub mod prompts;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::time::Duration;

use async_trait::async_trait;
use genai::chat::{ChatMessage, ChatRequest};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::LlmError;

/// A single-prompt text generation backend.
#[async_trait]
pub trait TextGenerator: Send + Sync + 'static {
    /// Send `prompt` and return the model's reply text.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// [`TextGenerator`] backed by the `genai` multi-provider client.
///
/// Credentials are resolved by `genai` from the provider's usual environment
/// variable (`GEMINI_API_KEY` for Gemini models).
pub struct GenAiGenerator {
    client: genai::Client,
    model: String,
}

impl GenAiGenerator {
    pub fn new(model: impl Into<String>) -> Self {
        Self { client: genai::Client::default(), model: model.into() }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for GenAiGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GenAiGenerator({})", self.model)
    }
}

#[async_trait]
impl TextGenerator for GenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let request = ChatRequest::new(vec![ChatMessage::user(prompt)]);
        let response = self
            .client
            .exec_chat(&self.model, request, None)
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;
        let text = response.first_text().ok_or(LlmError::EmptyResponse)?;
        debug!(model = %self.model, prompt_len = prompt.len(), reply_len = text.len(), "generation done");
        Ok(text.to_owned())
    }
}

/// Call `generator` but give up after `timeout`.
pub async fn generate_within(
    generator: &dyn TextGenerator,
    prompt: &str,
    timeout: Duration,
) -> Result<String, LlmError> {
    tokio::time::timeout(timeout, generator.generate(prompt))
        .await
        .map_err(|_| LlmError::Timeout(timeout))?
}

/// Remove Markdown code-fence markers that models like to wrap JSON in.
pub fn strip_code_fences(raw: &str) -> String {
    raw.trim().replace("```json", "").replace("```", "").trim().to_owned()
}

/// Parse a model reply that is supposed to be a JSON document.
pub fn parse_json_reply<T: DeserializeOwned>(raw: &str) -> Result<T, LlmError> {
    Ok(serde_json::from_str(&strip_code_fences(raw))?)
}
