//! Language translator client.
//!
//! One LLM call per (text, language). Failures never propagate: they become a
//! [`LanguageResult::Error`] so sibling languages in the same task still run.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::language;
use crate::llm::{self, TextGenerator, prompts};

/// Outcome of translating into one language.
///
/// Serialises as `{"translated": "..."}` or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageResult {
    Translated(String),
    Error(String),
}

impl LanguageResult {
    pub fn is_translated(&self) -> bool {
        matches!(self, LanguageResult::Translated(_))
    }
}

#[derive(Clone)]
pub struct Translator {
    generator: Arc<dyn TextGenerator>,
    call_timeout: Duration,
}

impl Translator {
    pub fn new(generator: Arc<dyn TextGenerator>, call_timeout: Duration) -> Self {
        Self { generator, call_timeout }
    }

    /// Translate `text` into the language identified by `code`.
    ///
    /// The model's reply is returned verbatim.
    pub async fn translate(&self, text: &str, code: &str) -> LanguageResult {
        let name = language::display_name(code);
        let prompt = prompts::translation(text, name);
        match llm::generate_within(self.generator.as_ref(), &prompt, self.call_timeout).await {
            Ok(translated) => {
                debug!(language = code, chars = translated.len(), "translation done");
                LanguageResult::Translated(translated)
            }
            Err(e) => {
                warn!(language = code, error = %e, "translation failed");
                LanguageResult::Error(format!("Translation to {name} failed."))
            }
        }
    }
}
