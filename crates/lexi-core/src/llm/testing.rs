//! Deterministic [`TextGenerator`] for tests and offline development.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::TextGenerator;
use crate::error::LlmError;

enum Rule {
    Reply { needle: String, reply: String },
    Fail { needle: String },
    Panic { needle: String },
}

/// Replies from a script: the first rule whose needle occurs in the prompt
/// wins, otherwise the default reply is returned.
pub struct ScriptedGenerator {
    default_reply: String,
    rules: Vec<Rule>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(default_reply: impl Into<String>) -> Self {
        Self {
            default_reply: default_reply.into(),
            rules: Vec::new(),
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `reply` whenever the prompt contains `needle`.
    pub fn reply_when(mut self, needle: impl Into<String>, reply: impl Into<String>) -> Self {
        self.rules.push(Rule::Reply { needle: needle.into(), reply: reply.into() });
        self
    }

    /// Fail whenever the prompt contains `needle`.
    pub fn fail_when(mut self, needle: impl Into<String>) -> Self {
        self.rules.push(Rule::Fail { needle: needle.into() });
        self
    }

    /// Panic whenever the prompt contains `needle`, simulating a crashing
    /// backend.
    pub fn panic_when(mut self, needle: impl Into<String>) -> Self {
        self.rules.push(Rule::Panic { needle: needle.into() });
        self
    }

    /// Sleep before answering every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_owned());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        for rule in &self.rules {
            match rule {
                Rule::Reply { needle, reply } if prompt.contains(needle.as_str()) => {
                    return Ok(reply.clone());
                }
                Rule::Fail { needle } if prompt.contains(needle.as_str()) => {
                    return Err(LlmError::Request(format!("scripted failure for '{needle}'")));
                }
                Rule::Panic { needle } if prompt.contains(needle.as_str()) => {
                    panic!("scripted panic for '{needle}'");
                }
                _ => {}
            }
        }
        Ok(self.default_reply.clone())
    }
}
