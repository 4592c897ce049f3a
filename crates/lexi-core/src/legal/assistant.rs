use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LlmError;
use crate::llm::{self, TextGenerator, prompts};

/// Number prefixed to every drafted clause; the agreement template already
/// uses 1 to 3.
const DRAFT_CLAUSE_PREFIX: &str = "4.";

/// Result of `/api/demystify`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Demystification {
    pub explanation: String,
    pub mindmap_data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClauseComparison {
    #[serde(default)]
    pub missing_clauses: Vec<serde_json::Value>,
    #[serde(default)]
    pub risky_clauses: Vec<serde_json::Value>,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDate {
    pub date: String,
    pub significance: String,
}

/// Request/response style LLM features. Each call is bounded by the
/// configured per-call timeout.
#[derive(Clone)]
pub struct LegalAssistant {
    generator: Arc<dyn TextGenerator>,
    call_timeout: Duration,
}

impl LegalAssistant {
    pub fn new(generator: Arc<dyn TextGenerator>, call_timeout: Duration) -> Self {
        Self { generator, call_timeout }
    }

    async fn ask(&self, prompt: &str) -> Result<String, LlmError> {
        llm::generate_within(self.generator.as_ref(), prompt, self.call_timeout).await
    }

    /// Plain-language explanation plus a mind map of the main themes.
    pub async fn demystify(&self, text: &str) -> Result<Demystification, LlmError> {
        let explanation_prompt = prompts::explanation(text);
        let mindmap_prompt = prompts::mindmap(text);
        let (explanation, mindmap) = tokio::try_join!(self.ask(&explanation_prompt), self.ask(&mindmap_prompt))?;
        let mindmap_data = llm::parse_json_reply(&mindmap)?;
        Ok(Demystification { explanation, mindmap_data })
    }

    /// Answer `question`, grounded in `document` when the user has one.
    pub async fn chat(&self, question: &str, document: Option<&str>) -> Result<String, LlmError> {
        let prompt = match document {
            Some(document) => prompts::document_chat(document, question),
            None => prompts::general_chat(question),
        };
        debug!(grounded = document.is_some(), "chat question");
        self.ask(&prompt).await
    }

    pub async fn compare_clauses(&self, document: &str) -> Result<ClauseComparison, LlmError> {
        let reply = self.ask(&prompts::clause_comparison(document)).await?;
        llm::parse_json_reply(&reply)
    }

    pub async fn draft_clause(&self, description: &str) -> Result<String, LlmError> {
        let reply = self.ask(&prompts::clause_draft(description)).await?;
        Ok(format!("{DRAFT_CLAUSE_PREFIX} {}", reply.trim()))
    }

    pub async fn key_dates(&self, document: &str) -> Result<Vec<KeyDate>, LlmError> {
        let reply = self.ask(&prompts::key_dates(document)).await?;
        llm::parse_json_reply(&reply)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::llm::testing::ScriptedGenerator;

    fn assistant(generator: ScriptedGenerator) -> LegalAssistant {
        LegalAssistant::new(Arc::new(generator), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn demystify_parses_fenced_mindmap() {
        let generator = ScriptedGenerator::new("The tenant must pay on time.")
            .reply_when("mind map", "```json\n{\"title\": \"Lease\", \"children\": [{\"title\": \"Rent\"}]}\n```");
        let result = assistant(generator).demystify("Rent is due monthly.").await.unwrap();
        assert_eq!(result.explanation, "The tenant must pay on time.");
        assert_eq!(result.mindmap_data["children"][0]["title"], "Rent");
    }

    #[tokio::test]
    async fn demystify_fails_on_prose_mindmap() {
        let generator = ScriptedGenerator::new("ok").reply_when("mind map", "Here are the themes: rent, deposit");
        let err = assistant(generator).demystify("x").await.unwrap_err();
        assert!(matches!(err, LlmError::MalformedJson(_)));
    }

    #[tokio::test]
    async fn chat_picks_prompt_by_context() {
        let generator = Arc::new(ScriptedGenerator::new("answer"));
        let assistant = LegalAssistant::new(generator.clone(), Duration::from_secs(5));
        assistant.chat("When is rent due?", Some("Rent is due on the 5th.")).await.unwrap();
        assistant.chat("Is a verbal lease valid?", None).await.unwrap();

        let prompts = generator.prompts();
        assert!(prompts[0].contains("DOCUMENT CONTEXT"));
        assert!(prompts[1].contains(prompts::CHAT_DISCLAIMER));
    }

    #[tokio::test]
    async fn drafted_clause_is_numbered() {
        let generator = ScriptedGenerator::new("  Pets are permitted with written consent.\n");
        let clause = assistant(generator).draft_clause("allow pets").await.unwrap();
        assert_eq!(clause, "4. Pets are permitted with written consent.");
    }

    #[tokio::test]
    async fn clause_comparison_tolerates_missing_keys() {
        let generator = ScriptedGenerator::new("{\"missing_clauses\": [\"Notice period\"], \"summary\": \"Thin.\"}");
        let result = assistant(generator).compare_clauses("Rent: 10000").await.unwrap();
        assert_eq!(result.missing_clauses, vec![serde_json::json!("Notice period")]);
        assert!(result.risky_clauses.is_empty());
        assert_eq!(result.summary, "Thin.");
    }

    #[tokio::test]
    async fn key_dates_are_parsed() {
        let generator = ScriptedGenerator::new(
            "```json\n[{\"date\": \"2024-04-01\", \"significance\": \"Agreement Start Date\"}]\n```",
        );
        let dates = assistant(generator).key_dates("Starts 1 April 2024").await.unwrap();
        assert_eq!(dates, vec![KeyDate { date: "2024-04-01".into(), significance: "Agreement Start Date".into() }]);
    }
}
