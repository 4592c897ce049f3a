use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, stream};
use tracing::{Instrument, error, info, info_span, warn};

use super::{TaskId, TaskResult, TaskStore, TranslationContent, TranslationJob};
use crate::error::ExtractError;
use crate::extract::extract_text_blocking;
use crate::history::{HistoryEntry, HistoryStore};
use crate::translate::{LanguageResult, Translator};

/// Error stored when a runner dies without producing a result.
pub const UNEXPECTED_FAILURE: &str = "Translation task failed unexpectedly.";

/// Activity type recorded in the history for translation tasks.
const HISTORY_TYPE: &str = "Translation";

/// Executes [`TranslationJob`]s: extract, translate every language, record
/// history, then write the terminal record.
pub struct TaskRunner {
    translator: Translator,
    store: Arc<dyn TaskStore>,
    history: Arc<dyn HistoryStore>,
    task_timeout: Duration,
    concurrency: usize,
}

impl TaskRunner {
    pub fn new(
        translator: Translator,
        store: Arc<dyn TaskStore>,
        history: Arc<dyn HistoryStore>,
        task_timeout: Duration,
    ) -> Self {
        Self { translator, store, history, task_timeout, concurrency: 4 }
    }

    /// Upper bound on concurrent per-language calls within one task.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// Run `job` on its own tokio task and make sure it ends terminal.
    ///
    /// A panic inside the runner is turned into a failed record carrying
    /// [`UNEXPECTED_FAILURE`].
    pub async fn run_supervised(self: Arc<Self>, job: TranslationJob) {
        let task_id = job.task_id.clone();
        let worker = tokio::spawn({
            let runner = Arc::clone(&self);
            async move { runner.run(job).await }
        });
        if let Err(e) = worker.await {
            error!(task_id = %task_id, error = %e, "translation task aborted");
            self.finish(&task_id, TaskResult::Error(UNEXPECTED_FAILURE.to_owned())).await;
        }
    }

    /// Execute `job` inline and write its terminal record.
    pub async fn run(&self, job: TranslationJob) {
        let span = info_span!(
            "translation_task",
            task_id = %job.task_id,
            user = %job.user,
            languages = job.languages.len(),
            is_file = job.is_file(),
        );
        async {
            info!("translation task started");
            let result = match tokio::time::timeout(self.task_timeout, self.execute(&job)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(timeout_secs = self.task_timeout.as_secs(), "translation task timed out");
                    TaskResult::Error(format!(
                        "Translation timed out after {} seconds.",
                        self.task_timeout.as_secs()
                    ))
                }
            };
            self.finish(&job.task_id, result).await;
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, job: &TranslationJob) -> TaskResult {
        let text = match &job.content {
            TranslationContent::Text(text) => text.clone(),
            TranslationContent::File { bytes, filename } => {
                match extract_text_blocking(bytes.clone(), filename.clone()).await {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(filename = %filename, error = ?e, "extraction failed");
                        return TaskResult::Error(extraction_failure(&e));
                    }
                }
            }
        };

        let translations = self.translate_all(&text, &job.languages).await;
        let result = TaskResult::Translations(translations);
        self.record_history(&job.user, &text, &result).await;
        result
    }

    async fn translate_all(&self, text: &str, languages: &[String]) -> BTreeMap<String, LanguageResult> {
        let translator = self.translator.clone();
        let text: Arc<str> = Arc::from(text);
        stream::iter(languages.to_vec())
            .map(move |code| {
                let translator = translator.clone();
                let text = Arc::clone(&text);
                async move {
                    let result = translator.translate(&text, &code).await;
                    (code, result)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }

    async fn record_history(&self, user: &str, text: &str, result: &TaskResult) {
        let value = match serde_json::to_value(result) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "could not serialise task result for history");
                return;
            }
        };
        if let Err(e) = self.history.record(user, HistoryEntry::new(HISTORY_TYPE, text, Some(value))).await {
            warn!(error = %e, "failed to record translation history");
        }
    }

    async fn finish(&self, task_id: &TaskId, result: TaskResult) {
        let status = result.status();
        match self.store.finish(task_id, result).await {
            Ok(true) => info!(task_id = %task_id, %status, "translation task finished"),
            Ok(false) => warn!(task_id = %task_id, "task was already terminal; result dropped"),
            Err(e) => error!(task_id = %task_id, error = %e, "failed to store task result"),
        }
    }
}

/// Message stored for a failed extraction. Document problems are reported
/// as-is; a dead extraction worker is an internal fault.
fn extraction_failure(e: &ExtractError) -> String {
    match e {
        ExtractError::Interrupted { .. } => UNEXPECTED_FAILURE.to_owned(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod test {
    use bytes::Bytes;
    use tracing_test::traced_test;

    use super::*;
    use crate::history::MemoryHistoryStore;
    use crate::llm::testing::ScriptedGenerator;
    use crate::task::{MemoryTaskStore, TaskStatus};

    struct Harness {
        runner: Arc<TaskRunner>,
        store: Arc<MemoryTaskStore>,
        history: Arc<MemoryHistoryStore>,
    }

    fn harness(generator: ScriptedGenerator, task_timeout: Duration) -> Harness {
        let store = Arc::new(MemoryTaskStore::default());
        let history = Arc::new(MemoryHistoryStore::new(0));
        let translator = Translator::new(Arc::new(generator), Duration::from_secs(5));
        let runner = TaskRunner::new(translator, store.clone(), history.clone(), task_timeout);
        Harness { runner: Arc::new(runner), store, history }
    }

    fn job(id: &str, content: TranslationContent, languages: &[&str]) -> TranslationJob {
        TranslationJob {
            task_id: id.to_owned(),
            user: "asha".to_owned(),
            content,
            languages: languages.iter().map(|l| l.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn every_language_gets_an_entry() {
        let h = harness(ScriptedGenerator::new("ok").fail_when("Japanese"), Duration::from_secs(5));
        h.store.register("t1").await.unwrap();
        h.runner.run(job("t1", TranslationContent::Text("Rent is due.".into()), &["fr", "ja", "hi"])).await;

        let record = h.store.get("t1").await.unwrap().unwrap();
        assert_eq!(record.status(), TaskStatus::Completed);
        let Some(TaskResult::Translations(map)) = record.result() else { panic!("expected translations") };
        assert_eq!(map.len(), 3);
        assert!(map["fr"].is_translated());
        assert!(map["hi"].is_translated());
        assert_eq!(map["ja"], LanguageResult::Error("Translation to Japanese failed.".into()));
    }

    #[tokio::test]
    async fn unsupported_file_fails_without_history() {
        let h = harness(ScriptedGenerator::new("ok"), Duration::from_secs(5));
        h.store.register("t1").await.unwrap();
        let content = TranslationContent::File { bytes: Bytes::from_static(b"PK.."), filename: "lease.docx".into() };
        h.runner.run(job("t1", content, &["fr"])).await;

        let record = h.store.get("t1").await.unwrap().unwrap();
        assert_eq!(record.status(), TaskStatus::Failed);
        assert_eq!(record.result(), Some(&TaskResult::Error("Unsupported file type.".into())));
        assert!(h.history.list("asha").await.unwrap().is_empty());
    }

    #[test]
    fn interrupted_extraction_stores_the_generic_failure() {
        let interrupted = ExtractError::Interrupted { detail: "task 7 panicked".into() };
        assert_eq!(extraction_failure(&interrupted), UNEXPECTED_FAILURE);
        let decode = ExtractError::DecodeError { detail: "bad xref".into() };
        assert_eq!(extraction_failure(&decode), "Failed to process the file.");
        assert_eq!(extraction_failure(&ExtractError::NoTextFound), "Could not extract any text from the document.");
    }

    #[tokio::test]
    async fn history_is_written_before_completion_is_visible() {
        let h = harness(ScriptedGenerator::new("Hola"), Duration::from_secs(5));
        h.store.register("t1").await.unwrap();
        h.runner.run(job("t1", TranslationContent::Text("Hello".into()), &["es"])).await;

        let history = h.history.list("asha").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].activity_type, "Translation");
        assert_eq!(history[0].content_preview, "Hello");
        assert_eq!(history[0].result.as_ref().unwrap()["translations"]["es"]["translated"], "Hola");
    }

    #[tokio::test]
    async fn text_file_is_extracted_first() {
        let generator = Arc::new(ScriptedGenerator::new("Bonjour"));
        let store = Arc::new(MemoryTaskStore::default());
        let history = Arc::new(MemoryHistoryStore::new(0));
        let runner = TaskRunner::new(
            Translator::new(generator.clone(), Duration::from_secs(5)),
            store.clone(),
            history,
            Duration::from_secs(5),
        );
        store.register("t1").await.unwrap();
        let content = TranslationContent::File { bytes: Bytes::from_static(b"Notice period: 30 days"), filename: "n.TXT".into() };
        runner.run(job("t1", content, &["fr"])).await;

        assert_eq!(store.get("t1").await.unwrap().unwrap().status(), TaskStatus::Completed);
        assert!(generator.prompts()[0].ends_with("Notice period: 30 days"));
    }

    #[tokio::test]
    #[traced_test]
    async fn slow_task_times_out_as_failed() {
        let generator = ScriptedGenerator::new("late").with_delay(Duration::from_millis(300));
        let h = harness(generator, Duration::from_millis(20));
        h.store.register("t1").await.unwrap();
        h.runner.run(job("t1", TranslationContent::Text("x".into()), &["fr"])).await;

        let record = h.store.get("t1").await.unwrap().unwrap();
        assert_eq!(record.status(), TaskStatus::Failed);
        assert!(logs_contain("translation task timed out"));
    }

    #[tokio::test]
    #[traced_test]
    async fn panicking_runner_is_recorded_as_failed() {
        let h = harness(ScriptedGenerator::new("ok").panic_when("French"), Duration::from_secs(5));
        h.store.register("t1").await.unwrap();
        Arc::clone(&h.runner).run_supervised(job("t1", TranslationContent::Text("x".into()), &["fr"])).await;

        let record = h.store.get("t1").await.unwrap().unwrap();
        assert_eq!(record.status(), TaskStatus::Failed);
        assert_eq!(record.result(), Some(&TaskResult::Error(UNEXPECTED_FAILURE.into())));
        assert!(logs_contain("translation task aborted"));
    }
}
