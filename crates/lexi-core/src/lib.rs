//! lexi-core – document handling, LLM orchestration and the translation task
//! subsystem behind the LexiCounsel server.
//!
//! The HTTP layer lives in `lexi-server`; everything here is transport
//! agnostic so the same runner can execute inside the server process or in a
//! queue worker.

pub mod context;
pub mod error;
pub mod extract;
pub mod history;
pub mod language;
pub mod legal;
pub mod llm;
pub mod speech;
pub mod task;
pub mod translate;

pub use context::DocumentContextStore;
pub use error::{DispatchError, DraftError, ExtractError, LlmError, SpeechError, StoreError};
pub use extract::{extract_text, extract_text_blocking};
pub use history::{HistoryEntry, HistoryStore, MemoryHistoryStore, SqlHistoryStore};
pub use legal::{ClauseComparison, Demystification, EstampCheck, KeyDate, LegalAssistant, RentalAgreement, check_estamp};
pub use llm::{GenAiGenerator, TextGenerator};
pub use speech::{CachedSpeech, GoogleTts, SpeechSynthesizer};
pub use task::{
    Dispatcher, InProcessScheduler, MemoryTaskStore, QueueScheduler, QueueWorker, Scheduler,
    SqlTaskStore, TaskId, TaskRecord, TaskResult, TaskRunner, TaskStatus, TaskStore,
    TranslationContent, TranslationJob,
};
pub use translate::{LanguageResult, Translator};

/// Open (or create) the SQLite database at `url` and run pending migrations.
///
/// `url` should be a sqlx-compatible SQLite URL, e.g.
/// `"sqlite://lexi.db?mode=rwc"` or `"sqlite::memory:"` for tests.
pub async fn connect_database(url: &str) -> Result<sqlx::SqlitePool, StoreError> {
    use std::str::FromStr;

    let options = sqlx::sqlite::SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .busy_timeout(std::time::Duration::from_secs(5));
    // An in-memory database only exists per connection, so pin the pool to one.
    let pool_options = if url.contains(":memory:") {
        sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        sqlx::sqlite::SqlitePoolOptions::new().max_connections(8)
    };
    let pool = pool_options.connect_with(options).await?;
    // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}
