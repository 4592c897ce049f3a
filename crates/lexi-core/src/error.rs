//! Error types shared across lexi-core.
//!
//! The `Display` strings of [`ExtractError`] are user facing: they end up
//! verbatim in failed task records and `400` responses.

use std::time::Duration;

use thiserror::Error;

/// Why a document could not be turned into plain text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// Filename missing or not one of the recognised suffixes.
    #[error("Unsupported file type.")]
    UnsupportedFormat,

    /// The payload is not valid UTF-8 text or not a readable PDF.
    #[error("Failed to process the file.")]
    DecodeError { detail: String },

    /// Decoding worked but produced nothing but whitespace.
    #[error("Could not extract any text from the document.")]
    NoTextFound,

    /// The extraction worker panicked or was cancelled.
    #[error("Document processing was interrupted.")]
    Interrupted { detail: String },
}

/// Errors produced while talking to the LLM collaborator.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The provider rejected the call or the transport failed.
    #[error("generation request failed: {0}")]
    Request(String),

    /// The provider answered without any text.
    #[error("generation returned no text")]
    EmptyResponse,

    /// The call did not finish inside its deadline.
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    /// A response that should have been JSON could not be parsed.
    #[error("model returned malformed JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),
}

/// Errors from a task / history store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors returned to the caller of [`crate::task::Dispatcher::dispatch`].
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No text / file, or no target languages.
    #[error("Missing content or languages.")]
    MissingContent,

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The job was registered but could not be handed to a scheduler.
    #[error("failed to schedule task: {0}")]
    Schedule(String),
}

/// Errors from the text-to-speech collaborator or its cache.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech service request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid speech endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("speech service returned HTTP {0}")]
    Status(u16),

    #[error("speech cache I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors while rendering a drafted agreement.
#[derive(Debug, Error)]
pub enum DraftError {
    #[error("pdf rendering failed: {0}")]
    Render(String),
}
