//! Asynchronous translation tasks.
//!
//! Flow: [`Dispatcher`] validates a request, registers a `processing`
//! [`TaskRecord`] in a [`TaskStore`] and hands a [`TranslationJob`] to a
//! [`Scheduler`]. Whichever scheduler is configured, the job ends up in
//! [`TaskRunner::run_supervised`], which writes exactly one terminal record.
//!
//! Two interchangeable scheduler backends exist:
//! - [`InProcessScheduler`]: supervised tokio task in the server process.
//! - [`QueueScheduler`]: durable job row consumed by a [`QueueWorker`],
//!   possibly in another process, with results in a [`SqlTaskStore`].

mod dispatch;
mod queue;
mod runner;
mod sql;
mod store;

pub use dispatch::{Dispatcher, InProcessScheduler, SCHEDULE_FAILURE, Scheduler};
pub use queue::{QueueScheduler, QueueWorker};
pub use runner::{TaskRunner, UNEXPECTED_FAILURE};
pub use sql::SqlTaskStore;
pub use store::{MemoryTaskStore, TaskStore};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::translate::LanguageResult;

/// Opaque task identifier (a UUIDv4 string).
pub type TaskId = String;

/// Lifecycle state of a translation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Processing)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(TaskStatus::Processing),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("unknown task status '{other}'")),
        }
    }
}

/// Terminal payload of a task.
///
/// Serialises as `{"translations": {code: {...}}}` for completed tasks and
/// `{"error": "..."}` for tasks that failed before per-language work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskResult {
    Translations(BTreeMap<String, LanguageResult>),
    Error(String),
}

impl TaskResult {
    /// The status a record takes when finished with this result.
    pub fn status(&self) -> TaskStatus {
        match self {
            TaskResult::Translations(_) => TaskStatus::Completed,
            TaskResult::Error(_) => TaskStatus::Failed,
        }
    }
}

/// A task as seen by the status endpoint.
///
/// `result` is `None` exactly while `status` is `processing`; the
/// constructors are the only way to build a record so that invariant holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    id: TaskId,
    status: TaskStatus,
    result: Option<TaskResult>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TaskRecord {
    /// A freshly registered record.
    pub fn processing(id: impl Into<TaskId>) -> Self {
        let now = Utc::now();
        Self { id: id.into(), status: TaskStatus::Processing, result: None, created_at: now, updated_at: now }
    }

    /// Move to the terminal state implied by `result`.
    ///
    /// Returns `false` and leaves the record untouched if it is already
    /// terminal.
    pub fn finish(&mut self, result: TaskResult) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = result.status();
        self.result = Some(result);
        self.updated_at = Utc::now();
        true
    }

    pub(crate) fn from_parts(
        id: TaskId,
        result: Option<TaskResult>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let status = result.as_ref().map(TaskResult::status).unwrap_or(TaskStatus::Processing);
        Self { id, status, result, created_at, updated_at }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn result(&self) -> Option<&TaskResult> {
        self.result.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// What is to be translated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationContent {
    /// Raw text supplied in the request body.
    Text(String),
    /// An uploaded document that still needs extraction.
    File { bytes: Bytes, filename: String },
}

impl TranslationContent {
    pub fn is_file(&self) -> bool {
        matches!(self, TranslationContent::File { .. })
    }

    /// `true` when there is nothing to translate at all.
    pub fn is_empty(&self) -> bool {
        match self {
            TranslationContent::Text(text) => text.is_empty(),
            TranslationContent::File { filename, .. } => filename.is_empty(),
        }
    }
}

/// Everything a runner needs to execute one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationJob {
    pub task_id: TaskId,
    pub user: String,
    pub content: TranslationContent,
    pub languages: Vec<String>,
}

impl TranslationJob {
    pub fn is_file(&self) -> bool {
        self.content.is_file()
    }
}

/// Fixed-width UTC timestamp so that SQL string comparison orders correctly.
pub(crate) fn db_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn new_record_is_processing_without_result() {
        let record = TaskRecord::processing("t1");
        assert_eq!(record.status(), TaskStatus::Processing);
        assert!(record.result().is_none());
    }

    #[test]
    fn finish_happens_once() {
        let mut record = TaskRecord::processing("t1");
        assert!(record.finish(TaskResult::Error("boom".into())));
        assert!(!record.finish(TaskResult::Translations(BTreeMap::new())));
        assert_eq!(record.status(), TaskStatus::Failed);
        assert_eq!(record.result(), Some(&TaskResult::Error("boom".into())));
    }

    #[test]
    fn record_serialises_like_the_status_endpoint() {
        let mut record = TaskRecord::processing("t1");
        let pending = serde_json::to_value(&record).unwrap();
        assert_eq!(pending["status"], "processing");
        assert!(pending["result"].is_null());

        let mut translations = BTreeMap::new();
        translations.insert("fr".to_owned(), LanguageResult::Translated("Bonjour".into()));
        record.finish(TaskResult::Translations(translations));
        let done = serde_json::to_value(&record).unwrap();
        assert_eq!(done["status"], "completed");
        assert_eq!(done["result"]["translations"]["fr"]["translated"], "Bonjour");
    }

    #[test]
    fn status_parses_from_its_own_string() {
        for status in [TaskStatus::Processing, TaskStatus::Completed, TaskStatus::Failed] {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
        assert!("cancelled".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn file_without_name_counts_as_empty() {
        let content = TranslationContent::File { bytes: Bytes::from_static(b"x"), filename: String::new() };
        assert!(content.is_empty());
        assert!(TranslationContent::Text(String::new()).is_empty());
    }
}
