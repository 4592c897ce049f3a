use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::{TaskId, TaskResult, TaskRunner, TaskStore, TranslationContent, TranslationJob};
use crate::error::DispatchError;

/// Error stored when a registered task could not be handed to its backend.
pub const SCHEDULE_FAILURE: &str = "Translation task could not be started.";

/// Hands a registered job to something that will eventually run it.
#[async_trait]
pub trait Scheduler: Send + Sync + 'static {
    /// Accept `job` for execution. Must not wait for the job to finish.
    async fn schedule(&self, job: TranslationJob) -> Result<(), DispatchError>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Runs jobs as supervised tokio tasks inside the current process.
pub struct InProcessScheduler {
    runner: Arc<TaskRunner>,
    in_flight: Arc<AtomicUsize>,
}

impl InProcessScheduler {
    pub fn new(runner: Arc<TaskRunner>) -> Self {
        Self { runner, in_flight: Arc::new(AtomicUsize::new(0)) }
    }

    /// Number of jobs spawned but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait up to `timeout` for in-flight jobs to finish. Returns the number
    /// still running when giving up.
    pub async fn drain(&self, timeout: Duration) -> usize {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.in_flight() > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.in_flight()
    }
}

impl std::fmt::Debug for InProcessScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InProcessScheduler({} in flight)", self.in_flight())
    }
}

#[async_trait]
impl Scheduler for InProcessScheduler {
    async fn schedule(&self, job: TranslationJob) -> Result<(), DispatchError> {
        let runner = Arc::clone(&self.runner);
        let in_flight = Arc::clone(&self.in_flight);
        in_flight.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            runner.run_supervised(job).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "inprocess"
    }
}

/// Entry point used by the HTTP layer to start translation tasks.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn TaskStore>,
    scheduler: Arc<dyn Scheduler>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn TaskStore>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self { store, scheduler }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// Register a new task and schedule it; returns as soon as the
    /// `processing` record exists.
    ///
    /// Language codes are trimmed and de-duplicated (first occurrence wins)
    /// so the result holds exactly one entry per distinct code.
    pub async fn dispatch(
        &self,
        user: &str,
        content: TranslationContent,
        languages: Vec<String>,
    ) -> Result<TaskId, DispatchError> {
        let languages = normalize_languages(languages);
        if content.is_empty() || languages.is_empty() {
            return Err(DispatchError::MissingContent);
        }

        let task_id = uuid::Uuid::new_v4().to_string();
        self.store.register(&task_id).await?;

        let job = TranslationJob { task_id: task_id.clone(), user: user.to_owned(), content, languages };
        let languages = job.languages.len();
        let is_file = job.is_file();
        if let Err(e) = self.scheduler.schedule(job).await {
            error!(task_id = %task_id, backend = self.scheduler.name(), error = %e, "failed to schedule task");
            let failed = TaskResult::Error(SCHEDULE_FAILURE.to_owned());
            if let Err(store_err) = self.store.finish(&task_id, failed).await {
                warn!(task_id = %task_id, error = %store_err, "could not mark unscheduled task as failed");
            }
            return Err(e);
        }

        info!(task_id = %task_id, user, languages, is_file, backend = self.scheduler.name(), "translation task dispatched");
        Ok(task_id)
    }
}

fn normalize_languages(languages: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(languages.len());
    for code in languages {
        let code = code.trim();
        if !code.is_empty() && !seen.iter().any(|c: &String| c == code) {
            seen.push(code.to_owned());
        }
    }
    seen
}
