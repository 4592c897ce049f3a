//! Shared application state injected into every Axum handler, and the
//! wiring of task backends from [`Config`].

use std::sync::Arc;

use anyhow::Context;
use lexi_core::speech::{CachedSpeech, SpeechSynthesizer};
use lexi_core::{
    Dispatcher, DocumentContextStore, HistoryStore, InProcessScheduler, LegalAssistant, MemoryHistoryStore,
    MemoryTaskStore, QueueScheduler, QueueWorker, Scheduler, SqlHistoryStore, SqlTaskStore, TaskRunner, TaskStore,
    TextGenerator, Translator,
};
use sqlx::SqlitePool;
use tracing::info;

use crate::config::{Config, TaskBackendKind};

/// Task stores plus the runner that writes to them.
///
/// In-process mode keeps everything in memory; queue mode shares the SQLite
/// database with any number of `lexi-server worker` processes.
pub struct TaskServices {
    pub store: Arc<dyn TaskStore>,
    pub history: Arc<dyn HistoryStore>,
    pub runner: Arc<TaskRunner>,
    pub pool: Option<SqlitePool>,
}

impl TaskServices {
    pub async fn open(cfg: &Config, kind: TaskBackendKind, generator: Arc<dyn TextGenerator>) -> anyhow::Result<Self> {
        let (store, history, pool): (Arc<dyn TaskStore>, Arc<dyn HistoryStore>, _) = match kind {
            TaskBackendKind::InProcess => (
                Arc::new(MemoryTaskStore::new(cfg.max_tasks)),
                Arc::new(MemoryHistoryStore::new(cfg.max_history_per_user)),
                None,
            ),
            TaskBackendKind::Queue => {
                let pool = lexi_core::connect_database(&cfg.database_url)
                    .await
                    .with_context(|| format!("opening database {}", cfg.database_url))?;
                info!(database_url = %cfg.database_url, "database ready");
                (
                    Arc::new(SqlTaskStore::new(pool.clone())),
                    Arc::new(SqlHistoryStore::new(pool.clone(), cfg.max_history_per_user)),
                    Some(pool),
                )
            }
        };

        let translator = Translator::new(generator, cfg.llm_timeout);
        let runner = TaskRunner::new(translator, Arc::clone(&store), Arc::clone(&history), cfg.task_timeout)
            .with_concurrency(cfg.translate_concurrency);
        Ok(Self { store, history, runner: Arc::new(runner), pool })
    }

    /// A queue worker over this backend's database, if it has one.
    pub fn worker(&self, cfg: &Config) -> Option<QueueWorker> {
        self.pool.as_ref().map(|pool| {
            QueueWorker::new(pool.clone(), Arc::clone(&self.runner))
                .with_poll_interval(cfg.worker_poll_interval)
                .with_stale_after(cfg.worker_stale_after)
        })
    }
}

/// State shared across all HTTP handlers.
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    pub dispatcher: Dispatcher,
    pub tasks: Arc<dyn TaskStore>,
    pub history: Arc<dyn HistoryStore>,
    /// Per-user document used to ground chat answers.
    pub contexts: DocumentContextStore,
    pub assistant: LegalAssistant,
    pub speech: CachedSpeech,
    /// Present in in-process mode so shutdown can drain running tasks.
    pub in_process: Option<Arc<InProcessScheduler>>,
    /// Queue database, checked by the health endpoint.
    pub pool: Option<SqlitePool>,
    /// Name of the active task scheduler.
    pub task_backend: &'static str,
}

impl AppState {
    pub fn new(
        config: Config,
        services: &TaskServices,
        generator: Arc<dyn TextGenerator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        let (scheduler, in_process): (Arc<dyn Scheduler>, _) = match &services.pool {
            Some(pool) => (Arc::new(QueueScheduler::new(pool.clone())), None),
            None => {
                let scheduler = Arc::new(InProcessScheduler::new(Arc::clone(&services.runner)));
                (scheduler.clone(), Some(scheduler))
            }
        };
        let task_backend = scheduler.name();
        info!(backend = task_backend, "task scheduler ready");

        Self {
            dispatcher: Dispatcher::new(Arc::clone(&services.store), scheduler),
            tasks: Arc::clone(&services.store),
            history: Arc::clone(&services.history),
            contexts: DocumentContextStore::new(),
            assistant: LegalAssistant::new(generator, config.llm_timeout),
            speech: CachedSpeech::new(synthesizer, config.tts_cache_dir.clone()),
            in_process,
            pool: services.pool.clone(),
            task_backend,
            config: Arc::new(config),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("task_backend", &self.task_backend)
            .field("in_process", &self.in_process)
            .finish_non_exhaustive()
    }
}
