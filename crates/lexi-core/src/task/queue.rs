//! Durable job queue on SQLite.
//!
//! The `jobs` table is the broker: [`QueueScheduler`] inserts a row per task,
//! [`QueueWorker`]s claim rows atomically, run them, and delete them once the
//! terminal record is stored. A claim older than `stale_after` is assumed to
//! belong to a dead worker and is put back in the queue.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{Scheduler, TaskRunner, TranslationContent, TranslationJob, db_timestamp};
use crate::error::{DispatchError, StoreError};

/// Publishes jobs to the `jobs` table.
#[derive(Debug, Clone)]
pub struct QueueScheduler {
    pool: SqlitePool,
}

impl QueueScheduler {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn enqueue(&self, job: &TranslationJob) -> Result<(), StoreError> {
        let (content, filename) = match &job.content {
            TranslationContent::Text(text) => (text.as_bytes().to_vec(), None),
            TranslationContent::File { bytes, filename } => (bytes.to_vec(), Some(filename.as_str())),
        };
        sqlx::query(
            "INSERT INTO jobs (task_id, user_id, content, filename, languages, is_file, state, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'queued', ?7)",
        )
        .bind(&job.task_id)
        .bind(&job.user)
        .bind(content)
        .bind(filename)
        .bind(serde_json::to_string(&job.languages)?)
        .bind(job.is_file())
        .bind(db_timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Scheduler for QueueScheduler {
    async fn schedule(&self, job: TranslationJob) -> Result<(), DispatchError> {
        self.enqueue(&job).await.map_err(|e| DispatchError::Schedule(e.to_string()))?;
        debug!(task_id = %job.task_id, "job queued");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "queue"
    }
}

type JobRow = (String, String, Vec<u8>, Option<String>, String, bool);

/// Consumes the `jobs` table one job at a time.
pub struct QueueWorker {
    pool: SqlitePool,
    runner: Arc<TaskRunner>,
    worker_id: String,
    poll_interval: Duration,
    stale_after: Duration,
}

impl QueueWorker {
    pub fn new(pool: SqlitePool, runner: Arc<TaskRunner>) -> Self {
        Self {
            pool,
            runner,
            worker_id: format!("worker-{}", uuid::Uuid::new_v4()),
            poll_interval: Duration::from_millis(500),
            stale_after: Duration::from_secs(600),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// How long a claim may stay unfinished before another worker takes over.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Atomically claim the oldest queued job, if any.
    pub async fn claim_next(&self) -> Result<Option<TranslationJob>, StoreError> {
        let row: Option<JobRow> = sqlx::query_as(
            "UPDATE jobs SET state = 'claimed', claimed_by = ?1, claimed_at = ?2 \
             WHERE task_id = (SELECT task_id FROM jobs WHERE state = 'queued' ORDER BY created_at LIMIT 1) \
             RETURNING task_id, user_id, content, filename, languages, is_file",
        )
        .bind(&self.worker_id)
        .bind(db_timestamp(Utc::now()))
        .fetch_optional(&self.pool)
        .await?;

        let Some((task_id, user, content, filename, languages, is_file)) = row else {
            return Ok(None);
        };
        let content = if is_file {
            TranslationContent::File { bytes: Bytes::from(content), filename: filename.unwrap_or_default() }
        } else {
            TranslationContent::Text(String::from_utf8_lossy(&content).into_owned())
        };
        let languages: Vec<String> = serde_json::from_str(&languages)?;
        Ok(Some(TranslationJob { task_id, user, content, languages }))
    }

    /// Put claims older than `stale_after` back in the queue.
    pub async fn requeue_stale(&self) -> Result<u64, StoreError> {
        let stale_after =
            chrono::Duration::from_std(self.stale_after).unwrap_or_else(|_| chrono::Duration::weeks(52));
        let cutoff = Utc::now() - stale_after;
        let outcome = sqlx::query(
            "UPDATE jobs SET state = 'queued', claimed_by = NULL, claimed_at = NULL \
             WHERE state = 'claimed' AND claimed_at < ?1",
        )
        .bind(db_timestamp(cutoff))
        .execute(&self.pool)
        .await?;
        Ok(outcome.rows_affected())
    }

    async fn acknowledge(&self, task_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM jobs WHERE task_id = ?1").bind(task_id).execute(&self.pool).await?;
        Ok(())
    }

    /// Claim and run one job. Returns `false` when the queue was empty.
    pub async fn run_once(&self) -> Result<bool, StoreError> {
        let Some(job) = self.claim_next().await? else {
            return Ok(false);
        };
        let task_id = job.task_id.clone();

        // A redelivered job whose task already finished only needs acking.
        let already_done = matches!(
            self.runner.store().get(&task_id).await?,
            Some(record) if record.status().is_terminal()
        );
        if already_done {
            debug!(task_id = %task_id, "skipping job for finished task");
        } else {
            Arc::clone(&self.runner).run_supervised(job).await;
        }
        self.acknowledge(&task_id).await?;
        Ok(true)
    }

    /// Work until `shutdown` flips to `true`. The job in progress is always
    /// finished before returning.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(worker_id = %self.worker_id, "queue worker started");
        match self.requeue_stale().await {
            Ok(0) => {}
            Ok(n) => warn!(count = n, "requeued stale jobs"),
            Err(e) => warn!(error = %e, "failed to requeue stale jobs"),
        }

        while !*shutdown.borrow() {
            let idle = match self.run_once().await {
                Ok(true) => false,
                Ok(false) => true,
                Err(e) => {
                    warn!(error = %e, "queue poll failed");
                    true
                }
            };
            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => {
                        if let Err(e) = self.requeue_stale().await {
                            warn!(error = %e, "failed to requeue stale jobs");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }
        info!(worker_id = %self.worker_id, "queue worker stopped");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::history::{HistoryStore, SqlHistoryStore};
    use crate::llm::testing::ScriptedGenerator;
    use crate::task::{Dispatcher, SqlTaskStore, TaskResult, TaskStatus, TaskStore};
    use crate::translate::Translator;

    struct Setup {
        pool: SqlitePool,
        store: Arc<SqlTaskStore>,
        history: Arc<SqlHistoryStore>,
        dispatcher: Dispatcher,
        runner: Arc<TaskRunner>,
    }

    async fn setup() -> Setup {
        let pool = crate::connect_database("sqlite::memory:").await.unwrap();
        let store = Arc::new(SqlTaskStore::new(pool.clone()));
        let history = Arc::new(SqlHistoryStore::new(pool.clone(), 0));
        let runner = Arc::new(TaskRunner::new(
            Translator::new(Arc::new(ScriptedGenerator::new("Hallo")), Duration::from_secs(5)),
            store.clone(),
            history.clone(),
            Duration::from_secs(5),
        ));
        let dispatcher = Dispatcher::new(store.clone(), Arc::new(QueueScheduler::new(pool.clone())));
        Setup { pool, store, history, dispatcher, runner }
    }

    async fn queued_jobs(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM jobs").fetch_one(pool).await.unwrap()
    }

    #[tokio::test]
    async fn job_round_trips_through_the_queue() {
        let s = setup().await;
        let content = TranslationContent::File { bytes: Bytes::from_static(b"Deposit: two months"), filename: "d.txt".into() };
        let id = s.dispatcher.dispatch("asha", content.clone(), vec!["de".into()]).await.unwrap();
        assert_eq!(s.store.get(&id).await.unwrap().unwrap().status(), TaskStatus::Processing);

        let worker = QueueWorker::new(s.pool.clone(), s.runner.clone());
        let job = worker.claim_next().await.unwrap().unwrap();
        assert_eq!(job.task_id, id);
        assert_eq!(job.user, "asha");
        assert_eq!(job.content, content);
        assert_eq!(job.languages, vec!["de".to_owned()]);
        assert!(worker.claim_next().await.unwrap().is_none(), "claimed job is not handed out twice");
    }

    #[tokio::test]
    async fn worker_completes_and_acknowledges() {
        let s = setup().await;
        let id = s.dispatcher.dispatch("asha", TranslationContent::Text("Hello".into()), vec!["de".into()]).await.unwrap();

        let worker = QueueWorker::new(s.pool.clone(), s.runner.clone());
        assert!(worker.run_once().await.unwrap());
        assert!(!worker.run_once().await.unwrap());

        let record = s.store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.status(), TaskStatus::Completed);
        assert_eq!(queued_jobs(&s.pool).await, 0);
        assert_eq!(s.history.list("asha").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stale_claims_are_requeued() {
        let s = setup().await;
        s.dispatcher.dispatch("asha", TranslationContent::Text("x".into()), vec!["fr".into()]).await.unwrap();

        let crashed = QueueWorker::new(s.pool.clone(), s.runner.clone()).with_stale_after(Duration::ZERO);
        assert!(crashed.claim_next().await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(crashed.requeue_stale().await.unwrap(), 1);
        let rescuer = QueueWorker::new(s.pool.clone(), s.runner.clone());
        assert!(rescuer.claim_next().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn redelivered_finished_task_is_only_acknowledged() {
        let s = setup().await;
        let id = s.dispatcher.dispatch("asha", TranslationContent::Text("x".into()), vec!["fr".into()]).await.unwrap();
        s.store.finish(&id, TaskResult::Error("earlier attempt".into())).await.unwrap();

        let worker = QueueWorker::new(s.pool.clone(), s.runner.clone());
        assert!(worker.run_once().await.unwrap());
        let record = s.store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.result(), Some(&TaskResult::Error("earlier attempt".into())));
        assert!(s.history.list("asha").await.unwrap().is_empty());
        assert_eq!(queued_jobs(&s.pool).await, 0);
    }

    #[tokio::test]
    async fn run_loop_stops_on_shutdown() {
        let s = setup().await;
        let id = s.dispatcher.dispatch("asha", TranslationContent::Text("x".into()), vec!["fr".into()]).await.unwrap();

        let (tx, rx) = watch::channel(false);
        let worker = QueueWorker::new(s.pool.clone(), s.runner.clone()).with_poll_interval(Duration::from_millis(10));
        let handle = tokio::spawn(worker.run(rx));

        let record = s.store.wait(&id).await.unwrap().unwrap();
        assert_eq!(record.status(), TaskStatus::Completed);
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
    }
}
