use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::{TaskRecord, TaskResult, TaskStatus, TaskStore, db_timestamp};
use crate::error::StoreError;

/// SQLite result backend shared by the server and queue workers.
#[derive(Debug, Clone)]
pub struct SqlTaskStore {
    pool: SqlitePool,
}

impl SqlTaskStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|e: chrono::ParseError| {
        tracing::warn!(raw, error = %e, "failed to parse task timestamp; using now");
        Utc::now()
    })
}

#[async_trait]
impl TaskStore for SqlTaskStore {
    async fn register(&self, id: &str) -> Result<TaskRecord, StoreError> {
        let record = TaskRecord::processing(id);
        sqlx::query(
            "INSERT INTO tasks (id, status, result, created_at, updated_at) VALUES (?1, ?2, NULL, ?3, ?4)",
        )
        .bind(record.id())
        .bind(TaskStatus::Processing.as_str())
        .bind(db_timestamp(record.created_at()))
        .bind(db_timestamp(record.updated_at()))
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Option<TaskRecord>, StoreError> {
        let row: Option<(String, String, Option<String>, String, String)> = sqlx::query_as(
            "SELECT id, status, result, created_at, updated_at FROM tasks WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((id, status, result, created_at, updated_at)) = row else {
            return Ok(None);
        };
        let result = match result {
            Some(raw) => Some(serde_json::from_str::<TaskResult>(&raw)?),
            None => None,
        };
        let derived = result.as_ref().map(TaskResult::status).unwrap_or(TaskStatus::Processing);
        if derived.as_str() != status {
            tracing::warn!(task_id = %id, status, %derived, "stored status disagrees with stored result");
        }
        Ok(Some(TaskRecord::from_parts(id, result, parse_timestamp(&created_at), parse_timestamp(&updated_at))))
    }

    async fn finish(&self, id: &str, result: TaskResult) -> Result<bool, StoreError> {
        let payload = serde_json::to_string(&result)?;
        let outcome = sqlx::query(
            "UPDATE tasks SET status = ?1, result = ?2, updated_at = ?3 \
             WHERE id = ?4 AND status = 'processing'",
        )
        .bind(result.status().as_str())
        .bind(payload)
        .bind(db_timestamp(Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(outcome.rows_affected() == 1)
    }
}
