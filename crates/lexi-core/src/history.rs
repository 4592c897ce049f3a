//! Per-user activity history, newest entry first.
//!
//! [`HistoryStore`] is implemented in memory for single-process deployments
//! and on SQLite when a queue worker in another process records entries.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tokio::sync::RwLock;

use crate::error::StoreError;

/// Number of characters of the input kept in [`HistoryEntry::content_preview`].
pub const PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "type")]
    pub activity_type: String,
    pub content_preview: String,
    pub result: Option<serde_json::Value>,
    pub timestamp: String,
}

impl HistoryEntry {
    pub fn new(activity_type: &str, content: &str, result: Option<serde_json::Value>) -> Self {
        Self {
            activity_type: activity_type.to_owned(),
            content_preview: preview(content),
            result,
            timestamp: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        }
    }
}

/// First [`PREVIEW_CHARS`] characters of `content`, with `...` appended when
/// something was cut off.
pub fn preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() { format!("{head}...") } else { head }
}

#[async_trait]
pub trait HistoryStore: Send + Sync + 'static {
    /// Insert a new entry at the front of `user`'s list.
    async fn record(&self, user: &str, entry: HistoryEntry) -> Result<(), StoreError>;

    /// All entries for `user`, newest first.
    async fn list(&self, user: &str) -> Result<Vec<HistoryEntry>, StoreError>;
}

/// In-memory history. `max_per_user == 0` disables the cap.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    inner: RwLock<HashMap<String, VecDeque<HistoryEntry>>>,
    max_per_user: usize,
}

impl MemoryHistoryStore {
    pub fn new(max_per_user: usize) -> Self {
        Self { inner: RwLock::new(HashMap::new()), max_per_user }
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn record(&self, user: &str, entry: HistoryEntry) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        let list = guard.entry(user.to_owned()).or_default();
        list.push_front(entry);
        if self.max_per_user > 0 {
            list.truncate(self.max_per_user);
        }
        Ok(())
    }

    async fn list(&self, user: &str) -> Result<Vec<HistoryEntry>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .get(user)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default())
    }
}

/// SQLite-backed history shared between the server and queue workers.
#[derive(Debug, Clone)]
pub struct SqlHistoryStore {
    pool: SqlitePool,
    max_per_user: usize,
}

impl SqlHistoryStore {
    pub fn new(pool: SqlitePool, max_per_user: usize) -> Self {
        Self { pool, max_per_user }
    }
}

#[async_trait]
impl HistoryStore for SqlHistoryStore {
    async fn record(&self, user: &str, entry: HistoryEntry) -> Result<(), StoreError> {
        let result = entry.result.as_ref().map(serde_json::to_string).transpose()?;
        sqlx::query(
            "INSERT INTO history (user_id, activity_type, content_preview, result, timestamp) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(user)
        .bind(&entry.activity_type)
        .bind(&entry.content_preview)
        .bind(result)
        .bind(&entry.timestamp)
        .execute(&self.pool)
        .await?;

        if self.max_per_user > 0 {
            sqlx::query(
                "DELETE FROM history WHERE user_id = ?1 AND id NOT IN \
                 (SELECT id FROM history WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2)",
            )
            .bind(user)
            .bind(self.max_per_user as i64)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn list(&self, user: &str) -> Result<Vec<HistoryEntry>, StoreError> {
        let rows: Vec<(String, String, Option<String>, String)> = sqlx::query_as(
            "SELECT activity_type, content_preview, result, timestamp \
             FROM history WHERE user_id = ?1 ORDER BY id DESC",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(activity_type, content_preview, result, timestamp)| -> Result<_, StoreError> {
                Ok(HistoryEntry {
                    activity_type,
                    content_preview,
                    result: result
                        .as_deref()
                        .map(serde_json::from_str::<serde_json::Value>)
                        .transpose()?,
                    timestamp,
                })
            })
            .collect()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn short_content_is_not_truncated() {
        assert_eq!(preview("Short lease."), "Short lease.");
        assert_eq!(preview(&"a".repeat(100)), "a".repeat(100));
    }

    #[test]
    fn long_content_is_truncated_with_ellipsis() {
        let p = preview(&"é".repeat(150));
        assert_eq!(p.chars().count(), 103);
        assert!(p.ends_with("..."));
    }

    #[test]
    fn timestamp_is_utc_formatted() {
        let entry = HistoryEntry::new("Translation", "x", None);
        assert!(entry.timestamp.ends_with(" UTC"));
        assert_eq!(entry.timestamp.len(), "2024-01-01 00:00:00 UTC".len());
    }

    #[test]
    fn entry_serialises_type_field() {
        let value = serde_json::to_value(HistoryEntry::new("Demystification", "x", None)).unwrap();
        assert_eq!(value["type"], "Demystification");
    }

    #[tokio::test]
    async fn memory_store_is_newest_first_and_per_user() {
        let store = MemoryHistoryStore::new(0);
        store.record("asha", HistoryEntry::new("Translation", "first", None)).await.unwrap();
        store.record("asha", HistoryEntry::new("Translation", "second", None)).await.unwrap();
        store.record("ravi", HistoryEntry::new("Translation", "other", None)).await.unwrap();

        let list = store.list("asha").await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].content_preview, "second");
        assert_eq!(list[1].content_preview, "first");
        assert!(store.list("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn memory_store_drops_oldest_beyond_cap() {
        let store = MemoryHistoryStore::new(2);
        for i in 0..3 {
            store.record("asha", HistoryEntry::new("Chat", &i.to_string(), None)).await.unwrap();
        }
        let previews: Vec<_> =
            store.list("asha").await.unwrap().into_iter().map(|e| e.content_preview).collect();
        assert_eq!(previews, vec!["2", "1"]);
    }

    #[tokio::test]
    async fn sql_store_round_trips_and_caps() {
        let pool = crate::connect_database("sqlite::memory:").await.unwrap();
        let store = SqlHistoryStore::new(pool, 2);
        let result = serde_json::json!({ "explanation": "plain words" });
        store.record("asha", HistoryEntry::new("Demystification", "a", Some(result.clone()))).await.unwrap();
        store.record("asha", HistoryEntry::new("Translation", "b", None)).await.unwrap();
        store.record("asha", HistoryEntry::new("Translation", "c", None)).await.unwrap();

        let list = store.list("asha").await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].content_preview, "c");
        assert_eq!(list[1].content_preview, "b");
        assert!(list[1].result.is_none());
    }
}
