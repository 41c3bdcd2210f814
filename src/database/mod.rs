//! Durable record of served prompts.
//!
//! [`RequestStore`] is the create / read-by-id interface the handlers use.
//! [`SqliteStore`] persists records to a SQLite file and is what the binary
//! runs with. [`MemoryStore`] keeps records in process memory behind an async
//! lock and hands out ids starting at 1; it backs tests and throwaway setups.

mod sqlite;

pub use sqlite::SqliteStore;

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// A persisted prompt/response pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRequest {
    pub id: i64,
    pub text: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

/// Errors produced by a [`RequestStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("id space exhausted")]
    IdExhausted,
}

#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Persists a new record and returns it with its assigned id and timestamp.
    async fn create(&self, text: &str, response: &str) -> Result<StoredRequest, StoreError>;

    /// Fetches a record by id. A missing id is `Ok(None)`.
    async fn get(&self, id: i64) -> Result<Option<StoredRequest>, StoreError>;
}

#[derive(Debug)]
pub struct MemoryStore {
    records: RwLock<HashMap<i64, StoredRequest>>,
    next_id: AtomicI64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn create(&self, text: &str, response: &str) -> Result<StoredRequest, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if id <= 0 {
            return Err(StoreError::IdExhausted);
        }

        let record = StoredRequest {
            id,
            text: text.to_owned(),
            response: response.to_owned(),
            created_at: Utc::now(),
        };
        self.records.write().await.insert(id, record.clone());
        tracing::debug!(id, "stored request");
        Ok(record)
    }

    async fn get(&self, id: i64) -> Result<Option<StoredRequest>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_assigns_increasing_ids() {
        let store = MemoryStore::new();
        let a = store.create("q1", "a1").await.unwrap();
        let b = store.create("q2", "a2").await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn read_back_by_id() {
        let store = MemoryStore::new();
        let created = store.create("Test request", "Test response").await.unwrap();
        let fetched = store.get(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.text, "Test request");
        assert_eq!(fetched.response, "Test response");
    }

    #[tokio::test]
    async fn missing_id_is_none() {
        let store = MemoryStore::new();
        assert!(store.is_empty().await);
        assert_eq!(store.get(999).await.unwrap(), None);
    }

    #[test]
    fn record_serializes_timestamp_as_rfc3339() {
        use chrono::TimeZone;
        let record = StoredRequest {
            id: 1,
            text: "q".into(),
            response: "a".into(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["created_at"], "2024-01-02T03:04:05Z");
        assert_eq!(json["id"], 1);
    }
}
