//! SQLite-backed [`RequestStore`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};

use super::{RequestStore, StoreError, StoredRequest};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS requests (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    text       TEXT NOT NULL,
    response   TEXT NOT NULL,
    created_at TEXT NOT NULL
);
";

/// Request records kept in one SQLite database file.
///
/// Every statement runs on tokio's blocking pool against a single shared
/// connection. `AUTOINCREMENT` keeps ids from being reused after a delete.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Opens or creates the database at `path` and makes sure the `requests`
    /// table exists. `":memory:"` gives a private in-memory database.
    ///
    /// # Errors
    ///
    /// [`StoreError::Database`] if the file cannot be opened or the schema
    /// cannot be applied.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        // In-memory databases refuse WAL; the default journal is fine there.
        let _ = conn.execute_batch("PRAGMA journal_mode = WAL");
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&conn.lock())).await?
    }
}

#[async_trait]
impl RequestStore for SqliteStore {
    async fn create(&self, text: &str, response: &str) -> Result<StoredRequest, StoreError> {
        let text = text.to_owned();
        let response = response.to_owned();
        let created_at = Utc::now();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO requests (text, response, created_at) VALUES (?1, ?2, ?3)",
                params![text, response, created_at],
            )?;
            let id = conn.last_insert_rowid();
            tracing::debug!(id, "stored request");
            Ok(StoredRequest {
                id,
                text,
                response,
                created_at,
            })
        })
        .await
    }

    async fn get(&self, id: i64) -> Result<Option<StoredRequest>, StoreError> {
        self.with_conn(move |conn| {
            let record = conn
                .query_row(
                    "SELECT id, text, response, created_at FROM requests WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(StoredRequest {
                            id: row.get(0)?,
                            text: row.get(1)?,
                            response: row.get(2)?,
                            created_at: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(record)
        })
        .await
    }
}
