//! [`SqliteStore`]: [`RecordStore`] over a single SQLite connection.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::OnceCell;
use tracing::info;

use super::{RecordStore, StoreError, StoredRecord};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS properties (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    owner      TEXT NOT NULL,
    blob       TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS properties_owner ON properties(owner);
";

type SharedConnection = Arc<Mutex<Connection>>;

/// SQLite-backed record store.
///
/// The connection is opened on first use, not at construction, so a missing
/// or locked database surfaces as [`StoreError::Unavailable`] on the request
/// that needs it. Statements run on Tokio's blocking pool.
pub struct SqliteStore {
    path: String,
    conn: OnceCell<SharedConnection>,
}

impl SqliteStore {
    /// Create a store for the database at `path` (`":memory:"` is accepted).
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            conn: OnceCell::new(),
        }
    }

    /// The shared connection, opening and migrating it on first call.
    ///
    /// Concurrent first callers wait on the same open; exactly one connection
    /// is retained.
    async fn connection(&self) -> Result<SharedConnection, StoreError> {
        self.conn
            .get_or_try_init(|| async {
                let path = self.path.clone();
                let conn = tokio::task::spawn_blocking(move || -> Result<Connection, StoreError> {
                    let conn = Connection::open(&path)
                        .map_err(|e| StoreError::Unavailable(format!("failed to open database: {e}")))?;
                    conn.execute_batch(SCHEMA)
                        .map_err(|e| StoreError::Unavailable(format!("failed to create schema: {e}")))?;
                    Ok(conn)
                })
                .await
                .map_err(|e| StoreError::Task(e.to_string()))??;
                info!(path = %self.path, "record store opened");
                Ok::<_, StoreError>(Arc::new(Mutex::new(conn)))
            })
            .await
            .cloned()
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self.connection().await?;
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
        .map_err(StoreError::from)
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn insert(&self, owner: &str, blob: &str) -> Result<i64, StoreError> {
        let (owner, blob) = (owner.to_owned(), blob.to_owned());
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO properties (owner, blob) VALUES (?1, ?2)",
                params![owner, blob],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn get(&self, id: i64, owner: &str) -> Result<Option<StoredRecord>, StoreError> {
        let owner = owner.to_owned();
        self.run(move |conn| {
            conn.query_row(
                "SELECT id, blob FROM properties WHERE id = ?1 AND owner = ?2",
                params![id, owner],
                |row| {
                    Ok(StoredRecord {
                        id: row.get(0)?,
                        blob: row.get(1)?,
                    })
                },
            )
            .optional()
        })
        .await
    }

    async fn list(&self, owner: &str) -> Result<Vec<StoredRecord>, StoreError> {
        let owner = owner.to_owned();
        self.run(move |conn| {
            let mut stmt =
                conn.prepare("SELECT id, blob FROM properties WHERE owner = ?1 ORDER BY id")?;
            let rows = stmt.query_map(params![owner], |row| {
                Ok(StoredRecord {
                    id: row.get(0)?,
                    blob: row.get(1)?,
                })
            })?;
            rows.collect()
        })
        .await
    }

    async fn update(&self, id: i64, owner: &str, blob: &str) -> Result<bool, StoreError> {
        let (owner, blob) = (owner.to_owned(), blob.to_owned());
        self.run(move |conn| {
            let changed = conn.execute(
                "UPDATE properties SET blob = ?1, updated_at = CURRENT_TIMESTAMP \
                 WHERE id = ?2 AND owner = ?3",
                params![blob, id, owner],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn delete(&self, id: i64, owner: &str) -> Result<bool, StoreError> {
        let owner = owner.to_owned();
        self.run(move |conn| {
            let changed = conn.execute(
                "DELETE FROM properties WHERE id = ?1 AND owner = ?2",
                params![id, owner],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn ping(&self) -> bool {
        self.run(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
            .await
            .is_ok()
    }
}
