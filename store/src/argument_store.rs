//! SQLite-backed argument store.
//!
//! Two tables: `argument_sets` holds each distinct argument list once, keyed by the hash
//! of its JSON payload, and `file_arguments` maps `(scheme, path)` to a set. The `scheme`
//! column holds the cache scope (`scheme` or `scheme::target`).

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;
use xcode_bsp_utils::sha256_hex;

use crate::sqlite_security::prepare_db_path;

/// File name of the store inside the cache directory.
pub const DATABASE_FILE_NAME: &str = "options.sqlite3";

/// Compiler arguments keyed by absolute file path.
pub type ArgumentsByPath = BTreeMap<String, Vec<String>>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// No row for `(scope, path)`; callers fall back to a live computation.
    #[error("no stored arguments for {path} in scope {scope}")]
    NotFound { path: String, scope: String },
    #[error("stored arguments for {path} are not a JSON string list")]
    InvalidPayload {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

/// Persistence seam for prepared compiler arguments.
pub trait ArgumentStore: Send + Sync {
    /// Point lookup of the arguments stored for `path` under `scope`.
    fn fetch_args(&self, path: &str, scope: &str) -> Result<Vec<String>, StoreError>;

    /// Replace everything stored under `scope` with `args_by_path`.
    fn update_args(&self, args_by_path: &ArgumentsByPath, scope: &str) -> Result<(), StoreError>;
}

/// Persistent store in a single SQLite database.
pub struct SqliteArgumentStore {
    db: Mutex<Connection>,
}

impl SqliteArgumentStore {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS argument_sets (
            id INTEGER PRIMARY KEY NOT NULL,
            hash TEXT NOT NULL UNIQUE,
            payload TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS file_arguments (
            scheme TEXT NOT NULL,
            path TEXT NOT NULL,
            argument_set_id INTEGER NOT NULL,
            PRIMARY KEY (scheme, path),
            FOREIGN KEY (argument_set_id) REFERENCES argument_sets(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_file_arguments_argument_set_id
        ON file_arguments(argument_set_id);
    ";

    /// Open or create the store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        prepare_db_path(path)?;

        let db = Connection::open(path)
            .with_context(|| format!("Failed to open argument store at {}", path.display()))?;
        Self::initialize(db)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let db =
            Connection::open_in_memory().context("Failed to open in-memory argument store")?;
        Self::initialize(db)
    }

    fn initialize(db: Connection) -> Result<Self> {
        db.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL; PRAGMA foreign_keys=ON;",
        )
        .context("Failed to set argument store pragmas")?;
        Self::drop_legacy_table(&db)?;
        db.execute_batch(Self::SCHEMA)
            .context("Failed to create argument store schema")?;
        Ok(Self { db: Mutex::new(db) })
    }

    /// Earlier versions stored one JSON payload per row in `arguments`.
    fn drop_legacy_table(db: &Connection) -> Result<()> {
        let exists: bool = db
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'arguments')",
                [],
                |row| row.get(0),
            )
            .context("Failed to inspect argument store schema")?;
        if exists {
            tracing::info!("Dropping legacy arguments table");
            db.execute_batch("DROP TABLE arguments; VACUUM;")
                .context("Failed to drop legacy arguments table")?;
        }
        Ok(())
    }

    fn update_in_transaction(&self, args_by_path: &ArgumentsByPath, scope: &str) -> Result<()> {
        let mut db = self.db.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = db
            .transaction()
            .context("Failed to start argument store transaction")?;

        tx.execute("DELETE FROM file_arguments WHERE scheme = ?1", params![scope])
            .context("Failed to clear scope")?;

        for (path, arguments) in args_by_path {
            let payload =
                serde_json::to_string(arguments).context("Failed to encode argument payload")?;
            let hash = sha256_hex(&payload);

            tx.execute(
                "INSERT INTO argument_sets (hash, payload)
                 VALUES (?1, ?2)
                 ON CONFLICT(hash) DO NOTHING",
                params![hash, payload],
            )
            .context("Failed to insert argument set")?;

            let set_id: i64 = tx
                .query_row(
                    "SELECT id FROM argument_sets WHERE hash = ?1 LIMIT 1",
                    params![hash],
                    |row| row.get(0),
                )
                .with_context(|| format!("Failed to resolve argument set {hash}"))?;

            tx.execute(
                "INSERT INTO file_arguments (scheme, path, argument_set_id)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(scheme, path) DO UPDATE SET
                     argument_set_id = excluded.argument_set_id",
                params![scope, path, set_id],
            )
            .with_context(|| format!("Failed to upsert arguments for {path}"))?;
        }

        let collected = tx
            .execute(
                "DELETE FROM argument_sets
                 WHERE id NOT IN (SELECT DISTINCT argument_set_id FROM file_arguments)",
                [],
            )
            .context("Failed to collect unreferenced argument sets")?;

        tx.commit()
            .context("Failed to commit argument store transaction")?;

        tracing::debug!(
            scope,
            files = args_by_path.len(),
            collected,
            "Updated stored compiler arguments"
        );
        Ok(())
    }

    #[cfg(test)]
    fn count(&self, table: &str) -> i64 {
        let db = self.db.lock().unwrap_or_else(PoisonError::into_inner);
        db.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .expect("count rows")
    }
}

impl ArgumentStore for SqliteArgumentStore {
    fn fetch_args(&self, path: &str, scope: &str) -> Result<Vec<String>, StoreError> {
        let payload: Option<String> = {
            let db = self.db.lock().unwrap_or_else(PoisonError::into_inner);
            db.query_row(
                "SELECT argument_sets.payload
                 FROM file_arguments
                 INNER JOIN argument_sets ON argument_sets.id = file_arguments.argument_set_id
                 WHERE file_arguments.scheme = ?1 AND file_arguments.path = ?2
                 LIMIT 1",
                params![scope, path],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query stored arguments")?
        };

        let Some(payload) = payload else {
            return Err(StoreError::NotFound {
                path: path.to_string(),
                scope: scope.to_string(),
            });
        };

        serde_json::from_str(&payload).map_err(|source| StoreError::InvalidPayload {
            path: path.to_string(),
            source,
        })
    }

    fn update_args(&self, args_by_path: &ArgumentsByPath, scope: &str) -> Result<(), StoreError> {
        self.update_in_transaction(args_by_path, scope)
            .map_err(StoreError::from)
    }
}

/// Map-backed store with the same replace-by-scope semantics, for tests and tooling.
#[derive(Debug, Default)]
pub struct InMemoryArgumentStore {
    scopes: Mutex<HashMap<String, ArgumentsByPath>>,
}

impl InMemoryArgumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of what is stored under `scope`.
    #[must_use]
    pub fn scope(&self, scope: &str) -> ArgumentsByPath {
        let scopes = self.scopes.lock().unwrap_or_else(PoisonError::into_inner);
        scopes.get(scope).cloned().unwrap_or_default()
    }
}

impl ArgumentStore for InMemoryArgumentStore {
    fn fetch_args(&self, path: &str, scope: &str) -> Result<Vec<String>, StoreError> {
        let scopes = self.scopes.lock().unwrap_or_else(PoisonError::into_inner);
        scopes
            .get(scope)
            .and_then(|by_path| by_path.get(path))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                path: path.to_string(),
                scope: scope.to_string(),
            })
    }

    fn update_args(&self, args_by_path: &ArgumentsByPath, scope: &str) -> Result<(), StoreError> {
        let mut scopes = self.scopes.lock().unwrap_or_else(PoisonError::into_inner);
        scopes.insert(scope.to_string(), args_by_path.clone());
        Ok(())
    }
}
