//! SQLite-backed secret and token store.

use super::{now_string, Secret, StorageError};
use rusqlite::{params, Connection, ErrorCode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS secrets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project TEXT NOT NULL,
    environment TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(project, environment, key)
);

CREATE INDEX IF NOT EXISTS idx_secrets_project_env ON secrets(project, environment);

CREATE TABLE IF NOT EXISTS tokens (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    token_hash TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);
"#;

/// How long a writer waits on SQLite's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to the daemon database. Cheap to clone.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .finish()
    }
}

impl SqliteStore {
    /// Open (or create) the database at `db_path` and apply the schema.
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db_path = db_path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let path = db_path.clone();
        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&path)?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.execute_batch(SCHEMA)?;
            Ok::<_, StorageError>(conn)
        })
        .await??;

        tracing::debug!(path = %db_path.display(), "Opened secret store");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(db_path),
        })
    }

    /// A private in-memory database (tests, throwaway daemons).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            f(&conn)
        })
        .await?
    }

    /// Create the row for (project, environment, key) or replace its value.
    ///
    /// One statement: `created_at` is only written on insert, `updated_at`
    /// on every call. The UNIQUE constraint guarantees a single row.
    /// `updated_at` never moves backwards, even if the wall clock does.
    pub async fn upsert(
        &self,
        project: &str,
        environment: &str,
        key: &str,
        envelope: &str,
    ) -> Result<(), StorageError> {
        let project = project.to_string();
        let environment = environment.to_string();
        let key = key.to_string();
        let envelope = envelope.to_string();

        self.with_conn(move |conn| {
            let now = now_string();
            conn.execute(
                "INSERT INTO secrets (project, environment, key, value, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT(project, environment, key)
                 DO UPDATE SET value = excluded.value,
                               updated_at = max(excluded.updated_at, secrets.updated_at)",
                params![project, environment, key, envelope, now],
            )?;
            Ok(())
        })
        .await
    }

    /// All secrets for exactly this (project, environment), ordered by key.
    pub async fn fetch(&self, project: &str, environment: &str) -> Result<Vec<Secret>, StorageError> {
        let project = project.to_string();
        let environment = environment.to_string();

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT project, environment, key, value, created_at, updated_at
                 FROM secrets
                 WHERE project = ?1 AND environment = ?2
                 ORDER BY key ASC",
            )?;
            let rows = stmt.query_map(params![project, environment], |row| {
                Ok(Secret {
                    project: row.get(0)?,
                    environment: row.get(1)?,
                    key: row.get(2)?,
                    value: row.get(3)?,
                    created_at: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            })?;
            let secrets = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(secrets)
        })
        .await
    }

    /// Distinct project names across all stored secrets, sorted.
    pub async fn list_projects(&self) -> Result<Vec<String>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT DISTINCT project FROM secrets ORDER BY project ASC")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let projects = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(projects)
        })
        .await
    }

    /// Insert a token digest under a unique name.
    pub async fn insert_token(&self, name: &str, token_hash: &str) -> Result<(), StorageError> {
        let name = name.to_string();
        let token_hash = token_hash.to_string();

        self.with_conn(move |conn| {
            let result = conn.execute(
                "INSERT INTO tokens (token_hash, name, created_at) VALUES (?1, ?2, ?3)",
                params![token_hash, name, now_string()],
            );
            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Err(StorageError::Conflict(format!("token '{}' already exists", name)))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    pub async fn token_exists(&self, token_hash: &str) -> Result<bool, StorageError> {
        let token_hash = token_hash.to_string();

        self.with_conn(move |conn| {
            let exists = conn
                .prepare("SELECT 1 FROM tokens WHERE token_hash = ?1")?
                .exists(params![token_hash])?;
            Ok(exists)
        })
        .await
    }

    pub async fn token_count(&self) -> Result<u64, StorageError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM tokens", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }

    /// Drop `table` so later queries against it fail.
    #[cfg(test)]
    pub(crate) async fn drop_table(&self, table: &'static str) {
        self.with_conn(move |conn| {
            conn.execute_batch(&format!("DROP TABLE {}", table))?;
            Ok(())
        })
        .await
        .unwrap()
    }

    /// Number of rows for a composite key. Used to check uniqueness.
    #[cfg(test)]
    async fn row_count(&self, project: &str, environment: &str, key: &str) -> i64 {
        let (p, e, k) = (project.to_string(), environment.to_string(), key.to_string());
        self.with_conn(move |conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM secrets WHERE project = ?1 AND environment = ?2 AND key = ?3",
                params![p, e, k],
                |row| row.get(0),
            )?)
        })
        .await
        .unwrap()
    }
}
