//! SQLite connection pool and migration runner.
//!
//! The content database is a single file holding the `activities`,
//! `events` and `photos` tables. It runs in WAL mode so that listings
//! served to the public site never wait on an admin write.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use crate::persistence::PersistenceError;

/// Pool size for a file database. Writers still serialize inside SQLite.
const MAX_CONNECTIONS: u32 = 5;
/// How long a writer waits for the database lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to the content database.
///
/// Cloning is cheap; every clone uses the same pool. One [`SqliteStore`]
/// per resource kind is built from [`Database::pool`].
///
/// [`SqliteStore`]: super::SqliteStore
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the database file at `path`, creating it and any missing parent
    /// directories, then bring the schema up to date.
    ///
    /// Safe to call on every start: migrations already applied are skipped.
    pub async fn open(path: &Path) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        tracing::info!(path = %path.display(), "Opened content database");
        Ok(db)
    }

    /// A private in-memory database with the schema applied.
    ///
    /// Limited to one connection, since each in-memory connection would
    /// otherwise see its own empty database.
    #[cfg(test)]
    pub async fn new_in_memory() -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Apply the migrations embedded from `server/migrations/`.
    async fn run_migrations(&self) -> Result<(), PersistenceError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PersistenceError::Migration(e.to_string()))?;
        tracing::debug!("Content schema is up to date");
        Ok(())
    }

    /// The pool every store and the JSON importer run their queries on.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
