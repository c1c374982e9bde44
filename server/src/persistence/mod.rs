//! Persistence backends for content collections.
//!
//! [`PersistenceBackend`] is implemented twice: [`FileStore`] keeps one JSON
//! array file per resource kind, [`SqliteStore`] keeps one table per kind.
//! [`Backend`] picks one of them at startup from configuration.

mod backend;
mod file_store;
pub mod sqlite;
mod traits;


pub use backend::{Backend, BackendKind};
pub use file_store::FileStore;
pub use sqlite::{import_json_to_sqlite, Database, ImportReport, SqlRecord, SqliteStore};
pub use traits::{PersistenceBackend, Removal};

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Duplicate record id: {0}")]
    Duplicate(String),
    #[error("Corrupt row in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },
}
