use std::fmt;
use std::str::FromStr;

use super::sqlite::{SqlRecord, SqliteStore};
use super::traits::{PersistenceBackend, Removal};
use super::{FileStore, PersistenceError};

/// Which storage variant a deployment uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    File,
    Sqlite,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::File => "file",
            Self::Sqlite => "sqlite",
        })
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" | "json" => Ok(Self::File),
            "sqlite" | "db" => Ok(Self::Sqlite),
            other => Err(format!("unknown backend {other:?} (expected file or sqlite)")),
        }
    }
}

/// The storage backend chosen at startup for one resource kind.
pub enum Backend<R> {
    File(FileStore<R>),
    Sqlite(SqliteStore<R>),
}

impl<R: SqlRecord> PersistenceBackend<R> for Backend<R> {
    async fn list(&self) -> Result<Vec<R>, PersistenceError> {
        match self {
            Self::File(store) => store.list().await,
            Self::Sqlite(store) => store.list().await,
        }
    }

    async fn get(&self, id: &str) -> Result<Option<R>, PersistenceError> {
        match self {
            Self::File(store) => store.get(id).await,
            Self::Sqlite(store) => store.get(id).await,
        }
    }

    async fn create(&self, record: &R) -> Result<(), PersistenceError> {
        match self {
            Self::File(store) => store.create(record).await,
            Self::Sqlite(store) => store.create(record).await,
        }
    }

    async fn update(&self, id: &str, patch: &R::Patch) -> Result<R, PersistenceError> {
        match self {
            Self::File(store) => store.update(id, patch).await,
            Self::Sqlite(store) => store.update(id, patch).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<Removal<R>, PersistenceError> {
        match self {
            Self::File(store) => store.delete(id).await,
            Self::Sqlite(store) => store.delete(id).await,
        }
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        match self {
            Self::File(store) => store.clear().await,
            Self::Sqlite(store) => store.clear().await,
        }
    }
}
