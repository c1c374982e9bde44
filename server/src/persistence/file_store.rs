use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use chrono::Utc;
use content::Resource;
use tempfile::NamedTempFile;
use tokio::sync::mpsc;

use super::traits::{PersistenceBackend, Removal};
use super::PersistenceError;
use crate::versioning::ChangeEvent;

/// A whole collection stored as one JSON array file.
///
/// Every mutation is a full read-modify-write of the file. Writes go to a
/// temporary file in the same directory which is then renamed over the
/// target, so readers never observe a half-written array.
///
/// Mutations are not serialized against each other: two concurrent writers
/// to the same collection can both read the old array and the later rename
/// wins, silently dropping the other change. Writes come from a single
/// admin dashboard, so this is accepted rather than locked around.
pub struct FileStore<R> {
    path: PathBuf,
    changes: Option<mpsc::Sender<ChangeEvent>>,
    _phantom: PhantomData<R>,
}

impl<R: Resource> FileStore<R> {
    /// A store backed by `path`. When `changes` is set, a [`ChangeEvent`] is
    /// queued after every successful write.
    pub fn new(path: PathBuf, changes: Option<mpsc::Sender<ChangeEvent>>) -> Self {
        Self {
            path,
            changes,
            _phantom: PhantomData,
        }
    }

    /// A store for `R` at `<data_dir>/<kind>.json`.
    pub fn in_dir(data_dir: &Path, changes: Option<mpsc::Sender<ChangeEvent>>) -> Self {
        Self::new(data_dir.join(R::KIND.file_name()), changes)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole collection. A missing or empty file is an empty
    /// collection.
    pub fn load(&self) -> Result<Vec<R>, PersistenceError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok(vec![]);
        }
        Ok(serde_json::from_str(&contents)?)
    }

    /// Replace the whole collection atomically.
    pub fn save(&self, records: &[R]) -> Result<(), PersistenceError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, records)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| PersistenceError::Io(e.error))?;

        self.notify();
        Ok(())
    }

    fn notify(&self) {
        let Some(tx) = &self.changes else {
            return;
        };
        let event = ChangeEvent {
            kind: R::KIND,
            path: self.path.clone(),
        };
        if let Err(e) = tx.try_send(event) {
            tracing::warn!(kind = %R::KIND, "Dropping versioning event: {}", e);
        }
    }
}

impl<R: Resource> PersistenceBackend<R> for FileStore<R> {
    async fn list(&self) -> Result<Vec<R>, PersistenceError> {
        self.load()
    }

    async fn get(&self, id: &str) -> Result<Option<R>, PersistenceError> {
        Ok(self.load()?.into_iter().find(|r| r.id() == id))
    }

    async fn create(&self, record: &R) -> Result<(), PersistenceError> {
        let mut records = self.load()?;
        if records.iter().any(|r| r.id() == record.id()) {
            return Err(PersistenceError::Duplicate(record.id().to_string()));
        }
        records.push(record.clone());
        self.save(&records)
    }

    async fn update(&self, id: &str, patch: &R::Patch) -> Result<R, PersistenceError> {
        let mut records = self.load()?;
        let Some(record) = records.iter_mut().find(|r| r.id() == id) else {
            return Err(PersistenceError::NotFound(id.to_string()));
        };
        record.apply(patch);
        record.touch(Utc::now());
        let updated = record.clone();
        self.save(&records)?;
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> Result<Removal<R>, PersistenceError> {
        let mut records = self.load()?;
        let Some(pos) = records.iter().position(|r| r.id() == id) else {
            return Ok(Removal::Absent);
        };
        let removed = records.remove(pos);
        self.save(&records)?;
        Ok(Removal::Removed(removed))
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        self.save(&[])
    }
}
