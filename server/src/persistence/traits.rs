//! Async repository trait shared by both storage backends.
//!
//! Methods return `impl Future + Send` rather than using `async fn` so that
//! the futures are guaranteed `Send`, which axum handlers and `tokio::spawn`
//! require.

use std::future::Future;

use content::Resource;

use super::PersistenceError;

/// Outcome of a delete. Deleting an id that is not stored is not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Removal<R> {
    Removed(R),
    Absent,
}

impl<R> Removal<R> {
    pub fn was_removed(&self) -> bool {
        matches!(self, Self::Removed(_))
    }
}

/// Storage for one collection of records of kind `R`.
///
/// `update` on an unknown id fails with [`PersistenceError::NotFound`] and
/// leaves the collection untouched.
pub trait PersistenceBackend<R: Resource>: Send + Sync {
    fn list(&self) -> impl Future<Output = Result<Vec<R>, PersistenceError>> + Send;
    fn get(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<R>, PersistenceError>> + Send;
    fn create(&self, record: &R) -> impl Future<Output = Result<(), PersistenceError>> + Send;
    fn update(
        &self,
        id: &str,
        patch: &R::Patch,
    ) -> impl Future<Output = Result<R, PersistenceError>> + Send;
    fn delete(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Removal<R>, PersistenceError>> + Send;
    /// Drop every record in the collection.
    fn clear(&self) -> impl Future<Output = Result<(), PersistenceError>> + Send;
}
