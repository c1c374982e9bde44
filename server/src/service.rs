//! Per-kind resource service.
//!
//! Orchestrates codec, asset pipeline and storage backend for one resource
//! kind. Validation always runs before anything touches disk, and an asset
//! stored for a mutation that then fails is removed again.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use content::{
    decode_create, decode_patch, FieldMap, Photo, RecordPatch, Resource, ResourceKind,
    ValidationError,
};
use serde::Serialize;

use crate::assets::{AssetError, AssetStore};
use crate::persistence::{Backend, PersistenceBackend, PersistenceError, Removal};

/// A binary file received alongside a payload.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{kind} record {id} not found")]
    NotFound { kind: ResourceKind, id: String },
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("storage failure: {0}")]
    Storage(#[source] PersistenceError),
}

/// Result of a standalone photo upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoUpload {
    pub filename: String,
    pub category: String,
    pub uploaded_at: DateTime<Utc>,
}

pub struct ResourceService<R: Resource, B = Backend<R>> {
    backend: B,
    assets: Arc<AssetStore>,
    _phantom: std::marker::PhantomData<fn() -> R>,
}

impl<R, B> ResourceService<R, B>
where
    R: Resource,
    B: PersistenceBackend<R>,
{
    pub fn new(backend: B, assets: Arc<AssetStore>) -> Self {
        Self {
            backend,
            assets,
            _phantom: std::marker::PhantomData,
        }
    }

    pub async fn find_all(&self) -> Result<Vec<R>, ServiceError> {
        self.backend
            .list()
            .await
            .map_err(|e| storage_error(R::KIND, "list", None, e))
    }

    pub async fn find_one(&self, id: &str) -> Result<Option<R>, ServiceError> {
        self.backend
            .get(id)
            .await
            .map_err(|e| storage_error(R::KIND, "get", Some(id), e))
    }

    pub async fn create(
        &self,
        fields: &FieldMap,
        upload: Option<Upload>,
    ) -> Result<R, ServiceError> {
        let mut record: R = decode_create(fields, upload.is_some())?;

        let stored = match upload {
            Some(upload) => {
                let filename = self.assets.store(upload.bytes, &upload.file_name).await?;
                record.set_image(filename.clone());
                Some(filename)
            }
            None => None,
        };

        if let Err(e) = self.backend.create(&record).await {
            self.discard_asset(stored.as_deref()).await;
            return Err(storage_error(R::KIND, "create", Some(record.id()), e));
        }

        tracing::info!(kind = %R::KIND, id = %record.id(), "Created record");
        Ok(record)
    }

    pub async fn update(
        &self,
        id: &str,
        fields: &FieldMap,
        upload: Option<Upload>,
    ) -> Result<R, ServiceError> {
        let mut patch = decode_patch::<R>(fields)?;

        // Unknown ids must not leave an uploaded asset behind.
        if self.find_one(id).await?.is_none() {
            return Err(not_found::<R>(id));
        }

        let stored = match upload {
            Some(upload) => {
                let filename = self.assets.store(upload.bytes, &upload.file_name).await?;
                patch.set_image(filename.clone());
                Some(filename)
            }
            None => None,
        };

        match self.backend.update(id, &patch).await {
            Ok(record) => {
                tracing::info!(kind = %R::KIND, id, "Updated record");
                Ok(record)
            }
            Err(e) => {
                self.discard_asset(stored.as_deref()).await;
                match e {
                    PersistenceError::NotFound(_) => Err(not_found::<R>(id)),
                    e => Err(storage_error(R::KIND, "update", Some(id), e)),
                }
            }
        }
    }

    /// Delete a record. The referenced asset is left in place.
    pub async fn remove(&self, id: &str) -> Result<Removal<R>, ServiceError> {
        let removal = self
            .backend
            .delete(id)
            .await
            .map_err(|e| storage_error(R::KIND, "delete", Some(id), e))?;
        if removal.was_removed() {
            tracing::info!(kind = %R::KIND, id, "Deleted record");
        } else {
            tracing::debug!(kind = %R::KIND, id, "Delete of absent record");
        }
        Ok(removal)
    }

    pub async fn clear(&self) -> Result<(), ServiceError> {
        self.backend
            .clear()
            .await
            .map_err(|e| storage_error(R::KIND, "clear", None, e))?;
        tracing::info!(kind = %R::KIND, "Cleared collection");
        Ok(())
    }

    async fn discard_asset(&self, filename: Option<&str>) {
        let Some(filename) = filename else {
            return;
        };
        if let Err(e) = self.assets.delete(filename).await {
            tracing::warn!(kind = %R::KIND, filename, "Failed to remove orphaned asset: {}", e);
        }
    }
}

impl<B: PersistenceBackend<Photo>> ResourceService<Photo, B> {
    /// Store an image and create the photo record pointing at it.
    pub async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        category: &str,
    ) -> Result<PhotoUpload, ServiceError> {
        let fields: FieldMap = [("category", category)].into_iter().collect();
        let photo = self
            .create(
                &fields,
                Some(Upload {
                    file_name: file_name.to_string(),
                    bytes,
                }),
            )
            .await?;

        Ok(PhotoUpload {
            filename: photo.image,
            category: photo.category,
            uploaded_at: photo.created_at.unwrap_or_else(Utc::now),
        })
    }

    /// Remove every photo record that references `filename`, then the file.
    pub async fn delete_by_filename(&self, filename: &str) -> Result<usize, ServiceError> {
        let matching: Vec<Photo> = self
            .find_all()
            .await?
            .into_iter()
            .filter(|photo| photo.image == filename)
            .collect();
        if matching.is_empty() {
            return Err(not_found::<Photo>(filename));
        }

        for photo in &matching {
            self.remove(&photo.id).await?;
        }
        self.assets.delete(filename).await?;

        tracing::info!(filename, records = matching.len(), "Deleted photo by filename");
        Ok(matching.len())
    }
}

fn not_found<R: Resource>(id: &str) -> ServiceError {
    ServiceError::NotFound {
        kind: R::KIND,
        id: id.to_string(),
    }
}

fn storage_error(
    kind: ResourceKind,
    op: &'static str,
    id: Option<&str>,
    e: PersistenceError,
) -> ServiceError {
    tracing::error!(%kind, op, id = id.unwrap_or("-"), "Storage failure: {}", e);
    ServiceError::Storage(e)
}
