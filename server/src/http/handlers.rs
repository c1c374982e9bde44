use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use content::Photo;
use serde_json::{json, Value};

use super::auth::RequireAdmin;
use super::error::ApiError;
use super::payload::Payload;
use crate::assets::AssetStore;
use crate::persistence::SqlRecord;
use crate::service::{PhotoUpload, ResourceService, ServiceError};

type Service<R> = State<Arc<ResourceService<R>>>;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn list<R: SqlRecord>(State(svc): Service<R>) -> Result<Json<Vec<R>>, ApiError> {
    Ok(Json(svc.find_all().await?))
}

pub async fn find<R: SqlRecord>(
    State(svc): Service<R>,
    Path(id): Path<String>,
) -> Result<Json<R>, ApiError> {
    match svc.find_one(&id).await? {
        Some(record) => Ok(Json(record)),
        None => Err(ServiceError::NotFound { kind: R::KIND, id }.into()),
    }
}

pub async fn create<R: SqlRecord>(
    _admin: RequireAdmin,
    State(svc): Service<R>,
    payload: Payload,
) -> Result<(StatusCode, Json<R>), ApiError> {
    let record = svc.create(&payload.fields, payload.upload).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn update<R: SqlRecord>(
    _admin: RequireAdmin,
    State(svc): Service<R>,
    Path(id): Path<String>,
    payload: Payload,
) -> Result<Json<R>, ApiError> {
    Ok(Json(svc.update(&id, &payload.fields, payload.upload).await?))
}

pub async fn remove<R: SqlRecord>(
    _admin: RequireAdmin,
    State(svc): Service<R>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let removal = svc.remove(&id).await?;
    Ok(Json(
        json!({ "success": true, "removed": removal.was_removed() }),
    ))
}

pub async fn clear<R: SqlRecord>(
    _admin: RequireAdmin,
    State(svc): Service<R>,
) -> Result<Json<Value>, ApiError> {
    svc.clear().await?;
    Ok(Json(json!({ "success": true })))
}

/// Multipart `file` + `category`: stores the image and its photo record.
pub async fn upload_photo(
    _admin: RequireAdmin,
    State(svc): Service<Photo>,
    payload: Payload,
) -> Result<(StatusCode, Json<PhotoUpload>), ApiError> {
    let Some(upload) = payload.upload else {
        return Err(ApiError::BadRequest("missing file part".to_string()));
    };
    let category = payload.fields.get("category").unwrap_or_default();
    let uploaded = svc
        .upload(upload.bytes, &upload.file_name, category)
        .await?;
    Ok((StatusCode::CREATED, Json(uploaded)))
}

/// Body `{filename}`: removes the photo records and the stored file.
pub async fn delete_photo_file(
    _admin: RequireAdmin,
    State(svc): Service<Photo>,
    payload: Payload,
) -> Result<Json<Value>, ApiError> {
    let filename = payload
        .fields
        .get("filename")
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing filename".to_string()))?;
    svc.delete_by_filename(filename).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn list_images(State(assets): State<Arc<AssetStore>>) -> Result<Json<Vec<String>>, ApiError> {
    let urls = assets
        .list()
        .await?
        .into_iter()
        .map(|name| format!("/uploads/{name}"))
        .collect();
    Ok(Json(urls))
}

pub async fn clear_uploads(
    _admin: RequireAdmin,
    State(assets): State<Arc<AssetStore>>,
) -> Result<Json<Value>, ApiError> {
    let removed = assets.clear().await?;
    Ok(Json(json!({ "success": true, "removed": removed })))
}
