//! Request body extraction shared by create and update routes.

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::{header::CONTENT_TYPE, StatusCode},
};
use content::FieldMap;

use super::error::ApiError;
use crate::service::{ServiceError, Upload};

/// Multipart parts that carry the image binary.
const FILE_PARTS: &[&str] = &["image", "file"];

/// Text fields plus an optional image upload, from either a JSON object or
/// a multipart form.
#[derive(Debug, Default)]
pub struct Payload {
    pub fields: FieldMap,
    pub upload: Option<Upload>,
}

impl<S: Send + Sync> FromRequest<S> for Payload {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?;
            return read_multipart(multipart).await;
        }

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        let value: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|_| ApiError::rejected(StatusCode::BAD_REQUEST, "malformed JSON body"))?;
        let fields = FieldMap::from_json(value).map_err(ServiceError::Validation)?;
        Ok(Self {
            fields,
            upload: None,
        })
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<Payload, ApiError> {
    let mut payload = Payload::default();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match field.file_name().map(str::to_string) {
            Some(file_name) if FILE_PARTS.contains(&name.as_str()) => {
                let bytes = field.bytes().await?;
                // Browsers send an empty part when no file was chosen.
                if !bytes.is_empty() {
                    payload.upload = Some(Upload {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            Some(_) => {
                return Err(ApiError::rejected(
                    StatusCode::BAD_REQUEST,
                    format!("unexpected file part `{name}`"),
                ));
            }
            None => {
                let value = field.text().await?;
                payload.fields.insert(name, value);
            }
        }
    }
    Ok(payload)
}
