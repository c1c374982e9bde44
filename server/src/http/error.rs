use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::assets::AssetError;
use crate::service::ServiceError;

/// Error returned by every handler. Bodies are `{error, message}` and never
/// carry internal error text.
#[derive(Debug)]
pub enum ApiError {
    Service(ServiceError),
    BadRequest(String),
    TooLarge,
    Asset(AssetError),
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self::Service(e)
    }
}

impl From<AssetError> for ApiError {
    fn from(e: AssetError) -> Self {
        Self::Asset(e)
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        Self::rejected(e.status(), format!("malformed multipart body: {}", e.body_text()))
    }
}

impl ApiError {
    /// Body extraction failed with the given status.
    pub fn rejected(status: StatusCode, message: impl Into<String>) -> Self {
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            Self::TooLarge
        } else {
            Self::BadRequest(message.into())
        }
    }

    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, "bad_request", message.clone()),
            Self::TooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                "Request body is too large".to_string(),
            ),
            Self::Service(ServiceError::Validation(e)) => {
                (StatusCode::BAD_REQUEST, "validation", e.to_string())
            }
            Self::Service(ServiceError::NotFound { kind, .. }) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("{kind} record not found"),
            ),
            Self::Service(ServiceError::Asset(e)) | Self::Asset(e) => asset_parts(e),
            Self::Service(ServiceError::Storage(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage",
                "Storage failure".to_string(),
            ),
        }
    }
}

fn asset_parts(e: &AssetError) -> (StatusCode, &'static str, String) {
    match e {
        AssetError::Empty | AssetError::Decode(_) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "unsupported_image",
            "Uploaded file is not a usable image".to_string(),
        ),
        AssetError::InvalidName(_) => (
            StatusCode::BAD_REQUEST,
            "bad_request",
            "Invalid filename".to_string(),
        ),
        AssetError::Encode(_) | AssetError::Io(_) | AssetError::Join(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "asset",
            "Asset storage failure".to_string(),
        ),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(error, "Request failed: {:?}", self);
        }
        (status, Json(json!({ "error": error, "message": message }))).into_response()
    }
}
