//! HTTP surface: router, shared state and access logging.

pub mod auth;
mod error;
mod handlers;
mod payload;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, FromRef, Request},
    http::{header::USER_AGENT, HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use content::{Activity, Event, Photo};
use serde_json::json;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use crate::assets::AssetStore;
use crate::persistence::SqlRecord;
use crate::service::ResourceService;

pub use auth::{AuthError, AuthPolicy, RequireAdmin};
pub use error::ApiError;
pub use payload::Payload;

const MAX_REQUEST_ID_LEN: usize = 128;
const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Everything handlers need, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub activities: Arc<ResourceService<Activity>>,
    pub events: Arc<ResourceService<Event>>,
    pub photos: Arc<ResourceService<Photo>>,
    pub assets: Arc<AssetStore>,
    pub auth: Arc<AuthPolicy>,
}

impl FromRef<AppState> for Arc<ResourceService<Activity>> {
    fn from_ref(state: &AppState) -> Self {
        state.activities.clone()
    }
}

impl FromRef<AppState> for Arc<ResourceService<Event>> {
    fn from_ref(state: &AppState) -> Self {
        state.events.clone()
    }
}

impl FromRef<AppState> for Arc<ResourceService<Photo>> {
    fn from_ref(state: &AppState) -> Self {
        state.photos.clone()
    }
}

impl FromRef<AppState> for Arc<AssetStore> {
    fn from_ref(state: &AppState) -> Self {
        state.assets.clone()
    }
}

/// Collection and item routes for one resource kind.
fn resource_routes<R>() -> Router<AppState>
where
    R: SqlRecord,
    Arc<ResourceService<R>>: FromRef<AppState>,
{
    let collection = format!("/api/{}", R::KIND);
    let item = format!("{collection}/{{id}}");
    Router::new()
        .route(
            &collection,
            get(handlers::list::<R>)
                .post(handlers::create::<R>)
                .delete(handlers::clear::<R>),
        )
        .route(
            &item,
            get(handlers::find::<R>)
                .put(handlers::update::<R>)
                .delete(handlers::remove::<R>),
        )
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let uploads = ServeDir::new(state.assets.dir());

    Router::new()
        .route("/api/health", get(handlers::health))
        .merge(resource_routes::<Activity>())
        .merge(resource_routes::<Event>())
        .merge(resource_routes::<Photo>())
        .route("/api/photos/upload", post(handlers::upload_photo))
        .route("/api/photos/delete", delete(handlers::delete_photo_file))
        .route("/api/images", get(handlers::list_images))
        .route("/api/clear-uploads", delete(handlers::clear_uploads))
        .nest_service("/uploads", uploads)
        .fallback(not_found_handler)
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(access_log))
}

async fn not_found_handler() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "not_found", "message": "No such route" })),
    )
        .into_response()
}

async fn access_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let request_id = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let start = Instant::now();
    let mut resp = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        resp.headers_mut().insert(X_REQUEST_ID, value);
    }

    let status = resp.status();
    let latency_ms = start.elapsed().as_millis() as u64;

    if status.is_server_error() {
        error!(
            "| {:>3} | {} | {:^7} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            path,
            latency_ms,
            user_agent
        );
    } else if status.is_client_error() {
        warn!(
            "| {:>3} | {} | {:^7} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            path,
            latency_ms,
            user_agent
        );
    } else {
        info!(
            "| {:>3} | {} | {:^7} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            path,
            latency_ms,
            user_agent
        );
    }

    resp
}
