use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::{router, AppState, AuthPolicy};
use crate::assets::tests::png_bytes;
use crate::assets::AssetStore;
use crate::persistence::{Backend, FileStore};
use crate::service::ResourceService;

const TOKEN: &str = "test-token";
const BOUNDARY: &str = "XcontentBoundaryX";

struct TestApp {
    _dir: tempfile::TempDir,
    state: AppState,
}

impl TestApp {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let assets = Arc::new(AssetStore::new(dir.path().join("uploads")));
        let state = AppState {
            activities: Arc::new(ResourceService::new(
                Backend::File(FileStore::in_dir(&data_dir, None)),
                assets.clone(),
            )),
            events: Arc::new(ResourceService::new(
                Backend::File(FileStore::in_dir(&data_dir, None)),
                assets.clone(),
            )),
            photos: Arc::new(ResourceService::new(
                Backend::File(FileStore::in_dir(&data_dir, None)),
                assets.clone(),
            )),
            assets,
            auth: Arc::new(AuthPolicy::Bearer {
                token: TOKEN.to_string(),
            }),
        };
        Self { _dir: dir, state }
    }

    fn app(&self) -> Router {
        self.app_with_limit(5 * 1024 * 1024)
    }

    fn app_with_limit(&self, max_body_bytes: usize) -> Router {
        router(self.state.clone(), max_body_bytes)
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        Self::send_to(self.app(), req).await
    }

    async fn send_to(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }
}

fn json_request(method: Method, uri: &str, body: Value, authed: bool) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if authed {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {TOKEN}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Multipart body with text fields and one optional file part.
fn multipart_request(
    method: Method,
    uri: &str,
    texts: &[(&str, &str)],
    file: Option<(&str, &str, Vec<u8>)>,
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in texts {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((part, file_name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{part}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(&bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .body(Body::from(body))
        .unwrap()
}

fn karate() -> Value {
    json!({ "title": "Karate", "description": "Tuesdays", "displayOn": "activities" })
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, body) = app.send(get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_crud_roundtrip() {
    let app = TestApp::new();

    let (status, created) = app
        .send(json_request(Method::POST, "/api/activities", karate(), true))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["displayOn"], "activities");

    let (status, listed) = app.send(get("/api/activities")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed, json!([created]));

    let (status, updated) = app
        .send(json_request(
            Method::PUT,
            &format!("/api/activities/{id}"),
            json!({ "title": "Judo" }),
            true,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Judo");
    assert_eq!(updated["description"], "Tuesdays");

    let (status, found) = app.send(get(&format!("/api/activities/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found, updated);

    let delete = |authed| {
        json_request(
            Method::DELETE,
            &format!("/api/activities/{id}"),
            Value::Null,
            authed,
        )
    };
    let (status, body) = app.send(delete(true)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "removed": true }));
    let (status, body) = app.send(delete(true)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "removed": false }));

    let (status, body) = app.send(get(&format!("/api/activities/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_mutations_require_auth() {
    let app = TestApp::new();
    let (status, body) = app
        .send(json_request(Method::POST, "/api/events", json!({}), false))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let req = Request::builder()
        .method(Method::DELETE)
        .uri("/api/clear-uploads")
        .header(header::AUTHORIZATION, "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Reads stay public.
    let (status, _) = app.send(get("/api/events")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_validation_errors() {
    let app = TestApp::new();
    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/events",
            json!({ "title": "Gala" }),
            true,
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");
    assert!(body["message"].as_str().unwrap().contains("venue"));

    let (status, _) = app
        .send(json_request(
            Method::POST,
            "/api/activities",
            json!({ "title": "x", "description": "y", "displayOn": "z", "colour": "red" }),
            true,
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/activities")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = app.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn test_update_unknown_id_is_404() {
    let app = TestApp::new();
    let (status, _) = app
        .send(json_request(
            Method::PUT,
            "/api/photos/ghost",
            json!({ "category": "x" }),
            true,
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_multipart_create_stores_image() {
    let app = TestApp::new();
    let (status, created) = app
        .send(multipart_request(
            Method::POST,
            "/api/activities",
            &[
                ("title", "Karate"),
                ("description", "Tuesdays"),
                ("displayOn", "activities"),
            ],
            Some(("image", "Karate Class.png", png_bytes())),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let image = created["image"].as_str().unwrap();
    assert!(image.ends_with("-karate-class.jpg"));

    let (status, images) = app.send(get("/api/images")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(images, json!([format!("/uploads/{image}")]));

    let resp = app
        .app()
        .oneshot(get(&format!("/uploads/{image}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_non_image_upload_is_422_and_nothing_persisted() {
    let app = TestApp::new();
    let (status, body) = app
        .send(multipart_request(
            Method::POST,
            "/api/activities",
            &[
                ("title", "Karate"),
                ("description", "Tuesdays"),
                ("displayOn", "activities"),
            ],
            Some(("image", "notes.txt", b"hello".to_vec())),
        ))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "unsupported_image");

    let (_, listed) = app.send(get("/api/activities")).await;
    assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn test_photo_upload_and_delete_by_filename() {
    let app = TestApp::new();
    let (status, uploaded) = app
        .send(multipart_request(
            Method::POST,
            "/api/photos/upload",
            &[("category", "youth")],
            Some(("file", "team.png", png_bytes())),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(uploaded["category"], "youth");
    assert!(uploaded["uploadedAt"].is_string());
    let filename = uploaded["filename"].as_str().unwrap().to_string();

    let (_, photos) = app.send(get("/api/photos")).await;
    assert_eq!(photos[0]["image"], filename.as_str());

    let (status, _) = app
        .send(json_request(
            Method::DELETE,
            "/api/photos/delete",
            json!({ "filename": filename }),
            true,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, photos) = app.send(get("/api/photos")).await;
    assert_eq!(photos, json!([]));

    let (status, _) = app
        .send(json_request(
            Method::DELETE,
            "/api/photos/delete",
            json!({ "filename": filename }),
            true,
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_photo_upload_without_file_is_400() {
    let app = TestApp::new();
    let (status, _) = app
        .send(multipart_request(
            Method::POST,
            "/api/photos/upload",
            &[("category", "youth")],
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_clear_collection_and_uploads() {
    let app = TestApp::new();
    app.send(multipart_request(
        Method::POST,
        "/api/photos/upload",
        &[("category", "youth")],
        Some(("file", "a.png", png_bytes())),
    ))
    .await;

    let (status, _) = app
        .send(json_request(Method::DELETE, "/api/photos", Value::Null, true))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, photos) = app.send(get("/api/photos")).await;
    assert_eq!(photos, json!([]));

    let (status, body) = app
        .send(json_request(
            Method::DELETE,
            "/api/clear-uploads",
            Value::Null,
            true,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "removed": 1 }));
}

#[tokio::test]
async fn test_clear_uploads_removes_dotted_names() {
    let app = TestApp::new();
    let dir = app.state.assets.dir().to_path_buf();
    std::fs::create_dir_all(&dir).unwrap();
    for name in ["1700000000000-a..b.png", "1700000000001-ok.png"] {
        std::fs::write(dir.join(name), png_bytes()).unwrap();
    }

    let (status, body) = app
        .send(json_request(
            Method::DELETE,
            "/api/clear-uploads",
            Value::Null,
            true,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "removed": 2 }));
    assert!(app.state.assets.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_body_is_413() {
    let app = TestApp::new();
    let long = "x".repeat(4 * 1024);

    let mut body = karate();
    body["description"] = json!(long);
    let (status, json_body) = TestApp::send_to(
        app.app_with_limit(1024),
        json_request(Method::POST, "/api/activities", body, true),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json_body["error"], "payload_too_large");

    let (status, multipart_body) = TestApp::send_to(
        app.app_with_limit(1024),
        multipart_request(
            Method::POST,
            "/api/activities",
            &[("title", "Karate"), ("displayOn", "activities")],
            Some(("image", "big.png", vec![0u8; 4 * 1024])),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(multipart_body["error"], "payload_too_large");

    let (_, activities) = app.send(get("/api/activities")).await;
    assert_eq!(activities, json!([]));
    assert!(app.state.assets.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = TestApp::new();
    let (status, body) = app.send(get("/api/nothing-here")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_request_id_is_reflected() {
    let app = TestApp::new();
    let req = Request::builder()
        .uri("/api/health")
        .header("x-request-id", "abc123")
        .body(Body::empty())
        .unwrap();
    let resp = app.app().oneshot(req).await.unwrap();
    assert_eq!(resp.headers()["x-request-id"], "abc123");
}
