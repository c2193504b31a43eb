//! Router tests.
//!
//! Requests go through the full router (body limit, CORS, tracing) with
//! `tower::ServiceExt::oneshot`; the core runs against a recording engine.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use docrights_server::handlers::FileResponse;
use docrights_server::{build_router, service_from_config, AppState};
use docrights_service::engine::EngineBootstrap;
use docrights_service::testing::{EngineStep, RecordingEngine};
use docrights_service::{NotificationTrigger, ProtectionService, ServiceConfig};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "docrights-test-boundary";

struct TestApp {
    _dir: TempDir,
    engine: RecordingEngine,
    router: Router,
}

fn config(dir: &TempDir) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.engine.service_account = "svc@contoso.com".to_string();
    config.engine.cache_path = dir.path().join("cache");
    config.staging.input_dir = dir.path().join("input");
    config.staging.protected_dir = dir.path().join("protected");
    config.staging.unprotected_dir = dir.path().join("unprotected");
    config
}

fn app(engine: RecordingEngine) -> TestApp {
    let dir = TempDir::new().unwrap();
    let service = ProtectionService::new(
        config(&dir),
        Arc::new(EngineBootstrap::new(Arc::new(engine.clone()))),
        NotificationTrigger::disabled(),
    );
    TestApp {
        _dir: dir,
        engine,
        router: build_router(Arc::new(AppState::new(service))),
    }
}

fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart_request(uri: &str, fields: &[(&str, &str)], file: Option<&[u8]>) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(bytes) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"File\"; filename=\"upload.bin\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn test_protect_returns_encoded_content() {
    let app = app(RecordingEngine::new().with_label("lbl-1", "Confidential"));

    let response = app
        .router
        .oneshot(json_request(
            "/api/v1/protect",
            serde_json::json!({
                "fileName": "plan.docx",
                "fileBase64StringContent": STANDARD.encode(b"quarterly plan"),
                "email": "a@x.com,b@x.com",
                "fileAccessRightType": "1,2",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: FileResponse = body_json(response).await;
    assert_eq!(body.status_code, 200);
    assert_eq!(body.status_message, "Success");
    assert_eq!(
        STANDARD.decode(body.file_response_content).unwrap(),
        b"quarterly plan"
    );
    assert_eq!(app.engine.applied_plans().len(), 1);
}

#[tokio::test]
async fn test_protect_requires_rights_codes() {
    let app = app(RecordingEngine::new());

    let response = app
        .router
        .oneshot(json_request(
            "/api/v1/protect",
            serde_json::json!({
                "fileName": "plan.docx",
                "fileBase64StringContent": STANDARD.encode(b"x"),
                "email": "a@x.com",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = body_json(response).await;
    assert_eq!(body["error"], "fileAccessRightType is required.");
    assert_eq!(app.engine.initializations(), 0);
}

#[tokio::test]
async fn test_traversal_is_bad_request() {
    let app = app(RecordingEngine::new());

    let response = app
        .router
        .oneshot(json_request(
            "/api/v1/unprotect",
            serde_json::json!({
                "fileName": "../secrets.docx",
                "fileBase64StringContent": STANDARD.encode(b"x"),
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: FileResponse = body_json(response).await;
    assert_eq!(body.status_code, 400);
    assert!(body.status_message.starts_with("Error: "));
    assert!(body.file_response_content.is_empty());
}

#[tokio::test]
async fn test_engine_failure_maps_to_bad_gateway() {
    let app = app(RecordingEngine::new().failing(EngineStep::Commit));

    let response = app
        .router
        .oneshot(json_request(
            "/api/v1/permissions",
            serde_json::json!({
                "fileName": "plan.docx",
                "fileBase64StringContent": STANDARD.encode(b"x"),
                "email": "a@x.com",
                "fileAccessRightType": "1",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: FileResponse = body_json(response).await;
    assert_eq!(body.status_code, 502);
    assert_eq!(app.engine.shutdowns(), 1);
}

#[tokio::test]
async fn test_unprotect_legacy_route() {
    let app = app(RecordingEngine::new());

    let response = app
        .router
        .oneshot(json_request(
            "/api/FileProtection/GetUnProtectedFileDetails",
            serde_json::json!({
                "fileName": "plan.docx",
                "fileBase64StringContent": STANDARD.encode(b"plain"),
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: FileResponse = body_json(response).await;
    assert_eq!(STANDARD.decode(body.file_response_content).unwrap(), b"plain");
}

#[tokio::test]
async fn test_protect_with_owner_downloads_file() {
    let app = app(RecordingEngine::new());

    let response = app
        .router
        .oneshot(multipart_request(
            "/api/v1/protect/owner",
            &[
                ("FileName", "plan.docx"),
                ("OwnerEmailId", "boss@x.com"),
                ("Email", "a@x.com"),
                ("FileAccessRightType", "1"),
            ],
            Some(b"raw bytes"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/octet-stream"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"plan.docx\""
    );
    assert_eq!(body_bytes(response).await, b"raw bytes");
    assert_eq!(app.engine.applied_plans()[0].owner(), "boss@x.com");
}

#[tokio::test]
async fn test_protect_with_owner_requires_owner() {
    let app = app(RecordingEngine::new());

    let response = app
        .router
        .oneshot(multipart_request(
            "/api/v1/protect/owner",
            &[("FileName", "plan.docx")],
            Some(b"raw bytes"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = body_json(response).await;
    assert_eq!(body["error"], "OwnerEmailId is required.");
}

#[tokio::test]
async fn test_multipart_requires_file() {
    let app = app(RecordingEngine::new());

    let response = app
        .router
        .oneshot(multipart_request(
            "/api/v1/protect/subject-owner",
            &[("FileName", "plan.docx"), ("Email", "lead@x.com")],
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = body_json(response).await;
    assert_eq!(body["error"], "File is required.");
}

#[tokio::test]
async fn test_protect_with_subject_owner() {
    let app = app(RecordingEngine::new());

    let response = app
        .router
        .oneshot(multipart_request(
            "/api/v1/protect/subject-owner",
            &[
                ("FileName", "plan.docx"),
                ("Email", "lead@x.com,b@x.com"),
                ("FileAccessRightType", "2"),
                ("RetainOutputFiles", "false"),
            ],
            Some(b"raw bytes"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.engine.applied_plans()[0].owner(), "lead@x.com");
}

#[tokio::test]
async fn test_bad_retention_flag_rejected() {
    let app = app(RecordingEngine::new());

    let response = app
        .router
        .oneshot(multipart_request(
            "/api/v1/protect/subject-owner",
            &[
                ("FileName", "plan.docx"),
                ("Email", "lead@x.com"),
                ("RetainInputFiles", "sometimes"),
            ],
            Some(b"raw bytes"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_routes() {
    let app = app(RecordingEngine::new());

    let live = app
        .router
        .clone()
        .oneshot(Request::get("/api/v1/health/live").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(live.status(), StatusCode::OK);

    let ready = app
        .router
        .clone()
        .oneshot(Request::get("/api/v1/health/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(ready.status(), StatusCode::OK);

    let legacy = app
        .router
        .oneshot(Request::get("/api/HealthCheck/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(legacy.status(), StatusCode::OK);
    let body: serde_json::Value = body_json(legacy).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_unhealthy_engine_reports_unavailable() {
    let app = app(RecordingEngine::new().failing(EngineStep::Initialize));

    let response = app
        .router
        .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = body_json(response).await;
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn test_service_from_default_config_uses_envelope_engine() {
    let dir = TempDir::new().unwrap();
    let service = service_from_config(config(&dir)).unwrap();
    let router = build_router(Arc::new(AppState::new(service)));

    let response = router
        .oneshot(json_request(
            "/api/v1/protect",
            serde_json::json!({
                "fileName": "notes.txt",
                "fileBase64StringContent": STANDARD.encode(b"hello"),
                "email": "a@x.com",
                "fileAccessRightType": "1",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: FileResponse = body_json(response).await;
    let protected = STANDARD.decode(body.file_response_content).unwrap();
    assert!(protected.starts_with(b"DOCRIGHTS-ENVELOPE/1\n"));
    assert!(protected.ends_with(b"hello"));
}
