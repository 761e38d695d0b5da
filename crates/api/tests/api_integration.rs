//! API integration tests.
//!
//! Exercise the router, auth middleware and handlers together against the
//! in-memory document store. No external services are wired in: identity,
//! email, media and AI stay disabled, push keeps only its token registry.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    middleware,
};
use comunimapp_api::{AppState, auth_middleware, router as api_router};
use comunimapp_common::config::SessionConfig;
use comunimapp_core::{
    CaseUpdateService, MetricsService, NotificationService, PushService, ReportService,
    SessionService, UserService,
};
use comunimapp_db::MemoryStore;
use comunimapp_db::repositories::{
    CaseUpdateRepository, FcmTokenRepository, NotificationRepository, ReportRepository,
    UserRepository,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

fn test_app() -> (Router, UserRepository) {
    let store = Arc::new(MemoryStore::new());

    let user_repo = UserRepository::new(store.clone());
    let report_repo = ReportRepository::new(store.clone());
    let case_update_repo = CaseUpdateRepository::new(store.clone());
    let notification_repo = NotificationRepository::new(store.clone());
    let fcm_token_repo = FcmTokenRepository::new(store);

    let session_service = SessionService::new(&SessionConfig {
        secret: "integration-test-secret".to_string(),
        expiry_hours: 24,
    });
    let push_service = Arc::new(PushService::new(
        fcm_token_repo,
        None,
        "test-project".to_string(),
        false,
    ));
    let notification_service = Arc::new(NotificationService::new(notification_repo, None, None));
    let user_service = UserService::new(
        user_repo.clone(),
        session_service.clone(),
        None,
        None,
        "http://localhost:8000".to_string(),
    );
    let report_service = ReportService::new(
        report_repo.clone(),
        user_repo.clone(),
        case_update_repo.clone(),
        Arc::clone(&notification_service),
        None,
    );
    let case_update_service = CaseUpdateService::new(
        case_update_repo,
        report_repo.clone(),
        user_repo.clone(),
        Arc::clone(&notification_service),
        None,
    );
    let metrics_service = MetricsService::new(report_repo, None);

    let state = AppState {
        user_service,
        report_service,
        case_update_service,
        notification_service,
        push_service: Some(push_service),
        metrics_service,
        session_service,
        identity_service: None,
        users: user_repo.clone(),
    };

    let app = api_router()
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state);
    (app, user_repo)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

async fn register(app: &Router, role: &str, email: &str, username: &str) {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/auth/register/{role}"),
            &json!({ "email": email, "username": username, "password": "secret123" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

async fn login(app: &Router, email: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            &json!({ "email": email, "password": "secret123" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    body["access_token"].as_str().unwrap().to_string()
}

/// Register an admin and log in. Admins start verified.
async fn admin_token(app: &Router) -> String {
    register(app, "admin", "root@example.com", "root").await;
    login(app, "root@example.com").await
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = test_app();
    let response = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_register_login_and_me() {
    let (app, _) = test_app();
    let token = admin_token(&app).await;

    let response = app
        .clone()
        .oneshot(authed_request("GET", "/auth/me", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let me = body_json(response).await;
    assert_eq!(me["username"], "root");
    assert_eq!(me["role"], "admin");

    let response = app
        .oneshot(authed_request("GET", "/auth/verify-token", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let verdict = body_json(response).await;
    assert_eq!(verdict["valid"], true);
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let (app, _) = test_app();

    let response = app
        .clone()
        .oneshot(Request::get("/auth/me").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(authed_request("GET", "/auth/me", "not-a-valid-jwt"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_deleted_user_token_is_not_found() {
    let (app, users) = test_app();
    let token = admin_token(&app).await;
    register(&app, "admin", "second@example.com", "second").await;
    let second_token = login(&app, "second@example.com").await;

    let first = users.find_by_email("root@example.com").await.unwrap().unwrap();
    let response = app
        .clone()
        .oneshot(authed_request(
            "DELETE",
            &format!("/users/{}", first.id),
            &second_token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The old token is still a valid signature but points nowhere.
    let response = app
        .oneshot(authed_request("GET", "/auth/me", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reporter_verification_and_multipart_report() {
    let (app, users) = test_app();
    register(&app, "reportante", "ana@example.com", "ana").await;

    // Unverified reporters cannot log in yet.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            &json!({ "email": "ana@example.com", "password": "secret123" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let ana = users.find_by_email("ana@example.com").await.unwrap().unwrap();
    let verification = ana.verification_token.unwrap();
    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/auth/verify-email?token={verification}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let token = login(&app, "ana@example.com").await;
    let form = concat!(
        "--boundary\r\n",
        "Content-Disposition: form-data; name=\"description\"\r\n\r\n",
        "Menores trabajando en ladrillera\r\n",
        "--boundary\r\n",
        "Content-Disposition: form-data; name=\"latitude\"\r\n\r\n",
        "4.61\r\n",
        "--boundary\r\n",
        "Content-Disposition: form-data; name=\"longitude\"\r\n\r\n",
        "-74.08\r\n",
        "--boundary\r\n",
        "Content-Disposition: form-data; name=\"priority\"\r\n\r\n",
        "alta\r\n",
        "--boundary--\r\n",
    );
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/reports")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(
                    header::CONTENT_TYPE,
                    "multipart/form-data; boundary=boundary",
                )
                .body(Body::from(form))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let report = body_json(response).await;
    assert_eq!(report["status"], "pendiente");
    assert_eq!(report["priority"], "alta");

    let response = app
        .oneshot(authed_request("GET", "/reports", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let reports = body_json(response).await;
    assert_eq!(reports.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_only_reporters_file_reports() {
    let (app, _) = test_app();
    let admin = admin_token(&app).await;

    let form = concat!(
        "--boundary\r\n",
        "Content-Disposition: form-data; name=\"description\"\r\n\r\n",
        "Menores trabajando en ladrillera\r\n",
        "--boundary\r\n",
        "Content-Disposition: form-data; name=\"latitude\"\r\n\r\n",
        "4.61\r\n",
        "--boundary\r\n",
        "Content-Disposition: form-data; name=\"longitude\"\r\n\r\n",
        "-74.08\r\n",
        "--boundary--\r\n",
    );
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/reports")
                .header(header::AUTHORIZATION, format!("Bearer {admin}"))
                .header(
                    header::CONTENT_TYPE,
                    "multipart/form-data; boundary=boundary",
                )
                .body(Body::from(form))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_dashboard_requires_auth() {
    let (app, _) = test_app();

    let response = app
        .clone()
        .oneshot(
            Request::get("/metrics/dashboard")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let token = admin_token(&app).await;
    let response = app
        .oneshot(authed_request("GET", "/metrics/dashboard", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let dashboard = body_json(response).await;
    assert_eq!(dashboard["kpis_negocio"]["total_reportes"], 0);
}

#[tokio::test]
async fn test_fcm_token_registry() {
    let (app, _) = test_app();
    let token = admin_token(&app).await;

    let response = app
        .clone()
        .oneshot(json_request("POST", "/fcm/tokens", &json!({ "token": "device-abc", "device_type": "android" })))
        .await
        .unwrap();
    // No bearer token on the request.
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/fcm/tokens")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "token": "device-abc", "device_type": "android" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(authed_request("DELETE", "/fcm/tokens/device-abc", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
