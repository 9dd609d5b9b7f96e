//! Login, restore and logout against a mocked backend.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::Harness;
use mito_core::auth::{AuthService, SessionStore, StorageSessionStore};
use mito_core::http::ReqwestTransport;
use mito_core::storage::LocalStorage;
use mito_core::Error;

struct TestContext {
    server: MockServer,
    harness: Harness,
    auth: AuthService<StorageSessionStore>,
}

impl TestContext {
    async fn new() -> Self {
        common::init_logging();
        let server = MockServer::start().await;
        let transport = Arc::new(ReqwestTransport::new().unwrap());
        let harness = Harness::new(&format!("{}/api", server.uri()), transport, true);
        let store = StorageSessionStore::new(Arc::new(harness.storage.clone()));
        let auth = AuthService::new(harness.api.clone(), store);
        Self {
            server,
            harness,
            auth,
        }
    }

    async fn mock_login(&self) {
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(body_json(json!({"email": "ada@example.com", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user": {"id": 7, "name": "Ada", "email": "ada@example.com", "role": "staff"},
                "token": "good-token"
            })))
            .mount(&self.server)
            .await;
    }

    async fn mock_profile(&self, token: &str, status: u16, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/api/auth/me"))
            .and(header("Authorization", format!("Bearer {token}").as_str()))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }
}

#[tokio::test]
async fn login_persists_session_and_restore_validates_it() {
    let ctx = TestContext::new().await;
    ctx.mock_login().await;
    ctx.mock_profile(
        "good-token",
        200,
        json!({"id": 7, "name": "Ada Lovelace", "department": {"id": 2, "name": "Ops"}}),
    )
    .await;

    let session = ctx.auth.login("ada@example.com", "pw").await.unwrap();
    assert_eq!(session.token, "good-token");
    assert_eq!(session.user.id.as_str(), "7");
    assert_eq!(
        ctx.harness.storage.get_item("token").unwrap().as_deref(),
        Some("good-token")
    );

    let restored = ctx.auth.restore().await.unwrap().expect("session restored");
    assert_eq!(restored.user.name.as_deref(), Some("Ada"));

    let refreshed = ctx.auth.refresh_profile().await.unwrap();
    assert_eq!(refreshed.user.name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(refreshed.user.role.as_deref(), Some("staff"));
    assert_eq!(
        ctx.auth.store().load_session().unwrap().unwrap().user.name.as_deref(),
        Some("Ada Lovelace")
    );
}

#[tokio::test]
async fn failed_validation_clears_stored_credentials() {
    let ctx = TestContext::new().await;
    ctx.harness.storage.set_item("user", r#"{"id":7,"name":"Ada"}"#).unwrap();
    ctx.harness.storage.set_item("token", "stale-token").unwrap();
    ctx.mock_profile("stale-token", 401, json!({"error": "Invalid token"}))
        .await;

    assert!(ctx.auth.restore().await.unwrap().is_none());
    assert_eq!(ctx.harness.storage.get_item("user").unwrap(), None);
    assert_eq!(ctx.harness.storage.get_item("token").unwrap(), None);
}

#[tokio::test]
async fn login_error_surfaces_server_message() {
    let ctx = TestContext::new().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid credentials"})),
        )
        .mount(&ctx.server)
        .await;

    let error = ctx.auth.login("ada@example.com", "wrong").await.unwrap_err();
    match error {
        Error::Http { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Invalid credentials");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(ctx.auth.current().unwrap().is_none());
}

#[tokio::test]
async fn logout_clears_even_when_backend_fails() {
    let ctx = TestContext::new().await;
    ctx.mock_login().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&ctx.server)
        .await;

    ctx.auth.login("ada@example.com", "pw").await.unwrap();
    ctx.auth.logout().await.unwrap();
    assert!(ctx.auth.current().unwrap().is_none());
}

#[tokio::test]
async fn tasks_are_filtered_by_assignee() {
    let ctx = TestContext::new().await;
    Mock::given(method("GET"))
        .and(path("/api/tasks"))
        .and(wiremock::matchers::query_param("assignedTo", "user 7"))
        .and(header("Authorization", "Bearer t"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "title": "Fix printer", "status": "open", "ticketId": 9}
        ])))
        .mount(&ctx.server)
        .await;

    let tasks = ctx
        .harness
        .api
        .get_tasks("t", Some(&"user 7".into()))
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title.as_deref(), Some("Fix printer"));
    assert_eq!(tasks[0].extra.get("ticketId"), Some(&json!(9)));
}

#[tokio::test]
async fn unread_count_is_derived_from_the_list() {
    let ctx = TestContext::new().await;
    Mock::given(method("GET"))
        .and(path("/api/notifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "title": "a", "isRead": false},
            {"id": 2, "title": "b", "isRead": true},
            {"id": 3, "title": "c"}
        ])))
        .mount(&ctx.server)
        .await;

    assert_eq!(ctx.harness.api.unread_notification_count("t").await.unwrap(), 2);
}

#[tokio::test]
async fn attachment_upload_is_multipart() {
    let ctx = TestContext::new().await;
    Mock::given(method("POST"))
        .and(path("/api/files/task/5"))
        .and(header("Authorization", "Bearer t"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 11, "filename": "report.pdf", "mimetype": "application/pdf", "size": 3
        })))
        .mount(&ctx.server)
        .await;

    let attachment = ctx
        .harness
        .api
        .upload_task_attachment("t", &"5".into(), "/tmp/report.pdf", b"pdf".to_vec())
        .await
        .unwrap();
    assert_eq!(attachment.id.as_str(), "11");

    let requests = ctx.server.received_requests().await.unwrap();
    let content_type = requests[0]
        .headers
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("multipart/form-data"));
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("filename=\"report.pdf\""));
    assert!(body.contains("application/pdf"));
}
