use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use domain::ProgressPolicy;
use domain::models::NewUser;
use domain::store::{MemoryStore, Store};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use super::create_router;
use crate::jwt::{JwtConfig, JwtService};
use crate::state::AppState;

struct TestApp {
    router: Router,
    store: Arc<dyn Store>,
    jwt: JwtService,
}

impl TestApp {
    fn new() -> Self {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let jwt = JwtService::new(JwtConfig::with_secret("rahasia-router", 300)).unwrap();
        let state = AppState::new(
            store.clone(),
            None,
            jwt.clone(),
            ProgressPolicy::AllDonations,
        );

        Self {
            router: create_router(state),
            store,
            jwt,
        }
    }

    /// Create a user without a password and return a bearer token for them
    async fn token_for(&self, name: &str) -> (Uuid, String) {
        let (user, _) = self
            .store
            .create_user(
                NewUser {
                    name: name.to_string(),
                    email: format!("{}@gotong.id", name),
                    password_hash: "unused".to_string(),
                },
                None,
            )
            .await
            .unwrap();
        (user.id, self.jwt.generate_access_token(user.id).unwrap())
    }

    async fn admin_token(&self) -> String {
        let admin = self
            .store
            .bootstrap_admin(NewUser {
                name: "Admin".to_string(),
                email: "admin@gotong.id".to_string(),
                password_hash: "unused".to_string(),
            })
            .await
            .unwrap();
        self.jwt.generate_access_token(admin.id).unwrap()
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "memory");
}

#[tokio::test]
async fn test_role_catalog_is_public() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/roles", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);
    assert_eq!(body[2]["name"], "donatur receiver");
    assert_eq!(body[2]["display_name"], "Penerima Donasi");
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = app
        .send(Method::GET, "/me", Some("garbage"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_login_and_me() {
    let app = TestApp::new();

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({
                "name": "Sinta",
                "email": "sinta@gotong.id",
                "password": "rahasia123",
                "requested_role": "pengelola proyek",
                "reason": "ingin membuat event"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["dashboard"], "user");
    assert_eq!(body["role_request"]["status"], "pending");
    assert!(body["user"].get("password_hash").is_none());

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": "sinta@gotong.id", "password": "rahasia123"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["access_token"].as_str().unwrap().to_string();

    let (status, body) = app.send(Method::GET, "/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "sinta@gotong.id");

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": "sinta@gotong.id", "password": "salah-sandi"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_role_request_flow_over_http() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let (_, user) = app.token_for("tari").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/role-requests",
            Some(&user),
            Some(json!({"role": "admin", "reason": "saya mau"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");

    let (status, body) = app
        .send(
            Method::POST,
            "/role-requests",
            Some(&user),
            Some(json!({"role": "pengelola proyek", "reason": "ingin membuat event"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_str().unwrap().to_string();
    let decision_uri = format!("/admin/role-requests/{}/decision", id);

    let (status, body) = app
        .send(
            Method::POST,
            &decision_uri,
            Some(&user),
            Some(json!({"decision": "approve"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "permission");

    let (status, body) = app
        .send(
            Method::POST,
            &decision_uri,
            Some(&admin),
            Some(json!({"decision": "approve"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "approved");

    let (status, body) = app
        .send(
            Method::POST,
            &decision_uri,
            Some(&admin),
            Some(json!({"decision": "reject"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (_, body) = app.send(Method::GET, "/me", Some(&user), None).await;
    assert_eq!(body["dashboard"], "project_manager");
    assert_eq!(body["roles"], json!(["pengelola proyek"]));
}

#[tokio::test]
async fn test_project_capacity_over_http() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let (_, first) = app.token_for("umi").await;
    let (_, second) = app.token_for("vano").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/projects",
            Some(&first),
            Some(json!({
                "name": "Bersih Sungai",
                "description": "Membersihkan sungai",
                "start_date": "2024-08-17",
                "required_participants": 1
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "permission");

    let (status, body) = app
        .send(
            Method::POST,
            "/projects",
            Some(&admin),
            Some(json!({
                "name": "Bersih Sungai",
                "description": "Membersihkan sungai",
                "start_date": "2024-08-17",
                "required_participants": 1
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let project_id = body["id"].as_str().unwrap().to_string();
    let join_uri = format!("/projects/{}/join", project_id);

    let (status, _) = app.send(Method::POST, &join_uri, Some(&first), None).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.send(Method::POST, &join_uri, Some(&first), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, body) = app.send(Method::POST, &join_uri, Some(&second), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "capacity");

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/projects/{}", project_id),
            Some(&first),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["participant_count"], 1);
    assert_eq!(body["joined"], true);

    let (status, body) = app
        .send(Method::GET, &format!("/projects/{}", project_id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["joined"], false);
}

#[tokio::test]
async fn test_donation_flow_over_http() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let (receiver_id, receiver) = app.token_for("wulan").await;
    let (_, donor) = app.token_for("yoga").await;

    let (status, _) = app
        .send(
            Method::POST,
            "/admin/roles/assign",
            Some(&admin),
            Some(json!({"user_id": receiver_id, "role": "donatur receiver"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(
            Method::POST,
            "/donation-requests",
            Some(&receiver),
            Some(json!({
                "title": "Seragam sekolah",
                "description": "Seragam untuk anak yatim",
                "category": "pendidikan",
                "type": "barang",
                "target_items": 10
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["kind"], "goods");
    let request_id = body["id"].as_str().unwrap().to_string();
    let donate_uri = format!("/donation-requests/{}/donations", request_id);
    let detail_uri = format!("/donation-requests/{}", request_id);

    let (status, body) = app
        .send(
            Method::POST,
            &donate_uri,
            Some(&donor),
            Some(json!({"item_description": "seragam SD", "quantity": 2})),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "state");

    let (status, _) = app.send(Method::GET, &detail_uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/admin/donation-requests/{}/decision", request_id),
            Some(&admin),
            Some(json!({"decision": "approve"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    for quantity in [2, 3, 4] {
        let (status, _) = app
            .send(
                Method::POST,
                &donate_uri,
                Some(&donor),
                Some(json!({"item_description": "seragam SD", "quantity": quantity})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = app.send(Method::GET, &detail_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["progress"]["collected"], 9);
    assert_eq!(body["progress"]["percent"], 90.0);
    assert_eq!(body["donations"].as_array().unwrap().len(), 3);

    let (status, body) = app.send(Method::GET, "/donation-requests", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = app.send(Method::GET, "/me/donations", Some(&donor), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);

    let donation_uri = format!("/donations/{}", body[0]["id"].as_str().unwrap());
    let (status, body) = app
        .send(
            Method::PUT,
            &donation_uri,
            Some(&receiver),
            Some(json!({"item_description": "seragam SMP", "quantity": 1})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "permission");

    let (status, body) = app
        .send(
            Method::PUT,
            &donation_uri,
            Some(&donor),
            Some(json!({"amount": 50000})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");

    let (status, body) = app
        .send(
            Method::PUT,
            &donation_uri,
            Some(&donor),
            Some(json!({"item_description": "seragam SMP", "quantity": 1})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["quantity"], 1);

    let (_, body) = app.send(Method::GET, &detail_uri, None, None).await;
    assert_eq!(body["progress"]["collected"], 6);
}
