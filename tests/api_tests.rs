use dashboard_api::{
    AppConfig, AppState, InMemoryRepository, MockMailer, create_router,
    auth::Claims,
    mailer::MailerState,
    models::{Project, User},
    repository::{Repository, RepositoryState},
    types::PermissionScope,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use reqwest::{StatusCode, header};
use serde_json::{Value, json};
use std::{sync::Arc, time::SystemTime};
use tokio::net::TcpListener;
use uuid::Uuid;

pub struct TestApp {
    pub address: String,
    pub repo: Arc<InMemoryRepository>,
    pub mailer: Arc<MockMailer>,
    pub user_id: Uuid,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}

async fn spawn_app() -> TestApp {
    let repo = Arc::new(InMemoryRepository::new());
    let mailer = Arc::new(MockMailer::new());

    let user_id = Uuid::new_v4();
    repo.create_user(User {
        id: user_id,
        email: "owner@example.com".to_string(),
        ..User::default()
    })
    .await
    .unwrap();

    let state = AppState {
        repo: repo.clone() as RepositoryState,
        mailer: mailer.clone() as MailerState,
        config: AppConfig::default(),
    };
    let router = create_router(state).expect("route registration failed");

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        repo,
        mailer,
        user_id,
    }
}

fn token_with_scopes(user_id: Uuid, scopes: Vec<PermissionScope>) -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize;
    let claims = Claims {
        sub: user_id,
        iat: now,
        exp: now + 3600,
        scopes,
    };
    let secret = AppConfig::default().jwt_secret;
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = reqwest::get(app.url("/health")).await.expect("req fail");
    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_auth_check_with_local_bypass() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(app.url("/api/auth/check"))
        .header("x-user-id", app.user_id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["id"], app.user_id.to_string());
    assert_eq!(body["email"], "owner@example.com");
    assert_eq!(body["email_verified"], false);
}

#[tokio::test]
async fn test_unauthenticated_request_gets_error_envelope() {
    let app = spawn_app().await;

    let response = reqwest::get(app.url("/api/projects")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "unauthenticated");
}

#[tokio::test]
async fn test_logout() {
    let app = spawn_app().await;
    let response = reqwest::Client::new()
        .post(app.url("/api/logout"))
        .header("x-user-id", app.user_id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_project_lifecycle() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let user = app.user_id.to_string();

    // Create
    let response = client
        .post(app.url("/api/projects"))
        .header("x-user-id", &user)
        .json(&json!({ "name": "alpha" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Project = response.json().await.unwrap();
    assert_eq!(created.name, "alpha");
    assert_eq!(created.user_id, app.user_id);

    // Same name again
    let response = client
        .post(app.url("/api/projects"))
        .header("x-user-id", &user)
        .json(&json!({ "name": "alpha" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // List
    let projects: Vec<Project> = client
        .get(app.url("/api/projects"))
        .header("x-user-id", &user)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(projects, vec![created.clone()]);

    // Get
    let response = client
        .get(app.url(&format!("/api/projects/{}", created.id)))
        .header("x-user-id", &user)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched: Project = response.json().await.unwrap();
    assert_eq!(fetched, created);

    // Delete
    let response = client
        .delete(app.url(&format!("/api/projects/{}", created.id)))
        .header("x-user-id", &user)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Gone
    let response = client
        .get(app.url(&format!("/api/projects/{}", created.id)))
        .header("x-user-id", &user)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_create_project_rejects_invalid_payloads() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(app.url("/api/projects"))
        .header("x-user-id", app.user_id.to_string())
        .json(&json!({ "name": "no/slashes" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let response = client
        .post(app.url("/api/projects"))
        .header("x-user-id", app.user_id.to_string())
        .header(header::CONTENT_TYPE, "application/json")
        .body("{")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_project_routes_reject_malformed_ids() {
    let app = spawn_app().await;

    let response = reqwest::Client::new()
        .get(app.url("/api/projects/not-a-uuid"))
        .header("x-user-id", app.user_id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "project_id must be a valid UUID");
}

#[tokio::test]
async fn test_projects_are_private_to_their_owner() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let project = app
        .repo
        .create_project(app.user_id, "secret")
        .await
        .unwrap();

    let stranger = Uuid::new_v4();
    app.repo
        .create_user(User {
            id: stranger,
            email: "stranger@example.com".to_string(),
            ..User::default()
        })
        .await
        .unwrap();

    let response = client
        .get(app.url(&format!("/api/projects/{}", project.id)))
        .header("x-user-id", stranger.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_scope_is_forbidden() {
    let app = spawn_app().await;
    let token = token_with_scopes(app.user_id, vec![PermissionScope::Project]);

    let response = reqwest::Client::new()
        .get(app.url("/api/projects"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn test_user_scope_alone_cannot_reach_project_routes() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let token = token_with_scopes(app.user_id, vec![PermissionScope::User]);

    let response = client
        .get(app.url("/api/projects"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .get(app.url(&format!("/api/projects/{}", Uuid::new_v4())))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_email_verification_flow_redirects_to_dashboard() {
    let app = spawn_app().await;
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let user = app.user_id.to_string();

    let response = client
        .post(app.url("/api/email/verify/initiate"))
        .header("x-user-id", &user)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "owner@example.com");
    let query = sent[0]
        .link
        .split_once('?')
        .map(|(_, query)| query.to_string())
        .unwrap();
    assert!(sent[0]
        .link
        .starts_with("http://localhost:3000/api/email/verify/finalize?token="));

    let response = client
        .get(app.url(&format!("/api/email/verify/finalize?{query}")))
        .header("x-user-id", &user)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[header::LOCATION],
        "http://localhost:3000/dashboard"
    );

    let stored = app.repo.get_user(app.user_id).await.unwrap().unwrap();
    assert!(stored.email_verified);

    // Tokens are single use.
    let response = client
        .get(app.url(&format!("/api/email/verify/finalize?{query}")))
        .header("x-user-id", &user)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[header::LOCATION],
        "http://localhost:3000/dashboard?error=not_found"
    );

    // Already verified
    let response = client
        .post(app.url("/api/email/verify/initiate"))
        .header("x-user-id", &user)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_finalize_with_another_users_token_leaves_it_usable() {
    let app = spawn_app().await;
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    let other = Uuid::new_v4();
    app.repo
        .create_user(User {
            id: other,
            email: "other@example.com".to_string(),
            ..User::default()
        })
        .await
        .unwrap();

    let response = client
        .post(app.url("/api/email/verify/initiate"))
        .header("x-user-id", app.user_id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let link = app.mailer.sent()[0].link.clone();
    let query = link.split_once('?').map(|(_, q)| q.to_string()).unwrap();

    // Someone else presents the owner's token.
    let response = client
        .get(app.url(&format!("/api/email/verify/finalize?{query}")))
        .header("x-user-id", other.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[header::LOCATION],
        "http://localhost:3000/dashboard?error=not_found"
    );
    let other_user = app.repo.get_user(other).await.unwrap().unwrap();
    assert!(!other_user.email_verified);

    // The owner can still finish verification.
    let response = client
        .get(app.url(&format!("/api/email/verify/finalize?{query}")))
        .header("x-user-id", app.user_id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(
        response.headers()[header::LOCATION],
        "http://localhost:3000/dashboard"
    );
    let owner = app.repo.get_user(app.user_id).await.unwrap().unwrap();
    assert!(owner.email_verified);
}

#[tokio::test]
async fn test_concurrent_creates_with_same_name_yield_one_project() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let user = app.user_id.to_string();

    let create = || {
        client
            .post(app.url("/api/projects"))
            .header("x-user-id", &user)
            .json(&json!({ "name": "race" }))
            .send()
    };
    let (first, second) = tokio::join!(create(), create());

    let mut statuses = vec![first.unwrap().status(), second.unwrap().status()];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::CONFLICT]);
    assert_eq!(app.repo.list_projects(app.user_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_finalize_without_token_redirects_with_error() {
    let app = spawn_app().await;
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    let response = client
        .get(app.url("/api/email/verify/finalize"))
        .header("x-user-id", app.user_id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[header::LOCATION],
        "http://localhost:3000/dashboard?error=bad_request"
    );
}

#[tokio::test]
async fn test_delete_current_user_ends_the_session() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let user = app.user_id.to_string();

    app.repo.create_project(app.user_id, "doomed").await.unwrap();

    let response = client
        .delete(app.url("/api/users/current"))
        .header("x-user-id", &user)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.repo.list_projects(app.user_id).await.unwrap().is_empty());

    let response = client
        .get(app.url("/api/auth/check"))
        .header("x-user-id", &user)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = spawn_app().await;

    let doc: Value = reqwest::get(app.url("/api-docs/openapi.json"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(doc["info"]["title"], "Dashboard API");
    assert!(doc["paths"]["/api/projects"]["post"].is_object());
    assert!(doc["paths"]["/api/projects/{project_id}"]["delete"].is_object());
    assert!(doc["paths"]["/api/email/verify/finalize"]["get"]["responses"]["302"].is_object());
}
