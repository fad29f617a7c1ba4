#![allow(dead_code)]

use reqwest::Client;
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};
use sea_orm_migration::MigratorTrait;
use serde_json::Value;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Once,
};
use tokio::sync::OnceCell;

static INIT: Once = Once::new();
static SCHEMA_READY: OnceCell<()> = OnceCell::const_new();
static NAME_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn init_env() {
    INIT.call_once(|| {
        dotenv::dotenv().ok();
        std::env::set_var(
            "JWT_SECRET",
            "integration_test_secret_that_is_at_least_32_characters_long",
        );
        let config = chat_api::config::jwt::JwtConfig::from_env().unwrap();
        let _ = chat_api::utils::jwt::init_jwt_config(config);
    });
}

pub struct TestApp {
    pub addr: String,
    pub db: DatabaseConnection,
    pub client: Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.addr, path)
    }

    /// `GET /servers` with the given query string, returning status and body.
    pub async fn list_servers(&self, query: &str, token: Option<&str>) -> (u16, Value) {
        let mut request = self.client.get(self.url(&format!("/servers?{}", query)));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let resp = request.send().await.expect("Failed to list servers");
        let status = resp.status().as_u16();
        let body = resp.json().await.expect("Failed to parse server list");
        (status, body)
    }
}

pub async fn spawn_app() -> TestApp {
    init_env();

    let database_url = std::env::var("TEST_DATABASE_URL")
        .unwrap_or_else(|_| std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"));

    let db = sea_orm::Database::connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    // Migrate and wipe once per test binary; tests inside a binary share the
    // tables and keep to their own rows through unique names.
    SCHEMA_READY
        .get_or_init(|| async {
            chat_api::migration::Migrator::up(&db, None)
                .await
                .expect("Failed to run migrations");
            cleanup_tables(&db).await;
        })
        .await;

    let app = axum::Router::new()
        .route("/", axum::routing::get(|| async { "ok" }))
        .merge(chat_api::routes::create_routes())
        .layer(axum::extract::Extension(db.clone()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        addr: format!("http://{}", addr),
        db,
        client: Client::new(),
    }
}

async fn cleanup_tables(db: &DatabaseConnection) {
    let tables = ["channels", "server_members", "servers", "categories", "users"];

    for table in tables {
        let sql = format!("TRUNCATE TABLE {} RESTART IDENTITY CASCADE", table);
        let _ = db
            .execute(Statement::from_string(
                sea_orm::DatabaseBackend::Postgres,
                sql,
            ))
            .await;
    }
}

/// A name no other test in this binary will use.
pub fn unique(prefix: &str) -> String {
    format!("{}_{}", prefix, NAME_COUNTER.fetch_add(1, Ordering::SeqCst))
}

/// Register a user and return (user_id, token).
pub async fn create_test_user(app: &TestApp, username_prefix: &str) -> (i32, String) {
    let username = unique(username_prefix);

    let resp = app
        .client
        .post(app.url("/auth/register"))
        .json(&serde_json::json!({
            "username": username,
            "email": format!("{}@test.com", username),
            "password": "test_password_123"
        }))
        .send()
        .await
        .expect("Failed to register user");

    let status = resp.status();
    let body: Value = resp.json().await.expect("Failed to parse register response");
    assert_eq!(status, 201, "Failed to register '{}': {}", username, body);

    let user_id = body["user_id"].as_i64().expect("Response missing user_id") as i32;
    let token = body["token"]
        .as_str()
        .expect("Response missing token")
        .to_string();
    (user_id, token)
}

/// Register a user and promote them to admin.
pub async fn create_admin(app: &TestApp) -> (i32, String) {
    let (id, token) = create_test_user(app, "admin").await;
    make_admin(&app.db, id).await;
    (id, token)
}

/// Make a user admin by directly updating the database.
pub async fn make_admin(db: &DatabaseConnection, user_id: i32) {
    db.execute(Statement::from_sql_and_values(
        sea_orm::DatabaseBackend::Postgres,
        "UPDATE users SET role = 'admin' WHERE id = $1",
        vec![user_id.into()],
    ))
    .await
    .expect("Failed to make user admin");
}

/// Create a category with a unique name derived from `prefix`.
/// Returns (category_id, name).
pub async fn create_category(app: &TestApp, admin_token: &str, prefix: &str) -> (i32, String) {
    let name = unique(prefix);
    let resp = app
        .client
        .post(app.url("/categories"))
        .bearer_auth(admin_token)
        .json(&serde_json::json!({ "name": name }))
        .send()
        .await
        .expect("Failed to create category");

    let status = resp.status();
    let body: Value = resp.json().await.expect("Failed to parse response");
    assert_eq!(status, 201, "Failed to create category: {}", body);
    (body["id"].as_i64().expect("Response missing id") as i32, name)
}

/// Create a server owned by the token's user and return its id.
pub async fn create_server(app: &TestApp, token: &str, category_id: i32, name: &str) -> i32 {
    let resp = app
        .client
        .post(app.url("/servers"))
        .bearer_auth(token)
        .json(&serde_json::json!({ "name": name, "category": category_id }))
        .send()
        .await
        .expect("Failed to create server");

    let status = resp.status();
    let body: Value = resp.json().await.expect("Failed to parse response");
    assert_eq!(status, 201, "Failed to create server: {}", body);
    body["id"].as_i64().expect("Response missing id") as i32
}

pub async fn join_server(app: &TestApp, token: &str, server_id: i32) {
    let resp = app
        .client
        .post(app.url(&format!("/servers/{}/members", server_id)))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to join server");
    assert_eq!(resp.status(), 204);
}

/// Create a channel and return the response body.
pub async fn create_channel(app: &TestApp, token: &str, server_id: i32, name: &str) -> Value {
    let resp = app
        .client
        .post(app.url(&format!("/servers/{}/channels", server_id)))
        .bearer_auth(token)
        .json(&serde_json::json!({ "name": name, "topic": "general chat" }))
        .send()
        .await
        .expect("Failed to create channel");

    let status = resp.status();
    let body: Value = resp.json().await.expect("Failed to parse response");
    assert_eq!(status, 201, "Failed to create channel: {}", body);
    body
}

/// Ids of a server list response, in order.
pub fn ids(body: &Value) -> Vec<i32> {
    body.as_array()
        .expect("Expected a JSON array")
        .iter()
        .map(|s| s["id"].as_i64().expect("Server missing id") as i32)
        .collect()
}
