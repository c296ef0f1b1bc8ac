// tests/common/mod.rs

#![allow(dead_code)]

use std::net::SocketAddr;

use psy_admin_backend::{config::Config, db, routes, services::admins, state::AppState};
use serde_json::Value;
use sqlx::SqlitePool;
use tempfile::TempDir;

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin123";

pub struct TestApp {
    /// Base URL, e.g. "http://127.0.0.1:12345".
    pub address: String,
    pub pool: SqlitePool,
    pub config: Config,
    pub client: reqwest::Client,
    // Keeps the database and report directories alive for the test.
    _dir: TempDir,
}

/// Spawns the app on a random port against a fresh SQLite file.
pub async fn spawn_app() -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let database_url = format!("sqlite://{}", dir.path().join("test.db").display());

    let pool = db::connect(&database_url, 4)
        .await
        .expect("Failed to open test database");
    db::migrate(&pool).await.expect("Failed to migrate database");

    admins::ensure_admin(&pool, ADMIN_USERNAME, ADMIN_PASSWORD)
        .await
        .expect("Failed to seed admin");

    let config = Config {
        database_url,
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
        allowed_origins: vec!["http://localhost:8080".to_string()],
        report_dir: dir.path().join("reports"),
        export_dir: dir.path().join("exports"),
        max_file_size_mb: 1,
        report_font_path: None,
        server_addr: "127.0.0.1:0".to_string(),
    };

    let app = routes::create_router(AppState::new(pool.clone(), config.clone()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        pool,
        config,
        client: reqwest::Client::new(),
        _dir: dir,
    }
}

/// Fresh student id, unique across test runs.
pub fn unique_student_id() -> String {
    format!("S{}", &uuid::Uuid::new_v4().simple().to_string()[..12])
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Logs in as the seeded admin and returns the bearer token.
    pub async fn token(&self) -> String {
        let response = self
            .client
            .post(self.url("/token"))
            .form(&[("username", ADMIN_USERNAME), ("password", ADMIN_PASSWORD)])
            .send()
            .await
            .expect("Login failed");
        assert_eq!(response.status().as_u16(), 200);

        let body: Value = response.json().await.expect("Failed to parse login json");
        body["access_token"]
            .as_str()
            .expect("Token not found")
            .to_string()
    }

    pub async fn create_student(&self, token: &str, student_id: &str, name: &str, class_name: &str) -> Value {
        let response = self
            .client
            .post(self.url("/api/students"))
            .bearer_auth(token)
            .json(&serde_json::json!({
                "student_id": student_id,
                "name": name,
                "class_name": class_name,
                "gender": "男"
            }))
            .send()
            .await
            .expect("Create student failed");
        assert_eq!(response.status().as_u16(), 201);
        response.json().await.unwrap()
    }

    /// Admin upload through the JSON endpoint.
    pub async fn upload(&self, token: &str, payload: Value) -> reqwest::Response {
        self.client
            .post(self.url("/test-data/upload"))
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .expect("Upload failed")
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}
