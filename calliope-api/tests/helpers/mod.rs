//! Shared setup for calliope-api integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use calliope_api::storage::UploadStorage;
use calliope_api::{build_router, AppState};
use calliope_common::config::ServiceConfig;
use calliope_common::db::init::{init_database, init_memory_database};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub const TEST_SECRET: i64 = 424_242;

/// Router over an in-memory database and a temporary upload folder
pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub storage: UploadStorage,
    _uploads: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let pool = init_memory_database().await.expect("memory database");
        let uploads = tempfile::tempdir().expect("temp dir");
        Self::with_pool(pool, uploads)
    }

    /// Router over a WAL database file, for tests that need parallel connections
    pub async fn on_disk() -> Self {
        let uploads = tempfile::tempdir().expect("temp dir");
        let pool = init_database(&uploads.path().join("calliope.db"))
            .await
            .expect("file database");
        Self::with_pool(pool, uploads)
    }

    fn with_pool(pool: SqlitePool, uploads: TempDir) -> Self {
        let storage = UploadStorage::new(uploads.path());

        let state = AppState::new(
            pool.clone(),
            storage.clone(),
            TEST_SECRET,
            ServiceConfig::default(),
        );

        Self {
            router: build_router(state),
            pool,
            storage,
            _uploads: uploads,
        }
    }

    /// Send a request and return status plus parsed JSON body
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request(method, uri, token, body))
            .await
            .expect("router response");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("JSON body")
        };
        (status, json)
    }

    /// Send a request and return status, content type and raw bytes
    pub async fn send_raw(&self, method: &str, uri: &str) -> (StatusCode, String, Vec<u8>) {
        let response = self
            .router
            .clone()
            .oneshot(request(method, uri, None, None))
            .await
            .expect("router response");

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        (status, content_type, bytes.to_vec())
    }

    /// Register an account and return its bearer token
    pub async fn register(&self, username: &str) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({
                    "username": username,
                    "email": format!("{}@example.org", username),
                    "password": "correct horse battery",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register {}: {}", username, body);
        body["data"]["token"]
            .as_str()
            .expect("token in register response")
            .to_string()
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .expect("count query")
    }
}

pub fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

/// The Dune payload used across tests
pub fn dune() -> Value {
    json!({
        "title": "Dune",
        "author": "Frank Herbert",
        "format": "paper",
        "editor": "Chilton",
        "isbn": "0-8041-0000-0",
        "nbPage": "412",
        "date": "1965-08-01"
    })
}
