#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use inkwell_db::{open_pool, DbPool, DbRuntimeSettings};
use inkwell_server::{app, AppState};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

/// A router over a fresh file-backed database. Keep `_dir` alive for the
/// duration of the test; dropping it deletes the database.
pub struct TestApp {
    pub router: Router,
    pub pool: DbPool,
    _dir: TempDir,
}

pub fn setup_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inkwell.db");
    let pool = open_pool(path.to_str().unwrap(), DbRuntimeSettings::default()).unwrap();

    TestApp {
        router: app(AppState { pool: pool.clone() }),
        pool,
        _dir: dir,
    }
}

impl TestApp {
    pub async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send_request(request).await
    }

    pub async fn send_request(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub fn count(&self, table: &str) -> i64 {
        let conn = self.pool.get().unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
        })
        .unwrap()
    }
}
