#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt; // for `oneshot`

use todo_authz::authz::{roles, SecurityCatalog};
use todo_authz::create_app;
use todo_authz::jwt::{Claims, JwtConfig};
use todo_authz::provider::{InMemoryProvider, ProtectionApi};

pub const OWNER: &str = "user-u";
pub const OTHER: &str = "user-v";
pub const ADMIN: &str = "admin-a";

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    pub provider: Arc<InMemoryProvider>,
    _dir: TempDir,
}

pub async fn temp_pool() -> Result<(SqlitePool, TempDir)> {
    let dir = tempdir()?;
    let db_path = dir.path().join("test.db");

    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    Ok((pool, dir))
}

pub async fn spawn_app() -> Result<TestApp> {
    let (pool, dir) = temp_pool().await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let provider = Arc::new(InMemoryProvider::new(SecurityCatalog::todo()?));
    let protection: Arc<dyn ProtectionApi> = provider.clone();
    let app = create_app(pool.clone(), protection).await?;

    Ok(TestApp {
        app,
        pool,
        provider,
        _dir: dir,
    })
}

/// Token for `user_id` holding `client_roles` on the service's client.
pub fn token_with_roles(user_id: &str, client_roles: &[&str]) -> String {
    std::env::set_var("JWT_SECRET", "test-secret");
    let jwt = JwtConfig::from_env().expect("jwt config");
    let claims = Claims::new(user_id, chrono::Duration::hours(1)).with_client_roles(&jwt.client_id, client_roles);
    jwt.encode(&claims).expect("token")
}

pub fn user_token(user_id: &str) -> String {
    token_with_roles(user_id, &[roles::USER])
}

pub fn admin_token(user_id: &str) -> String {
    token_with_roles(user_id, &[roles::ADMINISTRATOR])
}

pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let resp = app.clone().oneshot(req).await?;
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    Ok((status, value))
}

pub async fn list_count(pool: &SqlitePool) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM todo_lists").fetch_one(pool).await?)
}
