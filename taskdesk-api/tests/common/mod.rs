//! Common test utilities for HTTP integration tests
//!
//! The router is served from the in-memory backend with a manual clock and
//! a minimal-cost hasher, so these tests need no database.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, TimeZone, Utc};
use serde_json::Value;
use std::sync::Arc;
use taskdesk_api::{
    app::{build_router, AppState},
    config::{ApiConfig, Config, DatabaseConfig, JwtConfig},
};
use taskdesk_shared::{
    auth::password::{Argon2Hasher, HashCost},
    clock::ManualClock,
    db::memory::MemoryDatabase,
};
use tower::ServiceExt;

pub const PASSWORD: &str = "password123";

/// Test context containing the router and its backing state
pub struct TestContext {
    pub app: Router,
    pub state: AppState<MemoryDatabase>,
    pub db: MemoryDatabase,
    pub clock: Arc<ManualClock>,
}

/// Decoded response
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

pub fn test_config() -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            enable_hsts: false,
        },
        database: DatabaseConfig {
            url: "memory".to_string(),
            max_connections: 1,
        },
        jwt: JwtConfig {
            secret: "http-test-secret-at-least-32-bytes!".to_string(),
            issuer: "taskdesk".to_string(),
            ttl_minutes: 60,
        },
        run_migrations: false,
    }
}

impl TestContext {
    pub fn new() -> Self {
        let db = MemoryDatabase::new();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap(),
        ));
        let hasher = Arc::new(Argon2Hasher::new(HashCost::low()).unwrap());

        let state = AppState::new(db.clone(), test_config(), hasher, clock.clone());
        let app = build_router(state.clone());

        Self {
            app,
            state,
            db,
            clock,
        }
    }

    /// Sends one request through the router
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send_raw(request).await
    }

    pub async fn send_raw(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                panic!("non-JSON body ({}): {}", status, String::from_utf8_lossy(&bytes))
            })
        };

        TestResponse { status, body }
    }

    /// Signs up a user named after the local part of `email`; returns (token, id)
    pub async fn signup(&self, email: &str) -> (String, i64) {
        let name = email.split('@').next().unwrap_or("user");
        let res = self
            .send(
                Method::POST,
                "/v1/auth/signup",
                None,
                Some(serde_json::json!({
                    "email": email,
                    "password": PASSWORD,
                    "name": name,
                })),
            )
            .await;

        assert_eq!(res.status, StatusCode::CREATED, "signup failed: {}", res.body);
        (
            res.body["token"].as_str().unwrap().to_string(),
            res.body["user"]["id"].as_i64().unwrap(),
        )
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }
}
