/// Common test utilities for integration tests
///
/// Builds the full router over an in-memory store, so these tests need no
/// database. Requests go through `tower::ServiceExt::oneshot`.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use taskpoints_api::app::{build_router, AppState};
use taskpoints_api::config::{ApiConfig, Config, DatabaseConfig, JwtConfig};
use taskpoints_shared::services::rewards::RewardPolicy;
use taskpoints_shared::store::memory::MemoryStore;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "integration-test-secret-at-least-32-bytes";

/// Test context containing the router and its backing store
pub struct TestContext {
    pub app: axum::Router,
    pub store: Arc<MemoryStore>,
}

/// A registered user and their session token
pub struct TestUser {
    pub id: Uuid,
    pub token: String,
}

impl TestUser {
    /// Returns authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

pub fn test_config() -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
        },
        database: DatabaseConfig {
            url: "postgresql://unused".to_string(),
            max_connections: 1,
        },
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            expiration_seconds: 3600,
        },
        rewards: RewardPolicy::default(),
        leaderboard_limit: 10,
    }
}

impl TestContext {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::default());
        let state = AppState::new(store.clone(), store.clone(), test_config());

        Self {
            app: build_router(state),
            store,
        }
    }

    /// Sends one request and returns the status and the JSON body
    /// (`Value::Null` when the body is empty or not JSON)
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        auth: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }

        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        (status, json)
    }

    /// Registers a user through the API
    pub async fn register(&self, username: &str) -> TestUser {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/register",
                None,
                Some(serde_json::json!({
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": "password123",
                })),
            )
            .await;

        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);

        TestUser {
            id: body["user"]["id"].as_str().unwrap().parse().unwrap(),
            token: body["token"].as_str().unwrap().to_string(),
        }
    }
}
