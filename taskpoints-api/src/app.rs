/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskpoints_api::{app::AppState, config::Config};
/// use taskpoints_shared::db::pool::{create_pool, DatabaseConfig};
/// use taskpoints_shared::store::postgres::PgStore;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(DatabaseConfig {
///     url: config.database.url.clone(),
///     ..Default::default()
/// })
/// .await?;
///
/// let store = Arc::new(PgStore::new(pool));
/// let state = AppState::new(store.clone(), store, config);
/// let app = taskpoints_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::config::Config;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use taskpoints_shared::{
    auth::{jwt::TokenService, middleware::jwt_auth_middleware},
    services::{auth::AuthService, user::UserService},
    store::{TaskStore, UserStore},
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor; every
/// field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Registration, login and tokens
    pub auth: Arc<AuthService>,

    /// Status, completions, referrers, leaderboard
    pub users: Arc<UserService>,

    /// Store handle used for health checks
    pub store: Arc<dyn UserStore>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires the services over the given stores
    pub fn new(users: Arc<dyn UserStore>, tasks: Arc<dyn TaskStore>, config: Config) -> Self {
        let tokens = TokenService::new(config.jwt.secret.clone(), config.token_ttl());

        Self {
            auth: Arc::new(AuthService::new(users.clone(), tokens)),
            users: Arc::new(UserService::new(users.clone(), tasks, config.rewards)),
            store: users,
            config: Arc::new(config),
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        // Development mode: permissive CORS
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /
/// ├── GET  /ping
/// ├── GET  /health
/// └── /api/
///     ├── POST /register
///     ├── POST /login
///     └── /users/                    (bearer token required)
///         ├── GET  /leaderboard
///         ├── GET  /:id/status
///         ├── POST /:id/task/complete
///         └── POST /:id/referrer
/// ```
///
/// Middleware, outermost first: CORS, request tracing, then the bearer
/// guard on `/api/users`.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let public_routes = Router::new()
        .route("/ping", get(routes::health::ping))
        .route("/health", get(routes::health::health_check));

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login));

    let user_routes = Router::new()
        .route("/leaderboard", get(routes::users::leaderboard))
        .route("/:id/status", get(routes::users::status))
        .route("/:id/task/complete", post(routes::users::complete_task))
        .route("/:id/referrer", post(routes::users::set_referrer))
        .layer(axum::middleware::from_fn_with_state(
            state.auth.clone(),
            jwt_auth_middleware,
        ));

    let api_routes = Router::new()
        .merge(auth_routes)
        .nest("/users", user_routes);

    let cors = cors_layer(&state.config.api.cors_origins);

    Router::new()
        .merge(public_routes)
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}
