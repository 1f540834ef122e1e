/// Bearer token middleware for Axum
///
/// Reads `Authorization: Bearer <token>`, has the [`AuthService`] validate
/// the token, and inserts an [`AuthContext`] into request extensions.
/// Each failure has its own machine-readable code:
///
/// | Failure | Code |
/// |---|---|
/// | header absent | `auth_header_missing` |
/// | not `Bearer <token>` | `invalid_auth_header` |
/// | bad signature, malformed, expired | `invalid_token` |
///
/// All three answer 401.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use axum::{middleware, routing::get, Extension, Router};
/// use chrono::Duration;
/// use taskpoints_shared::auth::jwt::TokenService;
/// use taskpoints_shared::auth::middleware::{jwt_auth_middleware, AuthContext};
/// use taskpoints_shared::services::auth::AuthService;
/// use taskpoints_shared::store::memory::MemoryStore;
///
/// async fn whoami(Extension(auth): Extension<AuthContext>) -> String {
///     auth.user_id.to_string()
/// }
///
/// let tokens = TokenService::new("a-secret-of-at-least-thirty-two-bytes", Duration::hours(24));
/// let auth = Arc::new(AuthService::new(Arc::new(MemoryStore::default()), tokens));
/// let app: Router = Router::new()
///     .route("/whoami", get(whoami))
///     .layer(middleware::from_fn_with_state(auth, jwt_auth_middleware));
/// ```

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::services::{auth::AuthService, ServiceError};

/// Identity of the caller, added to request extensions after authentication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Authenticated user id
    pub user_id: Uuid,
}

/// Why a request could not be authenticated
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No `Authorization` header
    #[error("authorization header is required")]
    MissingHeader,

    /// Header present but not `Bearer <token>`
    #[error("invalid authorization header format")]
    InvalidHeader,

    /// Token rejected by the auth service
    #[error("invalid token")]
    InvalidToken(#[source] ServiceError),
}

impl AuthError {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingHeader => "auth_header_missing",
            AuthError::InvalidHeader => "invalid_auth_header",
            AuthError::InvalidToken(_) => "invalid_token",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::InvalidToken(ref e) = self {
            tracing::debug!(error = %e, "Rejected bearer token");
        }

        let body = Json(json!({
            "error": self.to_string(),
            "code": self.code(),
        }));

        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

/// Extracts the token from a `Bearer` authorization header
///
/// The scheme must be exactly `Bearer`, followed by a single space and a
/// non-empty token without further spaces.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidHeader)?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::InvalidHeader),
    }
}

/// Authenticates a request's headers
pub fn authenticate(headers: &HeaderMap, auth: &AuthService) -> Result<AuthContext, AuthError> {
    let token = bearer_token(headers)?;
    let user_id = auth.validate_token(token).map_err(AuthError::InvalidToken)?;

    Ok(AuthContext { user_id })
}

/// Axum middleware guarding routes behind a valid session token
///
/// Use with `axum::middleware::from_fn_with_state(auth_service, jwt_auth_middleware)`.
pub async fn jwt_auth_middleware(
    State(service): State<Arc<AuthService>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth = authenticate(req.headers(), &service)?;
    req.extensions_mut().insert(auth);

    Ok(next.run(req).await)
}
