/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /api/register` - Register a new user and get a session token
/// - `POST /api/login` - Exchange credentials for a session token

use crate::{app::AppState, error::ApiResult};
use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Display name
    #[validate(length(min = 1, max = 100, message = "Username must be 1 to 100 characters"))]
    pub username: String,

    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password; the length rule is enforced by the auth service
    pub password: String,
}

/// Public view of a newly registered user
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisteredUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

/// Register response
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    /// Session token
    pub token: String,

    /// Token lifetime in seconds
    pub expires_in: i64,

    pub user: RegisteredUser,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Session token
    pub token: String,

    /// Token lifetime in seconds
    pub expires_in: i64,
}

/// Register a new user
///
/// ```text
/// POST /api/register
/// Content-Type: application/json
///
/// {
///   "username": "alice",
///   "email": "alice@example.com",
///   "password": "correct-horse"
/// }
/// ```
///
/// # Errors
///
/// - `400 invalid_request`: Malformed body or field validation failed
/// - `400 invalid_password`: Password shorter than 8 characters
/// - `409 email_exists`: Email already registered
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let Json(req) = body?;
    req.validate()?;

    let user = state
        .auth
        .register(&req.username, &req.password, &req.email)
        .await?;
    let issued = state.auth.issue_token(&user)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            token: issued.token,
            expires_in: issued.expires_in,
            user: RegisteredUser {
                id: user.id,
                username: user.name,
                email: user.email,
            },
        }),
    ))
}

/// Login endpoint
///
/// ```text
/// POST /api/login
/// Content-Type: application/json
///
/// {
///   "email": "alice@example.com",
///   "password": "correct-horse"
/// }
/// ```
///
/// # Errors
///
/// - `400 invalid_request`: Malformed body or field validation failed
/// - `401 invalid_credentials`: Unknown email or wrong password
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let Json(req) = body?;
    req.validate()?;

    let issued = state.auth.login(&req.email, &req.password).await?;

    Ok(Json(LoginResponse {
        token: issued.token,
        expires_in: issued.expires_in,
    }))
}
