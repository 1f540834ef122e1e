/// Error handling for the API server
///
/// Every handler returns `ApiResult<T>`. Service failures are converted by
/// matching on the [`ServiceError`] variant; nothing here inspects message
/// text.
///
/// Error bodies look like:
///
/// ```json
/// { "error": "task 'x' not found", "code": "task_not_found" }
/// ```
///
/// with optional `field` (single offending field) and `details` (per-field
/// validation failures).

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use taskpoints_shared::{auth::middleware::AuthError, services::ServiceError};

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest {
        code: &'static str,
        message: String,
        field: Option<String>,
    },

    /// Request body failed field validation (400, `invalid_request`)
    ValidationError(Vec<ValidationErrorDetail>),

    /// Unauthorized (401)
    Unauthorized { code: &'static str, message: String },

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound { code: &'static str, message: String },

    /// Conflict (409)
    Conflict { code: &'static str, message: String },

    /// Internal server error (500); the detail is logged, never returned
    InternalError(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,

    /// Machine-readable error code (e.g., "invalid_request", "email_exists")
    pub code: String,

    /// Offending field, when one field is at fault
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    /// 400 `invalid_request`
    pub fn invalid_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            code: "invalid_request",
            message: message.into(),
            field: None,
        }
    }

    /// 400 `invalid_request` blaming one field
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            code: "invalid_request",
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } | ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest { code, .. }
            | ApiError::Unauthorized { code, .. }
            | ApiError::NotFound { code, .. }
            | ApiError::Conflict { code, .. } => *code,
            ApiError::ValidationError(_) => "invalid_request",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::InternalError(_) => "internal_error",
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest { message, .. } => write!(f, "Bad request: {}", message),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::Unauthorized { message, .. } => write!(f, "Unauthorized: {}", message),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound { message, .. } => write!(f, "Not found: {}", message),
            ApiError::Conflict { message, .. } => write!(f, "Conflict: {}", message),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let (message, field, details) = match self {
            ApiError::BadRequest { message, field, .. } => (message, field, None),
            ApiError::ValidationError(errors) => {
                ("Request validation failed".to_string(), None, Some(errors))
            }
            ApiError::Unauthorized { message, .. }
            | ApiError::NotFound { message, .. }
            | ApiError::Conflict { message, .. } => (message, None, None),
            ApiError::Forbidden(message) => (message, None, None),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!(error = %msg, "Internal error");
                ("An internal error occurred".to_string(), None, None)
            }
        };

        let body = Json(ErrorResponse {
            error: message,
            code: code.to_string(),
            field,
            details,
        });

        (status, body).into_response()
    }
}

/// Convert service errors to API errors
impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();

        match err {
            ServiceError::InvalidPassword { .. } => ApiError::BadRequest {
                code: "invalid_password",
                message,
                field: Some("password".to_string()),
            },
            ServiceError::SelfReferral => ApiError::BadRequest {
                code: "self_referral",
                message,
                field: Some("referrer_id".to_string()),
            },
            ServiceError::InvalidCredentials => ApiError::Unauthorized {
                code: "invalid_credentials",
                message,
            },
            ServiceError::InvalidToken(_) => ApiError::Unauthorized {
                code: "invalid_token",
                message,
            },
            ServiceError::UserNotFound(_) => ApiError::NotFound {
                code: "user_not_found",
                message,
            },
            ServiceError::ReferrerNotFound(_) => ApiError::NotFound {
                code: "referrer_not_found",
                message,
            },
            ServiceError::TaskNotFound(_) => ApiError::NotFound {
                code: "task_not_found",
                message,
            },
            ServiceError::EmailExists => ApiError::Conflict {
                code: "email_exists",
                message,
            },
            ServiceError::ReferrerAlreadySet => ApiError::Conflict {
                code: "referrer_already_set",
                message,
            },
            ServiceError::Store(_)
            | ServiceError::Password(_)
            | ServiceError::Token(_)
            | ServiceError::Internal(_) => ApiError::InternalError(message),
        }
    }
}

/// Convert bearer authentication errors to API errors
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Unauthorized {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::invalid_field("id", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::invalid_request(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();

        // HashMap iteration order is unspecified
        details.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::ValidationError(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskpoints_shared::store::StoreError;
    use uuid::Uuid;

    #[test]
    fn test_error_display() {
        let err = ApiError::invalid_request("Invalid input");
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::Forbidden("not yours".to_string());
        assert_eq!(err.to_string(), "Forbidden: not yours");
    }

    #[test]
    fn test_service_error_mapping() {
        let cases = [
            (ServiceError::InvalidPassword { min: 8 }, StatusCode::BAD_REQUEST, "invalid_password"),
            (ServiceError::SelfReferral, StatusCode::BAD_REQUEST, "self_referral"),
            (ServiceError::InvalidCredentials, StatusCode::UNAUTHORIZED, "invalid_credentials"),
            (ServiceError::UserNotFound(Uuid::nil()), StatusCode::NOT_FOUND, "user_not_found"),
            (ServiceError::ReferrerNotFound(Uuid::nil()), StatusCode::NOT_FOUND, "referrer_not_found"),
            (ServiceError::TaskNotFound("x".to_string()), StatusCode::NOT_FOUND, "task_not_found"),
            (ServiceError::EmailExists, StatusCode::CONFLICT, "email_exists"),
            (ServiceError::ReferrerAlreadySet, StatusCode::CONFLICT, "referrer_already_set"),
            (
                ServiceError::Store(StoreError::PointsOverflow(Uuid::nil())),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
            ),
            (
                ServiceError::Internal("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
            ),
        ];

        for (service_err, status, code) in cases {
            let api_err = ApiError::from(service_err);
            assert_eq!(api_err.status(), status);
            assert_eq!(api_err.code(), code);
        }
    }

    #[test]
    fn test_auth_error_mapping() {
        let err = ApiError::from(AuthError::MissingHeader);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.code(), "auth_header_missing");

        let err = ApiError::from(AuthError::InvalidHeader);
        assert_eq!(err.code(), "invalid_auth_header");
    }

    #[test]
    fn test_validation_error() {
        let errors = vec![
            ValidationErrorDetail {
                field: "email".to_string(),
                message: "Invalid email format".to_string(),
            },
            ValidationErrorDetail {
                field: "username".to_string(),
                message: "Username is required".to_string(),
            },
        ];

        let err = ApiError::ValidationError(errors);
        assert_eq!(err.to_string(), "Validation failed: 2 errors");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "invalid_request");
    }
}
