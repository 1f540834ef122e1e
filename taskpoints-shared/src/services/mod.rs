/// Business services
///
/// - [`auth::AuthService`]: registration, login, session tokens
/// - [`user::UserService`]: status, task completion, referrers, leaderboard
/// - [`rewards::RewardPolicy`]: how referral bonuses are computed
///
/// Both services hold their stores as trait objects, so the same code runs
/// against PostgreSQL and the in-memory store. Every failure is a
/// [`ServiceError`] variant; callers dispatch on the variant, never on the
/// message text.

use uuid::Uuid;

use crate::auth::{jwt::JwtError, password::PasswordError};
use crate::store::StoreError;

pub mod auth;
pub mod rewards;
pub mod user;

/// Error type for service operations
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Password does not meet the length rule
    #[error("password must be at least {min} characters")]
    InvalidPassword { min: usize },

    /// Email already registered
    #[error("email is already registered")]
    EmailExists,

    /// Unknown email or wrong password
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Session token rejected
    #[error("invalid token")]
    InvalidToken(#[source] JwtError),

    /// No task with this name
    #[error("task '{0}' not found")]
    TaskNotFound(String),

    /// No user with this id
    #[error("user {0} not found")]
    UserNotFound(Uuid),

    /// Prospective referrer does not exist
    #[error("referrer {0} not found")]
    ReferrerNotFound(Uuid),

    /// User named itself as referrer
    #[error("user cannot be their own referrer")]
    SelfReferral,

    /// Referrer already linked
    #[error("referrer is already set")]
    ReferrerAlreadySet,

    /// Storage failure
    #[error("storage error: {0}")]
    Store(#[source] StoreError),

    /// Password hashing failure
    #[error("password error: {0}")]
    Password(#[from] PasswordError),

    /// Token signing failure
    #[error("token error: {0}")]
    Token(#[source] JwtError),

    /// Anything else, such as a panicked blocking task
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Whether this error is a server-side fault rather than a caller mistake
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            ServiceError::Store(_)
                | ServiceError::Password(_)
                | ServiceError::Token(_)
                | ServiceError::Internal(_)
        )
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EmailTaken => ServiceError::EmailExists,
            StoreError::UserNotFound(id) => ServiceError::UserNotFound(id),
            StoreError::ReferrerNotFound(id) => ServiceError::ReferrerNotFound(id),
            StoreError::SelfReferral => ServiceError::SelfReferral,
            StoreError::ReferrerAlreadySet(_) => ServiceError::ReferrerAlreadySet,
            other => ServiceError::Store(other),
        }
    }
}
