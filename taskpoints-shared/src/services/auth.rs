/// Registration, login and session tokens
///
/// Argon2 hashing is CPU-bound, so hashing and verification run on the
/// blocking pool instead of the async workers.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use super::ServiceError;
use crate::auth::jwt::{Claims, IssuedToken, TokenService};
use crate::auth::password::{hash_password, is_acceptable_password, verify_password, MIN_PASSWORD_LENGTH};
use crate::models::user::{CreateUser, User};
use crate::store::UserStore;

/// Registers and authenticates users
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, tokens: TokenService) -> Self {
        Self { users, tokens }
    }

    /// Creates an account with zero points
    ///
    /// # Errors
    ///
    /// - `InvalidPassword` if the password is shorter than 8 characters
    /// - `EmailExists` if the email is taken, whether caught by the early
    ///   check or by the storage constraint during a concurrent registration
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<User, ServiceError> {
        if !is_acceptable_password(password) {
            return Err(ServiceError::InvalidPassword {
                min: MIN_PASSWORD_LENGTH,
            });
        }

        if self.users.email_exists(email).await? {
            return Err(ServiceError::EmailExists);
        }

        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| ServiceError::Internal(format!("password hashing task failed: {}", e)))??;

        let user = self
            .users
            .create_user(CreateUser {
                name: username.to_string(),
                email: email.to_string(),
                password_hash,
            })
            .await?;

        info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Checks credentials and issues a session token
    ///
    /// Unknown emails and wrong passwords both yield `InvalidCredentials`.
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedToken, ServiceError> {
        let Some(user) = self.users.find_user_by_email(email).await? else {
            debug!("Login for unknown email");
            return Err(ServiceError::InvalidCredentials);
        };

        let password = password.to_string();
        let stored_hash = user.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
            .await
            .map_err(|e| ServiceError::Internal(format!("password verification task failed: {}", e)))??;

        if !matches {
            debug!(user_id = %user.id, "Login with wrong password");
            return Err(ServiceError::InvalidCredentials);
        }

        let issued = self.issue_token(&user)?;
        info!(user_id = %user.id, "User logged in");
        Ok(issued)
    }

    /// Signs a session token for `user`
    pub fn issue_token(&self, user: &User) -> Result<IssuedToken, ServiceError> {
        self.tokens.issue(user.id).map_err(ServiceError::Token)
    }

    /// Validates a session token and returns the user id it carries
    ///
    /// This is the check behind the bearer guard on `/api/users`.
    pub fn validate_token(&self, token: &str) -> Result<Uuid, ServiceError> {
        self.tokens
            .validate(token)
            .map(|claims: Claims| claims.sub)
            .map_err(ServiceError::InvalidToken)
    }
}
