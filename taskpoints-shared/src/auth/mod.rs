/// Authentication primitives
///
/// - [`password`]: Argon2id password hashing and the registration password rule
/// - [`jwt`]: stateless HS256 session tokens
/// - [`middleware`]: bearer-token extraction and the Axum guard
///
/// # Example
///
/// ```
/// use taskpoints_shared::auth::password::{hash_password, verify_password};
/// use taskpoints_shared::auth::jwt::TokenService;
/// use chrono::Duration;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("user_password")?;
/// assert!(verify_password("user_password", &hash)?);
///
/// let tokens = TokenService::new("a-secret-of-at-least-thirty-two-bytes", Duration::hours(24));
/// let issued = tokens.issue(Uuid::new_v4())?;
/// # Ok(())
/// # }
/// ```

pub mod jwt;
pub mod middleware;
pub mod password;
