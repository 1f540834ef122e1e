/// Session tokens
///
/// Sessions are stateless: a token is an HS256-signed JWT carrying the user id
/// and an absolute expiry. Nothing is persisted and there is no revocation
/// list, so a token is valid exactly while its signature checks out and its
/// `exp` lies in the future.
///
/// # Claims
///
/// - `sub`: user id
/// - `iss`: always `"taskpoints"`
/// - `iat` / `nbf`: issue time (Unix seconds)
/// - `exp`: expiry (Unix seconds)
///
/// # Example
///
/// ```
/// use taskpoints_shared::auth::jwt::TokenService;
/// use chrono::Duration;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let tokens = TokenService::new("a-secret-of-at-least-thirty-two-bytes", Duration::hours(24));
/// let user_id = Uuid::new_v4();
///
/// let issued = tokens.issue(user_id)?;
/// let claims = tokens.validate(&issued.token)?;
/// assert_eq!(claims.sub, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Issuer written into and required from every token
pub const ISSUER: &str = "taskpoints";

/// Error type for token operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Signing failed
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Signature, structure or issuer check failed
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// `exp` has passed
    #[error("Token has expired")]
    Expired,

    /// `nbf` lies in the future
    #[error("Token is not valid yet")]
    NotYetValid,
}

/// JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - user id
    pub sub: Uuid,

    /// Issuer
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// `now + ttl`, or `CreateError` when that falls outside chrono's range
fn expiry(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, JwtError> {
    now.checked_add_signed(ttl)
        .ok_or_else(|| JwtError::CreateError(format!("Token lifetime {} is out of range", ttl)))
}

impl Claims {
    /// Builds claims for a token issued at `now` that lives for `ttl`
    pub fn new(user_id: Uuid, now: DateTime<Utc>, ttl: Duration) -> Result<Self, JwtError> {
        Ok(Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expiry(now, ttl)?.timestamp(),
        })
    }

    /// Whether the token is past its expiry at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}

/// A freshly signed token plus its expiry, as handed to clients
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    /// Compact JWS string
    pub token: String,

    /// Absolute expiry
    pub expires_at: DateTime<Utc>,

    /// Lifetime in seconds, for `expires_in` response fields
    pub expires_in: i64,
}

/// Issues and validates session tokens with one secret and lifetime
///
/// Cloning is cheap; the secret is shared.
#[derive(Clone)]
pub struct TokenService {
    secret: Arc<str>,
    ttl: Duration,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenService {
    /// Creates a token service
    ///
    /// The secret should be at least 32 bytes; the API config enforces that.
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: Arc::from(secret.into()),
            ttl,
        }
    }

    /// Token lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a token for `user_id` valid from now for [`Self::ttl`]
    pub fn issue(&self, user_id: Uuid) -> Result<IssuedToken, JwtError> {
        self.issue_at(user_id, Utc::now())
    }

    /// Issues a token as if the current time were `now`
    pub fn issue_at(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<IssuedToken, JwtError> {
        let expires_at = expiry(now, self.ttl)?;
        let claims = Claims::new(user_id, now, self.ttl)?;
        let key = EncodingKey::from_secret(self.secret.as_bytes());

        let token = encode(&Header::new(Algorithm::HS256), &claims, &key)
            .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))?;

        Ok(IssuedToken {
            token,
            expires_at,
            expires_in: self.ttl.num_seconds(),
        })
    }

    /// Validates a token against the current time
    pub fn validate(&self, token: &str) -> Result<Claims, JwtError> {
        self.validate_at(token, Utc::now())
    }

    /// Validates a token as if the current time were `now`
    ///
    /// Signature, issuer and claim presence are checked by `jsonwebtoken`;
    /// the time window is checked here with zero leeway so expiry is exact.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, JwtError> {
        let key = DecodingKey::from_secret(self.secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => {
                    JwtError::InvalidToken("unexpected issuer".to_string())
                }
                _ => JwtError::InvalidToken(e.to_string()),
            })?
            .claims;

        if claims.is_expired_at(now) {
            return Err(JwtError::Expired);
        }

        if now.timestamp() < claims.nbf {
            return Err(JwtError::NotYetValid);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn issued_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_claims_new() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, issued_time(), Duration::hours(1)).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.iat, claims.nbf);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_issue_and_validate() {
        let tokens = TokenService::new(SECRET, Duration::hours(24));
        let user_id = Uuid::new_v4();

        let issued = tokens.issue(user_id).expect("Should issue token");
        assert_eq!(issued.expires_in, 86400);

        let claims = tokens.validate(&issued.token).expect("Should validate token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, ISSUER);
    }

    #[test]
    fn test_expiry_boundary() {
        let ttl = Duration::seconds(3600);
        let tokens = TokenService::new(SECRET, ttl);
        let t = issued_time();

        let issued = tokens.issue_at(Uuid::new_v4(), t).unwrap();
        assert_eq!(issued.expires_at, t + ttl);

        assert!(tokens.validate_at(&issued.token, t).is_ok());
        assert!(tokens
            .validate_at(&issued.token, t + ttl - Duration::seconds(1))
            .is_ok());
        assert!(matches!(
            tokens.validate_at(&issued.token, t + ttl + Duration::seconds(1)),
            Err(JwtError::Expired)
        ));
    }

    #[test]
    fn test_issue_with_lifetime_past_calendar_range() {
        let tokens = TokenService::new(SECRET, Duration::seconds(1_000_000_000_000_000));

        assert!(matches!(
            tokens.issue(Uuid::new_v4()),
            Err(JwtError::CreateError(_))
        ));
        assert!(matches!(
            Claims::new(Uuid::new_v4(), issued_time(), Duration::seconds(1_000_000_000_000_000)),
            Err(JwtError::CreateError(_))
        ));
    }

    #[test]
    fn test_token_used_before_issue_time() {
        let tokens = TokenService::new(SECRET, Duration::hours(1));
        let t = issued_time();
        let issued = tokens.issue_at(Uuid::new_v4(), t).unwrap();

        assert!(matches!(
            tokens.validate_at(&issued.token, t - Duration::seconds(10)),
            Err(JwtError::NotYetValid)
        ));
    }

    #[test]
    fn test_validate_with_wrong_secret() {
        let issued = TokenService::new(SECRET, Duration::hours(1))
            .issue(Uuid::new_v4())
            .unwrap();

        let other = TokenService::new("another-secret-key-at-least-32-bytes", Duration::hours(1));
        assert!(matches!(
            other.validate(&issued.token),
            Err(JwtError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_validate_malformed_token() {
        let tokens = TokenService::new(SECRET, Duration::hours(1));

        assert!(matches!(tokens.validate(""), Err(JwtError::InvalidToken(_))));
        assert!(matches!(
            tokens.validate("not.a.token"),
            Err(JwtError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_validate_tampered_token() {
        let tokens = TokenService::new(SECRET, Duration::hours(1));
        let issued = tokens.issue(Uuid::new_v4()).unwrap();

        let mut parts: Vec<&str> = issued.token.split('.').collect();
        let forged_claims = Claims::new(Uuid::new_v4(), Utc::now(), Duration::hours(1)).unwrap();
        let forged_payload = encode(
            &Header::new(Algorithm::HS256),
            &forged_claims,
            &EncodingKey::from_secret(b"attacker-secret"),
        )
        .unwrap();
        let forged_body = forged_payload.split('.').nth(1).unwrap().to_string();
        parts[1] = &forged_body;

        assert!(matches!(
            tokens.validate(&parts.join(".")),
            Err(JwtError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_validate_foreign_issuer() {
        let tokens = TokenService::new(SECRET, Duration::hours(1));
        let mut claims = Claims::new(Uuid::new_v4(), Utc::now(), Duration::hours(1)).unwrap();
        claims.iss = "someone-else".to_string();

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            tokens.validate(&token),
            Err(JwtError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let tokens = TokenService::new(SECRET, Duration::hours(1));
        let rendered = format!("{:?}", tokens);

        assert!(!rendered.contains(SECRET));
        assert!(rendered.contains("<redacted>"));
    }
}
