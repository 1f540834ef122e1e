/// Configuration management for the API server
///
/// Configuration is loaded once from environment variables and passed by
/// construction to the services and the router.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: http://localhost:3000)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `JWT_SECRET`: Secret key for token signing, at least 32 characters (required)
/// - `JWT_EXPIRATION_SECONDS`: Session token lifetime, at most ten years (default: 86400)
/// - `REFERRAL_TASK_ID`: Id of the referral task (default: 3)
/// - `REFERRER_BONUS_POINTS`: Points a referrer earns when named (default: 100)
/// - `LEADERBOARD_LIMIT`: Default leaderboard size (default: 10)
/// - `RUST_LOG`: Log filter
///
/// # Example
///
/// ```no_run
/// use taskpoints_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::Context;
use std::env;
use std::str::FromStr;

use taskpoints_shared::services::rewards::RewardPolicy;

/// Shortest accepted `JWT_SECRET`
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Longest accepted session token lifetime (ten years)
pub const MAX_JWT_EXPIRATION_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT configuration
    pub jwt: JwtConfig,

    /// Reward rules
    pub rewards: RewardPolicy,

    /// Leaderboard size when the request gives none
    pub leaderboard_limit: i64,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for token signing
    ///
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,

    /// Token lifetime in seconds
    pub expiration_seconds: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("expiration_seconds", &self.expiration_seconds)
            .finish()
    }
}

/// Reads an optional variable, parsing it when set
fn env_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value: {:?}", name, value)),
        Err(_) => Ok(default),
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

fn check_expiration(seconds: i64) -> anyhow::Result<i64> {
    if !(1..=MAX_JWT_EXPIRATION_SECONDS).contains(&seconds) {
        anyhow::bail!(
            "JWT_EXPIRATION_SECONDS must be between 1 and {}",
            MAX_JWT_EXPIRATION_SECONDS
        );
    }

    Ok(seconds)
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `DATABASE_URL` or `JWT_SECRET` is missing
    /// - `JWT_SECRET` is shorter than 32 characters
    /// - A numeric variable does not parse or is out of range
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env_or("API_PORT", 8080u16)?;
        let cors_origins = parse_origins(
            &env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:3000".to_string()),
        );

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;
        let max_connections = env_or("DATABASE_MAX_CONNECTIONS", 10u32)?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.chars().count() < MIN_JWT_SECRET_LENGTH {
            anyhow::bail!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LENGTH
            );
        }

        let expiration_seconds =
            check_expiration(env_or("JWT_EXPIRATION_SECONDS", 86_400i64)?)?;

        let defaults = RewardPolicy::default();
        let rewards = RewardPolicy {
            referral_task_id: env_or("REFERRAL_TASK_ID", defaults.referral_task_id)?,
            referrer_bonus: env_or("REFERRER_BONUS_POINTS", defaults.referrer_bonus)?,
        };
        if rewards.referrer_bonus < 0 {
            anyhow::bail!("REFERRER_BONUS_POINTS must not be negative");
        }

        let leaderboard_limit = env_or("LEADERBOARD_LIMIT", 10i64)?;
        if !(1..=100).contains(&leaderboard_limit) {
            anyhow::bail!("LEADERBOARD_LIMIT must be between 1 and 100");
        }

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                cors_origins,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                expiration_seconds,
            },
            rewards,
            leaderboard_limit,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Session token lifetime
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.jwt.expiration_seconds)
    }
}
