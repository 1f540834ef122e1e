/// User model and single-statement queries
///
/// Multi-statement flows that must commit together (referrer assignment)
/// live in `store::postgres`; everything here runs as one statement.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY,
///     name VARCHAR(100) NOT NULL,
///     email VARCHAR(255) NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     points BIGINT NOT NULL DEFAULT 0 CHECK (points >= 0),
///     referrer UUID REFERENCES users (id) CHECK (referrer <> id),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskpoints_shared::models::user::{CreateUser, User};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let user = User::create(
///     &pool,
///     CreateUser {
///         name: "alice".to_string(),
///         email: "alice@example.com".to_string(),
///         password_hash: "$argon2id$...".to_string(),
///     },
/// )
/// .await?;
///
/// let found = User::find_by_email(&pool, "alice@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

/// A registered user
///
/// The password hash is never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct User {
    /// Unique user id (UUID v4)
    pub id: Uuid,

    /// Display name chosen at registration
    pub name: String,

    /// Email address, unique across users
    pub email: String,

    /// Argon2id PHC hash
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Accumulated points, never negative
    pub points: i64,

    /// Who referred this user; set at most once
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<Uuid>,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// Last change to points or referrer
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user
#[derive(Debug, Clone)]
pub struct CreateUser {
    /// Display name
    pub name: String,

    /// Email address
    pub email: String,

    /// Argon2id hash (NOT the plaintext password)
    pub password_hash: String,
}

const USER_COLUMNS: &str =
    "id, name, email, password_hash, points, referrer, created_at, updated_at";

impl User {
    /// Inserts a new user with zero points and no referrer
    ///
    /// # Errors
    ///
    /// A duplicate email surfaces as a database error on the
    /// `users_email_key` unique constraint.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (id, name, email, password_hash, points)
             VALUES ($1, $2, $3, $4, 0)
             RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&query)
            .bind(Uuid::new_v4())
            .bind(data.name)
            .bind(data.email)
            .bind(data.password_hash)
            .fetch_one(pool)
            .await
    }

    /// Finds a user by id
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by email
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Whether any user already has this email
    pub async fn email_exists(pool: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(pool)
            .await
    }

    /// Lists users whose referrer is `referrer_id`, oldest first
    pub async fn list_referred_by(pool: &PgPool, referrer_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE referrer = $1
             ORDER BY created_at ASC, id ASC"
        );

        sqlx::query_as::<_, User>(&query)
            .bind(referrer_id)
            .fetch_all(pool)
            .await
    }
}
