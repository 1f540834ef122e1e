/// Storage seam between the services and the database
///
/// The services talk to two traits:
///
/// - [`UserStore`]: credentials, point totals, referrer links, leaderboard
/// - [`TaskStore`]: task catalogue and completion records
///
/// Two implementations exist:
///
/// - [`postgres::PgStore`]: production, backed by a `PgPool`
/// - [`memory::MemoryStore`]: in-process, for tests and local runs
///
/// Operations that touch several rows ([`TaskStore::complete_task`],
/// [`UserStore::assign_referrer`]) are all-or-nothing in both
/// implementations. They re-validate their preconditions inside the
/// transaction, so callers' earlier checks are only a fast path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    leaderboard::LeaderboardEntry,
    task::{CompletedTask, Task},
    user::{CreateUser, User},
};

pub mod memory;
pub mod postgres;

/// Storage error
///
/// The domain variants are produced by in-transaction re-validation and by
/// constraint violations; `Database` covers everything else.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Email unique constraint hit
    #[error("email is already registered")]
    EmailTaken,

    /// No user with this id
    #[error("user {0} not found")]
    UserNotFound(Uuid),

    /// The prospective referrer does not exist
    #[error("referrer {0} not found")]
    ReferrerNotFound(Uuid),

    /// A user named itself as referrer
    #[error("user cannot be their own referrer")]
    SelfReferral,

    /// The user's referrer link is already set
    #[error("referrer already set for user {0}")]
    ReferrerAlreadySet(Uuid),

    /// A point total would leave the representable range
    #[error("points overflow for user {0}")]
    PointsOverflow(Uuid),

    /// Underlying database failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Bonus paid to a referrer as part of a task completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferrerBonus {
    pub referrer_id: Uuid,
    pub points: i64,
}

/// What a task completion changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionOutcome {
    pub task_id: i32,

    /// Timestamp now stored for `(user, task)`
    pub completed_at: DateTime<Utc>,

    /// False when the task's points had already been paid; no points move then
    pub newly_completed: bool,

    /// Points credited to the completing user
    pub points_awarded: i64,

    /// Referral bonus credited in the same transaction, if any
    pub referrer_bonus: Option<ReferrerBonus>,
}

/// Users, credentials and referrer links
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Checks the backing store is reachable
    async fn ping(&self) -> Result<(), StoreError>;

    /// Inserts a user with zero points; fails with `EmailTaken` on duplicates
    async fn create_user(&self, data: CreateUser) -> Result<User, StoreError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn email_exists(&self, email: &str) -> Result<bool, StoreError>;

    /// Users whose referrer is `referrer_id`
    async fn list_referred_by(&self, referrer_id: Uuid) -> Result<Vec<User>, StoreError>;

    /// Atomically links `user_id` to `referrer_id`, credits the referrer
    /// `bonus` points and records `referral_task_id` as completed by the
    /// referrer. That record pays none of the task's own points, so a later
    /// `complete_task` by the referrer still awards them.
    ///
    /// Fails with `SelfReferral`, `UserNotFound`, `ReferrerNotFound` or
    /// `ReferrerAlreadySet` without changing anything.
    async fn assign_referrer(
        &self,
        user_id: Uuid,
        referrer_id: Uuid,
        bonus: i64,
        referral_task_id: i32,
    ) -> Result<(), StoreError>;

    /// Top `limit` users by points with 1-based ranks
    async fn leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, StoreError>;
}

/// Task catalogue and completion records
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn find_task_by_name(&self, name: &str) -> Result<Option<Task>, StoreError>;

    async fn completed_tasks(&self, user_id: Uuid) -> Result<Vec<CompletedTask>, StoreError>;

    /// Atomically records the completion of `task` by `user_id`
    ///
    /// On the first paid completion the user is credited `task.points` and,
    /// when `referrer_share` is `Some` and the user has a referrer, the
    /// referrer is credited that share. A repeat completion only refreshes the
    /// timestamp.
    async fn complete_task(
        &self,
        user_id: Uuid,
        task: &Task,
        referrer_share: Option<i64>,
    ) -> Result<CompletionOutcome, StoreError>;
}
