/// PostgreSQL-backed store
///
/// Single-statement reads delegate to the model queries. The two
/// multi-row flows run in one transaction each and lock every user row they
/// touch up front, in id order (`SELECT … ORDER BY id FOR UPDATE`). Concurrent
/// completions or referrer assignments for the same user are serialised by
/// the database, and two users who referred each other cannot deadlock.
/// Dropping the future mid-flight drops the transaction, which rolls it back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use super::{CompletionOutcome, ReferrerBonus, StoreError, TaskStore, UserStore};
use crate::db::pool::health_check;
use crate::models::{
    leaderboard::LeaderboardEntry,
    task::{CompletedTask, Task},
    user::{CreateUser, User},
};

/// Unique constraint guarding registration races
const EMAIL_UNIQUE_CONSTRAINT: &str = "users_email_key";

/// Store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Opens the completion transaction with the user row locked, plus the
    /// referrer's row when a share may be paid to it
    ///
    /// Returns the transaction and the user's referrer as seen under the lock.
    async fn begin_completion(
        &self,
        user_id: Uuid,
        with_referrer: bool,
    ) -> Result<(Transaction<'static, Postgres>, Option<Uuid>), StoreError> {
        loop {
            let mut tx = self.pool.begin().await?;

            let seen = sqlx::query_scalar::<_, Option<Uuid>>(
                "SELECT referrer FROM users WHERE id = $1",
            )
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::UserNotFound(user_id))?;

            let mut ids = vec![user_id];
            if with_referrer {
                ids.extend(seen);
            }

            let locked = lock_users(&mut tx, &ids).await?;
            let referrer = locked
                .iter()
                .find(|(id, _)| *id == user_id)
                .ok_or(StoreError::UserNotFound(user_id))?
                .1;

            if !with_referrer || referrer == seen {
                return Ok((tx, referrer));
            }

            // The referrer was assigned between the read and the lock. The
            // link is write-once, so the next attempt sees a stable value.
            debug!(%user_id, "Referrer changed before lock, retrying");
        }
    }
}

/// Locks the given user rows in id order, returning `(id, referrer)` for each
/// row that exists
async fn lock_users(
    tx: &mut Transaction<'static, Postgres>,
    ids: &[Uuid],
) -> Result<Vec<(Uuid, Option<Uuid>)>, StoreError> {
    let rows = sqlx::query_as::<_, (Uuid, Option<Uuid>)>(
        "SELECT id, referrer FROM users WHERE id = ANY($1) ORDER BY id FOR UPDATE",
    )
    .bind(ids)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows)
}

#[async_trait]
impl UserStore for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        health_check(&self.pool).await?;
        Ok(())
    }

    async fn create_user(&self, data: CreateUser) -> Result<User, StoreError> {
        match User::create(&self.pool, data).await {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(db_err))
                if db_err.constraint() == Some(EMAIL_UNIQUE_CONSTRAINT) =>
            {
                Err(StoreError::EmailTaken)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        Ok(User::email_exists(&self.pool, email).await?)
    }

    async fn list_referred_by(&self, referrer_id: Uuid) -> Result<Vec<User>, StoreError> {
        Ok(User::list_referred_by(&self.pool, referrer_id).await?)
    }

    async fn assign_referrer(
        &self,
        user_id: Uuid,
        referrer_id: Uuid,
        bonus: i64,
        referral_task_id: i32,
    ) -> Result<(), StoreError> {
        if user_id == referrer_id {
            return Err(StoreError::SelfReferral);
        }

        let mut tx = self.pool.begin().await?;

        let locked = lock_users(&mut tx, &[user_id, referrer_id]).await?;

        let current_referrer = locked
            .iter()
            .find(|(id, _)| *id == user_id)
            .ok_or(StoreError::UserNotFound(user_id))?
            .1;

        if current_referrer.is_some() {
            return Err(StoreError::ReferrerAlreadySet(user_id));
        }

        if !locked.iter().any(|(id, _)| *id == referrer_id) {
            return Err(StoreError::ReferrerNotFound(referrer_id));
        }

        let linked = sqlx::query(
            r#"
            UPDATE users
            SET referrer = $2, updated_at = NOW()
            WHERE id = $1 AND referrer IS NULL
            "#,
        )
        .bind(user_id)
        .bind(referrer_id)
        .execute(&mut *tx)
        .await?;

        if linked.rows_affected() == 0 {
            return Err(StoreError::ReferrerAlreadySet(user_id));
        }

        sqlx::query("UPDATE users SET points = points + $1, updated_at = NOW() WHERE id = $2")
            .bind(bonus)
            .bind(referrer_id)
            .execute(&mut *tx)
            .await?;

        // Marked done for the referrer without paying the task's own points,
        // which stay claimable through a later completion
        sqlx::query(
            r#"
            INSERT INTO user_tasks (user_id, task_id, completed_at, awarded)
            VALUES ($1, $2, NOW(), FALSE)
            ON CONFLICT (user_id, task_id) DO UPDATE SET completed_at = EXCLUDED.completed_at
            "#,
        )
        .bind(referrer_id)
        .bind(referral_task_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(%user_id, %referrer_id, bonus, "Referrer assigned");
        Ok(())
    }

    async fn leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, StoreError> {
        if limit <= 0 {
            return Ok(Vec::new());
        }

        Ok(LeaderboardEntry::top(&self.pool, limit).await?)
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn find_task_by_name(&self, name: &str) -> Result<Option<Task>, StoreError> {
        Ok(Task::find_by_name(&self.pool, name).await?)
    }

    async fn completed_tasks(&self, user_id: Uuid) -> Result<Vec<CompletedTask>, StoreError> {
        Ok(Task::list_completed(&self.pool, user_id).await?)
    }

    async fn complete_task(
        &self,
        user_id: Uuid,
        task: &Task,
        referrer_share: Option<i64>,
    ) -> Result<CompletionOutcome, StoreError> {
        let (mut tx, referrer) = self
            .begin_completion(user_id, referrer_share.is_some())
            .await?;

        let previously_awarded = sqlx::query_scalar::<_, bool>(
            "SELECT awarded FROM user_tasks WHERE user_id = $1 AND task_id = $2",
        )
        .bind(user_id)
        .bind(task.id)
        .fetch_optional(&mut *tx)
        .await?
        .unwrap_or(false);

        let completed_at: DateTime<Utc> = sqlx::query_scalar(
            r#"
            INSERT INTO user_tasks (user_id, task_id, completed_at, awarded)
            VALUES ($1, $2, NOW(), TRUE)
            ON CONFLICT (user_id, task_id)
            DO UPDATE SET completed_at = EXCLUDED.completed_at, awarded = TRUE
            RETURNING completed_at
            "#,
        )
        .bind(user_id)
        .bind(task.id)
        .fetch_one(&mut *tx)
        .await?;

        if previously_awarded {
            tx.commit().await?;
            debug!(%user_id, task_id = task.id, "Task re-completed, no points awarded");

            return Ok(CompletionOutcome {
                task_id: task.id,
                completed_at,
                newly_completed: false,
                points_awarded: 0,
                referrer_bonus: None,
            });
        }

        sqlx::query("UPDATE users SET points = points + $1, updated_at = NOW() WHERE id = $2")
            .bind(task.points)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let referrer_bonus = match (referrer, referrer_share) {
            (Some(referrer_id), Some(points)) => {
                sqlx::query(
                    "UPDATE users SET points = points + $1, updated_at = NOW() WHERE id = $2",
                )
                .bind(points)
                .bind(referrer_id)
                .execute(&mut *tx)
                .await?;

                Some(ReferrerBonus {
                    referrer_id,
                    points,
                })
            }
            _ => None,
        };

        tx.commit().await?;

        info!(
            %user_id,
            task_id = task.id,
            points = task.points,
            referrer_bonus = ?referrer_bonus,
            "Task completed"
        );

        Ok(CompletionOutcome {
            task_id: task.id,
            completed_at,
            newly_completed: true,
            points_awarded: task.points,
            referrer_bonus,
        })
    }
}
