/// Leaderboard projection
///
/// Derived, read-only view over `users`: highest points first, 1-based rank
/// by sort order. Ties are broken by account age, then id, so the order is
/// stable between calls.

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

/// One row of the leaderboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct LeaderboardEntry {
    pub user_id: Uuid,
    pub name: String,
    pub points: i64,
    /// 1-based position
    pub rank: i64,
}

impl LeaderboardEntry {
    /// Top `limit` users by points
    pub async fn top(pool: &PgPool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, LeaderboardEntry>(
            r#"
            SELECT
                id AS user_id,
                name,
                points,
                ROW_NUMBER() OVER (ORDER BY points DESC, created_at ASC, id ASC) AS rank
            FROM users
            ORDER BY points DESC, created_at ASC, id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
