/// Task catalogue and completion records
///
/// Tasks are static reference data seeded by migration; the API never
/// mutates them. Completions are keyed by `(user_id, task_id)`: completing
/// again refreshes `completed_at` instead of adding a row. `awarded` records
/// whether the task's points were paid for that row; referrer assignment
/// writes the referral task with `awarded = FALSE`.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tasks (
///     id INTEGER PRIMARY KEY,
///     name VARCHAR(100) NOT NULL UNIQUE,
///     description TEXT NOT NULL DEFAULT '',
///     points BIGINT NOT NULL CHECK (points >= 0)
/// );
///
/// CREATE TABLE user_tasks (
///     user_id UUID NOT NULL REFERENCES users (id),
///     task_id INTEGER NOT NULL REFERENCES tasks (id),
///     completed_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     awarded BOOLEAN NOT NULL DEFAULT TRUE,
///     PRIMARY KEY (user_id, task_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

/// A task users can complete for points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Task {
    /// Task id
    pub id: i32,

    /// Unique name clients refer to the task by
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// Points awarded on first completion
    pub points: i64,
}

/// A task together with when the user last completed it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CompletedTask {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub task: Task,

    pub completed_at: DateTime<Utc>,
}

impl Task {
    /// Finds a task by its unique name
    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            "SELECT id, name, description, points FROM tasks WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(pool)
        .await
    }

    /// Lists the tasks a user has completed, most recent first
    pub async fn list_completed(pool: &PgPool, user_id: Uuid) -> Result<Vec<CompletedTask>, sqlx::Error> {
        sqlx::query_as::<_, CompletedTask>(
            r#"
            SELECT t.id, t.name, t.description, t.points, ut.completed_at
            FROM tasks t
            JOIN user_tasks ut ON ut.task_id = t.id
            WHERE ut.user_id = $1
            ORDER BY ut.completed_at DESC, t.id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_task_serializes_flat() {
        let completed = CompletedTask {
            task: Task {
                id: 3,
                name: "referral".to_string(),
                description: "Invite a friend".to_string(),
                points: 200,
            },
            completed_at: Utc::now(),
        };

        let json = serde_json::to_value(&completed).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["name"], "referral");
        assert_eq!(json["points"], 200);
        assert!(json["completed_at"].is_string());
    }
}
