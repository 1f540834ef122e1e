/// In-process store
///
/// Keeps everything behind one async mutex. Multi-row operations validate
/// and compute every new value before writing any of them, so a failure
/// leaves the state untouched, mirroring a rolled-back transaction. Used by
/// the service and HTTP tests, and for running the API without PostgreSQL.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use taskpoints_shared::store::{memory::MemoryStore, TaskStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(MemoryStore::default());
/// let referral = store.find_task_by_name("referral").await?;
/// assert_eq!(referral.map(|t| t.id), Some(3));
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CompletionOutcome, ReferrerBonus, StoreError, TaskStore, UserStore};
use crate::models::{
    leaderboard::LeaderboardEntry,
    task::{CompletedTask, Task},
    user::{CreateUser, User},
};

#[derive(Debug, Clone, Copy)]
struct Completion {
    completed_at: DateTime<Utc>,
    /// Whether the task's own points were paid for this record
    awarded: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    /// Insertion order, used as the final leaderboard tie-breaker
    user_order: Vec<Uuid>,
    tasks: BTreeMap<i32, Task>,
    completions: HashMap<(Uuid, i32), Completion>,
}

impl MemoryState {
    fn insert_user(&mut self, user: User) {
        if !self.users.contains_key(&user.id) {
            self.user_order.push(user.id);
        }
        self.users.insert(user.id, user);
    }

    fn credited_points(&self, user_id: Uuid, points: i64) -> Result<i64, StoreError> {
        let user = self
            .users
            .get(&user_id)
            .ok_or(StoreError::UserNotFound(user_id))?;

        user.points
            .checked_add(points)
            .filter(|total| *total >= 0)
            .ok_or(StoreError::PointsOverflow(user_id))
    }

    fn set_points(&mut self, user_id: Uuid, points: i64, now: DateTime<Utc>) {
        if let Some(user) = self.users.get_mut(&user_id) {
            user.points = points;
            user.updated_at = now;
        }
    }
}

/// Store held entirely in memory
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

/// The catalogue seeded by the schema migrations
pub fn default_tasks() -> Vec<Task> {
    let task = |id: i32, name: &str, description: &str, points: i64| Task {
        id,
        name: name.to_string(),
        description: description.to_string(),
        points,
    };

    vec![
        task(1, "subscribe_telegram", "Subscribe to the Telegram channel", 50),
        task(2, "follow_twitter", "Follow the project on Twitter", 50),
        task(3, "referral", "Invite a friend and enter their referral code", 200),
        task(4, "daily_login", "Log in to the app", 10),
    ]
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_tasks(default_tasks())
    }
}

impl MemoryStore {
    /// Empty store with the given task catalogue
    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let state = MemoryState {
            tasks: tasks.into_iter().map(|t| (t.id, t)).collect(),
            ..Default::default()
        };

        Self {
            state: Mutex::new(state),
        }
    }

    /// Inserts or replaces a user record verbatim
    ///
    /// Bypasses registration; meant for seeding fixtures.
    pub async fn insert_user(&self, user: User) {
        self.state.lock().await.insert_user(user);
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn create_user(&self, data: CreateUser) -> Result<User, StoreError> {
        let mut state = self.state.lock().await;

        if state.users.values().any(|u| u.email == data.email) {
            return Err(StoreError::EmailTaken);
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: data.name,
            email: data.email,
            password_hash: data.password_hash,
            points: 0,
            referrer: None,
            created_at: now,
            updated_at: now,
        };

        state.insert_user(user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        let state = self.state.lock().await;
        Ok(state.users.values().any(|u| u.email == email))
    }

    async fn list_referred_by(&self, referrer_id: Uuid) -> Result<Vec<User>, StoreError> {
        let state = self.state.lock().await;

        Ok(state
            .user_order
            .iter()
            .filter_map(|id| state.users.get(id))
            .filter(|u| u.referrer == Some(referrer_id))
            .cloned()
            .collect())
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

        let mut state = self.state.lock().await;

        let user = state
            .users
            .get(&user_id)
            .ok_or(StoreError::UserNotFound(user_id))?;

        if user.referrer.is_some() {
            return Err(StoreError::ReferrerAlreadySet(user_id));
        }

        if !state.users.contains_key(&referrer_id) {
            return Err(StoreError::ReferrerNotFound(referrer_id));
        }

        let referrer_points = state.credited_points(referrer_id, bonus)?;

        let now = Utc::now();
        if let Some(user) = state.users.get_mut(&user_id) {
            user.referrer = Some(referrer_id);
            user.updated_at = now;
        }
        state.set_points(referrer_id, referrer_points, now);
        state
            .completions
            .entry((referrer_id, referral_task_id))
            .and_modify(|c| c.completed_at = now)
            .or_insert(Completion {
                completed_at: now,
                awarded: false,
            });

        Ok(())
    }

    async fn leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, StoreError> {
        if limit <= 0 {
            return Ok(Vec::new());
        }

        let state = self.state.lock().await;

        let mut users: Vec<&User> = state
            .user_order
            .iter()
            .filter_map(|id| state.users.get(id))
            .collect();

        // Stable sort keeps insertion order among equal keys
        users.sort_by(|a, b| {
            b.points
                .cmp(&a.points)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });

        Ok(users
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .zip(1..)
            .map(|(user, rank)| LeaderboardEntry {
                user_id: user.id,
                name: user.name.clone(),
                points: user.points,
                rank,
            })
            .collect())
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn find_task_by_name(&self, name: &str) -> Result<Option<Task>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.tasks.values().find(|t| t.name == name).cloned())
    }

    async fn completed_tasks(&self, user_id: Uuid) -> Result<Vec<CompletedTask>, StoreError> {
        let state = self.state.lock().await;

        let mut completed: Vec<CompletedTask> = state
            .completions
            .iter()
            .filter(|((uid, _), _)| *uid == user_id)
            .filter_map(|((_, task_id), completion)| {
                state.tasks.get(task_id).map(|task| CompletedTask {
                    task: task.clone(),
                    completed_at: completion.completed_at,
                })
            })
            .collect();

        completed.sort_by(|a, b| {
            b.completed_at
                .cmp(&a.completed_at)
                .then_with(|| a.task.id.cmp(&b.task.id))
        });

        Ok(completed)
    }

    async fn complete_task(
        &self,
        user_id: Uuid,
        task: &Task,
        referrer_share: Option<i64>,
    ) -> Result<CompletionOutcome, StoreError> {
        let mut state = self.state.lock().await;

        let referrer = state
            .users
            .get(&user_id)
            .ok_or(StoreError::UserNotFound(user_id))?
            .referrer;

        let now = Utc::now();
        let key = (user_id, task.id);

        if let Some(completion) = state.completions.get_mut(&key).filter(|c| c.awarded) {
            completion.completed_at = now;

            return Ok(CompletionOutcome {
                task_id: task.id,
                completed_at: now,
                newly_completed: false,
                points_awarded: 0,
                referrer_bonus: None,
            });
        }

        let user_points = state.credited_points(user_id, task.points)?;

        let referrer_bonus = match (referrer, referrer_share) {
            (Some(referrer_id), Some(points)) => Some((
                ReferrerBonus {
                    referrer_id,
                    points,
                },
                state.credited_points(referrer_id, points)?,
            )),
            _ => None,
        };

        // Every check has passed; apply all writes
        state.completions.insert(
            key,
            Completion {
                completed_at: now,
                awarded: true,
            },
        );
        state.set_points(user_id, user_points, now);
        if let Some((bonus, referrer_points)) = referrer_bonus {
            state.set_points(bonus.referrer_id, referrer_points, now);
        }

        Ok(CompletionOutcome {
            task_id: task.id,
            completed_at: now,
            newly_completed: true,
            points_awarded: task.points,
            referrer_bonus: referrer_bonus.map(|(bonus, _)| bonus),
        })
    }
}
