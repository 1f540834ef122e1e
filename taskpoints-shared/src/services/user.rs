/// Status, task completion, referrers and the leaderboard
///
/// Cross-row consistency is left to the store: each mutating call here is a
/// lookup followed by one atomic store operation.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::{rewards::RewardPolicy, ServiceError};
use crate::models::{leaderboard::LeaderboardEntry, task::CompletedTask, user::User};
use crate::store::{CompletionOutcome, TaskStore, UserStore};

/// Everything the status endpoint reports about a user
#[derive(Debug, Clone, Serialize)]
pub struct UserStatus {
    pub user: User,

    /// Completed tasks, most recent first
    pub completed_tasks: Vec<CompletedTask>,

    /// Users referred by this user's referrer; empty without a referrer
    pub referrals: Vec<User>,

    /// Users who named this user as their referrer
    pub referred_users: Vec<User>,
}

/// Orchestrates user-facing operations over the two stores
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
    tasks: Arc<dyn TaskStore>,
    rewards: RewardPolicy,
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>, tasks: Arc<dyn TaskStore>, rewards: RewardPolicy) -> Self {
        Self {
            users,
            tasks,
            rewards,
        }
    }

    /// Current reward policy
    pub fn rewards(&self) -> RewardPolicy {
        self.rewards
    }

    /// Aggregates a user's record, completions and referral lists
    pub async fn get_user_status(&self, user_id: Uuid) -> Result<UserStatus, ServiceError> {
        let user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound(user_id))?;

        let completed_tasks = self.tasks.completed_tasks(user_id).await?;

        let referrals = match user.referrer {
            Some(referrer_id) => self.users.list_referred_by(referrer_id).await?,
            None => Vec::new(),
        };

        let referred_users = self.users.list_referred_by(user_id).await?;

        Ok(UserStatus {
            user,
            completed_tasks,
            referrals,
            referred_users,
        })
    }

    /// Marks a task complete and awards its points
    ///
    /// The first completion credits the task's points, plus the referrer's
    /// share for the referral task, in one atomic store call. Completing
    /// again only refreshes the timestamp.
    pub async fn complete_task(
        &self,
        user_id: Uuid,
        task_name: &str,
    ) -> Result<CompletionOutcome, ServiceError> {
        let task = self
            .tasks
            .find_task_by_name(task_name)
            .await?
            .ok_or_else(|| ServiceError::TaskNotFound(task_name.to_string()))?;

        let share = self.rewards.referrer_share(&task);
        let outcome = self.tasks.complete_task(user_id, &task, share).await?;

        if !outcome.newly_completed {
            debug!(%user_id, task = %task.name, "Task already completed");
        }

        Ok(outcome)
    }

    /// Links a user to the user who referred them
    ///
    /// The referrer receives the configured bonus and the referral task is
    /// recorded as completed for them. Only the store awards the bonus.
    pub async fn set_referrer(&self, user_id: Uuid, referrer_id: Uuid) -> Result<(), ServiceError> {
        if user_id == referrer_id {
            return Err(ServiceError::SelfReferral);
        }

        self.users
            .assign_referrer(
                user_id,
                referrer_id,
                self.rewards.referrer_bonus,
                self.rewards.referral_task_id,
            )
            .await?;

        info!(%user_id, %referrer_id, "Referrer set");
        Ok(())
    }

    /// Top `limit` users by points
    pub async fn get_leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, ServiceError> {
        Ok(self.users.leaderboard(limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::CreateUser;
    use crate::store::memory::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        service: UserService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::default());
        let service = UserService::new(store.clone(), store.clone(), RewardPolicy::default());
        Fixture { store, service }
    }

    async fn user(store: &MemoryStore, name: &str) -> User {
        store
            .create_user(CreateUser {
                name: name.to_string(),
                email: format!("{name}@example.com"),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap()
    }

    async fn points(store: &MemoryStore, id: Uuid) -> i64 {
        store.find_user(id).await.unwrap().unwrap().points
    }

    #[tokio::test]
    async fn test_complete_task_awards_task_points() {
        let f = fixture();
        let alice = user(&f.store, "alice").await;

        let outcome = f
            .service
            .complete_task(alice.id, "subscribe_telegram")
            .await
            .unwrap();

        assert!(outcome.newly_completed);
        assert_eq!(outcome.points_awarded, 50);
        assert!(outcome.referrer_bonus.is_none());
        assert_eq!(points(&f.store, alice.id).await, 50);
    }

    #[tokio::test]
    async fn test_repeat_completion_awards_nothing() {
        let f = fixture();
        let alice = user(&f.store, "alice").await;

        f.service.complete_task(alice.id, "follow_twitter").await.unwrap();
        let again = f.service.complete_task(alice.id, "follow_twitter").await.unwrap();

        assert!(!again.newly_completed);
        assert_eq!(again.points_awarded, 0);
        assert_eq!(points(&f.store, alice.id).await, 50);
    }

    #[tokio::test]
    async fn test_referral_task_pays_referrer_half() {
        let f = fixture();
        let referrer = user(&f.store, "referrer").await;
        let alice = user(&f.store, "alice").await;

        f.service.set_referrer(alice.id, referrer.id).await.unwrap();
        assert_eq!(points(&f.store, referrer.id).await, 100);

        let outcome = f.service.complete_task(alice.id, "referral").await.unwrap();
        assert_eq!(outcome.points_awarded, 200);
        assert_eq!(
            outcome.referrer_bonus.map(|b| (b.referrer_id, b.points)),
            Some((referrer.id, 100))
        );

        assert_eq!(points(&f.store, alice.id).await, 200);
        assert_eq!(points(&f.store, referrer.id).await, 200);
    }

    #[tokio::test]
    async fn test_referral_task_without_referrer() {
        let f = fixture();
        let alice = user(&f.store, "alice").await;

        let outcome = f.service.complete_task(alice.id, "referral").await.unwrap();
        assert!(outcome.referrer_bonus.is_none());
        assert_eq!(points(&f.store, alice.id).await, 200);
    }

    #[tokio::test]
    async fn test_referral_award_is_all_or_nothing() {
        let f = fixture();
        let referrer = user(&f.store, "referrer").await;
        let alice = user(&f.store, "alice").await;

        f.service.set_referrer(alice.id, referrer.id).await.unwrap();
        let referrer = f.store.find_user(referrer.id).await.unwrap().unwrap();
        f.store
            .insert_user(User {
                points: i64::MAX - 10,
                ..referrer.clone()
            })
            .await;

        let err = f.service.complete_task(alice.id, "referral").await.unwrap_err();
        assert!(err.is_internal());

        assert_eq!(points(&f.store, alice.id).await, 0);
        assert_eq!(points(&f.store, referrer.id).await, i64::MAX - 10);
        let status = f.service.get_user_status(alice.id).await.unwrap();
        assert!(status.completed_tasks.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_task() {
        let f = fixture();
        let alice = user(&f.store, "alice").await;

        let err = f.service.complete_task(alice.id, "climb_everest").await.unwrap_err();
        assert!(matches!(err, ServiceError::TaskNotFound(name) if name == "climb_everest"));
    }

    #[tokio::test]
    async fn test_set_referrer_twice() {
        let f = fixture();
        let a = user(&f.store, "a").await;
        let b = user(&f.store, "b").await;
        let c = user(&f.store, "c").await;

        f.service.set_referrer(c.id, a.id).await.unwrap();
        let err = f.service.set_referrer(c.id, b.id).await.unwrap_err();

        assert!(matches!(err, ServiceError::ReferrerAlreadySet));
        assert_eq!(points(&f.store, a.id).await, 100);
        assert_eq!(points(&f.store, b.id).await, 0);
    }

    #[tokio::test]
    async fn test_self_referral() {
        let f = fixture();
        let a = user(&f.store, "a").await;

        let err = f.service.set_referrer(a.id, a.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::SelfReferral));
        assert_eq!(points(&f.store, a.id).await, 0);
    }

    #[tokio::test]
    async fn test_set_referrer_unknown_ids() {
        let f = fixture();
        let a = user(&f.store, "a").await;
        let ghost = Uuid::new_v4();

        assert!(matches!(
            f.service.set_referrer(ghost, a.id).await,
            Err(ServiceError::UserNotFound(id)) if id == ghost
        ));
        assert!(matches!(
            f.service.set_referrer(a.id, ghost).await,
            Err(ServiceError::ReferrerNotFound(id)) if id == ghost
        ));
    }

    #[tokio::test]
    async fn test_set_referrer_marks_referral_task_for_referrer() {
        let f = fixture();
        let referrer = user(&f.store, "referrer").await;
        let alice = user(&f.store, "alice").await;

        f.service.set_referrer(alice.id, referrer.id).await.unwrap();

        let status = f.service.get_user_status(referrer.id).await.unwrap();
        let ids: Vec<i32> = status.completed_tasks.iter().map(|t| t.task.id).collect();
        assert_eq!(ids, vec![3]);
        assert_eq!(status.referred_users.len(), 1);
        assert_eq!(status.referred_users[0].id, alice.id);
        assert!(status.referrals.is_empty());
    }

    #[tokio::test]
    async fn test_referral_chain_pays_middle_referrer() {
        let f = fixture();
        let quinn = user(&f.store, "quinn").await;
        let rita = user(&f.store, "rita").await;
        let uma = user(&f.store, "uma").await;

        f.service.set_referrer(rita.id, quinn.id).await.unwrap();
        f.service.set_referrer(uma.id, rita.id).await.unwrap();

        let outcome = f.service.complete_task(rita.id, "referral").await.unwrap();
        assert!(outcome.newly_completed);
        assert_eq!(outcome.points_awarded, 200);
        assert_eq!(
            outcome.referrer_bonus.map(|b| (b.referrer_id, b.points)),
            Some((quinn.id, 100))
        );

        // 100 for referring uma plus the task's 200
        assert_eq!(points(&f.store, rita.id).await, 300);
        // 100 for referring rita plus half of rita's award
        assert_eq!(points(&f.store, quinn.id).await, 200);
    }

    #[tokio::test]
    async fn test_status_lists_referrers_referrals() {
        let f = fixture();
        let referrer = user(&f.store, "referrer").await;
        let alice = user(&f.store, "alice").await;
        let bob = user(&f.store, "bob").await;

        f.service.set_referrer(alice.id, referrer.id).await.unwrap();
        f.service.set_referrer(bob.id, referrer.id).await.unwrap();

        let status = f.service.get_user_status(alice.id).await.unwrap();
        assert_eq!(status.user.referrer, Some(referrer.id));
        let ids: Vec<Uuid> = status.referrals.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![alice.id, bob.id]);
        assert!(status.referred_users.is_empty());
    }

    #[tokio::test]
    async fn test_status_unknown_user() {
        let f = fixture();
        let ghost = Uuid::new_v4();

        let err = f.service.get_user_status(ghost).await.unwrap_err();
        assert!(matches!(err, ServiceError::UserNotFound(id) if id == ghost));
    }

    #[tokio::test]
    async fn test_leaderboard_ranks_and_order() {
        let f = fixture();
        let a = user(&f.store, "a").await;
        let b = user(&f.store, "b").await;
        let c = user(&f.store, "c").await;
        let d = user(&f.store, "d").await;

        f.service.complete_task(b.id, "referral").await.unwrap();
        f.service.complete_task(c.id, "subscribe_telegram").await.unwrap();
        f.service.complete_task(d.id, "daily_login").await.unwrap();

        let board = f.service.get_leaderboard(3).await.unwrap();
        assert_eq!(board.len(), 3);
        assert_eq!(board.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(board.windows(2).all(|w| w[0].points >= w[1].points));
        assert_eq!(board[0].user_id, b.id);

        let everyone = f.service.get_leaderboard(10).await.unwrap();
        assert_eq!(everyone.len(), 4);
        assert_eq!(everyone[3].user_id, a.id);
    }
}
