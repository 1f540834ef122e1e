/// Referral reward rules

use crate::models::task::Task;

/// Which task is the referral task and what referrers earn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardPolicy {
    /// Id of the distinguished referral task
    pub referral_task_id: i32,

    /// Points credited to a referrer when someone names them
    pub referrer_bonus: i64,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            referral_task_id: 3,
            referrer_bonus: 100,
        }
    }
}

impl RewardPolicy {
    /// Share of `task`'s points owed to the completing user's referrer
    ///
    /// Half the points (rounded down) for the referral task, `None` for
    /// every other task.
    pub fn referrer_share(&self, task: &Task) -> Option<i64> {
        (task.id == self.referral_task_id).then(|| task.points / 2)
    }
}
