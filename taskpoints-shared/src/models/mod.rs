/// Database models
///
/// - `user`: accounts, point totals, referrer links
/// - `task`: task catalogue and per-user completion records
/// - `leaderboard`: read-only ranking projection

pub mod leaderboard;
pub mod task;
pub mod user;
