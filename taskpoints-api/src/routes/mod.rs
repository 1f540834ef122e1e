/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Liveness and health endpoints
/// - `auth`: Registration and login
/// - `users`: Status, task completion, referrers, leaderboard

pub mod auth;
pub mod health;
pub mod users;
