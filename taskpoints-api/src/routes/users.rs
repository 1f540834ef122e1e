/// User endpoints (bearer token required)
///
/// # Endpoints
///
/// - `GET  /api/users/leaderboard?limit=N` - Top users by points
/// - `GET  /api/users/:id/status` - User record, completions and referrals
/// - `POST /api/users/:id/task/complete` - Complete a task by name
/// - `POST /api/users/:id/referrer` - Set the user's referrer once
///
/// The mutating endpoints only act on the caller's own account.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskpoints_shared::{
    auth::middleware::AuthContext,
    models::leaderboard::LeaderboardEntry,
    services::user::UserStatus,
    store::ReferrerBonus,
};
use uuid::Uuid;
use validator::Validate;

/// Largest leaderboard a single request may ask for
pub const MAX_LEADERBOARD_LIMIT: i64 = 100;

/// Complete task request
#[derive(Debug, Deserialize, Validate)]
pub struct CompleteTaskRequest {
    /// Unique task name, e.g. `subscribe_telegram`
    #[validate(length(min = 1, message = "Task name is required"))]
    pub task_name: String,
}

/// Complete task response
#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteTaskResponse {
    pub task_name: String,

    /// Points credited to the caller by this request
    pub points_awarded: i64,

    /// False when the task had already been completed
    pub newly_completed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer_bonus: Option<ReferrerBonus>,

    pub completed_at: DateTime<Utc>,
}

/// Set referrer request
#[derive(Debug, Deserialize)]
pub struct SetReferrerRequest {
    pub referrer_id: Uuid,
}

/// Set referrer response
#[derive(Debug, Serialize, Deserialize)]
pub struct SetReferrerResponse {
    pub user_id: Uuid,
    pub referrer_id: Uuid,
}

/// Leaderboard query string
#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<i64>,
}

fn ensure_owner(auth: &AuthContext, user_id: Uuid) -> ApiResult<()> {
    if auth.user_id != user_id {
        tracing::debug!(caller = %auth.user_id, target = %user_id, "Rejected cross-user write");
        return Err(ApiError::Forbidden(
            "cannot modify another user's account".to_string(),
        ));
    }

    Ok(())
}

/// User status
///
/// # Errors
///
/// - `400 invalid_request`: `:id` is not a UUID
/// - `404 user_not_found`: No such user
pub async fn status(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<UserStatus>> {
    let Path(user_id) = path?;

    let status = state.users.get_user_status(user_id).await?;
    Ok(Json(status))
}

/// Complete a task
///
/// ```text
/// POST /api/users/:id/task/complete
/// Content-Type: application/json
///
/// { "task_name": "subscribe_telegram" }
/// ```
///
/// # Errors
///
/// - `400 invalid_request`: Malformed id or body
/// - `403 forbidden`: `:id` is not the caller
/// - `404 task_not_found` / `user_not_found`
pub async fn complete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<CompleteTaskRequest>, JsonRejection>,
) -> ApiResult<Json<CompleteTaskResponse>> {
    let Path(user_id) = path?;
    ensure_owner(&auth, user_id)?;

    let Json(req) = body?;
    req.validate()?;

    let outcome = state.users.complete_task(user_id, &req.task_name).await?;

    Ok(Json(CompleteTaskResponse {
        task_name: req.task_name,
        points_awarded: outcome.points_awarded,
        newly_completed: outcome.newly_completed,
        referrer_bonus: outcome.referrer_bonus,
        completed_at: outcome.completed_at,
    }))
}

/// Set the caller's referrer
///
/// ```text
/// POST /api/users/:id/referrer
/// Content-Type: application/json
///
/// { "referrer_id": "uuid" }
/// ```
///
/// # Errors
///
/// - `400 invalid_request` / `self_referral`
/// - `403 forbidden`: `:id` is not the caller
/// - `404 user_not_found` / `referrer_not_found`
/// - `409 referrer_already_set`
pub async fn set_referrer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<SetReferrerRequest>, JsonRejection>,
) -> ApiResult<Json<SetReferrerResponse>> {
    let Path(user_id) = path?;
    ensure_owner(&auth, user_id)?;

    let Json(req) = body?;
    state.users.set_referrer(user_id, req.referrer_id).await?;

    Ok(Json(SetReferrerResponse {
        user_id,
        referrer_id: req.referrer_id,
    }))
}

/// Leaderboard
///
/// `limit` defaults to the configured size and is clamped to 1..=100.
pub async fn leaderboard(
    State(state): State<AppState>,
    query: Result<Query<LeaderboardQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<LeaderboardEntry>>> {
    let Query(query) = query?;
    let limit = query
        .limit
        .unwrap_or(state.config.leaderboard_limit)
        .clamp(1, MAX_LEADERBOARD_LIMIT);

    let entries = state.users.get_leaderboard(limit).await?;
    Ok(Json(entries))
}
