//! Admin panel endpoints. Every handler takes the `AdminUser` guard, so
//! only configured admin emails get through.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::extract::AdminUser;
use crate::errors::AppError;
use crate::models::resume::AnalysisWithUser;
use crate::models::user::PublicUser;
use crate::state::AppState;
use crate::storage::StoreStats;

const ADMIN_PAGE_DEFAULT: i64 = 50;
const ADMIN_PAGE_MAX: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct UsersQuery {
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub total: i64,
    pub users: Vec<PublicUser>,
}

/// GET /api/admin/users
pub async fn handle_list_users(
    State(state): State<AppState>,
    admin: AdminUser,
    Query(query): Query<UsersQuery>,
) -> Result<Json<UsersResponse>, AppError> {
    tracing::debug!("admin {} listed users", admin.0.email);
    let limit = query
        .limit
        .unwrap_or(ADMIN_PAGE_DEFAULT)
        .clamp(1, ADMIN_PAGE_MAX);
    let offset = query.offset.unwrap_or(0).max(0);
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let (total, users) = state.store.list_users(search, limit, offset).await?;

    Ok(Json(UsersResponse {
        total,
        users: users.iter().map(PublicUser::from).collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct FeedbackQuery {
    pub user_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub total: i64,
    pub feedback: Vec<AnalysisWithUser>,
}

/// GET /api/admin/feedback
pub async fn handle_list_feedback(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<FeedbackQuery>,
) -> Result<Json<FeedbackResponse>, AppError> {
    let limit = query
        .limit
        .unwrap_or(ADMIN_PAGE_DEFAULT)
        .clamp(1, ADMIN_PAGE_MAX);
    let offset = query.offset.unwrap_or(0).max(0);

    let (total, feedback) = state
        .store
        .list_analyses(query.user_id, limit, offset)
        .await?;

    Ok(Json(FeedbackResponse { total, feedback }))
}

/// GET /api/admin/stats
pub async fn handle_stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<StoreStats>, AppError> {
    Ok(Json(state.store.stats().await?))
}
