use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::CreateLearningRequest;
use super::repo_types::LearningEntry;
use super::services::{summarize, LearningSummary};
use crate::{
    auth::jwt::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/learning", get(list_learning).post(create_learning))
        .route("/learning/summary", get(summary))
        .route("/learning/:id", delete(delete_learning))
}

#[instrument(skip(state))]
pub async fn list_learning(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Vec<LearningEntry>>> {
    Ok(Json(state.store.list_learning(user_id).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_learning(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateLearningRequest>,
) -> AppResult<(StatusCode, Json<LearningEntry>)> {
    let entry = state.store.create_learning(user_id, payload.into_new()?).await?;
    info!(%user_id, entry_id = %entry.id, platform = %entry.platform, "learning logged");
    Ok((StatusCode::CREATED, Json(entry)))
}

#[instrument(skip(state))]
pub async fn delete_learning(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if !state.store.delete_learning(user_id, id).await? {
        return Err(AppError::NotFound("Learning entry"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn summary(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<LearningSummary>> {
    let entries = state.store.list_learning(user_id).await?;
    Ok(Json(summarize(&entries)))
}
