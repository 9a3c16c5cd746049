use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{CreateMoodRequest, ListMoodQuery};
use super::repo_types::MoodEntry;
use super::services::{summarize, MoodSummary};
use crate::{
    auth::jwt::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/mood", get(list_moods).post(create_mood))
        .route("/mood/summary", get(summary))
        .route("/mood/:id", delete(delete_mood))
}

#[instrument(skip(state))]
pub async fn list_moods(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<ListMoodQuery>,
) -> AppResult<Json<Vec<MoodEntry>>> {
    let limit = q.limit()?;
    Ok(Json(state.store.list_moods(user_id, Some(limit)).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_mood(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateMoodRequest>,
) -> AppResult<(StatusCode, Json<MoodEntry>)> {
    let entry = state.store.create_mood(user_id, payload.into_new()?).await?;
    info!(%user_id, entry_id = %entry.id, score = entry.mood_score, "mood logged");
    Ok((StatusCode::CREATED, Json(entry)))
}

#[instrument(skip(state))]
pub async fn delete_mood(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if !state.store.delete_mood(user_id, id).await? {
        return Err(AppError::NotFound("Mood entry"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn summary(State(state): State<AppState>, AuthUser(user_id): AuthUser) -> AppResult<Json<MoodSummary>> {
    let entries = state.store.list_moods(user_id, None).await?;
    Ok(Json(summarize(entries)))
}
