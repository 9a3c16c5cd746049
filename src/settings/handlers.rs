use axum::{extract::State, routing::get, Json, Router};
use tracing::{info, instrument};

use super::repo_types::UserSettings;
use crate::{auth::jwt::AuthUser, error::AppResult, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/settings", get(get_settings).put(put_settings))
}

#[instrument(skip(state))]
pub async fn get_settings(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<UserSettings>> {
    Ok(Json(state.store.load_settings(user_id).await?.unwrap_or_default()))
}

/// Replace the caller's settings. The live pomodoro timer picks up the new
/// durations right away.
#[instrument(skip(state, payload))]
pub async fn put_settings(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UserSettings>,
) -> AppResult<Json<UserSettings>> {
    payload.validate()?;
    state.store.save_settings(user_id, &payload).await?;
    state
        .timers
        .update_settings(user_id, payload.pomodoro.clone())
        .await?;
    info!(%user_id, "settings saved");
    Ok(Json(payload))
}
