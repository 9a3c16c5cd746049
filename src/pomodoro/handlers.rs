use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{LogSessionRequest, SessionQuery, StartTimerRequest};
use super::repo_types::PomodoroSession;
use super::runner::Command;
use super::services::{daily_stats, todays_sessions, PomodoroStats};
use super::timer::TimerSnapshot;
use crate::{auth::jwt::AuthUser, error::AppResult, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pomodoro/timer", get(get_timer))
        .route("/pomodoro/timer/start", post(start_timer))
        .route("/pomodoro/timer/pause", post(pause_timer))
        .route("/pomodoro/timer/resume", post(resume_timer))
        .route("/pomodoro/timer/reset", post(reset_timer))
        .route("/pomodoro/sessions", get(list_sessions).post(log_session))
        .route("/pomodoro/stats", get(stats))
}

async fn command(state: &AppState, user: AuthUser, cmd: Command) -> AppResult<Json<TimerSnapshot>> {
    let snapshot = state.timers.dispatch(state.store.as_ref(), user.0, cmd).await?;
    Ok(Json(snapshot))
}

#[instrument(skip(state))]
pub async fn get_timer(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<TimerSnapshot>> {
    command(&state, user, Command::Snapshot).await
}

#[instrument(skip(state, payload))]
pub async fn start_timer(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Option<Json<StartTimerRequest>>,
) -> AppResult<Json<TimerSnapshot>> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let cmd = Command::Start {
        task_name: payload.task_name()?,
        category: payload.category,
    };
    command(&state, user, cmd).await
}

#[instrument(skip(state))]
pub async fn pause_timer(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<TimerSnapshot>> {
    command(&state, user, Command::Pause).await
}

#[instrument(skip(state))]
pub async fn resume_timer(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<TimerSnapshot>> {
    command(&state, user, Command::Resume).await
}

#[instrument(skip(state))]
pub async fn reset_timer(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<TimerSnapshot>> {
    command(&state, user, Command::Reset).await
}

#[instrument(skip(state))]
pub async fn list_sessions(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<SessionQuery>,
) -> AppResult<Json<Vec<PomodoroSession>>> {
    let sessions = if q.today {
        todays_sessions(state.store.as_ref(), user_id).await?
    } else {
        state.store.list_sessions(user_id, None).await?
    };
    Ok(Json(sessions))
}

#[instrument(skip(state, payload))]
pub async fn log_session(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<LogSessionRequest>,
) -> AppResult<(StatusCode, Json<PomodoroSession>)> {
    let new = payload.into_new()?;
    let session = state.store.record_session(user_id, new).await?;
    info!(%user_id, session_id = %session.id, "pomodoro session logged");
    Ok((StatusCode::CREATED, Json(session)))
}

#[instrument(skip(state))]
pub async fn stats(State(state): State<AppState>, AuthUser(user_id): AuthUser) -> AppResult<Json<PomodoroStats>> {
    let settings = state.store.load_settings(user_id).await?.unwrap_or_default();
    let sessions = todays_sessions(state.store.as_ref(), user_id).await?;
    Ok(Json(daily_stats(&sessions, settings.daily_pomodoro_goal)))
}
