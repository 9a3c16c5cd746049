//! Headline numbers for the dashboard landing page.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tracing::instrument;

use crate::{
    auth::jwt::AuthUser,
    error::AppResult,
    jobs::{repo_types::JobFilter, services::job_stats},
    learning::services::summarize as learning_summary,
    mood::services::average_score,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard/stats", get(stats))
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_applications: usize,
    pub response_rate: u32,
    pub interview_rate: u32,
    pub average_mood_score: f64,
    pub total_pomodoro_sessions: usize,
    pub total_learning_hours: f64,
}

#[instrument(skip(state))]
pub async fn stats(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<DashboardStats>> {
    let store = state.store.as_ref();
    let everything = JobFilter::everything();
    let (jobs, moods, sessions, learning) = tokio::try_join!(
        store.list_jobs(user_id, &everything),
        store.list_moods(user_id, None),
        store.list_sessions(user_id, None),
        store.list_learning(user_id),
    )?;

    let jobs = job_stats(&jobs);
    Ok(Json(DashboardStats {
        total_applications: jobs.total,
        response_rate: jobs.response_rate,
        interview_rate: jobs.interview_rate,
        average_mood_score: average_score(&moods),
        total_pomodoro_sessions: sessions.iter().filter(|s| s.is_focus()).count(),
        total_learning_hours: learning_summary(&learning).total_hours,
    }))
}
