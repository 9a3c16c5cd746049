use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{CreateJobRequest, ListJobsQuery, StatusRequest, UpdateJobRequest};
use super::repo_types::{JobApplication, JobFilter, JobPatch};
use super::services::{job_stats, JobStats};
use crate::{
    auth::jwt::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(list_jobs).post(create_job))
        .route("/jobs/stats", get(stats))
        .route("/jobs/:id", get(get_job).patch(update_job).delete(delete_job))
        .route("/jobs/:id/status", put(update_status))
}

const NOT_FOUND: AppError = AppError::NotFound("Job application");

#[instrument(skip(state))]
pub async fn list_jobs(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<ListJobsQuery>,
) -> AppResult<Json<Vec<JobApplication>>> {
    let filter = q.into_filter()?;
    Ok(Json(state.store.list_jobs(user_id, &filter).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_job(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateJobRequest>,
) -> AppResult<(StatusCode, HeaderMap, Json<JobApplication>)> {
    let job = state.store.create_job(user_id, payload.into_new()?).await?;
    info!(%user_id, job_id = %job.id, company = %job.company, "job application created");

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/v1/jobs/{}", job.id)) {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(job)))
}

#[instrument(skip(state))]
pub async fn get_job(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<JobApplication>> {
    let job = state.store.get_job(user_id, id).await?.ok_or(NOT_FOUND)?;
    Ok(Json(job))
}

#[instrument(skip(state, payload))]
pub async fn update_job(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateJobRequest>,
) -> AppResult<Json<JobApplication>> {
    let patch = payload.into_patch()?;
    let job = state.store.update_job(user_id, id, patch).await?.ok_or(NOT_FOUND)?;
    Ok(Json(job))
}

#[instrument(skip(state, payload))]
pub async fn update_status(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusRequest>,
) -> AppResult<Json<JobApplication>> {
    let job = state
        .store
        .update_job(user_id, id, JobPatch::status(payload.status))
        .await?
        .ok_or(NOT_FOUND)?;
    info!(%user_id, job_id = %id, status = job.status.as_str(), "job status changed");
    Ok(Json(job))
}

#[instrument(skip(state))]
pub async fn delete_job(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if !state.store.delete_job(user_id, id).await? {
        return Err(NOT_FOUND);
    }
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn stats(State(state): State<AppState>, AuthUser(user_id): AuthUser) -> AppResult<Json<JobStats>> {
    let jobs = state.store.list_jobs(user_id, &JobFilter::everything()).await?;
    Ok(Json(job_stats(&jobs)))
}
