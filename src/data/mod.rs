//! Whole-account export and import.
//!
//! The export document is what the import endpoint accepts, so a backup can be
//! restored into another account or another store backend. Imported records
//! get fresh ids and belong to the caller.

use axum::{extract::State, routing::{get, post}, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::{
    auth::jwt::AuthUser,
    error::{AppError, AppResult},
    jobs::{
        dto::CreateJobRequest,
        repo_types::{JobApplication, JobFilter, NewJobApplication},
    },
    learning::{
        dto::CreateLearningRequest,
        repo_types::{LearningEntry, NewLearningEntry},
    },
    mood::{
        dto::CreateMoodRequest,
        repo_types::{MoodEntry, NewMoodEntry},
    },
    pomodoro::{
        dto::LogSessionRequest,
        repo_types::{NewPomodoroSession, PomodoroSession},
    },
    settings::repo_types::UserSettings,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/data/export", get(export))
        .route("/data/import", post(import))
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataBundle {
    pub jobs: Vec<JobApplication>,
    pub mood_entries: Vec<MoodEntry>,
    pub pomodoro_sessions: Vec<PomodoroSession>,
    pub learning_entries: Vec<LearningEntry>,
    pub settings: Option<UserSettings>,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportCounts {
    pub jobs: usize,
    pub mood_entries: usize,
    pub pomodoro_sessions: usize,
    pub learning_entries: usize,
    pub settings: bool,
}

#[instrument(skip(state))]
pub async fn export(State(state): State<AppState>, AuthUser(user_id): AuthUser) -> AppResult<Json<DataBundle>> {
    let store = state.store.as_ref();
    let everything = JobFilter::everything();
    let (jobs, mood_entries, pomodoro_sessions, learning_entries, settings) = tokio::try_join!(
        store.list_jobs(user_id, &everything),
        store.list_moods(user_id, None),
        store.list_sessions(user_id, None),
        store.list_learning(user_id),
        store.load_settings(user_id),
    )?;
    Ok(Json(DataBundle {
        jobs,
        mood_entries,
        pomodoro_sessions,
        learning_entries,
        settings,
    }))
}

#[instrument(skip(state, bundle))]
pub async fn import(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(bundle): Json<DataBundle>,
) -> AppResult<Json<ImportCounts>> {
    let checked = CheckedBundle::try_from(bundle)?;
    let store = state.store.as_ref();
    let mut counts = ImportCounts::default();

    for job in checked.jobs {
        store.create_job(user_id, job).await?;
        counts.jobs += 1;
    }
    for entry in checked.mood_entries {
        store.create_mood(user_id, entry).await?;
        counts.mood_entries += 1;
    }
    for session in checked.pomodoro_sessions {
        store.record_session(user_id, session).await?;
        counts.pomodoro_sessions += 1;
    }
    for entry in checked.learning_entries {
        store.create_learning(user_id, entry).await?;
        counts.learning_entries += 1;
    }
    if let Some(settings) = checked.settings {
        store.save_settings(user_id, &settings).await?;
        state.timers.update_settings(user_id, settings.pomodoro).await?;
        counts.settings = true;
    }

    info!(
        %user_id,
        jobs = counts.jobs,
        mood_entries = counts.mood_entries,
        pomodoro_sessions = counts.pomodoro_sessions,
        learning_entries = counts.learning_entries,
        "data imported"
    );
    Ok(Json(counts))
}

/// An import bundle whose every record passed the create-endpoint checks.
/// Built before the first write, so a bad record rejects the whole bundle.
#[derive(Debug)]
struct CheckedBundle {
    jobs: Vec<NewJobApplication>,
    mood_entries: Vec<NewMoodEntry>,
    pomodoro_sessions: Vec<NewPomodoroSession>,
    learning_entries: Vec<NewLearningEntry>,
    settings: Option<UserSettings>,
}

impl TryFrom<DataBundle> for CheckedBundle {
    type Error = AppError;

    fn try_from(bundle: DataBundle) -> Result<Self, AppError> {
        if let Some(settings) = &bundle.settings {
            settings.validate()?;
        }
        Ok(Self {
            jobs: check_all("jobs", bundle.jobs, check_job)?,
            mood_entries: check_all("moodEntries", bundle.mood_entries, check_mood)?,
            pomodoro_sessions: check_all("pomodoroSessions", bundle.pomodoro_sessions, check_session)?,
            learning_entries: check_all("learningEntries", bundle.learning_entries, check_learning)?,
            settings: bundle.settings,
        })
    }
}

fn check_all<T, N>(
    section: &str,
    items: Vec<T>,
    check: impl Fn(T) -> Result<N, AppError>,
) -> Result<Vec<N>, AppError> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            check(item).map_err(|e| match e {
                AppError::Validation(msg) => AppError::Validation(format!("{section}[{i}]: {msg}")),
                other => other,
            })
        })
        .collect()
}

fn check_job(job: JobApplication) -> Result<NewJobApplication, AppError> {
    CreateJobRequest {
        company: job.company,
        position: job.position,
        location: job.location,
        salary: job.salary,
        description: job.description,
        status: Some(job.status),
        priority: Some(job.priority),
        applied_at: Some(job.applied_at),
        interview_date: job.interview_date,
        interview_type: job.interview_type,
        interview_notes: job.interview_notes,
        source: job.source,
        contact_person: job.contact_person,
        referral: job.referral,
    }
    .into_new()
}

fn check_mood(entry: MoodEntry) -> Result<NewMoodEntry, AppError> {
    let new = CreateMoodRequest {
        mood_score: entry.mood_score,
        note: entry.note,
        tags: entry.tags,
    }
    .into_new()?;
    Ok(NewMoodEntry {
        created_at: entry.created_at,
        ..new
    })
}

fn check_session(session: PomodoroSession) -> Result<NewPomodoroSession, AppError> {
    let new = LogSessionRequest {
        duration: session.duration_minutes,
        task_name: session.task_name,
        category: session.category,
        completed: session.completed,
        phase: Some(session.phase),
        completed_at: Some(session.completed_at),
    }
    .into_new()?;
    Ok(NewPomodoroSession {
        interrupted: session.interrupted,
        ..new
    })
}

fn check_learning(entry: LearningEntry) -> Result<NewLearningEntry, AppError> {
    let new = CreateLearningRequest {
        platform: entry.platform,
        activity: entry.activity,
        description: entry.description,
        duration: entry.duration_minutes,
        difficulty: entry.difficulty,
        tags: entry.tags,
    }
    .into_new()?;
    Ok(NewLearningEntry {
        created_at: entry.created_at,
        ..new
    })
}
