use serde::Deserialize;
use time::OffsetDateTime;

use super::repo_types::{NewPomodoroSession, PomodoroCategory};
use super::timer::Phase;
use crate::error::AppError;
use crate::validation::{in_range, optional_text};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTimerRequest {
    pub task_name: Option<String>,
    pub category: Option<PomodoroCategory>,
}

impl StartTimerRequest {
    pub fn task_name(&self) -> Result<Option<String>, AppError> {
        optional_text("taskName", self.task_name.as_deref(), 200)
    }
}

/// Manually logged session, e.g. focus time spent away from the timer.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSessionRequest {
    pub duration: i32,
    pub task_name: Option<String>,
    pub category: PomodoroCategory,
    #[serde(default)]
    pub completed: bool,
    pub phase: Option<Phase>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

impl LogSessionRequest {
    pub fn into_new(self) -> Result<NewPomodoroSession, AppError> {
        let duration_minutes = in_range("duration", self.duration, 1, 180)?;
        let task_name = optional_text("taskName", self.task_name.as_deref(), 200)?;
        Ok(NewPomodoroSession {
            phase: self.phase.unwrap_or(Phase::Work),
            category: self.category,
            task_name,
            duration_minutes,
            completed: self.completed,
            interrupted: false,
            completed_at: self.completed_at.unwrap_or_else(OffsetDateTime::now_utc),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    #[serde(default)]
    pub today: bool,
}
