use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::timer::{CompletedPhase, Phase};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "pomodoro_category", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PomodoroCategory {
    #[default]
    Work,
    Study,
    JobSearch,
    InterviewPrep,
    Break,
}

/// Pomodoro history row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub phase: Phase,
    pub category: PomodoroCategory,
    pub task_name: Option<String>,
    pub duration_minutes: i32,
    pub completed: bool,
    pub interrupted: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub completed_at: OffsetDateTime,
}

impl PomodoroSession {
    /// Completed, uninterrupted work; what the daily goal counts.
    pub fn is_focus(&self) -> bool {
        self.phase == Phase::Work && self.completed && !self.interrupted
    }
}

#[derive(Debug, Clone)]
pub struct NewPomodoroSession {
    pub phase: Phase,
    pub category: PomodoroCategory,
    pub task_name: Option<String>,
    pub duration_minutes: i32,
    pub completed: bool,
    pub interrupted: bool,
    pub completed_at: OffsetDateTime,
}

impl From<CompletedPhase> for NewPomodoroSession {
    fn from(done: CompletedPhase) -> Self {
        Self {
            phase: done.phase,
            category: done.category,
            task_name: done.task_name,
            duration_minutes: done.duration_minutes as i32,
            completed: true,
            interrupted: done.interrupted,
            completed_at: done.completed_at,
        }
    }
}

impl NewPomodoroSession {
    pub fn into_session(self, user_id: Uuid) -> PomodoroSession {
        PomodoroSession {
            id: Uuid::new_v4(),
            user_id,
            phase: self.phase,
            category: self.category,
            task_name: self.task_name,
            duration_minutes: self.duration_minutes,
            completed: self.completed,
            interrupted: self.interrupted,
            completed_at: self.completed_at,
        }
    }
}
