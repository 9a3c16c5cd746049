use serde::Serialize;
use time::{OffsetDateTime, Time};
use uuid::Uuid;

use super::repo_types::PomodoroSession;
use crate::store::Store;

/// Midnight UTC of the day containing `now`.
pub fn start_of_day(now: OffsetDateTime) -> OffsetDateTime {
    now.replace_time(Time::MIDNIGHT)
}

pub async fn todays_sessions(store: &dyn Store, user_id: Uuid) -> anyhow::Result<Vec<PomodoroSession>> {
    let since = start_of_day(OffsetDateTime::now_utc());
    store.list_sessions(user_id, Some(since)).await
}

pub async fn completed_work_today(store: &dyn Store, user_id: Uuid) -> anyhow::Result<u32> {
    let sessions = todays_sessions(store, user_id).await?;
    Ok(sessions.iter().filter(|s| s.is_focus()).count() as u32)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroStats {
    pub completed_sessions: u32,
    pub focus_minutes: i64,
    pub daily_goal: u32,
    pub goal_progress: f64,
}

pub fn daily_stats(sessions: &[PomodoroSession], daily_goal: u32) -> PomodoroStats {
    let focus: Vec<&PomodoroSession> = sessions.iter().filter(|s| s.is_focus()).collect();
    let completed_sessions = focus.len() as u32;
    let focus_minutes = focus.iter().map(|s| i64::from(s.duration_minutes)).sum();
    let goal_progress = if daily_goal == 0 {
        100.0
    } else {
        (f64::from(completed_sessions) / f64::from(daily_goal) * 100.0).min(100.0)
    };
    PomodoroStats {
        completed_sessions,
        focus_minutes,
        daily_goal,
        goal_progress,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pomodoro::repo_types::PomodoroCategory;
    use crate::pomodoro::timer::Phase;
    use time::macros::datetime;

    fn session(phase: Phase, minutes: i32, interrupted: bool) -> PomodoroSession {
        PomodoroSession {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            phase,
            category: PomodoroCategory::Work,
            task_name: None,
            duration_minutes: minutes,
            completed: !interrupted,
            interrupted,
            completed_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn only_completed_work_counts_toward_the_goal() {
        let sessions = vec![
            session(Phase::Work, 25, false),
            session(Phase::ShortBreak, 5, false),
            session(Phase::Work, 25, true),
            session(Phase::Work, 50, false),
        ];
        let stats = daily_stats(&sessions, 8);
        assert_eq!(stats.completed_sessions, 2);
        assert_eq!(stats.focus_minutes, 75);
        assert!((stats.goal_progress - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn goal_progress_is_capped() {
        let sessions: Vec<_> = (0..10).map(|_| session(Phase::Work, 25, false)).collect();
        assert_eq!(daily_stats(&sessions, 8).goal_progress, 100.0);
    }

    #[test]
    fn day_starts_at_utc_midnight() {
        let now = datetime!(2024-03-05 17:45:12 UTC);
        assert_eq!(start_of_day(now), datetime!(2024-03-05 0:00 UTC));
    }
}
