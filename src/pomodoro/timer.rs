//! Pomodoro timer state machine.
//!
//! Pure and clock-free: the caller feeds one [`PomodoroTimer::tick`] per
//! elapsed second while the timer is running and calls
//! [`PomodoroTimer::advance`] once the post-completion delay has passed.
//! The async driver lives in `runner.rs`.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::repo_types::PomodoroCategory;
use crate::error::AppError;
use crate::validation::in_range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "camelCase")]
#[sqlx(type_name = "pomodoro_phase", rename_all = "snake_case")]
pub enum Phase {
    Work,
    ShortBreak,
    LongBreak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
    Completed,
}

impl TimerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TimerStatus::Idle => "idle",
            TimerStatus::Running => "running",
            TimerStatus::Paused => "paused",
            TimerStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durations are minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PomodoroSettings {
    pub work_duration: u32,
    pub short_break_duration: u32,
    pub long_break_duration: u32,
    pub sessions_until_long_break: u32,
    pub sound_enabled: bool,
    pub notifications_enabled: bool,
}

impl Default for PomodoroSettings {
    fn default() -> Self {
        Self {
            work_duration: 25,
            short_break_duration: 5,
            long_break_duration: 15,
            sessions_until_long_break: 4,
            sound_enabled: true,
            notifications_enabled: true,
        }
    }
}

impl PomodoroSettings {
    pub fn validate(&self) -> Result<(), AppError> {
        in_range("workDuration", self.work_duration, 1, 180)?;
        in_range("shortBreakDuration", self.short_break_duration, 1, 180)?;
        in_range("longBreakDuration", self.long_break_duration, 1, 180)?;
        in_range("sessionsUntilLongBreak", self.sessions_until_long_break, 1, 12)?;
        Ok(())
    }

    pub fn duration_minutes(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Work => self.work_duration,
            Phase::ShortBreak => self.short_break_duration,
            Phase::LongBreak => self.long_break_duration,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    #[error("timer is {0}; only an idle timer can be started")]
    NotIdle(TimerStatus),
    #[error("timer is {0}; only a running timer can be paused")]
    NotRunning(TimerStatus),
    #[error("timer is {0}; only a paused timer can be resumed")]
    NotPaused(TimerStatus),
    #[error("timer is {0}; only a completed phase can advance")]
    NotCompleted(TimerStatus),
}

/// Emitted once per phase that counts down to zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPhase {
    pub phase: Phase,
    pub category: PomodoroCategory,
    pub task_name: Option<String>,
    pub duration_minutes: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub completed_at: OffsetDateTime,
    pub interrupted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub phase: Phase,
    pub status: TimerStatus,
    pub remaining_seconds: u32,
    pub phase_duration_seconds: u32,
    pub display: String,
    pub progress: f64,
    pub completed_work_sessions: u32,
    pub next_break: Phase,
    pub task_name: Option<String>,
    pub category: PomodoroCategory,
}

#[derive(Debug, Clone)]
pub struct PomodoroTimer {
    settings: PomodoroSettings,
    phase: Phase,
    status: TimerStatus,
    /// Length of the countdown in progress, fixed when the phase was entered.
    phase_secs: u32,
    remaining_secs: u32,
    completed_work_sessions: u32,
    task_name: Option<String>,
    category: PomodoroCategory,
}

impl PomodoroTimer {
    /// A fresh timer in the idle work phase. `completed_work_sessions` seeds
    /// the long-break cadence (today's count when resuming a user's day).
    pub fn new(settings: PomodoroSettings, completed_work_sessions: u32) -> Self {
        let phase_secs = settings.work_duration * 60;
        Self {
            settings,
            phase: Phase::Work,
            status: TimerStatus::Idle,
            phase_secs,
            remaining_secs: phase_secs,
            completed_work_sessions,
            task_name: None,
            category: PomodoroCategory::Work,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn completed_work_sessions(&self) -> u32 {
        self.completed_work_sessions
    }

    pub fn phase_duration_secs(&self) -> u32 {
        self.phase_secs
    }

    pub fn start(
        &mut self,
        task_name: Option<String>,
        category: Option<PomodoroCategory>,
    ) -> Result<(), TimerError> {
        if self.status != TimerStatus::Idle {
            return Err(TimerError::NotIdle(self.status));
        }
        self.task_name = task_name;
        if let Some(category) = category {
            self.category = category;
        }
        self.status = TimerStatus::Running;
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), TimerError> {
        if self.status != TimerStatus::Running {
            return Err(TimerError::NotRunning(self.status));
        }
        self.status = TimerStatus::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), TimerError> {
        if self.status != TimerStatus::Paused {
            return Err(TimerError::NotPaused(self.status));
        }
        self.status = TimerStatus::Running;
        Ok(())
    }

    /// Back to idle with the full phase duration. Progress is discarded and
    /// nothing is emitted. A completed phase that has not advanced yet
    /// advances now instead of waiting for the delay.
    pub fn reset(&mut self) {
        if self.status == TimerStatus::Completed {
            self.enter(self.next_phase());
        } else {
            self.enter(self.phase);
        }
        self.task_name = None;
    }

    /// One elapsed second. Returns the completed phase when the countdown
    /// reaches zero; a no-op unless running.
    pub fn tick(&mut self, now: OffsetDateTime) -> Option<CompletedPhase> {
        if self.status != TimerStatus::Running {
            return None;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs > 0 {
            return None;
        }

        self.status = TimerStatus::Completed;
        let category = match self.phase {
            Phase::Work => {
                self.completed_work_sessions += 1;
                self.category
            }
            Phase::ShortBreak | Phase::LongBreak => PomodoroCategory::Break,
        };
        Some(CompletedPhase {
            phase: self.phase,
            category,
            task_name: self.task_name.clone(),
            duration_minutes: self.phase_secs / 60,
            completed_at: now,
            interrupted: false,
        })
    }

    /// Move a completed phase on to the next one, idle.
    pub fn advance(&mut self) -> Result<Phase, TimerError> {
        if self.status != TimerStatus::Completed {
            return Err(TimerError::NotCompleted(self.status));
        }
        let next = self.next_phase();
        self.enter(next);
        Ok(next)
    }

    /// New settings apply to the next countdown; an idle timer picks up the
    /// new phase duration straight away. A started countdown keeps its length.
    pub fn update_settings(&mut self, settings: PomodoroSettings) {
        self.settings = settings;
        if self.status == TimerStatus::Idle {
            self.enter(self.phase);
        }
    }

    /// The break that follows the next completed work phase.
    pub fn upcoming_break(&self) -> Phase {
        let cadence = self.settings.sessions_until_long_break.max(1);
        let pending = match (self.phase, self.status) {
            (Phase::Work, TimerStatus::Completed) => self.completed_work_sessions,
            _ => self.completed_work_sessions + 1,
        };
        if pending % cadence == 0 {
            Phase::LongBreak
        } else {
            Phase::ShortBreak
        }
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let total = self.phase_duration_secs();
        let elapsed = total.saturating_sub(self.remaining_secs);
        let progress = if total == 0 {
            0.0
        } else {
            f64::from(elapsed) / f64::from(total) * 100.0
        };
        TimerSnapshot {
            phase: self.phase,
            status: self.status,
            remaining_seconds: self.remaining_secs,
            phase_duration_seconds: total,
            display: format_clock(self.remaining_secs),
            progress,
            completed_work_sessions: self.completed_work_sessions,
            next_break: self.upcoming_break(),
            task_name: self.task_name.clone(),
            category: self.category,
        }
    }

    fn next_phase(&self) -> Phase {
        match self.phase {
            Phase::Work => {
                let cadence = self.settings.sessions_until_long_break.max(1);
                if self.completed_work_sessions % cadence == 0 {
                    Phase::LongBreak
                } else {
                    Phase::ShortBreak
                }
            }
            Phase::ShortBreak | Phase::LongBreak => Phase::Work,
        }
    }

    fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        self.status = TimerStatus::Idle;
        self.phase_secs = self.settings.duration_minutes(phase) * 60;
        self.remaining_secs = self.phase_secs;
    }
}

/// `mm:ss`, minutes unbounded.
pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(work: u32, short: u32, long: u32, every: u32) -> PomodoroSettings {
        PomodoroSettings {
            work_duration: work,
            short_break_duration: short,
            long_break_duration: long,
            sessions_until_long_break: every,
            ..PomodoroSettings::default()
        }
    }

    fn now() -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    /// Runs the current phase to completion, asserting the countdown hits
    /// zero exactly on the last tick.
    fn run_phase(timer: &mut PomodoroTimer) -> CompletedPhase {
        timer.start(None, None).expect("start");
        let total = timer.phase_duration_secs();
        assert_eq!(timer.remaining_secs(), total);
        for _ in 1..total {
            assert!(timer.tick(now()).is_none());
        }
        let record = timer.tick(now()).expect("completes on the last tick");
        assert_eq!(timer.remaining_secs(), 0);
        assert_eq!(timer.status(), TimerStatus::Completed);
        record
    }

    #[test]
    fn countdown_starts_at_duration_and_completes_at_zero() {
        for work in [1, 5, 25, 60] {
            let mut timer = PomodoroTimer::new(settings(work, 5, 15, 4), 0);
            assert_eq!(timer.remaining_secs(), work * 60);
            let record = run_phase(&mut timer);
            assert_eq!(record.phase, Phase::Work);
            assert_eq!(record.duration_minutes, work);
            assert!(!record.interrupted);
        }
    }

    #[test]
    fn ticks_are_ignored_unless_running() {
        let mut timer = PomodoroTimer::new(PomodoroSettings::default(), 0);
        assert!(timer.tick(now()).is_none());
        assert_eq!(timer.remaining_secs(), 25 * 60);

        timer.start(None, None).unwrap();
        timer.tick(now());
        timer.pause().unwrap();
        for _ in 0..10 {
            assert!(timer.tick(now()).is_none());
        }
        assert_eq!(timer.remaining_secs(), 25 * 60 - 1);
    }

    #[test]
    fn pause_and_resume_preserve_remaining_time() {
        let mut timer = PomodoroTimer::new(settings(2, 1, 1, 4), 0);
        timer.start(None, None).unwrap();
        for _ in 0..37 {
            timer.tick(now());
        }
        let before = timer.remaining_secs();
        timer.pause().unwrap();
        assert_eq!(timer.status(), TimerStatus::Paused);
        timer.resume().unwrap();
        assert_eq!(timer.remaining_secs(), before);
        assert_eq!(timer.status(), TimerStatus::Running);
    }

    #[test]
    fn fourth_work_session_routes_to_long_break() {
        let mut timer = PomodoroTimer::new(settings(25, 5, 15, 4), 0);
        let mut breaks = Vec::new();
        for _ in 0..4 {
            assert_eq!(timer.phase(), Phase::Work);
            run_phase(&mut timer);
            breaks.push(timer.advance().unwrap());
            run_phase(&mut timer);
            assert_eq!(timer.advance().unwrap(), Phase::Work);
        }
        assert_eq!(
            breaks,
            vec![
                Phase::ShortBreak,
                Phase::ShortBreak,
                Phase::ShortBreak,
                Phase::LongBreak
            ]
        );
        assert_eq!(timer.completed_work_sessions(), 4);
    }

    #[test]
    fn long_break_cadence_counts_seeded_sessions() {
        let mut timer = PomodoroTimer::new(settings(1, 1, 1, 3), 2);
        assert_eq!(timer.upcoming_break(), Phase::LongBreak);
        run_phase(&mut timer);
        assert_eq!(timer.advance().unwrap(), Phase::LongBreak);
        assert_eq!(timer.remaining_secs(), 60);
    }

    #[test]
    fn break_records_use_break_category() {
        let mut timer = PomodoroTimer::new(settings(1, 1, 1, 4), 0);
        timer
            .start(Some("Resume".into()), Some(PomodoroCategory::JobSearch))
            .unwrap();
        for _ in 0..59 {
            timer.tick(now());
        }
        let work = timer.tick(now()).unwrap();
        assert_eq!(work.category, PomodoroCategory::JobSearch);
        assert_eq!(work.task_name.as_deref(), Some("Resume"));
        timer.advance().unwrap();
        let rest = run_phase(&mut timer);
        assert_eq!(rest.phase, Phase::ShortBreak);
        assert_eq!(rest.category, PomodoroCategory::Break);
    }

    #[test]
    fn reset_restores_full_duration_from_any_state() {
        let mut timer = PomodoroTimer::new(settings(3, 1, 1, 4), 0);
        timer.reset();
        assert_eq!(timer.status(), TimerStatus::Idle);
        assert_eq!(timer.remaining_secs(), 180);

        timer.start(None, None).unwrap();
        timer.tick(now());
        timer.reset();
        assert_eq!(timer.status(), TimerStatus::Idle);
        assert_eq!(timer.remaining_secs(), 180);

        timer.start(None, None).unwrap();
        timer.tick(now());
        timer.pause().unwrap();
        timer.reset();
        assert_eq!(timer.status(), TimerStatus::Idle);
        assert_eq!(timer.remaining_secs(), 180);
        assert_eq!(timer.completed_work_sessions(), 0);
    }

    #[test]
    fn reset_after_completion_skips_the_advance_delay() {
        let mut timer = PomodoroTimer::new(settings(1, 2, 3, 4), 0);
        run_phase(&mut timer);
        timer.reset();
        assert_eq!(timer.phase(), Phase::ShortBreak);
        assert_eq!(timer.status(), TimerStatus::Idle);
        assert_eq!(timer.remaining_secs(), 120);
    }

    #[test]
    fn illegal_transitions_leave_state_untouched() {
        let mut timer = PomodoroTimer::new(PomodoroSettings::default(), 0);
        assert_eq!(timer.pause(), Err(TimerError::NotRunning(TimerStatus::Idle)));
        assert_eq!(timer.resume(), Err(TimerError::NotPaused(TimerStatus::Idle)));
        assert_eq!(timer.advance(), Err(TimerError::NotCompleted(TimerStatus::Idle)));
        timer.start(None, None).unwrap();
        assert_eq!(
            timer.start(None, None),
            Err(TimerError::NotIdle(TimerStatus::Running))
        );
        assert_eq!(timer.status(), TimerStatus::Running);
    }

    #[test]
    fn settings_change_only_rewinds_idle_timer() {
        let mut timer = PomodoroTimer::new(PomodoroSettings::default(), 0);
        timer.update_settings(settings(50, 10, 30, 4));
        assert_eq!(timer.remaining_secs(), 50 * 60);

        timer.start(None, None).unwrap();
        timer.tick(now());
        timer.update_settings(settings(10, 10, 30, 4));
        assert_eq!(timer.remaining_secs(), 50 * 60 - 1);
    }

    #[test]
    fn started_countdown_keeps_its_length_across_settings_changes() {
        let mut timer = PomodoroTimer::new(settings(1, 5, 15, 4), 0);
        timer.start(None, None).unwrap();
        for _ in 0..10 {
            timer.tick(now());
        }
        timer.update_settings(settings(50, 5, 15, 4));

        let snap = timer.snapshot();
        assert_eq!(snap.remaining_seconds, 50);
        assert_eq!(snap.phase_duration_seconds, 60);
        assert!(snap.progress < 17.0);

        for _ in 0..49 {
            assert!(timer.tick(now()).is_none());
        }
        let record = timer.tick(now()).expect("one-minute countdown completes");
        assert_eq!(record.duration_minutes, 1);

        // the next phase, and the one after it, use the new settings
        timer.advance().unwrap();
        run_phase(&mut timer);
        timer.advance().unwrap();
        assert_eq!(timer.phase(), Phase::Work);
        assert_eq!(timer.remaining_secs(), 50 * 60);
    }

    #[test]
    fn reset_adopts_current_settings() {
        let mut timer = PomodoroTimer::new(settings(1, 5, 15, 4), 0);
        timer.start(None, None).unwrap();
        timer.tick(now());
        timer.update_settings(settings(30, 5, 15, 4));
        timer.reset();
        assert_eq!(timer.remaining_secs(), 30 * 60);
        assert_eq!(timer.phase_duration_secs(), 30 * 60);
    }

    #[test]
    fn snapshot_reports_progress_and_clock() {
        let mut timer = PomodoroTimer::new(settings(1, 1, 1, 4), 0);
        timer.start(None, None).unwrap();
        for _ in 0..15 {
            timer.tick(now());
        }
        let snap = timer.snapshot();
        assert_eq!(snap.display, "00:45");
        assert_eq!(snap.remaining_seconds, 45);
        assert!((snap.progress - 25.0).abs() < f64::EPSILON);
        assert_eq!(format_clock(25 * 60), "25:00");
    }

    #[test]
    fn settings_validation() {
        assert!(PomodoroSettings::default().validate().is_ok());
        assert!(settings(0, 5, 15, 4).validate().is_err());
        assert!(settings(25, 5, 15, 0).validate().is_err());
        assert!(settings(181, 5, 15, 4).validate().is_err());
        assert!(settings(25, 5, 15, 12).validate().is_ok());
        assert!(settings(25, 5, 15, 13).validate().is_err());
    }
}
