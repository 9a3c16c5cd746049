use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::pomodoro::timer::PomodoroSettings;
use crate::validation::in_range;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "en")]
    En,
    #[serde(rename = "zh-TW")]
    ZhTw,
}

/// Per-user preferences, persisted as one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    pub pomodoro: PomodoroSettings,
    pub theme: Theme,
    pub locale: Locale,
    pub daily_pomodoro_goal: u32,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            pomodoro: PomodoroSettings::default(),
            theme: Theme::default(),
            locale: Locale::default(),
            daily_pomodoro_goal: 8,
        }
    }
}

impl UserSettings {
    pub fn validate(&self) -> Result<(), AppError> {
        self.pomodoro.validate()?;
        in_range("dailyPomodoroGoal", self.daily_pomodoro_goal, 1, 48)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let s: UserSettings = serde_json::from_value(serde_json::json!({
            "theme": "dark",
            "locale": "zh-TW",
            "pomodoro": { "workDuration": 50 }
        }))
        .unwrap();
        assert_eq!(s.theme, Theme::Dark);
        assert_eq!(s.locale, Locale::ZhTw);
        assert_eq!(s.pomodoro.work_duration, 50);
        assert_eq!(s.pomodoro.sessions_until_long_break, 4);
        assert_eq!(s.daily_pomodoro_goal, 8);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn goal_must_be_positive() {
        let s = UserSettings {
            daily_pomodoro_goal: 0,
            ..UserSettings::default()
        };
        assert!(s.validate().is_err());
    }
}
