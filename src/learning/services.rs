use std::collections::BTreeMap;

use serde::Serialize;

use super::repo_types::LearningEntry;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningSummary {
    pub entries: usize,
    pub total_minutes: i64,
    pub total_hours: f64,
    /// Minutes per platform.
    pub by_platform: BTreeMap<String, i64>,
}

/// Hours rounded to one decimal.
pub fn hours(minutes: i64) -> f64 {
    (minutes as f64 / 60.0 * 10.0).round() / 10.0
}

pub fn summarize(entries: &[LearningEntry]) -> LearningSummary {
    let mut by_platform: BTreeMap<String, i64> = BTreeMap::new();
    let mut total_minutes = 0i64;
    for entry in entries {
        let minutes = entry.duration_minutes.unwrap_or(0) as i64;
        total_minutes += minutes;
        *by_platform.entry(entry.platform.clone()).or_default() += minutes;
    }
    LearningSummary {
        entries: entries.len(),
        total_minutes,
        total_hours: hours(total_minutes),
        by_platform,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::repo_types::NewLearningEntry;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn entry(platform: &str, minutes: Option<i32>) -> LearningEntry {
        NewLearningEntry {
            platform: platform.into(),
            activity: "practice".into(),
            description: None,
            duration_minutes: minutes,
            difficulty: None,
            tags: vec![],
            created_at: OffsetDateTime::now_utc(),
        }
        .into_entry(Uuid::nil())
    }

    #[test]
    fn minutes_roll_up_per_platform() {
        let summary = summarize(&[
            entry("LeetCode", Some(45)),
            entry("Coursera", Some(90)),
            entry("LeetCode", Some(30)),
            entry("YouTube", None),
        ]);
        assert_eq!(summary.entries, 4);
        assert_eq!(summary.total_minutes, 165);
        assert_eq!(summary.total_hours, 2.8);
        assert_eq!(summary.by_platform["LeetCode"], 75);
        assert_eq!(summary.by_platform["YouTube"], 0);
    }
}
