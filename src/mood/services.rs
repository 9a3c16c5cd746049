use serde::Serialize;

use super::repo_types::MoodEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendedEntry {
    pub entry: MoodEntry,
    pub trend: Trend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_score: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodSummary {
    pub count: usize,
    pub average_score: f64,
    pub entries: Vec<TrendedEntry>,
}

pub fn trend(current: i32, previous: Option<i32>) -> Trend {
    match previous {
        Some(prev) if current > prev => Trend::Up,
        Some(prev) if current < prev => Trend::Down,
        _ => Trend::Stable,
    }
}

/// Mean score rounded to one decimal; 0 when there are no entries.
pub fn average_score(entries: &[MoodEntry]) -> f64 {
    if entries.is_empty() {
        return 0.0;
    }
    let sum: i64 = entries.iter().map(|e| e.mood_score as i64).sum();
    (sum as f64 / entries.len() as f64 * 10.0).round() / 10.0
}

/// `entries` newest first, as the store returns them. Each entry is compared
/// with the one logged just before it.
pub fn summarize(entries: Vec<MoodEntry>) -> MoodSummary {
    let average = average_score(&entries);
    let previous: Vec<Option<i32>> = (0..entries.len())
        .map(|i| entries.get(i + 1).map(|e| e.mood_score))
        .collect();
    let entries: Vec<TrendedEntry> = entries
        .into_iter()
        .zip(previous)
        .map(|(entry, previous_score)| TrendedEntry {
            trend: trend(entry.mood_score, previous_score),
            previous_score,
            entry,
        })
        .collect();

    MoodSummary {
        count: entries.len(),
        average_score: average,
        entries,
    }
}
