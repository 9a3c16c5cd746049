use serde::Deserialize;
use time::OffsetDateTime;

use super::repo_types::NewMoodEntry;
use crate::error::AppError;
use crate::validation::{in_range, optional_text, tags};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMoodRequest {
    pub mood_score: i32,
    pub note: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CreateMoodRequest {
    pub fn into_new(self) -> Result<NewMoodEntry, AppError> {
        Ok(NewMoodEntry {
            mood_score: in_range("moodScore", self.mood_score, 1, 10)?,
            note: optional_text("note", self.note.as_deref(), 500)?,
            tags: tags("tags", &self.tags, 10, 20)?,
            created_at: OffsetDateTime::now_utc(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ListMoodQuery {
    pub limit: Option<i64>,
}

impl ListMoodQuery {
    pub fn limit(&self) -> Result<i64, AppError> {
        in_range("limit", self.limit.unwrap_or(30), 1, 365)
    }
}
