use serde::Deserialize;
use time::OffsetDateTime;

use super::repo_types::{Difficulty, NewLearningEntry};
use crate::error::AppError;
use crate::validation::{in_range, optional_text, required_text, tags};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLearningRequest {
    pub platform: String,
    pub activity: String,
    pub description: Option<String>,
    /// Minutes.
    pub duration: Option<i32>,
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CreateLearningRequest {
    pub fn into_new(self) -> Result<NewLearningEntry, AppError> {
        Ok(NewLearningEntry {
            platform: required_text("platform", &self.platform, 50)?,
            activity: required_text("activity", &self.activity, 200)?,
            description: optional_text("description", self.description.as_deref(), 500)?,
            duration_minutes: self
                .duration
                .map(|d| in_range("duration", d, 1, 480))
                .transpose()?,
            difficulty: self.difficulty,
            tags: tags("tags", &self.tags, 10, 30)?,
            created_at: OffsetDateTime::now_utc(),
        })
    }
}
