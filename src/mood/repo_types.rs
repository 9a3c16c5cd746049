use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MoodEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub mood_score: i32, // 1..=10
    pub note: Option<String>,
    pub tags: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewMoodEntry {
    pub mood_score: i32,
    pub note: Option<String>,
    pub tags: Vec<String>,
    pub created_at: OffsetDateTime,
}

impl NewMoodEntry {
    pub fn into_entry(self, user_id: Uuid) -> MoodEntry {
        MoodEntry {
            id: Uuid::new_v4(),
            user_id,
            mood_score: self.mood_score,
            note: self.note,
            tags: self.tags,
            created_at: self.created_at,
        }
    }
}
