use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "learning_difficulty", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LearningEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub platform: String,
    pub activity: String,
    pub description: Option<String>,
    pub duration_minutes: Option<i32>,
    pub difficulty: Option<Difficulty>,
    pub tags: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewLearningEntry {
    pub platform: String,
    pub activity: String,
    pub description: Option<String>,
    pub duration_minutes: Option<i32>,
    pub difficulty: Option<Difficulty>,
    pub tags: Vec<String>,
    pub created_at: OffsetDateTime,
}

impl NewLearningEntry {
    pub fn into_entry(self, user_id: Uuid) -> LearningEntry {
        LearningEntry {
            id: Uuid::new_v4(),
            user_id,
            platform: self.platform,
            activity: self.activity,
            description: self.description,
            duration_minutes: self.duration_minutes,
            difficulty: self.difficulty,
            tags: self.tags,
            created_at: self.created_at,
        }
    }
}
