//! Persistence behind one interface.
//!
//! Handlers only see `Arc<dyn Store>`. [`PgStore`] keeps everything in
//! Postgres; [`LocalStore`] keeps each collection as a whole JSON document on
//! disk. Configuration picks one at start-up.

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{AuthProvider, NewUser, PasswordResetToken, User};
use crate::config::{AppConfig, StoreBackend};
use crate::jobs::repo_types::{JobApplication, JobFilter, JobPatch, NewJobApplication};
use crate::learning::repo_types::{LearningEntry, NewLearningEntry};
use crate::mood::repo_types::{MoodEntry, NewMoodEntry};
use crate::pomodoro::repo_types::{NewPomodoroSession, PomodoroSession};
use crate::settings::repo_types::UserSettings;

mod local;
mod postgres;

pub use local::LocalStore;
pub use postgres::PgStore;

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_user_by_account(
        &self,
        provider: AuthProvider,
        provider_account_id: &str,
    ) -> anyhow::Result<Option<User>>;
    async fn create_user(&self, user: NewUser) -> anyhow::Result<User>;
    async fn set_password(&self, user_id: Uuid, password_hash: &str) -> anyhow::Result<()>;
    async fn link_account(
        &self,
        user_id: Uuid,
        provider: AuthProvider,
        provider_account_id: &str,
    ) -> anyhow::Result<()>;
}

#[async_trait]
pub trait ResetTokenRepo: Send + Sync {
    /// Drop this email's unused tokens that expired before `now`.
    async fn purge_expired_reset_tokens(&self, email: &str, now: OffsetDateTime) -> anyhow::Result<u64>;
    async fn create_reset_token(
        &self,
        email: &str,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<PasswordResetToken>;
    async fn find_reset_token(&self, token_hash: &str) -> anyhow::Result<Option<PasswordResetToken>>;
    /// Claims an unused token; false when it was already used.
    async fn mark_reset_token_used(&self, id: Uuid) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait JobRepo: Send + Sync {
    async fn list_jobs(&self, user_id: Uuid, filter: &JobFilter) -> anyhow::Result<Vec<JobApplication>>;
    async fn get_job(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<JobApplication>>;
    async fn create_job(&self, user_id: Uuid, job: NewJobApplication) -> anyhow::Result<JobApplication>;
    async fn update_job(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: JobPatch,
    ) -> anyhow::Result<Option<JobApplication>>;
    async fn delete_job(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait MoodRepo: Send + Sync {
    /// Newest first.
    async fn list_moods(&self, user_id: Uuid, limit: Option<i64>) -> anyhow::Result<Vec<MoodEntry>>;
    async fn create_mood(&self, user_id: Uuid, entry: NewMoodEntry) -> anyhow::Result<MoodEntry>;
    async fn delete_mood(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait PomodoroRepo: Send + Sync {
    /// Newest first, optionally only those completed at or after `since`.
    async fn list_sessions(
        &self,
        user_id: Uuid,
        since: Option<OffsetDateTime>,
    ) -> anyhow::Result<Vec<PomodoroSession>>;
    async fn record_session(
        &self,
        user_id: Uuid,
        session: NewPomodoroSession,
    ) -> anyhow::Result<PomodoroSession>;
}

#[async_trait]
pub trait LearningRepo: Send + Sync {
    /// Newest first.
    async fn list_learning(&self, user_id: Uuid) -> anyhow::Result<Vec<LearningEntry>>;
    async fn create_learning(&self, user_id: Uuid, entry: NewLearningEntry) -> anyhow::Result<LearningEntry>;
    async fn delete_learning(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait SettingsRepo: Send + Sync {
    async fn load_settings(&self, user_id: Uuid) -> anyhow::Result<Option<UserSettings>>;
    async fn save_settings(&self, user_id: Uuid, settings: &UserSettings) -> anyhow::Result<()>;
}

#[async_trait]
pub trait Store:
    UserRepo + ResetTokenRepo + JobRepo + MoodRepo + PomodoroRepo + LearningRepo + SettingsRepo
{
    fn backend(&self) -> &'static str;

    /// Cheap round trip proving the backing storage is reachable.
    async fn ping(&self) -> anyhow::Result<()>;
}

pub async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    let store: Arc<dyn Store> = match &config.store {
        StoreBackend::Postgres { database_url } => Arc::new(PgStore::connect(database_url).await?),
        StoreBackend::Local { dir } => Arc::new(LocalStore::open(dir).await?),
    };
    tracing::info!(backend = store.backend(), "store opened");
    Ok(store)
}
