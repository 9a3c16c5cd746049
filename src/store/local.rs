//! File-backed store for single-user installs.
//!
//! Every collection is one JSON array on disk, read whole and rewritten whole.
//! Writes go to a temp file first and are renamed into place. A single async
//! mutex serializes all read-modify-write cycles.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    JobRepo, LearningRepo, MoodRepo, PomodoroRepo, ResetTokenRepo, SettingsRepo, Store, UserRepo,
};
use crate::auth::repo_types::{Account, AuthProvider, NewUser, PasswordResetToken, User};
use crate::jobs::repo_types::{JobApplication, JobFilter, JobPatch, NewJobApplication};
use crate::learning::repo_types::{LearningEntry, NewLearningEntry};
use crate::mood::repo_types::{MoodEntry, NewMoodEntry};
use crate::pomodoro::repo_types::{NewPomodoroSession, PomodoroSession};
use crate::settings::repo_types::UserSettings;

const USERS: &str = "worksync-users.json";
const ACCOUNTS: &str = "worksync-accounts.json";
const RESET_TOKENS: &str = "worksync-password-reset-tokens.json";
const JOBS: &str = "worksync-jobs.json";
const MOODS: &str = "worksync-mood-entries.json";
const SESSIONS: &str = "worksync-pomodoro-sessions.json";
const LEARNING: &str = "worksync-learning-progress.json";
const SETTINGS: &str = "worksync-settings.json";

pub struct LocalStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl LocalStore {
    pub async fn open(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let root = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(root.join("users"))
            .await
            .with_context(|| format!("create store dir {}", root.display()))?;
        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    fn user_file(&self, user_id: Uuid, name: &str) -> PathBuf {
        self.root.join("users").join(user_id.to_string()).join(name)
    }

    async fn load<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
        match tokio::fs::read(path).await {
            Ok(raw) => serde_json::from_slice(&raw)
                .with_context(|| format!("parse {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    async fn save<T: Serialize>(path: &Path, items: &[T]) -> anyhow::Result<()> {
        write_json(path, &items).await
    }

    /// Apply `f` to the collection at `path` and persist it when `f` reports a change.
    async fn modify<T, R>(
        &self,
        path: PathBuf,
        f: impl FnOnce(&mut Vec<T>) -> (R, bool),
    ) -> anyhow::Result<R>
    where
        T: Serialize + DeserializeOwned,
    {
        let _guard = self.lock.lock().await;
        let mut items = Self::load::<T>(&path).await?;
        let (out, changed) = f(&mut items);
        if changed {
            Self::save(&path, &items).await?;
        }
        Ok(out)
    }

    async fn read<T: DeserializeOwned>(&self, path: PathBuf) -> anyhow::Result<Vec<T>> {
        let _guard = self.lock.lock().await;
        Self::load(&path).await
    }
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let body = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, body)
        .await
        .with_context(|| format!("write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> OffsetDateTime) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

fn remove_owned<T>(items: &mut Vec<T>, keep: impl Fn(&T) -> bool) -> (bool, bool) {
    let before = items.len();
    items.retain(keep);
    let removed = items.len() != before;
    (removed, removed)
}

#[async_trait]
impl UserRepo for LocalStore {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users: Vec<User> = self.read(self.root.join(USERS)).await?;
        Ok(users.into_iter().find(|u| u.email == email))
    }

    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let users: Vec<User> = self.read(self.root.join(USERS)).await?;
        Ok(users.into_iter().find(|u| u.id == id))
    }

    async fn find_user_by_account(
        &self,
        provider: AuthProvider,
        provider_account_id: &str,
    ) -> anyhow::Result<Option<User>> {
        let accounts: Vec<Account> = self.read(self.root.join(ACCOUNTS)).await?;
        let Some(account) = accounts
            .into_iter()
            .find(|a| a.provider == provider && a.provider_account_id == provider_account_id)
        else {
            return Ok(None);
        };
        self.find_user_by_id(account.user_id).await
    }

    async fn create_user(&self, user: NewUser) -> anyhow::Result<User> {
        let now = OffsetDateTime::now_utc();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            image: user.image,
            provider: user.provider,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        let result = self
            .modify(self.root.join(USERS), |users: &mut Vec<User>| {
                if users.iter().any(|u| u.email == created.email) {
                    return (None, false);
                }
                users.push(created.clone());
                (Some(created.clone()), true)
            })
            .await?;
        result.ok_or_else(|| anyhow::anyhow!("email already registered: {}", created.email))
    }

    async fn set_password(&self, user_id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        let found = self
            .modify(self.root.join(USERS), |users: &mut Vec<User>| {
                match users.iter_mut().find(|u| u.id == user_id) {
                    Some(user) => {
                        user.password_hash = Some(password_hash.to_string());
                        user.updated_at = OffsetDateTime::now_utc();
                        (true, true)
                    }
                    None => (false, false),
                }
            })
            .await?;
        anyhow::ensure!(found, "user {user_id} not found");
        Ok(())
    }

    async fn link_account(
        &self,
        user_id: Uuid,
        provider: AuthProvider,
        provider_account_id: &str,
    ) -> anyhow::Result<()> {
        self.modify(self.root.join(ACCOUNTS), |accounts: &mut Vec<Account>| {
            let exists = accounts
                .iter()
                .any(|a| a.provider == provider && a.provider_account_id == provider_account_id);
            if !exists {
                accounts.push(Account {
                    user_id,
                    provider,
                    provider_account_id: provider_account_id.to_string(),
                });
            }
            ((), !exists)
        })
        .await
    }
}

#[async_trait]
impl ResetTokenRepo for LocalStore {
    async fn purge_expired_reset_tokens(&self, email: &str, now: OffsetDateTime) -> anyhow::Result<u64> {
        self.modify(self.root.join(RESET_TOKENS), |tokens: &mut Vec<PasswordResetToken>| {
            let before = tokens.len();
            tokens.retain(|t| !(t.email == email && !t.used && t.expires_at < now));
            let purged = (before - tokens.len()) as u64;
            (purged, purged > 0)
        })
        .await
    }

    async fn create_reset_token(
        &self,
        email: &str,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<PasswordResetToken> {
        let token = PasswordResetToken {
            id: Uuid::new_v4(),
            email: email.to_string(),
            token_hash: token_hash.to_string(),
            expires_at,
            used: false,
            created_at: OffsetDateTime::now_utc(),
        };
        self.modify(self.root.join(RESET_TOKENS), |tokens: &mut Vec<PasswordResetToken>| {
            tokens.push(token.clone());
            ((), true)
        })
        .await?;
        Ok(token)
    }

    async fn find_reset_token(&self, token_hash: &str) -> anyhow::Result<Option<PasswordResetToken>> {
        let tokens: Vec<PasswordResetToken> = self.read(self.root.join(RESET_TOKENS)).await?;
        Ok(tokens.into_iter().find(|t| t.token_hash == token_hash))
    }

    async fn mark_reset_token_used(&self, id: Uuid) -> anyhow::Result<bool> {
        self.modify(self.root.join(RESET_TOKENS), |tokens: &mut Vec<PasswordResetToken>| {
            match tokens.iter_mut().find(|t| t.id == id && !t.used) {
                Some(t) => {
                    t.used = true;
                    (true, true)
                }
                None => (false, false),
            }
        })
        .await
    }
}

#[async_trait]
impl JobRepo for LocalStore {
    async fn list_jobs(&self, user_id: Uuid, filter: &JobFilter) -> anyhow::Result<Vec<JobApplication>> {
        let jobs = self.read(self.user_file(user_id, JOBS)).await?;
        Ok(filter.apply(jobs))
    }

    async fn get_job(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<JobApplication>> {
        let jobs: Vec<JobApplication> = self.read(self.user_file(user_id, JOBS)).await?;
        Ok(jobs.into_iter().find(|j| j.id == id))
    }

    async fn create_job(&self, user_id: Uuid, job: NewJobApplication) -> anyhow::Result<JobApplication> {
        let job = job.into_job(user_id, OffsetDateTime::now_utc());
        self.modify(self.user_file(user_id, JOBS), |jobs: &mut Vec<JobApplication>| {
            jobs.push(job.clone());
            ((), true)
        })
        .await?;
        Ok(job)
    }

    async fn update_job(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: JobPatch,
    ) -> anyhow::Result<Option<JobApplication>> {
        self.modify(self.user_file(user_id, JOBS), |jobs: &mut Vec<JobApplication>| {
            match jobs.iter_mut().find(|j| j.id == id) {
                Some(job) => {
                    patch.apply(job, OffsetDateTime::now_utc());
                    (Some(job.clone()), true)
                }
                None => (None, false),
            }
        })
        .await
    }

    async fn delete_job(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        self.modify(self.user_file(user_id, JOBS), |jobs: &mut Vec<JobApplication>| {
            remove_owned(jobs, |j| j.id != id)
        })
        .await
    }
}

#[async_trait]
impl MoodRepo for LocalStore {
    async fn list_moods(&self, user_id: Uuid, limit: Option<i64>) -> anyhow::Result<Vec<MoodEntry>> {
        let mut moods: Vec<MoodEntry> = self.read(self.user_file(user_id, MOODS)).await?;
        newest_first(&mut moods, |m| m.created_at);
        if let Some(limit) = limit {
            moods.truncate(limit.max(0).try_into().unwrap_or(usize::MAX));
        }
        Ok(moods)
    }

    async fn create_mood(&self, user_id: Uuid, entry: NewMoodEntry) -> anyhow::Result<MoodEntry> {
        let entry = entry.into_entry(user_id);
        self.modify(self.user_file(user_id, MOODS), |moods: &mut Vec<MoodEntry>| {
            moods.push(entry.clone());
            ((), true)
        })
        .await?;
        Ok(entry)
    }

    async fn delete_mood(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        self.modify(self.user_file(user_id, MOODS), |moods: &mut Vec<MoodEntry>| {
            remove_owned(moods, |m| m.id != id)
        })
        .await
    }
}

#[async_trait]
impl PomodoroRepo for LocalStore {
    async fn list_sessions(
        &self,
        user_id: Uuid,
        since: Option<OffsetDateTime>,
    ) -> anyhow::Result<Vec<PomodoroSession>> {
        let mut sessions: Vec<PomodoroSession> = self.read(self.user_file(user_id, SESSIONS)).await?;
        if let Some(since) = since {
            sessions.retain(|s| s.completed_at >= since);
        }
        newest_first(&mut sessions, |s| s.completed_at);
        Ok(sessions)
    }

    async fn record_session(
        &self,
        user_id: Uuid,
        session: NewPomodoroSession,
    ) -> anyhow::Result<PomodoroSession> {
        let session = session.into_session(user_id);
        self.modify(self.user_file(user_id, SESSIONS), |sessions: &mut Vec<PomodoroSession>| {
            sessions.push(session.clone());
            ((), true)
        })
        .await?;
        Ok(session)
    }
}

#[async_trait]
impl LearningRepo for LocalStore {
    async fn list_learning(&self, user_id: Uuid) -> anyhow::Result<Vec<LearningEntry>> {
        let mut entries: Vec<LearningEntry> = self.read(self.user_file(user_id, LEARNING)).await?;
        newest_first(&mut entries, |e| e.created_at);
        Ok(entries)
    }

    async fn create_learning(&self, user_id: Uuid, entry: NewLearningEntry) -> anyhow::Result<LearningEntry> {
        let entry = entry.into_entry(user_id);
        self.modify(self.user_file(user_id, LEARNING), |entries: &mut Vec<LearningEntry>| {
            entries.push(entry.clone());
            ((), true)
        })
        .await?;
        Ok(entry)
    }

    async fn delete_learning(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        self.modify(self.user_file(user_id, LEARNING), |entries: &mut Vec<LearningEntry>| {
            remove_owned(entries, |e| e.id != id)
        })
        .await
    }
}

#[async_trait]
impl SettingsRepo for LocalStore {
    async fn load_settings(&self, user_id: Uuid) -> anyhow::Result<Option<UserSettings>> {
        let path = self.user_file(user_id, SETTINGS);
        let _guard = self.lock.lock().await;
        match tokio::fs::read(&path).await {
            Ok(raw) => {
                let settings = serde_json::from_slice(&raw)
                    .with_context(|| format!("parse {}", path.display()))?;
                Ok(Some(settings))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    async fn save_settings(&self, user_id: Uuid, settings: &UserSettings) -> anyhow::Result<()> {
        let path = self.user_file(user_id, SETTINGS);
        let _guard = self.lock.lock().await;
        write_json(&path, settings).await
    }
}

#[async_trait]
impl Store for LocalStore {
    fn backend(&self) -> &'static str {
        "local"
    }

    async fn ping(&self) -> anyhow::Result<()> {
        let meta = tokio::fs::metadata(&self.root)
            .await
            .with_context(|| format!("stat {}", self.root.display()))?;
        anyhow::ensure!(meta.is_dir(), "{} is not a directory", self.root.display());
        Ok(())
    }
}
