use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    JobRepo, LearningRepo, MoodRepo, PomodoroRepo, ResetTokenRepo, SettingsRepo, Store, UserRepo,
};
use crate::auth::repo_types::{AuthProvider, NewUser, PasswordResetToken, User};
use crate::jobs::repo_types::{JobApplication, JobFilter, JobPatch, NewJobApplication};
use crate::learning::repo_types::{LearningEntry, NewLearningEntry};
use crate::mood::repo_types::{MoodEntry, NewMoodEntry};
use crate::pomodoro::repo_types::{NewPomodoroSession, PomodoroSession};
use crate::settings::repo_types::UserSettings;

const USER_COLUMNS: &str = "id, email, name, image, provider, password_hash, created_at, updated_at";

const JOB_COLUMNS: &str = "id, user_id, company, position, location, salary, description, status, \
     priority, applied_at, interview_date, interview_type, interview_notes, source, \
     contact_person, referral, created_at, updated_at";

const SESSION_COLUMNS: &str =
    "id, user_id, phase, category, task_name, duration_minutes, completed, interrupted, completed_at";

const LEARNING_COLUMNS: &str =
    "id, user_id, platform, activity, description, duration_minutes, difficulty, tags, created_at";

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migration failed; continuing with the existing schema");
        }
        Ok(Self { db })
    }
}

#[async_trait]
impl UserRepo for PgStore {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_user_by_account(
        &self,
        provider: AuthProvider,
        provider_account_id: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.email, u.name, u.image, u.provider, u.password_hash,
                   u.created_at, u.updated_at
            FROM users u
            JOIN accounts a ON a.user_id = u.id
            WHERE a.provider = $1 AND a.provider_account_id = $2
            "#,
        )
        .bind(provider)
        .bind(provider_account_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, name, image, provider, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.image)
        .bind(user.provider)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn set_password(&self, user_id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.db)
            .await
            .context("update password")?;
        Ok(())
    }

    async fn link_account(
        &self,
        user_id: Uuid,
        provider: AuthProvider,
        provider_account_id: &str,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, user_id, provider, provider_account_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (provider, provider_account_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(provider)
        .bind(provider_account_id)
        .execute(&self.db)
        .await
        .context("link account")?;
        Ok(())
    }
}

#[async_trait]
impl ResetTokenRepo for PgStore {
    async fn purge_expired_reset_tokens(&self, email: &str, now: OffsetDateTime) -> anyhow::Result<u64> {
        let done = sqlx::query(
            "DELETE FROM password_reset_tokens WHERE email = $1 AND used = FALSE AND expires_at < $2",
        )
        .bind(email)
        .bind(now)
        .execute(&self.db)
        .await?;
        Ok(done.rows_affected())
    }

    async fn create_reset_token(
        &self,
        email: &str,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<PasswordResetToken> {
        let token = sqlx::query_as::<_, PasswordResetToken>(
            r#"
            INSERT INTO password_reset_tokens (id, email, token_hash, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, token_hash, expires_at, used, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.db)
        .await?;
        Ok(token)
    }

    async fn find_reset_token(&self, token_hash: &str) -> anyhow::Result<Option<PasswordResetToken>> {
        let token = sqlx::query_as::<_, PasswordResetToken>(
            r#"
            SELECT id, email, token_hash, expires_at, used, created_at
            FROM password_reset_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.db)
        .await?;
        Ok(token)
    }

    async fn mark_reset_token_used(&self, id: Uuid) -> anyhow::Result<bool> {
        let result =
            sqlx::query("UPDATE password_reset_tokens SET used = TRUE WHERE id = $1 AND used = FALSE")
                .bind(id)
                .execute(&self.db)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl JobRepo for PgStore {
    async fn list_jobs(&self, user_id: Uuid, filter: &JobFilter) -> anyhow::Result<Vec<JobApplication>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {JOB_COLUMNS} FROM job_applications WHERE user_id = "
        ));
        qb.push_bind(user_id);

        if !filter.statuses.is_empty() {
            qb.push(" AND status IN (");
            let mut list = qb.separated(", ");
            for status in &filter.statuses {
                list.push_bind(*status);
            }
            list.push_unseparated(")");
        }
        if !filter.priorities.is_empty() {
            qb.push(" AND priority IN (");
            let mut list = qb.separated(", ");
            for priority in &filter.priorities {
                list.push_bind(*priority);
            }
            list.push_unseparated(")");
        }
        if let Some(company) = &filter.company {
            qb.push(" AND company ILIKE ");
            qb.push_bind(format!("%{}%", escape_like(company)));
        }
        if let Some(from) = filter.date_from {
            qb.push(" AND applied_at >= ");
            qb.push_bind(from);
        }
        if let Some(to) = filter.date_to {
            qb.push(" AND applied_at <= ");
            qb.push_bind(to);
        }

        qb.push(format!(
            " ORDER BY {} {}, id",
            filter.sort_by.column(),
            filter.order.sql()
        ));
        qb.push(" LIMIT ");
        qb.push_bind(filter.limit);
        qb.push(" OFFSET ");
        qb.push_bind(filter.offset);

        let rows = qb
            .build_query_as::<JobApplication>()
            .fetch_all(&self.db)
            .await
            .context("list job applications")?;
        Ok(rows)
    }

    async fn get_job(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<JobApplication>> {
        let job = sqlx::query_as::<_, JobApplication>(&format!(
            "SELECT {JOB_COLUMNS} FROM job_applications WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(job)
    }

    async fn create_job(&self, user_id: Uuid, job: NewJobApplication) -> anyhow::Result<JobApplication> {
        let row = sqlx::query_as::<_, JobApplication>(&format!(
            r#"
            INSERT INTO job_applications (
                id, user_id, company, position, location, salary, description, status,
                priority, applied_at, interview_date, interview_type, interview_notes,
                source, contact_person, referral
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&job.company)
        .bind(&job.position)
        .bind(&job.location)
        .bind(&job.salary)
        .bind(&job.description)
        .bind(job.status)
        .bind(job.priority)
        .bind(job.applied_at)
        .bind(job.interview_date)
        .bind(&job.interview_type)
        .bind(&job.interview_notes)
        .bind(&job.source)
        .bind(&job.contact_person)
        .bind(&job.referral)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn update_job(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: JobPatch,
    ) -> anyhow::Result<Option<JobApplication>> {
        let row = sqlx::query_as::<_, JobApplication>(&format!(
            r#"
            UPDATE job_applications SET
                company = COALESCE($3, company),
                position = COALESCE($4, position),
                location = COALESCE($5, location),
                salary = COALESCE($6, salary),
                description = COALESCE($7, description),
                status = COALESCE($8, status),
                priority = COALESCE($9, priority),
                interview_date = COALESCE($10, interview_date),
                interview_type = COALESCE($11, interview_type),
                interview_notes = COALESCE($12, interview_notes),
                source = COALESCE($13, source),
                contact_person = COALESCE($14, contact_person),
                referral = COALESCE($15, referral),
                updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(patch.company)
        .bind(patch.position)
        .bind(patch.location)
        .bind(patch.salary)
        .bind(patch.description)
        .bind(patch.status)
        .bind(patch.priority)
        .bind(patch.interview_date)
        .bind(patch.interview_type)
        .bind(patch.interview_notes)
        .bind(patch.source)
        .bind(patch.contact_person)
        .bind(patch.referral)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete_job(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let done = sqlx::query("DELETE FROM job_applications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(done.rows_affected() > 0)
    }
}

#[async_trait]
impl MoodRepo for PgStore {
    async fn list_moods(&self, user_id: Uuid, limit: Option<i64>) -> anyhow::Result<Vec<MoodEntry>> {
        let rows = sqlx::query_as::<_, MoodEntry>(
            r#"
            SELECT id, user_id, mood_score, note, tags, created_at
            FROM mood_entries
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn create_mood(&self, user_id: Uuid, entry: NewMoodEntry) -> anyhow::Result<MoodEntry> {
        let row = sqlx::query_as::<_, MoodEntry>(
            r#"
            INSERT INTO mood_entries (id, user_id, mood_score, note, tags, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, mood_score, note, tags, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(entry.mood_score)
        .bind(&entry.note)
        .bind(&entry.tags)
        .bind(entry.created_at)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete_mood(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let done = sqlx::query("DELETE FROM mood_entries WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(done.rows_affected() > 0)
    }
}

#[async_trait]
impl PomodoroRepo for PgStore {
    async fn list_sessions(
        &self,
        user_id: Uuid,
        since: Option<OffsetDateTime>,
    ) -> anyhow::Result<Vec<PomodoroSession>> {
        let rows = sqlx::query_as::<_, PomodoroSession>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM pomodoro_sessions
            WHERE user_id = $1 AND ($2::timestamptz IS NULL OR completed_at >= $2)
            ORDER BY completed_at DESC
            "#
        ))
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn record_session(
        &self,
        user_id: Uuid,
        session: NewPomodoroSession,
    ) -> anyhow::Result<PomodoroSession> {
        let row = sqlx::query_as::<_, PomodoroSession>(&format!(
            r#"
            INSERT INTO pomodoro_sessions (
                id, user_id, phase, category, task_name, duration_minutes,
                completed, interrupted, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(session.phase)
        .bind(session.category)
        .bind(&session.task_name)
        .bind(session.duration_minutes)
        .bind(session.completed)
        .bind(session.interrupted)
        .bind(session.completed_at)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl LearningRepo for PgStore {
    async fn list_learning(&self, user_id: Uuid) -> anyhow::Result<Vec<LearningEntry>> {
        let rows = sqlx::query_as::<_, LearningEntry>(&format!(
            "SELECT {LEARNING_COLUMNS} FROM learning_entries WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn create_learning(&self, user_id: Uuid, entry: NewLearningEntry) -> anyhow::Result<LearningEntry> {
        let row = sqlx::query_as::<_, LearningEntry>(&format!(
            r#"
            INSERT INTO learning_entries (
                id, user_id, platform, activity, description, duration_minutes,
                difficulty, tags, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {LEARNING_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&entry.platform)
        .bind(&entry.activity)
        .bind(&entry.description)
        .bind(entry.duration_minutes)
        .bind(entry.difficulty)
        .bind(&entry.tags)
        .bind(entry.created_at)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete_learning(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let done = sqlx::query("DELETE FROM learning_entries WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(done.rows_affected() > 0)
    }
}

#[async_trait]
impl SettingsRepo for PgStore {
    async fn load_settings(&self, user_id: Uuid) -> anyhow::Result<Option<UserSettings>> {
        let row = sqlx::query_as::<_, (sqlx::types::Json<UserSettings>,)>(
            "SELECT settings FROM user_settings WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(|(settings,)| settings.0))
    }

    async fn save_settings(&self, user_id: Uuid, settings: &UserSettings) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_settings (user_id, settings, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (user_id) DO UPDATE SET settings = EXCLUDED.settings, updated_at = now()
            "#,
        )
        .bind(user_id)
        .bind(sqlx::types::Json(settings))
        .execute(&self.db)
        .await
        .context("save settings")?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}

/// Escape `%`, `_` and `\` so user input matches literally inside ILIKE.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_patterns_are_escaped() {
        assert_eq!(escape_like("100%_fun\\"), "100\\%\\_fun\\\\");
        assert_eq!(escape_like("Acme"), "Acme");
    }
}
