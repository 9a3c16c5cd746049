use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Pipeline stage of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "job_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Applied,
    Screening,
    InterviewScheduled,
    InterviewCompleted,
    OfferReceived,
    Rejected,
    Withdrawn,
}

impl JobStatus {
    pub const ALL: [JobStatus; 7] = [
        JobStatus::Applied,
        JobStatus::Screening,
        JobStatus::InterviewScheduled,
        JobStatus::InterviewCompleted,
        JobStatus::OfferReceived,
        JobStatus::Rejected,
        JobStatus::Withdrawn,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Applied => "APPLIED",
            JobStatus::Screening => "SCREENING",
            JobStatus::InterviewScheduled => "INTERVIEW_SCHEDULED",
            JobStatus::InterviewCompleted => "INTERVIEW_COMPLETED",
            JobStatus::OfferReceived => "OFFER_RECEIVED",
            JobStatus::Rejected => "REJECTED",
            JobStatus::Withdrawn => "WITHDRAWN",
        }
    }

    /// The company reacted in some way.
    pub fn is_response(self) -> bool {
        self != JobStatus::Applied
    }

    pub fn reached_interview(self) -> bool {
        matches!(
            self,
            JobStatus::InterviewScheduled | JobStatus::InterviewCompleted | JobStatus::OfferReceived
        )
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| format!("unknown job status {s:?}"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "job_priority", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl FromStr for JobPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(JobPriority::Low),
            "MEDIUM" => Ok(JobPriority::Medium),
            "HIGH" => Ok(JobPriority::High),
            "URGENT" => Ok(JobPriority::Urgent),
            _ => Err(format!("unknown job priority {s:?}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct JobApplication {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company: String,
    pub position: String,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub description: Option<String>,
    pub status: JobStatus,
    pub priority: JobPriority,
    #[serde(with = "time::serde::rfc3339")]
    pub applied_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub interview_date: Option<OffsetDateTime>,
    pub interview_type: Option<String>,
    pub interview_notes: Option<String>,
    pub source: Option<String>,
    pub contact_person: Option<String>,
    pub referral: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Validated input for a new application.
#[derive(Debug, Clone)]
pub struct NewJobApplication {
    pub company: String,
    pub position: String,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub description: Option<String>,
    pub status: JobStatus,
    pub priority: JobPriority,
    pub applied_at: OffsetDateTime,
    pub interview_date: Option<OffsetDateTime>,
    pub interview_type: Option<String>,
    pub interview_notes: Option<String>,
    pub source: Option<String>,
    pub contact_person: Option<String>,
    pub referral: Option<String>,
}

impl NewJobApplication {
    pub fn into_job(self, user_id: Uuid, now: OffsetDateTime) -> JobApplication {
        JobApplication {
            id: Uuid::new_v4(),
            user_id,
            company: self.company,
            position: self.position,
            location: self.location,
            salary: self.salary,
            description: self.description,
            status: self.status,
            priority: self.priority,
            applied_at: self.applied_at,
            interview_date: self.interview_date,
            interview_type: self.interview_type,
            interview_notes: self.interview_notes,
            source: self.source,
            contact_person: self.contact_person,
            referral: self.referral,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Validated partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub company: Option<String>,
    pub position: Option<String>,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub description: Option<String>,
    pub status: Option<JobStatus>,
    pub priority: Option<JobPriority>,
    pub interview_date: Option<OffsetDateTime>,
    pub interview_type: Option<String>,
    pub interview_notes: Option<String>,
    pub source: Option<String>,
    pub contact_person: Option<String>,
    pub referral: Option<String>,
}

impl JobPatch {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn apply(self, job: &mut JobApplication, now: OffsetDateTime) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(v) = value {
                *slot = v;
            }
        }
        fn set_opt<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }
        set(&mut job.company, self.company);
        set(&mut job.position, self.position);
        set_opt(&mut job.location, self.location);
        set_opt(&mut job.salary, self.salary);
        set_opt(&mut job.description, self.description);
        set(&mut job.status, self.status);
        set(&mut job.priority, self.priority);
        set_opt(&mut job.interview_date, self.interview_date);
        set_opt(&mut job.interview_type, self.interview_type);
        set_opt(&mut job.interview_notes, self.interview_notes);
        set_opt(&mut job.source, self.source);
        set_opt(&mut job.contact_person, self.contact_person);
        set_opt(&mut job.referral, self.referral);
        job.updated_at = now;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobSort {
    #[default]
    AppliedAt,
    UpdatedAt,
    Company,
    Position,
}

impl JobSort {
    pub fn column(self) -> &'static str {
        match self {
            JobSort::AppliedAt => "applied_at",
            JobSort::UpdatedAt => "updated_at",
            JobSort::Company => "company",
            JobSort::Position => "position",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobFilter {
    pub statuses: Vec<JobStatus>,
    pub priorities: Vec<JobPriority>,
    pub company: Option<String>,
    pub date_from: Option<OffsetDateTime>,
    pub date_to: Option<OffsetDateTime>,
    pub sort_by: JobSort,
    pub order: SortOrder,
    pub limit: i64,
    pub offset: i64,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            statuses: Vec::new(),
            priorities: Vec::new(),
            company: None,
            date_from: None,
            date_to: None,
            sort_by: JobSort::default(),
            order: SortOrder::default(),
            limit: 20,
            offset: 0,
        }
    }
}

impl JobFilter {
    /// No filtering and no page limit; used for stats and export.
    pub fn everything() -> Self {
        Self {
            limit: i64::MAX,
            ..Self::default()
        }
    }

    pub fn matches(&self, job: &JobApplication) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&job.status))
            && (self.priorities.is_empty() || self.priorities.contains(&job.priority))
            && self.company.as_ref().map_or(true, |needle| {
                job.company.to_lowercase().contains(&needle.to_lowercase())
            })
            && self.date_from.map_or(true, |from| job.applied_at >= from)
            && self.date_to.map_or(true, |to| job.applied_at <= to)
    }

    pub fn compare(&self, a: &JobApplication, b: &JobApplication) -> Ordering {
        let ord = match self.sort_by {
            JobSort::AppliedAt => a.applied_at.cmp(&b.applied_at),
            JobSort::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            JobSort::Company => a.company.cmp(&b.company),
            JobSort::Position => a.position.cmp(&b.position),
        };
        match self.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    }

    /// Filter, sort and page an in-memory collection.
    pub fn apply(&self, jobs: Vec<JobApplication>) -> Vec<JobApplication> {
        let mut hits: Vec<JobApplication> = jobs.into_iter().filter(|j| self.matches(j)).collect();
        hits.sort_by(|a, b| self.compare(a, b));
        hits.into_iter()
            .skip(self.offset.max(0) as usize)
            .take(self.limit.max(0).try_into().unwrap_or(usize::MAX))
            .collect()
    }
}
