use serde::Deserialize;
use time::{
    format_description::well_known::Rfc3339,
    macros::format_description,
    Date, OffsetDateTime, Time,
};

use super::repo_types::{
    JobFilter, JobPatch, JobPriority, JobSort, JobStatus, NewJobApplication, SortOrder,
};
use crate::error::AppError;
use crate::validation::{in_range, optional_text, required_text};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub company: String,
    pub position: String,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub priority: Option<JobPriority>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub applied_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub interview_date: Option<OffsetDateTime>,
    pub interview_type: Option<String>,
    pub interview_notes: Option<String>,
    pub source: Option<String>,
    pub contact_person: Option<String>,
    pub referral: Option<String>,
}

impl CreateJobRequest {
    pub fn into_new(self) -> Result<NewJobApplication, AppError> {
        Ok(NewJobApplication {
            company: required_text("company", &self.company, 100)?,
            position: required_text("position", &self.position, 200)?,
            location: optional_text("location", self.location.as_deref(), 100)?,
            salary: optional_text("salary", self.salary.as_deref(), 50)?,
            description: optional_text("description", self.description.as_deref(), 1000)?,
            status: self.status.unwrap_or(JobStatus::Applied),
            priority: self.priority.unwrap_or_default(),
            applied_at: self.applied_at.unwrap_or_else(OffsetDateTime::now_utc),
            interview_date: self.interview_date,
            interview_type: optional_text("interviewType", self.interview_type.as_deref(), 50)?,
            interview_notes: optional_text("interviewNotes", self.interview_notes.as_deref(), 500)?,
            source: optional_text("source", self.source.as_deref(), 100)?,
            contact_person: optional_text("contactPerson", self.contact_person.as_deref(), 100)?,
            referral: optional_text("referral", self.referral.as_deref(), 100)?,
        })
    }
}

/// Partial update; absent fields stay as they are.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateJobRequest {
    pub company: Option<String>,
    pub position: Option<String>,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub description: Option<String>,
    pub status: Option<JobStatus>,
    pub priority: Option<JobPriority>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub interview_date: Option<OffsetDateTime>,
    pub interview_type: Option<String>,
    pub interview_notes: Option<String>,
    pub source: Option<String>,
    pub contact_person: Option<String>,
    pub referral: Option<String>,
}

impl UpdateJobRequest {
    pub fn into_patch(self) -> Result<JobPatch, AppError> {
        Ok(JobPatch {
            company: self
                .company
                .map(|c| required_text("company", &c, 100))
                .transpose()?,
            position: self
                .position
                .map(|p| required_text("position", &p, 200))
                .transpose()?,
            location: optional_text("location", self.location.as_deref(), 100)?,
            salary: optional_text("salary", self.salary.as_deref(), 50)?,
            description: optional_text("description", self.description.as_deref(), 1000)?,
            status: self.status,
            priority: self.priority,
            interview_date: self.interview_date,
            interview_type: optional_text("interviewType", self.interview_type.as_deref(), 50)?,
            interview_notes: optional_text("interviewNotes", self.interview_notes.as_deref(), 500)?,
            source: optional_text("source", self.source.as_deref(), 100)?,
            contact_person: optional_text("contactPerson", self.contact_person.as_deref(), 100)?,
            referral: optional_text("referral", self.referral.as_deref(), 100)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: JobStatus,
}

/// Raw `GET /jobs` query string. Lists are comma separated.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListJobsQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub company: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub sort_by: Option<JobSort>,
    pub sort_order: Option<SortOrder>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn comma_list<T>(field: &str, raw: Option<&str>) -> Result<Vec<T>, AppError>
where
    T: std::str::FromStr<Err = String>,
{
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<T>().map_err(|e| AppError::Validation(format!("{field}: {e}"))))
        .collect()
}

/// RFC 3339 timestamp, or a bare `YYYY-MM-DD` taken at the start (or end) of that UTC day.
fn parse_bound(field: &str, raw: Option<&str>, end_of_day: bool) -> Result<Option<OffsetDateTime>, AppError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(Some(ts));
    }
    let date = Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .map_err(|_| AppError::Validation(format!("{field} must be a date")))?;
    let at: Time = if end_of_day {
        time::macros::time!(23:59:59.999_999_999)
    } else {
        Time::MIDNIGHT
    };
    Ok(Some(date.with_time(at).assume_utc()))
}

impl ListJobsQuery {
    pub fn into_filter(self) -> Result<JobFilter, AppError> {
        let defaults = JobFilter::default();
        let offset = self.offset.unwrap_or(0);
        if offset < 0 {
            return Err(AppError::Validation("offset must not be negative".into()));
        }
        Ok(JobFilter {
            statuses: comma_list("status", self.status.as_deref())?,
            priorities: comma_list("priority", self.priority.as_deref())?,
            company: optional_text("company", self.company.as_deref(), 100)?,
            date_from: parse_bound("dateFrom", self.date_from.as_deref(), false)?,
            date_to: parse_bound("dateTo", self.date_to.as_deref(), true)?,
            sort_by: self.sort_by.unwrap_or_default(),
            order: self.sort_order.unwrap_or_default(),
            limit: in_range("limit", self.limit.unwrap_or(defaults.limit), 1, 100)?,
            offset,
        })
    }
}
