use std::collections::BTreeMap;

use serde::Serialize;

use super::repo_types::{JobApplication, JobStatus};

/// Whole-number percentage of `part` in `total`; 0 for an empty set.
pub fn percent(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((part as f64 / total as f64) * 100.0).round() as u32
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    pub total: usize,
    pub by_status: BTreeMap<&'static str, usize>,
    pub response_rate: u32,
    pub interview_rate: u32,
    pub offer_rate: u32,
}

pub fn job_stats(jobs: &[JobApplication]) -> JobStats {
    let mut by_status: BTreeMap<&'static str, usize> =
        JobStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    for job in jobs {
        *by_status.entry(job.status.as_str()).or_default() += 1;
    }

    let total = jobs.len();
    let count = |pred: fn(JobStatus) -> bool| jobs.iter().filter(|j| pred(j.status)).count();
    JobStats {
        total,
        by_status,
        response_rate: percent(count(JobStatus::is_response), total),
        interview_rate: percent(count(JobStatus::reached_interview), total),
        offer_rate: percent(count(|s| s == JobStatus::OfferReceived), total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::repo_types::{JobPriority, NewJobApplication};
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn job(status: JobStatus) -> JobApplication {
        NewJobApplication {
            company: "Acme".into(),
            position: "Engineer".into(),
            location: None,
            salary: None,
            description: None,
            status,
            priority: JobPriority::Medium,
            applied_at: OffsetDateTime::now_utc(),
            interview_date: None,
            interview_type: None,
            interview_notes: None,
            source: None,
            contact_person: None,
            referral: None,
        }
        .into_job(Uuid::new_v4(), OffsetDateTime::now_utc())
    }

    #[test]
    fn empty_set_is_all_zero() {
        let stats = job_stats(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.response_rate, 0);
        assert_eq!(stats.interview_rate, 0);
        assert_eq!(stats.offer_rate, 0);
        assert_eq!(stats.by_status.len(), JobStatus::ALL.len());
    }

    #[test]
    fn rates_follow_the_pipeline() {
        let jobs = vec![
            job(JobStatus::Applied),
            job(JobStatus::Screening),
            job(JobStatus::InterviewScheduled),
        ];
        let stats = job_stats(&jobs);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.response_rate, 67);
        assert_eq!(stats.interview_rate, 33);
        assert_eq!(stats.offer_rate, 0);
        assert_eq!(stats.by_status["SCREENING"], 1);

        let jobs = vec![job(JobStatus::OfferReceived), job(JobStatus::Rejected)];
        let stats = job_stats(&jobs);
        assert_eq!(stats.response_rate, 100);
        assert_eq!(stats.interview_rate, 50);
        assert_eq!(stats.offer_rate, 50);
    }
}
