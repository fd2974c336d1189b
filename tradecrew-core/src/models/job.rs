use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The work a job performs. The queue job name is `as_str()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobKind {
    #[serde(rename = "search_1688")]
    Search1688,
    #[serde(rename = "amazon_scrape")]
    AmazonScrape,
    #[serde(rename = "price_monitor")]
    PriceMonitor,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::Search1688, JobKind::AmazonScrape, JobKind::PriceMonitor];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Search1688 => "search_1688",
            JobKind::AmazonScrape => "amazon_scrape",
            JobKind::PriceMonitor => "price_monitor",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown job kind '{s}'"))
    }
}

/// Job record lifecycle: `pending → running → {completed, failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// `pending → failed` covers a synchronous run that could not start.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }

    /// States a record may be in for a transition into `next` to apply.
    pub fn sources_of(next: JobStatus) -> Vec<&'static str> {
        [JobStatus::Pending, JobStatus::Running, JobStatus::Completed, JobStatus::Failed]
            .into_iter()
            .filter(|s| s.can_transition_to(next))
            .map(|s| s.as_str())
            .collect()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub kind: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub queue_job_id: Option<i64>,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn status(&self) -> Option<JobStatus> {
        self.status.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_kind_wire_names() {
        assert_eq!(serde_json::to_value(JobKind::Search1688).unwrap(), "search_1688");
        let kind: JobKind = serde_json::from_value(serde_json::json!("price_monitor")).unwrap();
        assert_eq!(kind, JobKind::PriceMonitor);
        assert_eq!("amazon_scrape".parse::<JobKind>().unwrap(), JobKind::AmazonScrape);
        assert!("crawl_everything".parse::<JobKind>().is_err());
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [JobStatus::Completed, JobStatus::Failed] {
            assert!(terminal.is_terminal());
            for next in [JobStatus::Pending, JobStatus::Running, JobStatus::Completed, JobStatus::Failed] {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next} must be rejected");
            }
        }
    }

    #[test]
    fn test_no_transition_back_to_pending() {
        assert!(!JobStatus::Running.can_transition_to(JobStatus::Pending));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
    }

    #[test]
    fn test_sources_of_match_transition_table() {
        assert_eq!(JobStatus::sources_of(JobStatus::Running), vec!["pending", "running"]);
        assert_eq!(JobStatus::sources_of(JobStatus::Completed), vec!["running"]);
        assert_eq!(JobStatus::sources_of(JobStatus::Failed), vec!["pending", "running"]);
        assert!(JobStatus::sources_of(JobStatus::Pending).is_empty());
    }
}
