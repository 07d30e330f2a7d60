use super::{
    Cluster,
    ClusterId,
};
use chrono::{
    DateTime,
    TimeDelta,
    Utc,
};
use derive_more::Deref;
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

/// State of a job as reported by a cluster.
///
/// The remote vocabulary grows over time, so anything we do not know about is
/// kept verbatim in [`JobState::Other`] instead of being rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobState {
    Running,
    Failed,
    Finished,
    Canceled,
    Canceling,
    Suspended,
    Restarting,
    Other(String),
}

impl JobState {
    /// Every state with a dedicated variant.
    pub const KNOWN: [JobState; 7] = [
        JobState::Running,
        JobState::Failed,
        JobState::Finished,
        JobState::Canceled,
        JobState::Canceling,
        JobState::Suspended,
        JobState::Restarting,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            JobState::Running => "RUNNING",
            JobState::Failed => "FAILED",
            JobState::Finished => "FINISHED",
            JobState::Canceled => "CANCELED",
            JobState::Canceling => "CANCELING",
            JobState::Suspended => "SUSPENDED",
            JobState::Restarting => "RESTARTING",
            JobState::Other(state) => state,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for JobState {
    fn from(state: String) -> Self {
        JobState::KNOWN
            .into_iter()
            .find(|known| known.as_str() == state)
            .unwrap_or(JobState::Other(state))
    }
}

impl From<&str> for JobState {
    fn from(state: &str) -> Self {
        JobState::from(state.to_string())
    }
}

impl From<JobState> for String {
    fn from(state: JobState) -> Self {
        match state {
            JobState::Other(state) => state,
            known => known.as_str().to_string(),
        }
    }
}

/// A job as it was reported by a cluster during one fetch. Never persisted as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawJobRecord {
    pub job_id: String,
    pub name: String,
    pub state: JobState,
    pub job_type: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_stoppable: Option<bool>,
    pub max_parallelism: Option<i64>,
    /// The job object exactly as the cluster sent it.
    pub details: Option<serde_json::Value>,
}

impl RawJobRecord {
    /// `end - start` for jobs that ended, `collected_at - start` for jobs that
    /// are still going. Without a start instant there is no duration; the same
    /// holds when the instants are inverted.
    pub fn duration_at(&self, collected_at: DateTime<Utc>) -> Option<TimeDelta> {
        let start = self.start_time?;
        let end = self.end_time.unwrap_or(collected_at);
        let duration = end - start;
        (duration >= TimeDelta::zero()).then_some(duration)
    }

    pub fn into_snapshot(self, cluster: &Cluster, collected_at: DateTime<Utc>) -> NewJobSnapshot {
        let duration_ms = self.duration_at(collected_at).map(|d| d.num_milliseconds());
        NewJobSnapshot {
            cluster_id: cluster.id,
            cluster_name: cluster.name.clone(),
            job_id: self.job_id,
            job_name: self.name,
            state: self.state,
            job_type: self.job_type,
            start_time: self.start_time,
            end_time: self.end_time,
            duration_ms,
            is_stoppable: self.is_stoppable,
            max_parallelism: self.max_parallelism,
            details: self.details,
            collected_at,
        }
    }
}

/// One job observed at one collection instant, ready to be appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJobSnapshot {
    /// Cluster the job was observed on. Not required to still be registered.
    pub cluster_id: ClusterId,
    pub cluster_name: String,
    pub job_id: String,
    pub job_name: String,
    pub state: JobState,
    pub job_type: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_stoppable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallelism: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub collected_at: DateTime<Utc>,
}

/// A persisted, immutable snapshot row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Deref)]
pub struct JobSnapshot {
    pub id: i64,
    #[deref]
    #[serde(flatten)]
    pub record: NewJobSnapshot,
}
