use super::{
    JobSnapshot,
    JobState,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeMap;

const UNKNOWN_JOB_TYPE: &str = "Unknown";

/// Point-in-time statistics over the latest snapshot of every (cluster, job) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    /// Distinct (cluster, job) pairs ever observed.
    pub total_jobs: u64,
    /// Latest state → number of jobs. Known states are always present.
    pub states: BTreeMap<String, u64>,
    /// Stored cluster name → number of jobs.
    pub clusters: BTreeMap<String, u64>,
    /// Job type → number of jobs.
    pub job_types: BTreeMap<String, u64>,
}

impl Default for Statistics {
    fn default() -> Self {
        Self {
            total_jobs: 0,
            states: JobState::KNOWN.iter().map(|state| (state.to_string(), 0)).collect(),
            clusters: BTreeMap::new(),
            job_types: BTreeMap::new(),
        }
    }
}

impl Statistics {
    /// Tallies a set of latest-per-job snapshots.
    pub fn from_latest<'a>(latest: impl IntoIterator<Item = &'a JobSnapshot>) -> Self {
        let mut stats = Self::default();
        for snapshot in latest {
            stats.record(snapshot);
        }
        stats
    }

    fn record(&mut self, snapshot: &JobSnapshot) {
        self.total_jobs += 1;
        *self.states.entry(snapshot.state.to_string()).or_default() += 1;
        *self.clusters.entry(snapshot.cluster_name.clone()).or_default() += 1;
        let job_type = snapshot.job_type.as_deref().unwrap_or(UNKNOWN_JOB_TYPE);
        *self.job_types.entry(job_type.to_string()).or_default() += 1;
    }

    pub fn count(&self, state: &JobState) -> u64 {
        self.states.get(state.as_str()).copied().unwrap_or_default()
    }

    /// States with at least one job.
    pub fn non_zero_states(&self) -> BTreeMap<String, u64> {
        self.states
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(state, count)| (state.clone(), *count))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewJobSnapshot;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn snapshot(id: i64, cluster: &str, job: &str, state: JobState, job_type: Option<&str>) -> JobSnapshot {
        JobSnapshot {
            id,
            record: NewJobSnapshot {
                cluster_id: 1,
                cluster_name: cluster.to_string(),
                job_id: job.to_string(),
                job_name: job.to_string(),
                state,
                job_type: job_type.map(str::to_string),
                start_time: None,
                end_time: None,
                duration_ms: None,
                is_stoppable: None,
                max_parallelism: None,
                details: None,
                collected_at: Utc::now(),
            },
        }
    }

    #[test]
    fn empty_statistics_report_zero_for_every_known_state() {
        let stats = Statistics::default();
        assert_eq!(stats.total_jobs, 0);
        assert_eq!(stats.states.len(), JobState::KNOWN.len());
        assert!(stats.states.values().all(|count| *count == 0));
        assert!(stats.non_zero_states().is_empty());
    }

    #[test]
    fn tallies_states_clusters_and_types() {
        let latest = [
            snapshot(1, "a", "j1", JobState::Running, Some("STREAMING")),
            snapshot(2, "a", "j2", JobState::Failed, Some("BATCH")),
            snapshot(3, "b", "j3", JobState::Other("INITIALIZING".into()), None),
        ];
        let stats = Statistics::from_latest(&latest);

        assert_eq!(stats.total_jobs, 3);
        assert_eq!(stats.count(&JobState::Running), 1);
        assert_eq!(stats.count(&JobState::Failed), 1);
        assert_eq!(stats.count(&JobState::Other("INITIALIZING".into())), 1);
        assert_eq!(stats.clusters, BTreeMap::from([("a".to_string(), 2), ("b".to_string(), 1)]));
        assert_eq!(
            stats.job_types,
            BTreeMap::from([
                ("BATCH".to_string(), 1),
                ("STREAMING".to_string(), 1),
                ("Unknown".to_string(), 1),
            ])
        );
    }
}
