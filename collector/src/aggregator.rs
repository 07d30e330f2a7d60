use crate::{
    collector::CycleReport,
    error::{
        RegistryError,
        StoreError,
    },
    model::{
        Cluster,
        ClusterId,
        ClusterSummary,
        JobState,
        Statistics,
    },
    registry::ClusterRegistry,
    store::SnapshotStore,
};
use serde::Serialize;

/// What the collector has gathered so far, as shown to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionSummary {
    pub total_clusters: usize,
    pub active_clusters: usize,
    pub statistics: Statistics,
    pub last_cycle: Option<CycleReport>,
}

/// Read-only statistics over the snapshot log.
///
/// Everything is derived from the latest snapshot of each (cluster, job)
/// pair, keyed by the cluster stored on the snapshot. Deleted clusters keep
/// counting until their snapshots are purged.
#[derive(Debug, Clone)]
pub struct Aggregator {
    registry: ClusterRegistry,
    store: SnapshotStore,
}

impl Aggregator {
    pub fn new(registry: ClusterRegistry, store: SnapshotStore) -> Self {
        Self { registry, store }
    }

    pub async fn statistics(&self) -> Result<Statistics, StoreError> {
        self.statistics_for(None).await
    }

    /// Statistics over all clusters, or only the given one.
    pub async fn statistics_for(&self, cluster_id: Option<ClusterId>) -> Result<Statistics, StoreError> {
        let latest = self.store.latest_per_job(cluster_id).await?;
        let stats = Statistics::from_latest(&latest);
        debug!(?cluster_id, total_jobs = stats.total_jobs, "computed statistics");
        Ok(stats)
    }

    pub async fn cluster_summary(&self, cluster: &Cluster) -> Result<ClusterSummary, StoreError> {
        let latest = self.store.latest_per_job(Some(cluster.id)).await?;
        let stats = Statistics::from_latest(&latest);
        Ok(ClusterSummary {
            cluster_id: cluster.id,
            cluster_name: cluster.name.clone(),
            total_jobs: stats.total_jobs,
            running_jobs: stats.count(&JobState::Running),
            failed_jobs: stats.count(&JobState::Failed),
            finished_jobs: stats.count(&JobState::Finished),
            last_update: latest.iter().map(|snapshot| snapshot.collected_at).max(),
        })
    }

    pub async fn collection_summary(
        &self,
        last_cycle: Option<CycleReport>,
    ) -> Result<CollectionSummary, RegistryError> {
        let clusters = self.registry.list(false).await?;
        let active_clusters = clusters.iter().filter(|cluster| cluster.active).count();
        Ok(CollectionSummary {
            total_clusters: clusters.len(),
            active_clusters,
            statistics: self.statistics().await?,
            last_cycle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        database::Database,
        model::{
            NewCluster,
            NewJobSnapshot,
        },
    };
    use chrono::{
        DateTime,
        TimeDelta,
        Utc,
    };
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn snapshot(cluster: &Cluster, job_id: &str, state: JobState, collected_at: DateTime<Utc>) -> NewJobSnapshot {
        NewJobSnapshot {
            cluster_id: cluster.id,
            cluster_name: cluster.name.clone(),
            job_id: job_id.to_string(),
            job_name: format!("job {job_id}"),
            state,
            job_type: None,
            start_time: None,
            end_time: None,
            duration_ms: None,
            is_stoppable: None,
            max_parallelism: None,
            details: None,
            collected_at,
        }
    }

    async fn setup() -> (Database, Cluster) {
        let database = Database::in_memory().await.unwrap();
        let cluster = database
            .registry()
            .create(NewCluster::new("prod", "http://prod:8081"))
            .await
            .unwrap();
        (database, cluster)
    }

    #[tokio::test]
    async fn empty_store_yields_all_zero_statistics() {
        let (database, _) = setup().await;
        let stats = database.aggregator().statistics().await.unwrap();
        assert_eq!(stats, Statistics::default());
    }

    #[tokio::test]
    async fn only_the_latest_state_of_a_job_counts() {
        let (database, cluster) = setup().await;
        let store = database.snapshots();
        let t0 = Utc::now();
        for (offset, state) in [JobState::Running, JobState::Running, JobState::Failed].into_iter().enumerate() {
            let at = t0 + TimeDelta::seconds(offset as i64);
            store.append(&snapshot(&cluster, "J1", state, at)).await.unwrap();
        }

        let stats = database.aggregator().statistics().await.unwrap();
        assert_eq!(stats.total_jobs, 1);
        assert_eq!(stats.non_zero_states(), BTreeMap::from([("FAILED".to_string(), 1)]));
    }

    #[tokio::test]
    async fn deleted_clusters_keep_counting() {
        let (database, cluster) = setup().await;
        database
            .snapshots()
            .append(&snapshot(&cluster, "j1", JobState::Running, Utc::now()))
            .await
            .unwrap();
        database.registry().delete(cluster.id).await.unwrap();

        let stats = database.aggregator().statistics().await.unwrap();
        assert_eq!(stats.total_jobs, 1);
        assert_eq!(stats.count(&JobState::Running), 1);
        assert_eq!(stats.clusters, BTreeMap::from([("prod".to_string(), 1)]));
    }

    #[tokio::test]
    async fn statistics_and_summaries_scope_to_one_cluster() {
        let (database, prod) = setup().await;
        let staging = database
            .registry()
            .create(NewCluster::new("staging", "http://staging:8081"))
            .await
            .unwrap();
        let store = database.snapshots();
        let now = Utc::now();
        store.append(&snapshot(&prod, "j1", JobState::Running, now)).await.unwrap();
        store.append(&snapshot(&prod, "j2", JobState::Finished, now)).await.unwrap();
        store.append(&snapshot(&staging, "j1", JobState::Failed, now)).await.unwrap();

        let aggregator = database.aggregator();
        assert_eq!(aggregator.statistics().await.unwrap().total_jobs, 3);
        let scoped = aggregator.statistics_for(Some(staging.id)).await.unwrap();
        assert_eq!(scoped.non_zero_states(), BTreeMap::from([("FAILED".to_string(), 1)]));

        let summary = aggregator.cluster_summary(&prod).await.unwrap();
        let expected_update = DateTime::from_timestamp_millis(now.timestamp_millis());
        assert_eq!(
            summary,
            ClusterSummary {
                cluster_id: prod.id,
                cluster_name: "prod".to_string(),
                total_jobs: 2,
                running_jobs: 1,
                failed_jobs: 0,
                finished_jobs: 1,
                last_update: expected_update,
            }
        );
    }

    #[tokio::test]
    async fn collection_summary_counts_clusters() {
        let (database, prod) = setup().await;
        database
            .registry()
            .create(NewCluster::new("old", "http://old:8081").inactive())
            .await
            .unwrap();
        database
            .snapshots()
            .append(&snapshot(&prod, "j1", JobState::Running, Utc::now()))
            .await
            .unwrap();

        let summary = database.aggregator().collection_summary(None).await.unwrap();
        assert_eq!(summary.total_clusters, 2);
        assert_eq!(summary.active_clusters, 1);
        assert_eq!(summary.statistics.total_jobs, 1);
        assert_eq!(summary.last_cycle, None);
    }
}
