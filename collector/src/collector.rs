use crate::{
    error::{
        CollectorError,
        FetchError,
    },
    model::{
        instant_from_millis,
        Cluster,
        ClusterId,
    },
    registry::ClusterRegistry,
    source::JobSource,
    store::SnapshotStore,
};
use chrono::{
    DateTime,
    Utc,
};
use futures::{
    stream,
    StreamExt,
};
use serde::Serialize;
use std::{
    fmt,
    sync::{
        atomic::{
            AtomicI64,
            Ordering,
        },
        Arc,
    },
    time::Duration,
};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorSettings {
    /// Upper bound for a single cluster fetch.
    pub fetch_timeout: Duration,
    /// How many clusters are fetched at the same time.
    pub max_in_flight: usize,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

/// Why a cluster contributed nothing (or only part of its jobs) to a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("{error}")]
    Fetch { error: FetchError },
    #[error("writing snapshots failed: {message}")]
    Store { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterFailure {
    pub cluster_id: ClusterId,
    pub cluster_name: String,
    pub reason: FailureReason,
}

/// Outcome of one collection cycle. Only surfaced to the caller, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Shared by every snapshot written in this cycle.
    pub collected_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub clusters_attempted: usize,
    pub clusters_succeeded: usize,
    pub snapshots_written: usize,
    pub failures: Vec<ClusterFailure>,
}

impl CycleReport {
    fn new(collected_at: DateTime<Utc>) -> Self {
        Self {
            collected_at,
            finished_at: collected_at,
            clusters_attempted: 0,
            clusters_succeeded: 0,
            snapshots_written: 0,
            failures: Vec::new(),
        }
    }

    fn record(&mut self, outcome: ClusterOutcome) {
        self.clusters_attempted += 1;
        self.snapshots_written += outcome.written;
        match outcome.failure {
            None => self.clusters_succeeded += 1,
            Some(failure) => self.failures.push(failure),
        }
    }

    /// Every attempted cluster delivered all of its jobs.
    pub fn is_healthy(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Collection at {}: {}/{} clusters succeeded, {} snapshots written",
            self.collected_at.format("%Y-%m-%d %H:%M:%S%.3f UTC"),
            self.clusters_succeeded,
            self.clusters_attempted,
            self.snapshots_written,
        )?;
        for failure in &self.failures {
            writeln!(
                f,
                "  • {} (#{}): {}",
                failure.cluster_name, failure.cluster_id, failure.reason
            )?;
        }
        Ok(())
    }
}

struct ClusterOutcome {
    written: usize,
    failure: Option<ClusterFailure>,
}

impl ClusterOutcome {
    fn failed(cluster: &Cluster, written: usize, reason: FailureReason) -> Self {
        Self {
            written,
            failure: Some(ClusterFailure {
                cluster_id: cluster.id,
                cluster_name: cluster.name.clone(),
                reason,
            }),
        }
    }
}

/// Runs collection cycles: polls every active cluster and appends what it
/// reports to the snapshot store.
pub struct Collector {
    registry: ClusterRegistry,
    store: SnapshotStore,
    source: Arc<dyn JobSource>,
    settings: CollectorSettings,
    last_collected_ms: AtomicI64,
}

impl Collector {
    pub fn new(
        registry: ClusterRegistry,
        store: SnapshotStore,
        source: Arc<dyn JobSource>,
        settings: CollectorSettings,
    ) -> Self {
        Self {
            registry,
            store,
            source,
            settings,
            last_collected_ms: AtomicI64::new(0),
        }
    }

    pub fn settings(&self) -> CollectorSettings {
        self.settings
    }

    /// Strictly increasing across cycles, even if the wall clock is not.
    fn next_collection_instant(&self) -> DateTime<Utc> {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last_collected_ms
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| Some(now.max(last + 1)))
            .unwrap_or(now);
        instant_from_millis(now.max(previous + 1))
    }

    /// One collection cycle over the clusters that are active right now.
    ///
    /// Failing clusters end up in the report; they never abort the cycle. The
    /// only error is not being able to read the cluster list.
    pub async fn run_cycle(&self) -> Result<CycleReport, CollectorError> {
        let clusters = self.registry.list(true).await?;
        let collected_at = self.next_collection_instant();
        let mut report = CycleReport::new(collected_at);

        if clusters.is_empty() {
            info!("no active clusters, nothing to collect");
            report.finished_at = Utc::now();
            return Ok(report);
        }

        info!(clusters = clusters.len(), source = self.source.name(), %collected_at, "starting collection cycle");

        let outcomes: Vec<ClusterOutcome> = stream::iter(clusters)
            .map(|cluster| self.collect_cluster(cluster, collected_at))
            .buffer_unordered(self.settings.max_in_flight.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            report.record(outcome);
        }
        report.finished_at = Utc::now();

        info!(
            attempted = report.clusters_attempted,
            succeeded = report.clusters_succeeded,
            snapshots = report.snapshots_written,
            failed = report.failures.len(),
            "collection cycle finished"
        );
        Ok(report)
    }

    async fn collect_cluster(&self, cluster: Cluster, collected_at: DateTime<Utc>) -> ClusterOutcome {
        let timeout = self.settings.fetch_timeout;
        let fetched = tokio::time::timeout(timeout, self.source.fetch_jobs(&cluster, timeout))
            .await
            .unwrap_or(Err(FetchError::Timeout(timeout)));

        let records = match fetched {
            Ok(records) => records,
            Err(error) => {
                warn!(cluster_id = cluster.id, cluster = %cluster.name, "fetching jobs failed: {error}");
                return ClusterOutcome::failed(&cluster, 0, FailureReason::Fetch { error });
            }
        };
        debug!(cluster_id = cluster.id, cluster = %cluster.name, jobs = records.len(), "fetched jobs");

        let mut written = 0;
        for record in records {
            let snapshot = record.into_snapshot(&cluster, collected_at);
            if let Err(err) = self.store.append(&snapshot).await {
                error!(cluster_id = cluster.id, cluster = %cluster.name, job_id = %snapshot.job_id, "storing snapshot failed: {err}");
                return ClusterOutcome::failed(
                    &cluster,
                    written,
                    FailureReason::Store {
                        message: err.to_string(),
                    },
                );
            }
            written += 1;
        }

        ClusterOutcome { written, failure: None }
    }
}
