//! # Snapshot Store
//!
//! Append-only log of job snapshots, one row per (cluster, job, collection
//! instant). Rows are never updated; the only deletions are the explicit purge
//! operations used for retention.

use crate::{
    error::StoreError,
    model::{
        instant_from_millis,
        optional_instant_from_millis,
        ClusterId,
        JobSnapshot,
        JobState,
        NewJobSnapshot,
    },
};
use chrono::{
    DateTime,
    TimeDelta,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use sqlx::{
    QueryBuilder,
    Sqlite,
    SqlitePool,
};

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 1000;

const SNAPSHOT_COLUMNS: &str = "id, cluster_id, cluster_name, job_id, job_name, job_state, job_type, start_time, \
                                end_time, duration_ms, is_stoppable, max_parallelism, details, collected_at";

/// Newest row of every (cluster, job) pair, optionally for one cluster only.
/// Ties on the collection instant go to the highest row id.
const LATEST_PER_JOB: &str = r#"
    SELECT * FROM (
      SELECT *, ROW_NUMBER() OVER (
        PARTITION BY cluster_id, job_id
        ORDER BY collected_at DESC, id DESC
      ) AS row_rank
      FROM job_snapshots
      WHERE (? IS NULL OR cluster_id = ?)
    )
    WHERE row_rank = 1
"#;

#[derive(Debug, sqlx::FromRow)]
struct SnapshotRow {
    id: i64,
    cluster_id: i64,
    cluster_name: String,
    job_id: String,
    job_name: String,
    job_state: String,
    job_type: Option<String>,
    start_time: Option<i64>,
    end_time: Option<i64>,
    duration_ms: Option<i64>,
    is_stoppable: Option<bool>,
    max_parallelism: Option<i64>,
    details: Option<String>,
    collected_at: i64,
}

fn parse_details(id: i64, details: Option<String>) -> Option<serde_json::Value> {
    let details = details?;
    match serde_json::from_str(&details) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(snapshot = id, "ignoring unreadable job details: {err}");
            None
        }
    }
}

impl From<SnapshotRow> for JobSnapshot {
    fn from(row: SnapshotRow) -> Self {
        JobSnapshot {
            id: row.id,
            record: NewJobSnapshot {
                cluster_id: row.cluster_id,
                cluster_name: row.cluster_name,
                job_id: row.job_id,
                job_name: row.job_name,
                state: JobState::from(row.job_state),
                job_type: row.job_type,
                start_time: optional_instant_from_millis(row.start_time),
                end_time: optional_instant_from_millis(row.end_time),
                duration_ms: row.duration_ms,
                is_stoppable: row.is_stoppable,
                max_parallelism: row.max_parallelism,
                details: parse_details(row.id, row.details),
                collected_at: instant_from_millis(row.collected_at),
            },
        }
    }
}

/// Filter for listing recent snapshots, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub cluster_id: Option<ClusterId>,
    #[serde(default)]
    pub state: Option<JobState>,
    /// Case-insensitive substring of the job name.
    #[serde(default, rename = "name")]
    pub name_contains: Option<String>,
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

impl Default for SnapshotQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            cluster_id: None,
            state: None,
            name_contains: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    pool: SqlitePool,
}

impl SnapshotStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Appends one snapshot and returns its row id. Each append is an
    /// independent write; concurrent appends are serialized by the database.
    pub async fn append(&self, snapshot: &NewJobSnapshot) -> Result<i64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO job_snapshots (cluster_id, cluster_name, job_id, job_name, job_state, job_type, \
             start_time, end_time, duration_ms, is_stoppable, max_parallelism, details, collected_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(snapshot.cluster_id)
        .bind(&snapshot.cluster_name)
        .bind(&snapshot.job_id)
        .bind(&snapshot.job_name)
        .bind(snapshot.state.as_str())
        .bind(&snapshot.job_type)
        .bind(snapshot.start_time.map(|t| t.timestamp_millis()))
        .bind(snapshot.end_time.map(|t| t.timestamp_millis()))
        .bind(snapshot.duration_ms)
        .bind(snapshot.is_stoppable)
        .bind(snapshot.max_parallelism)
        .bind(snapshot.details.as_ref().map(serde_json::Value::to_string))
        .bind(snapshot.collected_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn recent(&self, query: &SnapshotQuery) -> Result<Vec<JobSnapshot>, StoreError> {
        let limit = query.limit.clamp(1, MAX_LIMIT);
        let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {SNAPSHOT_COLUMNS} FROM job_snapshots WHERE 1 = 1"));
        if let Some(cluster_id) = query.cluster_id {
            builder.push(" AND cluster_id = ").push_bind(cluster_id);
        }
        if let Some(state) = &query.state {
            builder.push(" AND job_state = ").push_bind(state.to_string());
        }
        if let Some(pattern) = query.name_contains.as_deref().filter(|p| !p.is_empty()) {
            builder
                .push(" AND LOWER(job_name) LIKE ")
                .push_bind(format!("%{}%", pattern.to_lowercase()));
        }
        builder
            .push(" ORDER BY collected_at DESC, id DESC LIMIT ")
            .push_bind(i64::from(limit));

        let rows: Vec<SnapshotRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(JobSnapshot::from).collect())
    }

    /// Snapshots collected in `[from, to)`, oldest first.
    pub async fn range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<JobSnapshot>, StoreError> {
        let rows: Vec<SnapshotRow> = sqlx::query_as(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM job_snapshots WHERE collected_at >= ? AND collected_at < ? \
             ORDER BY collected_at ASC, id ASC"
        ))
        .bind(from.timestamp_millis())
        .bind(to.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(JobSnapshot::from).collect())
    }

    /// The newest snapshot of one job.
    pub async fn latest(&self, cluster_id: ClusterId, job_id: &str) -> Result<Option<JobSnapshot>, StoreError> {
        let row: Option<SnapshotRow> = sqlx::query_as(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM job_snapshots WHERE cluster_id = ? AND job_id = ? \
             ORDER BY collected_at DESC, id DESC LIMIT 1"
        ))
        .bind(cluster_id)
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(JobSnapshot::from))
    }

    /// The newest snapshot of every distinct (cluster, job) pair, optionally
    /// restricted to one cluster.
    pub async fn latest_per_job(&self, cluster_id: Option<ClusterId>) -> Result<Vec<JobSnapshot>, StoreError> {
        let rows: Vec<SnapshotRow> = sqlx::query_as(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM ({LATEST_PER_JOB}) ORDER BY cluster_id, job_id"
        ))
        .bind(cluster_id)
        .bind(cluster_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(JobSnapshot::from).collect())
    }

    /// Jobs whose newest snapshot says they are running and have been for
    /// longer than `min_duration`. Longest first.
    pub async fn long_running(
        &self,
        min_duration: TimeDelta,
        cluster_id: Option<ClusterId>,
    ) -> Result<Vec<JobSnapshot>, StoreError> {
        let rows: Vec<SnapshotRow> = sqlx::query_as(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM ({LATEST_PER_JOB}) WHERE job_state = ? AND duration_ms > ? \
             ORDER BY duration_ms DESC, cluster_id, job_id"
        ))
        .bind(cluster_id)
        .bind(cluster_id)
        .bind(JobState::Running.as_str())
        .bind(min_duration.num_milliseconds())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(JobSnapshot::from).collect())
    }

    pub async fn count(&self) -> Result<u64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM job_snapshots")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    /// Retention: drops snapshots collected before `cutoff`.
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM job_snapshots WHERE collected_at < ?")
            .bind(cutoff.timestamp_millis())
            .execute(&self.pool)
            .await?;
        info!(%cutoff, deleted = result.rows_affected(), "purged old snapshots");
        Ok(result.rows_affected())
    }

    /// Drops every snapshot of one cluster.
    pub async fn purge_cluster(&self, cluster_id: ClusterId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM job_snapshots WHERE cluster_id = ?")
            .bind(cluster_id)
            .execute(&self.pool)
            .await?;
        info!(cluster_id, deleted = result.rows_affected(), "purged cluster snapshots");
        Ok(result.rows_affected())
    }
}
