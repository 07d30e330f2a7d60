use crate::{
    aggregator::Aggregator,
    error::StoreError,
    registry::ClusterRegistry,
    store::SnapshotStore,
};
use sqlx::{
    sqlite::{
        SqliteConnectOptions,
        SqliteJournalMode,
        SqlitePoolOptions,
    },
    SqlitePool,
};
use std::{
    str::FromStr,
    time::Duration,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_CONNECTIONS: u32 = 5;
const ADDED_SNAPSHOT_COLUMNS: [(&str, &str); 3] = [
    ("is_stoppable", "INTEGER"),
    ("max_parallelism", "INTEGER"),
    ("details", "TEXT"),
];

/// Relational storage shared by the cluster registry and the snapshot log.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database behind a `sqlite://` URL.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;
        let database = Self { pool };
        database.bootstrap().await?;
        info!(url, "database ready");
        Ok(database)
    }

    /// Private in-memory database, mostly for tests.
    ///
    /// Every SQLite connection to `:memory:` is its own database, so the pool
    /// holds exactly one connection and never recycles it.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let database = Self { pool };
        database.bootstrap().await?;
        Ok(database)
    }

    async fn bootstrap(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clusters (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              name TEXT NOT NULL,
              url TEXT NOT NULL,
              description TEXT,
              is_active INTEGER NOT NULL DEFAULT 1,
              created_at INTEGER NOT NULL,
              updated_at INTEGER NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_clusters_name ON clusters(name);
            CREATE INDEX IF NOT EXISTS idx_clusters_active ON clusters(is_active);
            "#,
        )
        .execute(&self.pool)
        .await?;

        // No foreign key on cluster_id: snapshots outlive their cluster.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS job_snapshots (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              cluster_id INTEGER NOT NULL,
              cluster_name TEXT NOT NULL,
              job_id TEXT NOT NULL,
              job_name TEXT NOT NULL,
              job_state TEXT NOT NULL,
              job_type TEXT,
              start_time INTEGER,
              end_time INTEGER,
              duration_ms INTEGER,
              is_stoppable INTEGER,
              max_parallelism INTEGER,
              details TEXT,
              collected_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_job_snapshots_job
              ON job_snapshots(cluster_id, job_id, collected_at);
            CREATE INDEX IF NOT EXISTS idx_job_snapshots_collected_at
              ON job_snapshots(collected_at);
            CREATE INDEX IF NOT EXISTS idx_job_snapshots_state
              ON job_snapshots(job_state);
            "#,
        )
        .execute(&self.pool)
        .await?;

        self.add_missing_snapshot_columns().await
    }

    /// Databases created before these columns existed get them added, empty.
    async fn add_missing_snapshot_columns(&self) -> Result<(), StoreError> {
        for (column, definition) in ADDED_SNAPSHOT_COLUMNS {
            let (present,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM pragma_table_info('job_snapshots') WHERE name = ?")
                    .bind(column)
                    .fetch_one(&self.pool)
                    .await?;
            if present == 0 {
                sqlx::query(&format!("ALTER TABLE job_snapshots ADD COLUMN {column} {definition}"))
                    .execute(&self.pool)
                    .await?;
                info!(column, "added snapshot column");
            }
        }
        Ok(())
    }

    /// Round trip to the database, used for health reporting.
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn registry(&self) -> ClusterRegistry {
        ClusterRegistry::new(self.pool.clone())
    }

    pub fn snapshots(&self) -> SnapshotStore {
        SnapshotStore::new(self.pool.clone())
    }

    pub fn aggregator(&self) -> Aggregator {
        Aggregator::new(self.registry(), self.snapshots())
    }
}
