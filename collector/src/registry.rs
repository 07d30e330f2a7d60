//! # Cluster Registry
//!
//! Holds the set of known clusters and their active flag. The collector reads
//! the active subset once per cycle; everything else goes through the
//! management operations below, each of which bumps `updated_at`.

use crate::{
    error::{
        RegistryError,
        StoreError,
    },
    model::{
        instant_from_millis,
        Cluster,
        ClusterId,
        ClusterUpdate,
        NewCluster,
    },
};
use chrono::Utc;
use sqlx::SqlitePool;
use url::Url;

const MAX_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 500;

const CLUSTER_COLUMNS: &str = "id, name, url, description, is_active, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ClusterRow {
    id: i64,
    name: String,
    url: String,
    description: Option<String>,
    is_active: bool,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<ClusterRow> for Cluster {
    type Error = StoreError;

    fn try_from(row: ClusterRow) -> Result<Self, Self::Error> {
        let url = Url::parse(&row.url).map_err(|err| StoreError::Corrupt {
            table: "clusters",
            reason: format!("cluster {} has an invalid url '{}': {err}", row.id, row.url),
        })?;
        Ok(Cluster {
            id: row.id,
            name: row.name,
            url,
            description: row.description,
            active: row.is_active,
            created_at: instant_from_millis(row.created_at),
            updated_at: instant_from_millis(row.updated_at),
        })
    }
}

/// Checked cluster fields, ready to be written.
struct ValidCluster {
    name: String,
    url: Url,
    description: Option<String>,
}

fn validate(name: &str, url: &str, description: Option<&str>) -> Result<ValidCluster, RegistryError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RegistryError::Validation("cluster name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(RegistryError::Validation(format!(
            "cluster name must be at most {MAX_NAME_LEN} characters"
        )));
    }

    let url = url.trim();
    if url.is_empty() {
        return Err(RegistryError::Validation("cluster url must not be empty".to_string()));
    }
    let parsed = Url::parse(url).map_err(|err| RegistryError::Validation(format!("invalid cluster url '{url}': {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(RegistryError::Validation(format!(
            "cluster url '{url}' must be an http:// or https:// address"
        )));
    }

    let description = description.map(str::trim).filter(|d| !d.is_empty());
    if description.is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN) {
        return Err(RegistryError::Validation(format!(
            "cluster description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }

    Ok(ValidCluster {
        name: name.to_string(),
        url: parsed,
        description: description.map(str::to_string),
    })
}

fn map_unique_violation(err: sqlx::Error, name: &str) -> RegistryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return RegistryError::Validation(format!("a cluster named '{name}' already exists"));
        }
    }
    err.into()
}

#[derive(Debug, Clone)]
pub struct ClusterRegistry {
    pool: SqlitePool,
}

impl ClusterRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, active_only: bool) -> Result<Vec<Cluster>, RegistryError> {
        let rows: Vec<ClusterRow> = sqlx::query_as(&format!(
            "SELECT {CLUSTER_COLUMNS} FROM clusters WHERE (? = 0 OR is_active = 1) ORDER BY id"
        ))
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Cluster::try_from(row).map_err(RegistryError::from))
            .collect()
    }

    pub async fn get(&self, id: ClusterId) -> Result<Cluster, RegistryError> {
        let row: Option<ClusterRow> = sqlx::query_as(&format!("SELECT {CLUSTER_COLUMNS} FROM clusters WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let row = row.ok_or(RegistryError::NotFound(id))?;
        Ok(Cluster::try_from(row)?)
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Cluster>, RegistryError> {
        let row: Option<ClusterRow> =
            sqlx::query_as(&format!("SELECT {CLUSTER_COLUMNS} FROM clusters WHERE name = ?"))
                .bind(name.trim())
                .fetch_optional(&self.pool)
                .await?;
        match row {
            Some(row) => Ok(Some(Cluster::try_from(row)?)),
            None => Ok(None),
        }
    }

    pub async fn create(&self, new: NewCluster) -> Result<Cluster, RegistryError> {
        let valid = validate(&new.name, &new.url, new.description.as_deref())?;
        let now = Utc::now().timestamp_millis();

        let row: ClusterRow = sqlx::query_as(&format!(
            "INSERT INTO clusters (name, url, description, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING {CLUSTER_COLUMNS}"
        ))
        .bind(&valid.name)
        .bind(valid.url.as_str())
        .bind(&valid.description)
        .bind(new.active)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| map_unique_violation(err, &valid.name))?;

        let cluster = Cluster::try_from(row)?;
        info!(cluster_id = cluster.id, name = %cluster.name, url = %cluster.url, "cluster registered");
        Ok(cluster)
    }

    pub async fn update(&self, id: ClusterId, update: ClusterUpdate) -> Result<Cluster, RegistryError> {
        let current = self.get(id).await?;

        let name = update.name.unwrap_or(current.name);
        let url = update.url.unwrap_or_else(|| current.url.to_string());
        let description = update.description.or(current.description);
        let active = update.active.unwrap_or(current.active);
        let valid = validate(&name, &url, description.as_deref())?;

        let row: Option<ClusterRow> = sqlx::query_as(&format!(
            "UPDATE clusters SET name = ?, url = ?, description = ?, is_active = ?, updated_at = ? \
             WHERE id = ? RETURNING {CLUSTER_COLUMNS}"
        ))
        .bind(&valid.name)
        .bind(valid.url.as_str())
        .bind(&valid.description)
        .bind(active)
        .bind(Utc::now().timestamp_millis())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| map_unique_violation(err, &valid.name))?;

        let cluster = Cluster::try_from(row.ok_or(RegistryError::NotFound(id))?)?;
        debug!(cluster_id = id, name = %cluster.name, "cluster updated");
        Ok(cluster)
    }

    /// Removes the cluster. Its snapshots stay in the store.
    pub async fn delete(&self, id: ClusterId) -> Result<(), RegistryError> {
        let result = sqlx::query("DELETE FROM clusters WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RegistryError::NotFound(id));
        }
        info!(cluster_id = id, "cluster deleted");
        Ok(())
    }

    pub async fn set_active(&self, id: ClusterId, active: bool) -> Result<Cluster, RegistryError> {
        let row: Option<ClusterRow> = sqlx::query_as(&format!(
            "UPDATE clusters SET is_active = ?, updated_at = ? WHERE id = ? RETURNING {CLUSTER_COLUMNS}"
        ))
        .bind(active)
        .bind(Utc::now().timestamp_millis())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let cluster = Cluster::try_from(row.ok_or(RegistryError::NotFound(id))?)?;
        info!(cluster_id = id, active, "cluster toggled");
        Ok(cluster)
    }

    pub async fn activate(&self, id: ClusterId) -> Result<Cluster, RegistryError> {
        self.set_active(id, true).await
    }

    pub async fn deactivate(&self, id: ClusterId) -> Result<Cluster, RegistryError> {
        self.set_active(id, false).await
    }

    /// Registers a configured cluster if its name is unknown, or points an
    /// existing one at the configured URL if that changed.
    pub async fn ensure(&self, seed: NewCluster) -> Result<Cluster, RegistryError> {
        let Some(existing) = self.find_by_name(&seed.name).await? else {
            return self.create(seed).await;
        };

        let valid = validate(&seed.name, &seed.url, seed.description.as_deref())?;
        if existing.url == valid.url {
            debug!(cluster_id = existing.id, name = %existing.name, "configured cluster already registered");
            return Ok(existing);
        }

        info!(cluster_id = existing.id, name = %existing.name, from = %existing.url, to = %valid.url, "updating configured cluster url");
        self.update(
            existing.id,
            ClusterUpdate {
                url: Some(valid.url.to_string()),
                ..Default::default()
            },
        )
        .await
    }
}
