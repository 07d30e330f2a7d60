use crate::{
    collector::CycleReport,
    database::Database,
    scheduler::CycleAbort,
};
use chrono::{
    DateTime,
    Utc,
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    /// The service works but the last cycle aborted or could not reach every
    /// cluster.
    Degraded,
    /// The store does not answer.
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub database: bool,
    pub registry: bool,
    pub active_clusters: Option<usize>,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_cycle_failures: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_cycle_aborted: Option<CycleAbort>,
    pub collection_running: bool,
    pub checked_at: DateTime<Utc>,
}

/// Health of the service itself. A monitored cluster being down only ever
/// makes it degraded.
pub async fn check_health(
    database: &Database,
    last_cycle: Option<&CycleReport>,
    last_abort: Option<&CycleAbort>,
    collection_running: bool,
) -> HealthReport {
    let database_ok = match database.ping().await {
        Ok(()) => true,
        Err(err) => {
            warn!("database health check failed: {err}");
            false
        }
    };
    let active_clusters = match database.registry().list(true).await {
        Ok(clusters) => Some(clusters.len()),
        Err(err) => {
            warn!("registry health check failed: {err}");
            None
        }
    };
    let last_cycle_failures = last_cycle.map_or(0, |report| report.failures.len());

    let status = if !database_ok || active_clusters.is_none() {
        HealthStatus::Unhealthy
    } else if last_cycle_failures > 0 || last_abort.is_some() {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    HealthReport {
        status,
        database: database_ok,
        registry: active_clusters.is_some(),
        active_clusters,
        last_cycle_at: last_cycle.map(|report| report.collected_at),
        last_cycle_failures,
        last_cycle_aborted: last_abort.cloned(),
        collection_running,
        checked_at: Utc::now(),
    }
}
