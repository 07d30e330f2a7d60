use crate::{
    error::AppError,
    router::AppState,
};
use axum::{
    extract::{
        rejection::QueryRejection,
        Path,
        Query,
        State,
    },
    Json,
};
use chrono::TimeDelta;
use serde::Deserialize;
use stream_observer_collector::{
    ClusterId,
    JobSnapshot,
    SnapshotQuery,
    Statistics,
};

const DEFAULT_LONG_RUNNING_HOURS: u32 = 24;

#[derive(Debug, Default, Deserialize)]
pub struct StatisticsParams {
    #[serde(default)]
    cluster_id: Option<ClusterId>,
}

/// Recent snapshots, newest first.
pub async fn recent(
    State(state): State<AppState>,
    query: Result<Query<SnapshotQuery>, QueryRejection>,
) -> Result<Json<Vec<JobSnapshot>>, AppError> {
    let Query(query) = query?;
    Ok(Json(state.database.snapshots().recent(&query).await?))
}

pub async fn statistics(
    State(state): State<AppState>,
    params: Result<Query<StatisticsParams>, QueryRejection>,
) -> Result<Json<Statistics>, AppError> {
    let Query(params) = params?;
    Ok(Json(state.database.aggregator().statistics_for(params.cluster_id).await?))
}

/// Latest snapshot of one job. Works for deleted clusters too.
pub async fn latest(
    State(state): State<AppState>,
    Path((cluster_id, job_id)): Path<(ClusterId, String)>,
) -> Result<Json<JobSnapshot>, AppError> {
    state
        .database
        .snapshots()
        .latest(cluster_id, &job_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("job {job_id} was never observed on cluster {cluster_id}")))
}

#[derive(Debug, Deserialize)]
pub struct LongRunningParams {
    #[serde(default = "default_long_running_hours")]
    hours: u32,
    #[serde(default)]
    cluster_id: Option<ClusterId>,
}

fn default_long_running_hours() -> u32 {
    DEFAULT_LONG_RUNNING_HOURS
}

/// Jobs that are still running after more than `hours`, longest first.
pub async fn long_running(
    State(state): State<AppState>,
    params: Result<Query<LongRunningParams>, QueryRejection>,
) -> Result<Json<Vec<JobSnapshot>>, AppError> {
    let Query(params) = params?;
    if params.hours == 0 {
        return Err(AppError::BadRequest("hours must be at least 1".to_string()));
    }
    let min_duration = TimeDelta::hours(i64::from(params.hours));
    Ok(Json(
        state
            .database
            .snapshots()
            .long_running(min_duration, params.cluster_id)
            .await?,
    ))
}
