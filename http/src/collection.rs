use crate::{
    error::AppError,
    router::AppState,
};
use axum::{
    extract::{
        rejection::QueryRejection,
        Query,
        State,
    },
    http::StatusCode,
    Json,
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
use stream_observer_collector::{
    CollectionSummary,
    TriggerOutcome,
};

const DEFAULT_RETENTION_HOURS: u32 = 168;

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    status: TriggerOutcome,
}

/// Starts a cycle in the background and answers right away.
pub async fn trigger(State(state): State<AppState>) -> (StatusCode, Json<TriggerResponse>) {
    let status = state.scheduler.trigger_now();
    let code = match status {
        TriggerOutcome::Accepted => StatusCode::ACCEPTED,
        TriggerOutcome::Busy => StatusCode::CONFLICT,
    };
    info!(?status, "collection requested");
    (code, Json(TriggerResponse { status }))
}

pub async fn summary(State(state): State<AppState>) -> Result<Json<CollectionSummary>, AppError> {
    let last_cycle = state.scheduler.last_report();
    Ok(Json(state.database.aggregator().collection_summary(last_cycle).await?))
}

#[derive(Debug, Deserialize)]
pub struct CleanupParams {
    #[serde(default = "default_hours")]
    hours: u32,
}

fn default_hours() -> u32 {
    DEFAULT_RETENTION_HOURS
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    cutoff: DateTime<Utc>,
    deleted_snapshots: u64,
}

/// Drops snapshots older than `hours`.
pub async fn cleanup(
    State(state): State<AppState>,
    params: Result<Query<CleanupParams>, QueryRejection>,
) -> Result<Json<CleanupResponse>, AppError> {
    let Query(params) = params?;
    if params.hours == 0 {
        return Err(AppError::BadRequest("hours must be at least 1".to_string()));
    }
    let cutoff = Utc::now() - TimeDelta::hours(i64::from(params.hours));
    let deleted_snapshots = state.database.snapshots().purge_older_than(cutoff).await?;
    Ok(Json(CleanupResponse {
        cutoff,
        deleted_snapshots,
    }))
}
