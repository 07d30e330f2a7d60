use crate::{
    error::AppError,
    router::AppState,
};
use axum::{
    extract::{
        rejection::{
            JsonRejection,
            QueryRejection,
        },
        Path,
        Query,
        State,
    },
    http::StatusCode,
    Json,
};
use serde::{
    Deserialize,
    Serialize,
};
use stream_observer_collector::{
    Cluster,
    ClusterId,
    ClusterSummary,
    ClusterUpdate,
    NewCluster,
};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    active_only: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    purge_snapshots: bool,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    cluster_id: ClusterId,
    purged_snapshots: u64,
}

pub async fn list(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Cluster>>, AppError> {
    let Query(params) = params?;
    Ok(Json(state.database.registry().list(params.active_only).await?))
}

pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<NewCluster>, JsonRejection>,
) -> Result<(StatusCode, Json<Cluster>), AppError> {
    let Json(new) = payload?;
    let cluster = state.database.registry().create(new).await?;
    Ok((StatusCode::CREATED, Json(cluster)))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<ClusterId>) -> Result<Json<Cluster>, AppError> {
    Ok(Json(state.database.registry().get(id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<ClusterId>,
    payload: Result<Json<ClusterUpdate>, JsonRejection>,
) -> Result<Json<Cluster>, AppError> {
    let Json(update) = payload?;
    Ok(Json(state.database.registry().update(id, update).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<ClusterId>,
    params: Result<Query<DeleteParams>, QueryRejection>,
) -> Result<Json<Deleted>, AppError> {
    let Query(params) = params?;
    state.database.registry().delete(id).await?;
    let purged_snapshots = if params.purge_snapshots {
        state.database.snapshots().purge_cluster(id).await?
    } else {
        0
    };
    Ok(Json(Deleted {
        cluster_id: id,
        purged_snapshots,
    }))
}

pub async fn activate(State(state): State<AppState>, Path(id): Path<ClusterId>) -> Result<Json<Cluster>, AppError> {
    Ok(Json(state.database.registry().activate(id).await?))
}

pub async fn deactivate(State(state): State<AppState>, Path(id): Path<ClusterId>) -> Result<Json<Cluster>, AppError> {
    Ok(Json(state.database.registry().deactivate(id).await?))
}

pub async fn summary(
    State(state): State<AppState>,
    Path(id): Path<ClusterId>,
) -> Result<Json<ClusterSummary>, AppError> {
    let cluster = state.database.registry().get(id).await?;
    Ok(Json(state.database.aggregator().cluster_summary(&cluster).await?))
}
