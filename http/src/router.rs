use crate::{
    clusters,
    collection,
    jobs,
};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{
        get,
        post,
    },
    Json,
    Router,
};
use stream_observer_collector::{
    check_health,
    Database,
    HealthReport,
    HealthStatus,
    Scheduler,
};

#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub scheduler: Scheduler,
}

pub fn create_router(database: Database, scheduler: Scheduler) -> Router {
    let state = AppState { database, scheduler };

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/health", get(health))
        .route("/api/clusters", get(clusters::list).post(clusters::create))
        .route(
            "/api/clusters/{id}",
            get(clusters::get).put(clusters::update).delete(clusters::delete),
        )
        .route("/api/clusters/{id}/activate", post(clusters::activate))
        .route("/api/clusters/{id}/deactivate", post(clusters::deactivate))
        .route("/api/clusters/{id}/summary", get(clusters::summary))
        .route("/api/clusters/{id}/jobs/{job_id}", get(jobs::latest))
        .route("/api/jobs", get(jobs::recent))
        .route("/api/jobs/statistics", get(jobs::statistics))
        .route("/api/jobs/long-running", get(jobs::long_running))
        .route("/api/collect", post(collection::trigger))
        .route("/api/collect/summary", get(collection::summary))
        .route("/api/cleanup", post(collection::cleanup))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let last_cycle = state.scheduler.last_report();
    let last_abort = state.scheduler.last_abort();
    let report = check_health(
        &state.database,
        last_cycle.as_ref(),
        last_abort.as_ref(),
        state.scheduler.is_running(),
    )
    .await;
    let status = match report.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(report))
}
