use chrono::Utc;
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::{
    json,
    Value,
};
use std::{
    sync::Arc,
    time::Duration,
};
use stream_observer_collector::{
    Cluster,
    Collector,
    CollectorSettings,
    Database,
    FetchFuture,
    JobSource,
    JobState,
    NewJobSnapshot,
    RawJobRecord,
    Scheduler,
};
use stream_observer_http::create_router;
use tokio::net::TcpListener;

/// Reports one running job per cluster after `delay`.
struct SlowSource {
    delay: Duration,
}

impl JobSource for SlowSource {
    fn fetch_jobs<'a>(&'a self, _cluster: &'a Cluster, _timeout: Duration) -> FetchFuture<'a> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            Ok(vec![RawJobRecord {
                job_id: "j1".to_string(),
                name: "wordcount".to_string(),
                state: JobState::Running,
                job_type: None,
                start_time: Some(Utc::now()),
                end_time: None,
                is_stoppable: None,
                max_parallelism: None,
                details: None,
            }])
        })
    }

    fn name(&self) -> &'static str {
        "SlowSource"
    }
}

struct TestApp {
    base: String,
    client: reqwest::Client,
    database: Database,
    scheduler: Scheduler,
}

impl TestApp {
    async fn spawn(delay: Duration) -> Self {
        let database = Database::in_memory().await.unwrap();
        let collector = Collector::new(
            database.registry(),
            database.snapshots(),
            Arc::new(SlowSource { delay }),
            CollectorSettings::default(),
        );
        let scheduler = Scheduler::new(Arc::new(collector));
        let router = create_router(database.clone(), scheduler.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

        Self {
            base: format!("http://{addr}"),
            client: reqwest::Client::new(),
            database,
            scheduler,
        }
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = self.client.get(format!("{}{path}", self.base)).send().await.unwrap();
        (response.status(), response.json().await.unwrap())
    }

    async fn send(&self, method: reqwest::Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = self.client.request(method, format!("{}{path}", self.base));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.unwrap();
        (response.status(), response.json().await.unwrap())
    }

    async fn post(&self, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(reqwest::Method::POST, path, body).await
    }

    async fn create_cluster(&self, name: &str) -> i64 {
        let (status, body) = self
            .post(
                "/api/clusters",
                Some(json!({"name": name, "url": format!("http://{name}:8081")})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }
}

fn snapshot(cluster_id: i64, cluster_name: &str, job_id: &str, job_name: &str, state: JobState) -> NewJobSnapshot {
    NewJobSnapshot {
        cluster_id,
        cluster_name: cluster_name.to_string(),
        job_id: job_id.to_string(),
        job_name: job_name.to_string(),
        state,
        job_type: Some("STREAMING".to_string()),
        start_time: None,
        end_time: None,
        duration_ms: None,
        is_stoppable: None,
        max_parallelism: None,
        details: None,
        collected_at: Utc::now(),
    }
}

#[tokio::test]
async fn liveness_and_health() {
    let app = TestApp::spawn(Duration::ZERO).await;

    let response = app.client.get(format!("{}/healthz", app.base)).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "ok");

    let (status, body) = app.get("/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], true);

    app.database.close().await;
    let (status, body) = app.get("/api/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn cluster_management() {
    let app = TestApp::spawn(Duration::ZERO).await;
    let id = app.create_cluster("prod").await;
    app.create_cluster("staging").await;

    let (status, body) = app
        .post("/api/clusters", Some(json!({"name": "prod", "url": "http://other:8081"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "a cluster named 'prod' already exists");

    let (status, body) = app.post("/api/clusters", Some(json!({"name": "", "url": "http://x"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "cluster name must not be empty");

    let (status, body) = app.post("/api/clusters", Some(json!({"url": "http://x"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = app.get(&format!("/api/clusters/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "prod");
    assert_eq!(body["active"], true);

    let (status, body) = app
        .send(
            reqwest::Method::PUT,
            &format!("/api/clusters/{id}"),
            Some(json!({"description": "production flink"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["description"], "production flink");
    assert_eq!(body["url"], "http://prod:8081/");

    let (status, body) = app.post(&format!("/api/clusters/{id}/deactivate"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], false);
    let (_, body) = app.get("/api/clusters?active_only=true").await;
    let names: Vec<_> = body.as_array().unwrap().iter().map(|c| c["name"].clone()).collect();
    assert_eq!(names, vec![json!("staging")]);
    let (_, body) = app.get("/api/clusters").await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = app.post(&format!("/api/clusters/{id}/activate"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], true);

    let (status, body) = app.get("/api/clusters/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "cluster 999 not found");
}

#[tokio::test]
async fn deleting_with_and_without_purge() {
    let app = TestApp::spawn(Duration::ZERO).await;
    let kept = app.create_cluster("kept").await;
    let purged = app.create_cluster("purged").await;
    let store = app.database.snapshots();
    store
        .append(&snapshot(kept, "kept", "j1", "etl", JobState::Running))
        .await
        .unwrap();
    store
        .append(&snapshot(purged, "purged", "j2", "etl", JobState::Running))
        .await
        .unwrap();

    let (status, body) = app.send(reqwest::Method::DELETE, &format!("/api/clusters/{kept}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"cluster_id": kept, "purged_snapshots": 0}));

    let (status, body) = app
        .send(
            reqwest::Method::DELETE,
            &format!("/api/clusters/{purged}?purge_snapshots=true"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["purged_snapshots"], 1);

    let (status, _) = app.send(reqwest::Method::DELETE, &format!("/api/clusters/{kept}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, stats) = app.get("/api/jobs/statistics").await;
    assert_eq!(stats["total_jobs"], 1);
    assert_eq!(stats["clusters"], json!({"kept": 1}));
}

#[tokio::test]
async fn job_listings_and_statistics() {
    let app = TestApp::spawn(Duration::ZERO).await;
    let prod = app.create_cluster("prod").await;
    let store = app.database.snapshots();
    store
        .append(&snapshot(prod, "prod", "j1", "Word Count", JobState::Running))
        .await
        .unwrap();
    store
        .append(&snapshot(prod, "prod", "j2", "billing", JobState::Finished))
        .await
        .unwrap();
    store
        .append(&snapshot(prod, "prod", "j1", "Word Count", JobState::Failed))
        .await
        .unwrap();

    let (status, body) = app.get("/api/jobs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);
    assert_eq!(body[0]["state"], "FAILED");

    let (_, body) = app.get("/api/jobs?limit=1").await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    let (_, body) = app.get("/api/jobs?state=FINISHED").await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    let (_, body) = app.get("/api/jobs?name=word").await;
    assert_eq!(body.as_array().unwrap().len(), 2);
    let (status, _) = app.get("/api/jobs?limit=lots").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, stats) = app.get("/api/jobs/statistics").await;
    assert_eq!(stats["total_jobs"], 2);
    assert_eq!(stats["states"]["FAILED"], 1);
    assert_eq!(stats["states"]["FINISHED"], 1);
    assert_eq!(stats["states"]["RUNNING"], 0);
    let (_, stats) = app.get(&format!("/api/jobs/statistics?cluster_id={}", prod + 1)).await;
    assert_eq!(stats["total_jobs"], 0);

    let (status, latest) = app.get(&format!("/api/clusters/{prod}/jobs/j1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["state"], "FAILED");
    let (status, _) = app.get(&format!("/api/clusters/{prod}/jobs/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, summary) = app.get(&format!("/api/clusters/{prod}/summary")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["total_jobs"], 2);
    assert_eq!(summary["failed_jobs"], 1);
    assert_eq!(summary["finished_jobs"], 1);
    assert_eq!(summary["running_jobs"], 0);
}

#[tokio::test]
async fn collection_trigger_is_fire_and_forget() {
    let app = TestApp::spawn(Duration::from_millis(300)).await;
    app.create_cluster("prod").await;
    let mut reports = app.scheduler.subscribe();

    let (status, body) = app.post("/api/collect", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, json!({"status": "accepted"}));

    let (status, body) = app.post("/api/collect", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, json!({"status": "busy"}));

    reports.changed().await.unwrap();
    app.scheduler.shutdown().await;

    let (status, summary) = app.get("/api/collect/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["total_clusters"], 1);
    assert_eq!(summary["active_clusters"], 1);
    assert_eq!(summary["statistics"]["total_jobs"], 1);
    assert_eq!(summary["last_cycle"]["snapshots_written"], 1);
    assert_eq!(summary["last_cycle"]["failures"], json!([]));
}

#[tokio::test]
async fn cleanup_purges_old_snapshots() {
    let app = TestApp::spawn(Duration::ZERO).await;
    let prod = app.create_cluster("prod").await;
    let mut old = snapshot(prod, "prod", "j1", "etl", JobState::Finished);
    old.collected_at = Utc::now() - chrono::TimeDelta::hours(200);
    app.database.snapshots().append(&old).await.unwrap();
    app.database
        .snapshots()
        .append(&snapshot(prod, "prod", "j2", "etl", JobState::Running))
        .await
        .unwrap();

    let (status, body) = app.post("/api/cleanup?hours=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = app.post("/api/cleanup", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted_snapshots"], 1);
    assert_eq!(app.database.snapshots().count().await.unwrap(), 1);
}

#[tokio::test]
async fn long_running_jobs() {
    let app = TestApp::spawn(Duration::ZERO).await;
    let prod = app.create_cluster("prod").await;
    let hours = |n: i64| Some(n * 3_600_000);

    for (job_id, duration_ms) in [("marathon", hours(30)), ("sprint", hours(1))] {
        let mut running = snapshot(prod, "prod", job_id, job_id, JobState::Running);
        running.duration_ms = duration_ms;
        running.details = Some(json!({"jid": job_id}));
        app.database.snapshots().append(&running).await.unwrap();
    }

    let (status, body) = app.get("/api/jobs/long-running").await;
    assert_eq!(status, StatusCode::OK);
    let jobs = body.as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["job_id"], "marathon");
    assert_eq!(jobs[0]["details"], json!({"jid": "marathon"}));

    let (_, body) = app.get("/api/jobs/long-running?hours=1").await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, body) = app.get(&format!("/api/jobs/long-running?cluster_id={}", prod + 1)).await;
    assert_eq!(body, json!([]));

    let (status, body) = app.get("/api/jobs/long-running?hours=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}
