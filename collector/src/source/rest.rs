use super::{
    FetchFuture,
    JobSource,
};
use crate::{
    error::FetchError,
    model::{
        optional_instant_from_millis,
        Cluster,
        JobState,
        RawJobRecord,
    },
};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const JOBS_OVERVIEW_PATH: &str = "jobs/overview";
const MAX_IDLE_CONNECTIONS_PER_HOST: usize = 10;

/// Body of `GET /jobs/overview`. Jobs stay raw so they can be kept verbatim.
#[derive(Debug, Deserialize)]
struct JobsOverview {
    jobs: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OverviewJob {
    jid: String,
    #[serde(default)]
    name: String,
    state: String,
    #[serde(default, rename = "job-type")]
    job_type: Option<String>,
    #[serde(default, rename = "start-time")]
    start_time: Option<i64>,
    #[serde(default, rename = "end-time")]
    end_time: Option<i64>,
    #[serde(default, rename = "isStoppable")]
    is_stoppable: Option<bool>,
    #[serde(default, rename = "maxParallelism")]
    max_parallelism: Option<i64>,
}

impl OverviewJob {
    fn into_record(self, details: serde_json::Value) -> RawJobRecord {
        RawJobRecord {
            job_id: self.jid,
            name: self.name,
            state: JobState::from(self.state),
            job_type: self.job_type,
            start_time: optional_instant_from_millis(self.start_time),
            end_time: optional_instant_from_millis(self.end_time),
            is_stoppable: self.is_stoppable,
            // -1 means the cluster default
            max_parallelism: self.max_parallelism.filter(|parallelism| *parallelism > 0),
            details: Some(details),
        }
    }
}

fn malformed(err: serde_json::Error) -> FetchError {
    FetchError::MalformedResponse(err.to_string())
}

pub(crate) fn parse_overview(body: &[u8]) -> Result<Vec<RawJobRecord>, FetchError> {
    let overview: JobsOverview = serde_json::from_slice(body).map_err(malformed)?;
    overview
        .jobs
        .into_iter()
        .map(|raw| {
            let job = OverviewJob::deserialize(&raw).map_err(malformed)?;
            Ok(job.into_record(raw))
        })
        .collect()
}

fn overview_url(base: &Url) -> Result<Url, FetchError> {
    let url = format!("{}/{JOBS_OVERVIEW_PATH}", base.as_str().trim_end_matches('/'));
    Url::parse(&url).map_err(|err| FetchError::Unreachable(format!("invalid overview url '{url}': {err}")))
}

fn classify(err: reqwest::Error, timeout: Duration) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(timeout)
    } else if err.is_decode() {
        FetchError::MalformedResponse(err.to_string())
    } else {
        FetchError::Unreachable(err.without_url().to_string())
    }
}

/// Reads the job overview from a cluster's REST endpoint.
#[derive(Debug, Clone)]
pub struct RestJobSource {
    http_client: HttpClient,
}

impl RestJobSource {
    /// Fails only when the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, reqwest::Error> {
        let http_client = HttpClient::builder()
            .pool_max_idle_per_host(MAX_IDLE_CONNECTIONS_PER_HOST)
            .build()?;
        Ok(Self::with_client(http_client))
    }

    pub fn with_client(http_client: HttpClient) -> Self {
        Self { http_client }
    }

    /// One outbound call. The whole exchange, body included, is bounded by
    /// `timeout`.
    pub async fn fetch(&self, cluster: &Cluster, timeout: Duration) -> Result<Vec<RawJobRecord>, FetchError> {
        let url = overview_url(&cluster.url)?;
        debug!(cluster = %cluster.name, %url, "fetching job overview");

        let exchange = async {
            let response = self
                .http_client
                .get(url)
                .timeout(timeout)
                .send()
                .await
                .map_err(|err| classify(err, timeout))?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::HttpError(status.as_u16()));
            }

            let body = response.bytes().await.map_err(|err| classify(err, timeout))?;
            parse_overview(&body)
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .unwrap_or(Err(FetchError::Timeout(timeout)))
    }
}

impl JobSource for RestJobSource {
    fn fetch_jobs<'a>(&'a self, cluster: &'a Cluster, timeout: Duration) -> FetchFuture<'a> {
        Box::pin(self.fetch(cluster, timeout))
    }

    fn name(&self) -> &'static str {
        "RestJobSource"
    }
}
