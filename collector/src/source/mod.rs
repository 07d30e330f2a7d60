use crate::{
    error::FetchError,
    model::{
        Cluster,
        RawJobRecord,
    },
};
use std::{
    future::Future,
    pin::Pin,
    time::Duration,
};

mod rest;

pub use rest::RestJobSource;

pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<RawJobRecord>, FetchError>> + Send + 'a>>;

/// Something that can report the current jobs of a cluster.
pub trait JobSource: Send + Sync {
    /// Fetch the job overview of `cluster`, giving up after `timeout`.
    fn fetch_jobs<'a>(&'a self, cluster: &'a Cluster, timeout: Duration) -> FetchFuture<'a>;

    /// Get the name of this source
    fn name(&self) -> &'static str;
}
