//! # Stream Observer Collector
//!
//! Watches a fleet of stream-processing clusters by polling each cluster's job
//! overview endpoint and keeping every observation in an append-only snapshot
//! log.
//!
//! ## Architecture
//!
//! - **`registry`**: the known clusters and their active flag
//! - **`source`**: fetches the job overview of one cluster (`JobSource`, with
//!   `RestJobSource` as the HTTP implementation)
//! - **`store`**: the snapshot log
//! - **`collector`**: one collection cycle, fanning out to all active clusters
//!   with bounded concurrency and isolating per-cluster failures
//! - **`scheduler`**: runs cycles on an interval or on demand, one at a time
//! - **`aggregator`**: statistics over the latest snapshot of every job
//!
//! ## Usage
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use stream_observer_collector::{Collector, CollectorSettings, Database, NewCluster, RestJobSource};
//!
//! let database = Database::connect("sqlite://observer.db").await?;
//! database.registry().ensure(NewCluster::new("prod", "http://flink:8081")).await?;
//!
//! let collector = Collector::new(
//!     database.registry(),
//!     database.snapshots(),
//!     Arc::new(RestJobSource::new()?),
//!     CollectorSettings::default(),
//! );
//! println!("{}", collector.run_cycle().await?);
//! println!("{:?}", database.aggregator().statistics().await?);
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate tracing;

pub mod aggregator;
pub mod collector;
pub mod database;
pub mod error;
pub mod health;
pub mod model;
pub mod registry;
pub mod scheduler;
pub mod source;
pub mod store;

pub use aggregator::{
    Aggregator,
    CollectionSummary,
};
pub use collector::{
    ClusterFailure,
    Collector,
    CollectorSettings,
    CycleReport,
    FailureReason,
};
pub use database::Database;
pub use error::{
    CollectorError,
    FetchError,
    RegistryError,
    StoreError,
};
pub use health::{
    check_health,
    HealthReport,
    HealthStatus,
};
pub use model::*;
pub use registry::ClusterRegistry;
pub use scheduler::{
    CycleAbort,
    Scheduler,
    TriggerOutcome,
};
pub use source::{
    FetchFuture,
    JobSource,
    RestJobSource,
};
pub use store::{
    SnapshotQuery,
    SnapshotStore,
};
