use crate::model::ClusterId;
use serde::Serialize;
use std::time::Duration;

/// Failure of the relational store backing the registry and the snapshot log.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt row in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Bad cluster input. The message is meant to be shown to the user as is.
    #[error("{0}")]
    Validation(String),
    #[error("cluster {0} not found")]
    NotFound(ClusterId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<sqlx::Error> for RegistryError {
    fn from(err: sqlx::Error) -> Self {
        RegistryError::Store(StoreError::Database(err))
    }
}

/// Why fetching the job overview of a single cluster failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FetchError {
    #[error("cluster unreachable: {0}")]
    Unreachable(String),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("unexpected HTTP status {0}")]
    HttpError(u16),
    #[error("malformed job overview: {0}")]
    MalformedResponse(String),
}

/// The only failure that aborts a whole collection cycle: not knowing which
/// clusters to poll.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("failed to read active clusters: {0}")]
    Registry(#[from] RegistryError),
}
