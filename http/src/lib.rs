//! HTTP interface of the stream observer: cluster management, snapshot
//! listings, statistics and collection triggers.

#[macro_use]
extern crate tracing;

mod clusters;
mod collection;
pub mod error;
mod jobs;
pub mod router;

pub use error::AppError;
pub use router::{
    create_router,
    AppState,
};
