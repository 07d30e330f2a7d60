#[macro_use]
extern crate tracing;

mod app;
mod cli;
mod logging;
mod report;

pub use app::{
    run,
    App,
};
pub use cli::{
    Cli,
    Command,
};
pub use logging::{
    init_errors,
    init_logging,
};
