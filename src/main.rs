use clap::Parser;
use color_eyre::Result;
use stream_observer::{
    init_errors,
    init_logging,
    run,
    Cli,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_errors()?;
    let cli = Cli::parse();
    init_logging(cli.log_filter.as_deref())?;
    run(cli).await
}
