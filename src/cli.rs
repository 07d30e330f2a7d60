use clap::{
    Parser,
    Subcommand,
};
use stream_observer_collector::ClusterId;
use stream_observer_config::{
    version,
    Args,
};

/// Polls a fleet of stream-processing clusters and keeps a time series of
/// their job states.
#[derive(Parser, Debug, Clone)]
#[command(author, version = version(), about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub args: Args,

    /// Log filter directives, e.g. `info,stream_observer_collector=debug`.
    /// Falls back to `RUST_LOG`, then `info`.
    #[arg(long, value_name = "FILTER", global = true)]
    pub log_filter: Option<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the scheduler and the HTTP interface (default).
    Serve,
    /// Run exactly one collection cycle and print its report.
    Collect {
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print job statistics from the snapshot log.
    Stats {
        /// Only count jobs of this cluster.
        #[arg(long)]
        cluster_id: Option<ClusterId>,
        /// Print the statistics as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration.
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_is_the_default_and_settings_are_global() {
        let cli = Cli::try_parse_from(["stream-observer", "--max-in-flight", "3"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.args.max_in_flight, Some(3));

        let cli = Cli::try_parse_from([
            "stream-observer",
            "stats",
            "--cluster-id",
            "2",
            "--json",
            "--database-url",
            "sqlite://observer.db",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Stats {
                cluster_id: Some(2),
                json: true,
            })
        );
        assert_eq!(cli.args.database_url.as_deref(), Some("sqlite://observer.db"));
    }
}
