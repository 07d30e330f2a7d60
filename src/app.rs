use crate::{
    cli::{
        Cli,
        Command,
    },
    report,
};
use color_eyre::Result;
use eyre::Context as _;
use std::sync::Arc;
use stream_observer_collector::{
    ClusterId,
    Collector,
    CollectorSettings,
    Database,
    NewCluster,
    RestJobSource,
    Scheduler,
};
use stream_observer_config::{
    ClusterSeed,
    Config,
};
use stream_observer_http::create_router;
use tokio::net::TcpListener;

/// Entry point for every subcommand.
pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::new(cli.args).wrap_err("Failed to load configuration")?;
    config.validate().wrap_err("Invalid configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Config => {
            print!("{}", config.to_yaml()?);
            Ok(())
        }
        Command::Serve => App::new(config).await?.serve().await,
        Command::Collect { json } => App::new(config).await?.collect_once(json).await,
        Command::Stats { cluster_id, json } => App::new(config).await?.stats(cluster_id, json).await,
    }
}

fn seed_to_cluster(seed: &ClusterSeed) -> NewCluster {
    NewCluster {
        name: seed.name.clone(),
        url: seed.url.clone(),
        description: seed.description.clone(),
        active: seed.active,
    }
}

pub struct App {
    config: Config,
    database: Database,
}

impl App {
    /// Opens the database and registers the configured clusters.
    pub async fn new(config: Config) -> Result<Self> {
        config.prepare_database_dir()?;
        let database = Database::connect(&config.database_url)
            .await
            .wrap_err_with(|| format!("Failed to open database {}", config.database_url))?;

        let registry = database.registry();
        for seed in &config.clusters {
            let cluster = registry
                .ensure(seed_to_cluster(seed))
                .await
                .wrap_err_with(|| format!("Failed to register configured cluster '{}'", seed.name))?;
            debug!(cluster_id = cluster.id, name = %cluster.name, "configured cluster registered");
        }

        Ok(Self { config, database })
    }

    fn collector(&self) -> Result<Collector> {
        let source = RestJobSource::new().wrap_err("Failed to build the HTTP client")?;
        Ok(Collector::new(
            self.database.registry(),
            self.database.snapshots(),
            Arc::new(source),
            CollectorSettings {
                fetch_timeout: self.config.fetch_timeout,
                max_in_flight: self.config.max_in_flight,
            },
        ))
    }

    /// Runs the scheduler and the HTTP interface until Ctrl-C. The HTTP server
    /// stops first, then a running cycle is awaited before the database closes.
    pub async fn serve(self) -> Result<()> {
        let scheduler = Scheduler::new(Arc::new(self.collector()?));
        if self.config.collect_on_startup {
            scheduler.trigger_now();
        }
        scheduler.start(self.config.collection_interval);

        let address = self.config.listen_address;
        let listener = TcpListener::bind(address)
            .await
            .wrap_err_with(|| format!("Failed to listen on {address}"))?;
        info!("listening on {address}");

        let router = create_router(self.database.clone(), scheduler.clone());
        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        info!("shutting down, waiting for a running collection to finish");
        scheduler.shutdown().await;
        self.database.close().await;
        served.wrap_err("HTTP server failed")
    }

    pub async fn collect_once(&self, json: bool) -> Result<()> {
        let report = self.collector()?.run_cycle().await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print!("{}", report::cycle_table(&report));
        }
        self.database.close().await;
        Ok(())
    }

    pub async fn stats(&self, cluster_id: Option<ClusterId>, json: bool) -> Result<()> {
        let stats = self.database.aggregator().statistics_for(cluster_id).await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!("{}", report::statistics_tables(&stats));
        }
        self.database.close().await;
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for Ctrl-C: {err}");
        std::future::pending::<()>().await;
    }
    info!("Ctrl-C received");
}
