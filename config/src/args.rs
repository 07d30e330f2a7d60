use std::{
    net::SocketAddr,
    path::PathBuf,
};

/// Settings that can be given on the command line. Anything left out falls
/// back to the environment, the config file and finally the built-in defaults.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct Args {
    /// Read settings from this file instead of `config.yaml` in the config
    /// directory.
    #[clap(long = "config", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// SQLite database, e.g. `sqlite://observer.db`.
    #[clap(long, value_name = "URL", global = true)]
    pub database_url: Option<String>,

    /// Address the HTTP interface listens on.
    #[clap(long, value_name = "ADDR", global = true)]
    pub listen_address: Option<SocketAddr>,

    /// Time between two scheduled collection cycles, e.g. `30s` or `5m`.
    #[clap(long, value_name = "DURATION", global = true)]
    pub collection_interval: Option<String>,

    /// Upper bound for fetching the jobs of one cluster.
    #[clap(long, value_name = "DURATION", global = true)]
    pub fetch_timeout: Option<String>,

    /// How many clusters are polled at the same time.
    #[clap(long, value_name = "N", global = true)]
    pub max_in_flight: Option<u64>,

    /// Run a collection cycle right after startup.
    #[clap(long, value_name = "BOOL", global = true)]
    pub collect_on_startup: Option<bool>,
}

mod config_ext {
    use super::*;
    use config::{
        Map,
        Source,
        Value,
    };
    use std::collections::HashMap;

    impl Source for Args {
        fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
            Box::new((*self).clone())
        }

        fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
            let mut cache = HashMap::<String, Value>::new();
            if let Some(database_url) = &self.database_url {
                cache.insert("database_url".to_string(), database_url.clone().into());
            }
            if let Some(listen_address) = &self.listen_address {
                cache.insert("listen_address".to_string(), listen_address.to_string().into());
            }
            if let Some(interval) = &self.collection_interval {
                cache.insert("collection_interval".to_string(), interval.clone().into());
            }
            if let Some(timeout) = &self.fetch_timeout {
                cache.insert("fetch_timeout".to_string(), timeout.clone().into());
            }
            if let Some(max_in_flight) = self.max_in_flight {
                cache.insert("max_in_flight".to_string(), max_in_flight.into());
            }
            if let Some(collect_on_startup) = self.collect_on_startup {
                cache.insert("collect_on_startup".to_string(), collect_on_startup.into());
            }
            Ok(cache)
        }
    }
}

pub fn version() -> String {
    let config_dir_path = crate::get_config_dir().display().to_string();
    let data_dir_path = crate::get_data_dir().display().to_string();

    format!(
        "{}

Config directory: {config_dir_path}
Data directory: {data_dir_path}",
        clap::crate_version!()
    )
}
