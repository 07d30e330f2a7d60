#[macro_use]
extern crate tracing;

mod app_config;
mod args;

use app_config::{
    AppConfig,
    ENV_PREFIX,
};
pub use app_config::{
    get_config_dir,
    get_data_dir,
};
pub use args::{
    version,
    Args,
};
use color_eyre::Result;
use eyre::{
    ensure,
    Context as _,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::HashMap,
    net::SocketAddr,
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};

const DEFAULT_CONFIG: &str = include_str!("default-config.yaml");
const DATABASE_FILE: &str = "stream-observer.db";

/// A cluster that should exist in the registry after startup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSeed {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

fn active_by_default() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten, skip_serializing)]
    app_config: AppConfig,
    pub database_url: String,
    pub listen_address: SocketAddr,
    #[serde(with = "humantime_format")]
    pub collection_interval: Duration,
    #[serde(with = "humantime_format")]
    pub fetch_timeout: Duration,
    pub max_in_flight: usize,
    pub collect_on_startup: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<ClusterSeed>,
}

mod humantime_format {
    use serde::{
        de::Error as _,
        Deserialize,
        Deserializer,
        Serializer,
    };
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(|err| D::Error::custom(format!("invalid duration '{raw}': {err}")))
    }
}

impl Config {
    /// Layers, lowest priority first: built-in defaults, the config file,
    /// `STREAM_OBSERVER_*` environment variables, command line arguments.
    pub fn new(args: Args) -> Result<Self, config::ConfigError> {
        Self::load(args, &get_config_dir(), &get_data_dir(), None)
    }

    fn load(
        args: Args,
        config_dir: &Path,
        data_dir: &Path,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, config::ConfigError> {
        let database_url = format!("sqlite://{}", data_dir.join(DATABASE_FILE).display());
        let mut builder = config::Config::builder()
            .set_default("data_dir", data_dir.display().to_string())?
            .set_default("config_dir", config_dir.display().to_string())?
            .set_default("database_url", database_url)?
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Yaml));

        builder = match &args.config_file {
            Some(file) => builder.add_source(config::File::from(file.as_path()).format(config::FileFormat::Yaml)),
            None => builder.add_source(
                config::File::from(config_dir.join("config.yaml"))
                    .format(config::FileFormat::Yaml)
                    .required(false),
            ),
        };

        builder = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX.as_str())
                    .try_parsing(true)
                    .source(env),
            )
            .add_source(args);

        let cfg: Self = builder.build()?.try_deserialize()?;
        debug!(?cfg, "configuration loaded");
        Ok(cfg)
    }

    /// Rejects settings that would make the service misbehave at runtime.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.collection_interval.is_zero(), "collection_interval must be greater than zero");
        ensure!(!self.fetch_timeout.is_zero(), "fetch_timeout must be greater than zero");
        ensure!(self.max_in_flight >= 1, "max_in_flight must be at least 1");
        ensure!(!self.database_url.trim().is_empty(), "database_url must not be empty");

        for seed in &self.clusters {
            ensure!(!seed.name.trim().is_empty(), "cluster seeds need a name");
            let url = url::Url::parse(seed.url.trim())
                .wrap_err_with(|| format!("cluster '{}' has an invalid url '{}'", seed.name, seed.url))?;
            ensure!(
                matches!(url.scheme(), "http" | "https"),
                "cluster '{}' must use http or https, got '{}'",
                seed.name,
                url.scheme()
            );
        }
        Ok(())
    }

    pub fn data_dir(&self) -> &Path {
        &self.app_config.data_dir
    }

    pub fn config_dir(&self) -> &Path {
        &self.app_config.config_dir
    }

    /// Where `config.yaml` is looked up when no `--config` is given.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir().join("config.yaml")
    }

    /// Creates the directory of a file-backed SQLite database.
    pub fn prepare_database_dir(&self) -> Result<()> {
        let Some(location) = self.database_url.strip_prefix("sqlite://") else {
            return Ok(());
        };
        let path = Path::new(location.split('?').next().unwrap_or_default());
        if path.as_os_str().is_empty() || path.starts_with(":memory:") {
            return Ok(());
        }
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create database directory {parent:?}"))?;
        }
        Ok(())
    }

    /// The effective configuration in the format of `config.yaml`.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yml::to_string(self).context("Failed to serialize config")
    }
}
