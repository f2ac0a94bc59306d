use std::{
    env::var,
    path::PathBuf,
    sync::LazyLock,
    time::Duration,
};

use beacon_deposit::constants::DEFAULT_INDEXER_HOST;
use config::{Config, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Environment variable pointing at an alternative config file.
pub(crate) const CONFIG_FILE_ENV: &str = "BEACON_DEPOSIT_CONFIG";

/// Prefix of environment variables overriding individual settings.
const ENV_PREFIX: &str = "BEACON_DEPOSIT";

const DEFAULT_RPC_ENDPOINT: &str = "http://localhost:8545";
const DEFAULT_INDEXER_TIMEOUT_SECS: u64 = 30;

/// Settings deserialized from the config file and environment.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct SettingsFromFile {
    /// Execution client JSON-RPC endpoint.
    pub(crate) rpc_endpoint: Option<String>,
    /// Host serving the deposit indexer subgraphs.
    pub(crate) indexer_host: Option<String>,
    /// Timeout for a single indexer request, in seconds.
    pub(crate) indexer_timeout_secs: Option<u64>,
    /// Network used when neither `--network` nor `--address` is given.
    pub(crate) default_network: Option<String>,
    /// Emit logs as JSON.
    pub(crate) json_logs: Option<bool>,
}

/// Settings filled with either config values or defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Settings {
    pub(crate) rpc_endpoint: String,
    pub(crate) indexer_host: String,
    pub(crate) indexer_timeout: Duration,
    pub(crate) default_network: Option<String>,
    pub(crate) json_logs: bool,
    pub(crate) config_file: Option<PathBuf>,
}

pub(crate) static PROJ_DIRS: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("io", "beacon", "beacon-deposit"));

pub(crate) static CONFIG_FILE: LazyLock<Option<PathBuf>> =
    LazyLock::new(|| match var(CONFIG_FILE_ENV).ok() {
        Some(path) => Some(PathBuf::from(path)),
        None => PROJ_DIRS
            .as_ref()
            .map(|dirs| dirs.config_dir().join("config.toml")),
    });

impl Settings {
    /// Loads settings from the config file, if present, layered under the environment.
    pub(crate) fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(CONFIG_FILE.clone())
    }

    fn load_from(config_file: Option<PathBuf>) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = &config_file {
            builder = builder.add_source(config::File::from(path.as_path()).required(false));
        }
        let from_file: SettingsFromFile = builder
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()?;

        Ok(Self::from_file(from_file, config_file))
    }

    fn from_file(from_file: SettingsFromFile, config_file: Option<PathBuf>) -> Self {
        Settings {
            rpc_endpoint: from_file
                .rpc_endpoint
                .unwrap_or_else(|| DEFAULT_RPC_ENDPOINT.to_owned()),
            indexer_host: from_file
                .indexer_host
                .unwrap_or_else(|| DEFAULT_INDEXER_HOST.to_owned()),
            indexer_timeout: Duration::from_secs(
                from_file
                    .indexer_timeout_secs
                    .unwrap_or(DEFAULT_INDEXER_TIMEOUT_SECS),
            ),
            default_network: from_file.default_network,
            json_logs: from_file.json_logs.unwrap_or(false),
            config_file,
        }
    }
}
