//! Engine configuration: an optional TOML file, then `CASHVAULT_*`
//! environment variables, then command-line flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cashvault_core::constants::Network;
use cashvault_store::StoreConfig;
use cashvault_wallet::ComposerConfig;
use serde::{Deserialize, Serialize};

/// Prefix of environment overrides, e.g. `CASHVAULT_NETWORK=chipnet` or
/// `CASHVAULT_STORE__SAVE_DEBOUNCE_MS=100`.
pub const ENV_PREFIX: &str = "CASHVAULT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub network: Network,
    /// Root for persistent data; defaults to the platform data dir.
    pub data_dir: Option<PathBuf>,
    /// Log level filter string (e.g. "info", "cashvault_store=debug").
    pub log_level: String,
    /// "text" or "json".
    pub log_format: String,
    pub store: StoreConfig,
    pub composer: ComposerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            data_dir: None,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            store: StoreConfig::default(),
            composer: ComposerConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Read `path` (if given) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("failed to read configuration")?;
        settings.try_deserialize().context("invalid configuration")
    }

    /// Data directory, per network unless configured explicitly.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("cashvault")
                .join(self.network.name())
        })
    }

    /// RocksDB directory holding the store snapshot.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir().join("snapshots")
    }
}
