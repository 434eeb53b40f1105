//! cashvault: inspect and maintain a Cashvault wallet store.
//!
//! Opens the RocksDB-backed snapshot store, migrating it on first use, and
//! reports wallets, addresses, coins and history as JSON.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use cashvault_core::constants::Network;
use cashvault_store::{AddressDirectory, RocksSnapshotStorage, Store, TransactionHistory, UtxoLedger};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use crate::config::EngineConfig;

/// Cashvault wallet store tool.
#[derive(Parser, Debug)]
#[command(name = "cashvault", version, about = "Inspect and maintain a Cashvault wallet store")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides configuration)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Network: mainnet, chipnet or testnet
    #[arg(long, global = true, value_parser = parse_network)]
    network: Option<Network>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show schema version and known wallets.
    Status,
    /// List every address known for a wallet.
    Addresses {
        #[arg(long)]
        wallet: u64,
    },
    /// List stored coins of a wallet, optionally for one address.
    Utxos {
        #[arg(long)]
        wallet: u64,
        #[arg(long)]
        address: Option<String>,
    },
    /// Show recorded transaction history of a wallet.
    History {
        #[arg(long)]
        wallet: u64,
    },
    /// Drop every table and re-run migrations.
    Reset {
        /// Confirm the wipe.
        #[arg(long)]
        yes: bool,
    },
}

fn parse_network(s: &str) -> Result<Network, String> {
    Network::from_name(s).ok_or_else(|| format!("unknown network: {s}"))
}

impl Cli {
    /// Configuration file and environment, with flags applied on top.
    fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = EngineConfig::load(self.config.as_deref())?;
        if let Some(network) = self.network {
            config.network = network;
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = Some(dir.clone());
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.log_format = format.clone();
        }
        Ok(config)
    }
}

#[derive(Serialize)]
struct Status {
    network: &'static str,
    data_dir: PathBuf,
    schema_version: u32,
    wallets: Vec<WalletStatus>,
}

#[derive(Serialize)]
struct WalletStatus {
    id: u64,
    name: String,
    network: &'static str,
    addresses: usize,
    utxos: usize,
    balance: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.engine_config()?;
    init_logging(&config.log_level, &config.log_format);

    let store = open_store(&config)?;
    run(cli.command, &config, &store)?;
    store.flush().context("failed to write snapshot")?;
    Ok(())
}

fn open_store(config: &EngineConfig) -> Result<Arc<Store>> {
    let db_path = config.db_path();
    std::fs::create_dir_all(&db_path).with_context(|| format!("failed to create {}", db_path.display()))?;
    let storage = RocksSnapshotStorage::open(&db_path).context("failed to open snapshot storage")?;
    let store = Arc::new(Store::new(Arc::new(storage), config.store.clone()));
    store.ensure_started().context("failed to start store")?;
    info!(network = config.network.name(), path = %db_path.display(), "store opened");
    Ok(store)
}

fn run(command: Command, config: &EngineConfig, store: &Arc<Store>) -> Result<()> {
    let ledger = UtxoLedger::new(store.clone());
    match command {
        Command::Status => {
            let directory = AddressDirectory::new(store.clone());
            let wallets = directory
                .wallets()
                .into_iter()
                .map(|w| {
                    let utxos = ledger.query_by_wallet(w.id);
                    WalletStatus {
                        id: w.id,
                        name: w.name,
                        network: w.network.name(),
                        addresses: ledger.list_addresses(w.id).len(),
                        balance: utxos.iter().map(|u| u.amount).sum(),
                        utxos: utxos.len(),
                    }
                })
                .collect();
            print_json(&Status {
                network: config.network.name(),
                data_dir: config.data_dir(),
                schema_version: store.schema_version()?,
                wallets,
            })
        }
        Command::Addresses { wallet } => print_json(&ledger.list_addresses(wallet)),
        Command::Utxos { wallet, address } => {
            let utxos = match address {
                Some(address) => ledger.query_by_address(wallet, &address),
                None => ledger.query_by_wallet(wallet),
            };
            print_json(&utxos)
        }
        Command::History { wallet } => print_json(&TransactionHistory::new(store.clone()).entries(wallet)),
        Command::Reset { yes } => {
            if !yes {
                bail!("reset wipes every wallet table; pass --yes to confirm");
            }
            store.reset()?;
            info!(version = store.schema_version()?, "store reset");
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Initialize the tracing subscriber with the given log level and format.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    // Logs go to stderr so JSON output on stdout stays parseable.
    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init();
    }
}
