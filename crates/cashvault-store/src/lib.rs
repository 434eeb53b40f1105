//! # cashvault-store
//! Schema-versioned embedded store with debounced snapshots, and the wallet
//! tables built on it: coin ledger, address directory, transaction history
//! and token metadata cache.

pub mod config;
pub mod directory;
pub mod error;
pub mod history;
pub mod ledger;
pub mod metadata;
pub mod migrations;
pub mod schema;
pub mod snapshot;
pub mod store;

pub use config::StoreConfig;
pub use directory::AddressDirectory;
pub use error::StoreError;
pub use history::TransactionHistory;
pub use ledger::{TokenPartition, UtxoLedger};
pub use metadata::{TokenMetadata, TokenMetadataCache};
pub use snapshot::{MemorySnapshotStorage, RocksSnapshotStorage, SnapshotStorage};
pub use store::{PendingSave, Store};
