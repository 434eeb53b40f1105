//! Collaborator interfaces.
//!
//! The ledger and composer never touch key derivation, contract compilation
//! or network transport directly. They talk to these traits instead:
//! - [`KeyManager`]: private keys and derived key records
//! - [`ContractProvider`]: deployed contract instances and their unlockers
//! - [`NetworkProvider`]: coin lookups, history, block height, broadcast
//! - [`SigningProvider`]: secp256k1 public key derivation and signing
//! - [`ScriptUnlocker`]: produces unlocking bytecode for one input

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ContractError, KeyError, NetworkError, SigningError};
use crate::transaction::InputContext;
use crate::types::{ContractArgs, ContractInstance, HistoryEntry, KeyRecord, NetworkUtxo, PrivateKey, UtxoRecord};

/// Access to wallet key material.
#[async_trait]
pub trait KeyManager: Send + Sync {
    /// Private key controlling `address`. `Ok(None)` when the address is not ours.
    async fn fetch_private_key(&self, address: &str) -> Result<Option<PrivateKey>, KeyError>;

    /// All key records of a wallet.
    async fn retrieve_keys(&self, wallet_id: u64) -> Result<Vec<KeyRecord>, KeyError>;

    /// Derive and persist a new key record.
    async fn create_keys(
        &self,
        wallet_id: u64,
        account_index: u32,
        change_index: u32,
        address_index: u32,
    ) -> Result<KeyRecord, KeyError>;
}

/// Produces unlocking bytecode for a single input.
pub trait ScriptUnlocker: Send + Sync {
    fn unlocking_bytecode(&self, ctx: &InputContext<'_>) -> Result<Vec<u8>, ContractError>;
}

/// Deployed-contract lookups.
#[async_trait]
pub trait ContractProvider: Send + Sync {
    /// The contract instance living at `address`.
    async fn instance_by_address(&self, address: &str) -> Result<ContractInstance, ContractError>;

    /// An unlocker that spends `utxo` through `function` with `args`.
    async fn unlocker(
        &self,
        utxo: &UtxoRecord,
        function: &str,
        args: &ContractArgs,
    ) -> Result<Arc<dyn ScriptUnlocker>, ContractError>;
}

/// Blockchain indexer and relay.
#[async_trait]
pub trait NetworkProvider: Send + Sync {
    async fn utxos(&self, address: &str) -> Result<Vec<NetworkUtxo>, NetworkError>;

    async fn transaction_history(&self, address: &str) -> Result<Vec<HistoryEntry>, NetworkError>;

    /// Current chain tip height.
    async fn block_height(&self) -> Result<u32, NetworkError>;

    /// Broadcast a raw transaction; returns its id.
    async fn send_raw_transaction(&self, tx_hex: &str) -> Result<String, NetworkError>;
}

/// secp256k1 operations.
pub trait SigningProvider: Send + Sync {
    /// Compressed public key for `private_key`.
    fn public_key(&self, private_key: &PrivateKey) -> Result<Vec<u8>, SigningError>;

    /// Signature over a 32-byte digest (Schnorr or DER ECDSA).
    fn sign_digest(&self, private_key: &PrivateKey, digest: &[u8; 32]) -> Result<Vec<u8>, SigningError>;
}
