//! Wallet, key and address lookups.
//!
//! The key manager persists derived keys into the `keys` table; the
//! directory reads them back to map a wallet address to its token-aware
//! counterpart.

use std::sync::Arc;

use cashvault_core::constants::Network;
use cashvault_core::types::{AddressRecord, KeyRecord, WalletRecord};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::schema::{AddressRow, KeyRow, WalletRow};
use crate::store::Store;

#[derive(Clone)]
pub struct AddressDirectory {
    store: Arc<Store>,
}

impl AddressDirectory {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Token-aware address paired with `address` in the wallet's keys.
    ///
    /// Any lookup failure yields `None`.
    pub fn resolve(&self, wallet_id: u64, address: &str) -> Option<String> {
        let found = self.store.read(|db| {
            Ok(db
                .keys()?
                .get(&(wallet_id, address.to_string()))
                .map(|k| k.token_address.clone()))
        });
        match found {
            Ok(Some(token_address)) if !token_address.is_empty() => Some(token_address),
            Ok(_) => {
                debug!(wallet_id, address, "no token address on record");
                None
            }
            Err(e) => {
                warn!(wallet_id, address, error = %e, "token address lookup failed");
                None
            }
        }
    }

    pub fn register_wallet(&self, wallet: &WalletRecord) -> Result<(), StoreError> {
        let row = WalletRow::from(wallet);
        self.store.batch(|db| {
            db.wallets_mut()?.insert(row.id, row);
            Ok(())
        })?;
        self.store.schedule_durable_save();
        Ok(())
    }

    /// Registered wallets. An unrecognised network name reads as mainnet.
    pub fn wallets(&self) -> Vec<WalletRecord> {
        let rows = self.store.read(|db| Ok(db.wallets()?.values().cloned().collect::<Vec<_>>()));
        match rows {
            Ok(rows) => rows
                .into_iter()
                .map(|w| {
                    let network = Network::from_name(&w.network).unwrap_or_else(|| {
                        warn!(wallet_id = w.id, network = %w.network, "unknown network name");
                        Network::default()
                    });
                    WalletRecord {
                        id: w.id,
                        name: w.name,
                        network,
                    }
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "wallet listing failed");
                Vec::new()
            }
        }
    }

    /// Persist a derived key record, replacing one for the same address.
    pub fn register_key(&self, key: &KeyRecord) -> Result<(), StoreError> {
        let row = KeyRow::from(key);
        self.store.batch(|db| {
            db.keys_mut()?.insert((row.wallet_id, row.address.clone()), row);
            Ok(())
        })?;
        self.store.schedule_durable_save();
        Ok(())
    }

    pub fn keys(&self, wallet_id: u64) -> Vec<KeyRecord> {
        self.store
            .read(|db| {
                Ok(db
                    .keys()?
                    .values()
                    .filter(|k| k.wallet_id == wallet_id)
                    .cloned()
                    .map(KeyRecord::from)
                    .collect())
            })
            .unwrap_or_else(|e| {
                warn!(wallet_id, error = %e, "key listing failed");
                Vec::new()
            })
    }

    pub fn register_address(&self, record: &AddressRecord) -> Result<(), StoreError> {
        let row = AddressRow::from(record);
        self.store.batch(|db| {
            db.addresses_mut()?.insert((row.wallet_id, row.address.clone()), row);
            Ok(())
        })?;
        debug!(wallet_id = record.wallet_id, address = %record.address, "registered address");
        self.store.schedule_durable_save();
        Ok(())
    }

    pub fn addresses(&self, wallet_id: u64) -> Vec<AddressRecord> {
        self.store
            .read(|db| {
                Ok(db
                    .addresses()?
                    .values()
                    .filter(|a| a.wallet_id == wallet_id)
                    .cloned()
                    .map(AddressRecord::from)
                    .collect())
            })
            .unwrap_or_else(|e| {
                warn!(wallet_id, error = %e, "address listing failed");
                Vec::new()
            })
    }
}
