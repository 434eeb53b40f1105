//! Refreshing the local ledger from the network.
//!
//! Every refresh treats the network's answer as authoritative for one
//! address. Failures are logged and leave the stored state untouched.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use cashvault_core::constants::Network;
use cashvault_core::traits::NetworkProvider;
use cashvault_core::types::{NetworkUtxo, UtxoKey, UtxoRecord};
use cashvault_store::{AddressDirectory, TokenPartition, TransactionHistory, UtxoLedger};
use chrono::Utc;
use tracing::{debug, error, warn};

pub struct LedgerSync {
    network: Network,
    provider: Arc<dyn NetworkProvider>,
    ledger: UtxoLedger,
    directory: AddressDirectory,
    history: TransactionHistory,
}

impl LedgerSync {
    pub fn new(
        network: Network,
        provider: Arc<dyn NetworkProvider>,
        ledger: UtxoLedger,
        directory: AddressDirectory,
        history: TransactionHistory,
    ) -> Self {
        Self {
            network,
            provider,
            ledger,
            directory,
            history,
        }
    }

    /// Replace the stored coins of `address` with the network's view and
    /// return what is stored afterwards. Empty on failure.
    ///
    /// Contract bindings of coins that survive the refresh are kept.
    pub async fn refresh_address(&self, wallet_id: u64, address: &str) -> Vec<UtxoRecord> {
        let remote = match self.provider.utxos(address).await {
            Ok(remote) => remote,
            Err(e) => {
                warn!(wallet_id, address, error = %e, "utxo fetch failed");
                return Vec::new();
            }
        };

        let token_address = self.directory.resolve(wallet_id, address);
        let bindings: HashMap<UtxoKey, _> = self
            .ledger
            .query_by_address(wallet_id, address)
            .into_iter()
            .filter_map(|u| Some((u.key(), u.contract?)))
            .collect();

        let fresh: Vec<UtxoRecord> = remote
            .into_iter()
            .map(|coin| {
                let mut record = self.to_record(wallet_id, address, token_address.clone(), coin);
                record.contract = bindings.get(&record.key()).cloned();
                record
            })
            .collect();

        if let Err(e) = self.ledger.reconcile(wallet_id, address, &fresh) {
            error!(wallet_id, address, error = %e, "utxo reconcile failed");
            return Vec::new();
        }
        debug!(wallet_id, address, count = fresh.len(), "address refreshed");
        self.ledger.query_by_address(wallet_id, address)
    }

    fn to_record(&self, wallet_id: u64, address: &str, token_address: Option<String>, coin: NetworkUtxo) -> UtxoRecord {
        UtxoRecord {
            wallet_id,
            address: address.to_string(),
            token_address,
            height: coin.height.max(0) as u64,
            tx_hash: coin.tx_hash,
            tx_pos: coin.tx_pos,
            amount: coin.value,
            prefix: self.network.prefix().to_string(),
            token: coin.token.map(|t| t.normalized()),
            contract: None,
        }
    }

    /// Record the transaction history of `address`. Returns how many
    /// transactions were new; 0 on failure.
    pub async fn refresh_history(&self, wallet_id: u64, address: &str) -> usize {
        let entries = match self.provider.transaction_history(address).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(wallet_id, address, error = %e, "history fetch failed");
                return 0;
            }
        };
        match self.history.record(wallet_id, &entries, Utc::now()) {
            Ok(inserted) => inserted,
            Err(e) => {
                error!(wallet_id, address, error = %e, "history update failed");
                0
            }
        }
    }

    /// Stored coins of each address, split into plain and token-bearing.
    pub fn load_utxo_maps(&self, wallet_id: u64, addresses: &[String]) -> BTreeMap<String, TokenPartition> {
        addresses
            .iter()
            .map(|address| {
                let coins = self.ledger.query_by_address(wallet_id, address);
                (address.clone(), UtxoLedger::partition_by_token(coins))
            })
            .collect()
    }
}
