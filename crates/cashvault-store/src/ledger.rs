//! The coin ledger: per-wallet, per-address unspent outputs.
//!
//! Coins are created or overwritten only by [`UtxoLedger::upsert`] and
//! [`UtxoLedger::reconcile`], and removed only when a fresh network view no
//! longer contains them. There is no "mark spent" operation.
//!
//! Writes run inside one store batch and return [`StoreError`] after rolling
//! back. Reads never fail: a missing table or an undecodable row degrades to
//! an empty or token-less result and is logged.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use cashvault_core::types::{ContractBinding, Token, UtxoKey, UtxoRecord};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::schema::{CoinKey, Database, UtxoRow, coin_key};
use crate::store::Store;

/// Coins split by whether they carry tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenPartition {
    pub plain: Vec<UtxoRecord>,
    pub with_tokens: Vec<UtxoRecord>,
}

/// Stores, queries and reconciles wallet coins.
#[derive(Clone)]
pub struct UtxoLedger {
    store: Arc<Store>,
}

impl UtxoLedger {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Insert or replace coins keyed by `(wallet_id, tx_hash, tx_pos)`.
    pub fn upsert(&self, records: &[UtxoRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let rows = records.iter().map(UtxoRow::from_record).collect::<Result<Vec<_>, _>>()?;
        self.store.update(Database::utxos_mut, |utxos| {
            for row in rows {
                utxos.insert(row.key(), row);
            }
        })?;
        debug!(count = records.len(), "upserted coins");
        self.store.schedule_durable_save();
        Ok(())
    }

    /// Coins stored for one address of a wallet.
    pub fn query_by_address(&self, wallet_id: u64, address: &str) -> Vec<UtxoRecord> {
        self.query(wallet_id, |row| row.address == address)
    }

    /// Every coin stored for a wallet.
    pub fn query_by_wallet(&self, wallet_id: u64) -> Vec<UtxoRecord> {
        self.query(wallet_id, |_| true)
    }

    fn query(&self, wallet_id: u64, filter: impl Fn(&UtxoRow) -> bool) -> Vec<UtxoRecord> {
        let rows = self.store.read(|db| {
            Ok(db
                .utxos()?
                .values()
                .filter(|row| row.wallet_id == wallet_id && filter(row))
                .cloned()
                .collect::<Vec<_>>())
        });
        match rows {
            Ok(rows) => rows.into_iter().map(decode_row).collect(),
            Err(e) => {
                warn!(wallet_id, error = %e, "coin query failed");
                Vec::new()
            }
        }
    }

    /// Replace the stored coins of one address with `fresh`.
    ///
    /// Stored coins of `(wallet_id, address)` whose key is absent from `fresh`
    /// are deleted, then `fresh` is upserted, all in one batch.
    pub fn reconcile(&self, wallet_id: u64, address: &str, fresh: &[UtxoRecord]) -> Result<(), StoreError> {
        let rows = fresh.iter().map(UtxoRow::from_record).collect::<Result<Vec<_>, _>>()?;
        let keep: HashSet<CoinKey> = rows.iter().map(UtxoRow::key).collect();

        let removed = self.store.update(Database::utxos_mut, |utxos| {
            let before = utxos.len();
            utxos.retain(|key, row| row.wallet_id != wallet_id || row.address != address || keep.contains(key));
            let removed = before - utxos.len();
            for row in rows {
                utxos.insert(row.key(), row);
            }
            removed
        })?;
        debug!(wallet_id, address, removed, stored = fresh.len(), "reconciled coins");
        self.store.schedule_durable_save();
        Ok(())
    }

    /// Delete specific coins. Returns how many existed.
    pub fn delete(&self, wallet_id: u64, keys: &[UtxoKey]) -> Result<usize, StoreError> {
        let removed = self.store.update(Database::utxos_mut, |utxos| {
            keys.iter()
                .filter(|k| k.wallet_id == wallet_id)
                .filter(|k| utxos.remove(&coin_key(k)).is_some())
                .count()
        })?;
        if removed > 0 {
            self.store.schedule_durable_save();
        }
        Ok(removed)
    }

    /// Every address known for a wallet, from keys, addresses and coins.
    pub fn list_addresses(&self, wallet_id: u64) -> Vec<String> {
        let res = self.store.read(|db| {
            let mut out = BTreeSet::new();
            match db.keys() {
                Ok(keys) => out.extend(keys.values().filter(|k| k.wallet_id == wallet_id).map(|k| k.address.clone())),
                Err(e) => warn!(error = %e, "skipping keys table"),
            }
            match db.addresses() {
                Ok(addrs) => out.extend(addrs.values().filter(|a| a.wallet_id == wallet_id).map(|a| a.address.clone())),
                Err(e) => warn!(error = %e, "skipping addresses table"),
            }
            match db.utxos() {
                Ok(utxos) => out.extend(utxos.values().filter(|u| u.wallet_id == wallet_id).map(|u| u.address.clone())),
                Err(e) => warn!(error = %e, "skipping utxos table"),
            }
            Ok(out)
        });
        match res {
            Ok(set) => set.into_iter().collect(),
            Err(e) => {
                warn!(wallet_id, error = %e, "address listing failed");
                Vec::new()
            }
        }
    }

    /// Total satoshis stored for an address.
    pub fn balance(&self, wallet_id: u64, address: &str) -> u64 {
        self.query_by_address(wallet_id, address).iter().map(|u| u.amount).sum()
    }

    /// Split coins into plain and token-bearing sets, preserving order.
    pub fn partition_by_token(records: Vec<UtxoRecord>) -> TokenPartition {
        let (with_tokens, plain): (Vec<_>, Vec<_>) = records.into_iter().partition(|u| u.token.is_some());
        TokenPartition { plain, with_tokens }
    }
}

fn decode_row(row: UtxoRow) -> UtxoRecord {
    let token = row.token.as_deref().and_then(|json| decode_token(&row, json));
    let contract = row.contract.as_deref().and_then(|json| {
        serde_json::from_str::<ContractBinding>(json)
            .inspect_err(|e| warn!(tx_hash = %row.tx_hash, tx_pos = row.tx_pos, error = %e, "dropping malformed contract binding"))
            .ok()
    });
    UtxoRecord {
        wallet_id: row.wallet_id,
        address: row.address,
        token_address: row.token_address,
        height: row.height,
        tx_hash: row.tx_hash,
        tx_pos: row.tx_pos,
        amount: row.amount,
        prefix: row.prefix,
        token,
        contract,
    }
}

fn decode_token(row: &UtxoRow, json: &str) -> Option<Token> {
    let token = match serde_json::from_str::<Token>(json) {
        Ok(t) => t.normalized(),
        Err(e) => {
            warn!(tx_hash = %row.tx_hash, tx_pos = row.tx_pos, error = %e, "dropping malformed token data");
            return None;
        }
    };
    if !token.is_well_formed() {
        warn!(tx_hash = %row.tx_hash, tx_pos = row.tx_pos, "token has both or neither of amount and nft");
        return None;
    }
    Some(token)
}
