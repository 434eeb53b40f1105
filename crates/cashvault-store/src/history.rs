//! Wallet transaction history.

use std::sync::Arc;

use cashvault_core::types::HistoryEntry;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::schema::{Database, TransactionRow};
use crate::store::Store;

#[derive(Clone)]
pub struct TransactionHistory {
    store: Arc<Store>,
}

impl TransactionHistory {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Record history entries observed at `seen_at`, in one batch.
    ///
    /// New transactions are inserted with amount 0. Known ones get their
    /// height and timestamp updated; their amount is left alone.
    pub fn record(&self, wallet_id: u64, entries: &[HistoryEntry], seen_at: DateTime<Utc>) -> Result<usize, StoreError> {
        let timestamp = seen_at.timestamp();
        let inserted = self.store.update(Database::transactions_mut, |txs| {
            let mut inserted = 0;
            for entry in entries {
                txs.entry((wallet_id, entry.tx_hash.clone()))
                    .and_modify(|row| {
                        row.height = entry.height;
                        row.timestamp = timestamp;
                    })
                    .or_insert_with(|| {
                        inserted += 1;
                        TransactionRow {
                            wallet_id,
                            tx_hash: entry.tx_hash.clone(),
                            height: entry.height,
                            timestamp,
                            amount: 0,
                        }
                    });
            }
            inserted
        })?;
        debug!(wallet_id, total = entries.len(), inserted, "recorded history");
        self.store.schedule_durable_save();
        Ok(inserted)
    }

    /// History of a wallet, highest block first; unconfirmed entries lead.
    pub fn entries(&self, wallet_id: u64) -> Vec<TransactionRow> {
        let rows = self.store.read(|db| {
            Ok(db
                .transactions()?
                .values()
                .filter(|t| t.wallet_id == wallet_id)
                .cloned()
                .collect::<Vec<_>>())
        });
        match rows {
            Ok(mut rows) => {
                rows.sort_by_key(|t| if t.height <= 0 { i64::MAX } else { t.height });
                rows.reverse();
                rows
            }
            Err(e) => {
                warn!(wallet_id, error = %e, "history query failed");
                Vec::new()
            }
        }
    }
}
