//! Ordered schema migrations.
//!
//! Migration `i` (zero-based) moves the database from version `i` to `i + 1`.
//! Steps only create tables that are missing, so re-running one after an
//! interrupted start is harmless.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::error::StoreError;
use crate::schema::Database;

pub type Migration = fn(&mut Database) -> Result<(), StoreError>;

/// All migrations in application order.
pub const MIGRATIONS: &[Migration] = &[create_wallet_tables, create_token_tables];

/// Schema version reached once every migration has run.
pub fn target_version() -> u32 {
    MIGRATIONS.len() as u32
}

/// v1: wallets, keys, addresses, coins, history and contract bookkeeping.
fn create_wallet_tables(db: &mut Database) -> Result<(), StoreError> {
    db.wallets.get_or_insert_with(BTreeMap::new);
    db.keys.get_or_insert_with(BTreeMap::new);
    db.addresses.get_or_insert_with(BTreeMap::new);
    db.utxos.get_or_insert_with(BTreeMap::new);
    db.transactions.get_or_insert_with(BTreeMap::new);
    db.contract_artifacts.get_or_insert_with(BTreeMap::new);
    db.contract_addresses.get_or_insert_with(BTreeMap::new);
    db.instantiated_contracts.get_or_insert_with(BTreeMap::new);
    Ok(())
}

/// v2: token registry and metadata cache.
fn create_token_tables(db: &mut Database) -> Result<(), StoreError> {
    db.token_registries.get_or_insert_with(BTreeMap::new);
    db.token_categories.get_or_insert_with(BTreeMap::new);
    db.token_metadata.get_or_insert_with(BTreeMap::new);
    Ok(())
}

/// Apply every migration above the current version, in order.
///
/// Returns the number of steps applied. On failure the version stays at the
/// last successful step.
pub fn apply(db: &mut Database) -> Result<u32, StoreError> {
    apply_steps(db, MIGRATIONS)
}

pub(crate) fn apply_steps(db: &mut Database, steps: &[Migration]) -> Result<u32, StoreError> {
    let target = steps.len() as u32;
    let current = db.user_version;
    if current > target {
        warn!(current, target, "database is newer than this build; leaving schema untouched");
        return Ok(0);
    }

    let mut applied = 0;
    for (idx, step) in steps.iter().enumerate().skip(current as usize) {
        let version = idx as u32 + 1;
        step(db).map_err(|e| StoreError::Migration {
            version,
            reason: e.to_string(),
        })?;
        db.user_version = version;
        applied += 1;
        info!(version, "applied schema migration");
    }
    Ok(applied)
}
