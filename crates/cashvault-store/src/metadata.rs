//! Cache of token display metadata, keyed by category.
//!
//! Resolving metadata from a registry happens elsewhere; this only stores
//! what was resolved so later sessions can render it offline.

use std::sync::Arc;

use tracing::warn;

use crate::error::StoreError;
use crate::schema::{Database, TokenMetadataRow};
use crate::store::Store;

pub type TokenMetadata = TokenMetadataRow;

#[derive(Clone)]
pub struct TokenMetadataCache {
    store: Arc<Store>,
}

impl TokenMetadataCache {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn put(&self, metadata: TokenMetadata) -> Result<(), StoreError> {
        self.store.update(Database::token_metadata_mut, |table| {
            table.insert(metadata.category.clone(), metadata);
        })?;
        self.store.schedule_durable_save();
        Ok(())
    }

    pub fn get(&self, category: &str) -> Option<TokenMetadata> {
        self.store
            .read(|db| Ok(db.token_metadata()?.get(category).cloned()))
            .unwrap_or_else(|e| {
                warn!(category, error = %e, "token metadata lookup failed");
                None
            })
    }
}
