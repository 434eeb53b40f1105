//! Table layout of the embedded database.
//!
//! Every table is an ordered map keyed by its unique constraint. A table is
//! `None` until the migration that creates it has run, so writes against a
//! missing table fail with [`StoreError::MissingTable`] instead of silently
//! creating it.

use std::collections::BTreeMap;

use bincode::{Decode, Encode};
use cashvault_core::types::{AddressRecord, KeyRecord, PrivateKey, UtxoKey, UtxoRecord, WalletRecord};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// `(wallet_id, address)`
pub type AddressKey = (u64, String);
/// `(wallet_id, tx_hash, tx_pos)`
pub type CoinKey = (u64, String, u32);
/// `(wallet_id, tx_hash)`
pub type TxKey = (u64, String);

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct WalletRow {
    pub id: u64,
    pub name: String,
    pub network: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct KeyRow {
    pub wallet_id: u64,
    pub address: String,
    pub token_address: String,
    pub account_index: u32,
    pub change_index: u32,
    pub address_index: u32,
    pub public_key: Vec<u8>,
    pub private_key: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct AddressRow {
    pub wallet_id: u64,
    pub address: String,
    pub token_address: Option<String>,
    pub balance: u64,
    pub hd_index: u32,
    pub change_index: u32,
    pub prefix: String,
}

/// A stored coin. Token data and contract binding are kept as JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct UtxoRow {
    pub wallet_id: u64,
    pub address: String,
    pub token_address: Option<String>,
    pub height: u64,
    pub tx_hash: String,
    pub tx_pos: u32,
    pub amount: u64,
    pub prefix: String,
    pub token: Option<String>,
    pub contract: Option<String>,
}

/// One wallet transaction. `amount` is not derived from history and stays 0
/// until something computes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct TransactionRow {
    pub wallet_id: u64,
    pub tx_hash: String,
    pub height: i64,
    /// Unix seconds of the last refresh that observed this transaction.
    pub timestamp: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ContractArtifactRow {
    pub contract_name: String,
    /// Compiled artifact as JSON.
    pub artifact: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ContractAddressRow {
    pub address: String,
    pub token_address: String,
    pub contract_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct InstantiatedContractRow {
    pub address: String,
    pub contract_name: String,
    /// Constructor arguments as JSON.
    pub constructor_args: String,
    pub balance: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct TokenRegistryRow {
    pub uri: String,
    pub registry_json: String,
    pub fetched_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct TokenCategoryRow {
    pub category: String,
    pub registry_uri: String,
}

/// Cached display metadata of a token category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct TokenMetadataRow {
    pub category: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub icon_uri: Option<String>,
    pub updated_at: i64,
}

/// The whole database: schema version plus every table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct Database {
    pub user_version: u32,
    pub wallets: Option<BTreeMap<u64, WalletRow>>,
    pub keys: Option<BTreeMap<AddressKey, KeyRow>>,
    pub addresses: Option<BTreeMap<AddressKey, AddressRow>>,
    pub utxos: Option<BTreeMap<CoinKey, UtxoRow>>,
    pub transactions: Option<BTreeMap<TxKey, TransactionRow>>,
    pub contract_artifacts: Option<BTreeMap<String, ContractArtifactRow>>,
    pub contract_addresses: Option<BTreeMap<String, ContractAddressRow>>,
    pub instantiated_contracts: Option<BTreeMap<String, InstantiatedContractRow>>,
    pub token_registries: Option<BTreeMap<String, TokenRegistryRow>>,
    pub token_categories: Option<BTreeMap<String, TokenCategoryRow>>,
    pub token_metadata: Option<BTreeMap<String, TokenMetadataRow>>,
}

macro_rules! table_accessors {
    ($($field:ident, $field_mut:ident: $key:ty => $row:ty;)*) => {
        impl Database {
            $(
                pub fn $field(&self) -> Result<&BTreeMap<$key, $row>, StoreError> {
                    self.$field.as_ref().ok_or(StoreError::MissingTable(stringify!($field)))
                }

                pub fn $field_mut(&mut self) -> Result<&mut BTreeMap<$key, $row>, StoreError> {
                    self.$field.as_mut().ok_or(StoreError::MissingTable(stringify!($field)))
                }
            )*

            /// Names of the tables that currently exist.
            pub fn table_names(&self) -> Vec<&'static str> {
                let mut names = Vec::new();
                $(
                    if self.$field.is_some() {
                        names.push(stringify!($field));
                    }
                )*
                names
            }

            /// Drop every table and reset the schema version.
            pub fn drop_all(&mut self) {
                $(self.$field = None;)*
                self.user_version = 0;
            }
        }
    };
}

table_accessors! {
    wallets, wallets_mut: u64 => WalletRow;
    keys, keys_mut: AddressKey => KeyRow;
    addresses, addresses_mut: AddressKey => AddressRow;
    utxos, utxos_mut: CoinKey => UtxoRow;
    transactions, transactions_mut: TxKey => TransactionRow;
    contract_artifacts, contract_artifacts_mut: String => ContractArtifactRow;
    contract_addresses, contract_addresses_mut: String => ContractAddressRow;
    instantiated_contracts, instantiated_contracts_mut: String => InstantiatedContractRow;
    token_registries, token_registries_mut: String => TokenRegistryRow;
    token_categories, token_categories_mut: String => TokenCategoryRow;
    token_metadata, token_metadata_mut: String => TokenMetadataRow;
}

impl UtxoRow {
    pub fn from_record(record: &UtxoRecord) -> Result<Self, StoreError> {
        let token = record.token.as_ref().map(serde_json::to_string).transpose()?;
        let contract = record.contract.as_ref().map(serde_json::to_string).transpose()?;
        Ok(Self {
            wallet_id: record.wallet_id,
            address: record.address.clone(),
            token_address: record.token_address.clone(),
            height: record.height,
            tx_hash: record.tx_hash.clone(),
            tx_pos: record.tx_pos,
            amount: record.amount,
            prefix: record.prefix.clone(),
            token,
            contract,
        })
    }

    pub fn key(&self) -> CoinKey {
        (self.wallet_id, self.tx_hash.clone(), self.tx_pos)
    }
}

/// Table key of a coin identity.
pub fn coin_key(key: &UtxoKey) -> CoinKey {
    (key.wallet_id, key.tx_hash.clone(), key.tx_pos)
}

impl From<&WalletRecord> for WalletRow {
    fn from(w: &WalletRecord) -> Self {
        Self {
            id: w.id,
            name: w.name.clone(),
            network: w.network.name().to_string(),
        }
    }
}

impl From<&AddressRecord> for AddressRow {
    fn from(a: &AddressRecord) -> Self {
        Self {
            wallet_id: a.wallet_id,
            address: a.address.clone(),
            token_address: a.token_address.clone(),
            balance: a.balance,
            hd_index: a.hd_index,
            change_index: a.change_index,
            prefix: a.prefix.clone(),
        }
    }
}

impl From<AddressRow> for AddressRecord {
    fn from(a: AddressRow) -> Self {
        Self {
            wallet_id: a.wallet_id,
            address: a.address,
            token_address: a.token_address,
            balance: a.balance,
            hd_index: a.hd_index,
            change_index: a.change_index,
            prefix: a.prefix,
        }
    }
}

impl From<&KeyRecord> for KeyRow {
    fn from(k: &KeyRecord) -> Self {
        Self {
            wallet_id: k.wallet_id,
            address: k.address.clone(),
            token_address: k.token_address.clone(),
            account_index: k.account_index,
            change_index: k.change_index,
            address_index: k.address_index,
            public_key: k.public_key.clone(),
            private_key: k.private_key.as_bytes().to_vec(),
        }
    }
}

impl From<KeyRow> for KeyRecord {
    fn from(k: KeyRow) -> Self {
        Self {
            wallet_id: k.wallet_id,
            address: k.address,
            token_address: k.token_address,
            account_index: k.account_index,
            change_index: k.change_index,
            address_index: k.address_index,
            public_key: k.public_key,
            private_key: PrivateKey::new(k.private_key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_has_no_tables() {
        let db = Database::default();
        assert!(db.table_names().is_empty());
        assert_eq!(db.utxos().unwrap_err(), StoreError::MissingTable("utxos"));
    }

    #[test]
    fn drop_all_clears_tables_and_version() {
        let mut db = Database {
            user_version: 2,
            utxos: Some(BTreeMap::new()),
            wallets: Some(BTreeMap::new()),
            ..Default::default()
        };
        assert_eq!(db.table_names(), vec!["wallets", "utxos"]);
        db.drop_all();
        assert!(db.table_names().is_empty());
        assert_eq!(db.user_version, 0);
    }

    #[test]
    fn utxo_row_keeps_token_as_json() {
        let record = UtxoRecord {
            wallet_id: 1,
            address: "bchtest:qa".into(),
            token_address: Some("bchtest:za".into()),
            height: 10,
            tx_hash: "aa".into(),
            tx_pos: 2,
            amount: 1000,
            prefix: "bchtest".into(),
            token: Some(cashvault_core::types::Token::fungible("c1", 5)),
            contract: None,
        };
        let row = UtxoRow::from_record(&record).unwrap();
        assert_eq!(row.token.as_deref(), Some(r#"{"category":"c1","amount":5}"#));
        assert_eq!(row.key(), (1, "aa".to_string(), 2));
        assert!(row.contract.is_none());
    }
}
