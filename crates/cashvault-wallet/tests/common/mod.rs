//! Hand-written collaborators shared by the wallet integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cashvault_core::address::{AddressKind, CashAddress};
use cashvault_core::error::{ContractError, KeyError, NetworkError, SigningError};
use cashvault_core::traits::{ContractProvider, KeyManager, NetworkProvider, ScriptUnlocker, SigningProvider};
use cashvault_core::transaction::InputContext;
use cashvault_core::types::{
    ContractArgs, ContractInstance, HistoryEntry, KeyRecord, NetworkUtxo, PrivateKey, UtxoRecord,
};
use cashvault_store::{AddressDirectory, MemorySnapshotStorage, Store, StoreConfig};
use cashvault_wallet::Collaborators;
use parking_lot::Mutex;

pub const WALLET: u64 = 1;
pub const HEIGHT: u32 = 850_000;

pub const ESCROW: &str = r#"
contract Escrow(pubkey arbiter, pubkey buyer, int timeout) {
    function spend(sig s) {
        require(checkSig(s, arbiter));
    }

    function refund(sig s) {
        require(tx.time >= timeout);
        require(checkSig(s, buyer));
    }
}
"#;

pub fn address(kind: AddressKind, seed: u8) -> String {
    CashAddress::new("bchtest", kind, &[seed; 20]).unwrap().encode()
}

/// Our own P2PKH address, holding the test key.
pub fn own() -> String {
    address(AddressKind::P2pkh, 0x01)
}

pub fn recipient() -> String {
    address(AddressKind::P2pkh, 0x02)
}

pub fn recipient_token() -> String {
    address(AddressKind::TokenP2pkh, 0x02)
}

pub fn contract() -> String {
    address(AddressKind::P2sh, 0x03)
}

pub fn coin(address: &str, tx_seed: u8, tx_pos: u32, amount: u64) -> UtxoRecord {
    UtxoRecord {
        wallet_id: WALLET,
        address: address.into(),
        token_address: None,
        height: 800_000,
        tx_hash: format!("{tx_seed:02x}").repeat(32),
        tx_pos,
        amount,
        prefix: "bchtest".into(),
        token: None,
        contract: None,
    }
}

pub fn started_store() -> Arc<Store> {
    let store = Arc::new(Store::new(Arc::new(MemorySnapshotStorage::new()), StoreConfig::default()));
    store.ensure_started().unwrap();
    store
}

/// Directory knowing `recipient()`'s token-aware counterpart.
pub fn directory(store: Arc<Store>) -> AddressDirectory {
    let directory = AddressDirectory::new(store);
    directory
        .register_key(&KeyRecord {
            wallet_id: WALLET,
            address: recipient(),
            token_address: recipient_token(),
            account_index: 0,
            change_index: 0,
            address_index: 1,
            public_key: vec![0x02; 33],
            private_key: PrivateKey::new(vec![2; 32]),
        })
        .unwrap();
    directory
}

#[derive(Default)]
pub struct MockKeys {
    pub keys: HashMap<String, PrivateKey>,
}

impl MockKeys {
    pub fn with_own_key() -> Self {
        let mut keys = HashMap::new();
        keys.insert(own(), PrivateKey::new(vec![1; 32]));
        Self { keys }
    }
}

#[async_trait]
impl KeyManager for MockKeys {
    async fn fetch_private_key(&self, address: &str) -> Result<Option<PrivateKey>, KeyError> {
        Ok(self.keys.get(address).cloned())
    }

    async fn retrieve_keys(&self, _wallet_id: u64) -> Result<Vec<KeyRecord>, KeyError> {
        Ok(Vec::new())
    }

    async fn create_keys(&self, _: u64, _: u32, _: u32, _: u32) -> Result<KeyRecord, KeyError> {
        Err(KeyError::Unavailable("read-only".into()))
    }
}

/// Unlocks with a bare `OP_1`.
pub struct PushTrue;

impl ScriptUnlocker for PushTrue {
    fn unlocking_bytecode(&self, _ctx: &InputContext<'_>) -> Result<Vec<u8>, ContractError> {
        Ok(vec![0x51])
    }
}

pub struct MockContracts {
    pub uses_time_predicates: Option<bool>,
}

#[async_trait]
impl ContractProvider for MockContracts {
    async fn instance_by_address(&self, address: &str) -> Result<ContractInstance, ContractError> {
        if address != contract() {
            return Err(ContractError::UnknownInstance(address.into()));
        }
        Ok(ContractInstance {
            address: contract(),
            token_address: address_token_p2sh(),
            contract_name: "Escrow".into(),
            source_code: ESCROW.into(),
            abi: Vec::new(),
            utxos: Vec::new(),
            uses_time_predicates: self.uses_time_predicates,
        })
    }

    async fn unlocker(
        &self,
        _utxo: &UtxoRecord,
        _function: &str,
        _args: &ContractArgs,
    ) -> Result<Arc<dyn ScriptUnlocker>, ContractError> {
        Ok(Arc::new(PushTrue))
    }
}

fn address_token_p2sh() -> String {
    address(AddressKind::TokenP2sh, 0x03)
}

#[derive(Default)]
pub struct MockNetwork {
    pub utxos: Mutex<HashMap<String, Vec<NetworkUtxo>>>,
    pub history: Mutex<HashMap<String, Vec<HistoryEntry>>>,
    pub offline: bool,
    pub reject: bool,
    pub broadcasts: Mutex<Vec<String>>,
}

#[async_trait]
impl NetworkProvider for MockNetwork {
    async fn utxos(&self, address: &str) -> Result<Vec<NetworkUtxo>, NetworkError> {
        if self.offline {
            return Err(NetworkError::Request("offline".into()));
        }
        Ok(self.utxos.lock().get(address).cloned().unwrap_or_default())
    }

    async fn transaction_history(&self, address: &str) -> Result<Vec<HistoryEntry>, NetworkError> {
        if self.offline {
            return Err(NetworkError::Request("offline".into()));
        }
        Ok(self.history.lock().get(address).cloned().unwrap_or_default())
    }

    async fn block_height(&self) -> Result<u32, NetworkError> {
        Ok(HEIGHT)
    }

    async fn send_raw_transaction(&self, tx_hex: &str) -> Result<String, NetworkError> {
        if self.reject {
            return Err(NetworkError::Rejected("txn-mempool-conflict".into()));
        }
        self.broadcasts.lock().push(tx_hex.to_string());
        Ok("ab".repeat(32))
    }
}

/// Fixed-size signatures so both build passes measure the same size.
pub struct MockSigner;

impl SigningProvider for MockSigner {
    fn public_key(&self, private_key: &PrivateKey) -> Result<Vec<u8>, SigningError> {
        if private_key.is_empty() {
            return Err(SigningError::InvalidPrivateKey);
        }
        Ok(vec![0x03; 33])
    }

    fn sign_digest(&self, _private_key: &PrivateKey, digest: &[u8; 32]) -> Result<Vec<u8>, SigningError> {
        Ok([digest.as_slice(), digest.as_slice()].concat())
    }
}

pub fn collaborators(keys: MockKeys, contracts: MockContracts, network: Arc<MockNetwork>) -> Collaborators {
    Collaborators {
        keys: Arc::new(keys),
        contracts: Arc::new(contracts),
        network,
        signer: Arc::new(MockSigner),
    }
}
