//! Wallet data model: coins, tokens, key and address records, output specs.
//!
//! All monetary values are in satoshis. Transaction hashes and token
//! categories are carried as display-order hex strings, exactly as network
//! indexers report them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use zeroize::Zeroizing;

use crate::constants::Network;

/// NFT capability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Immutable NFT.
    None,
    /// Commitment may be changed when spent.
    Mutable,
    /// May create new NFTs of its category.
    Minting,
}

impl Capability {
    /// Low nibble of the token prefix bitfield.
    pub fn bits(&self) -> u8 {
        match self {
            Self::None => 0x00,
            Self::Mutable => 0x01,
            Self::Minting => 0x02,
        }
    }
}

/// Non-fungible token data.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nft {
    pub capability: Capability,
    /// Hex-encoded commitment; empty for none.
    #[serde(default)]
    pub commitment: String,
}

/// Token data attached to a coin or an output.
///
/// A stored coin holds exactly one of `amount` (fungible) or `nft`. Output
/// tokens for a freshly minted NFT may also carry `amount: Some(0)`, which is
/// never encoded on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    /// Category id: display-order hex of the genesis transaction hash.
    pub category: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_amount"
    )]
    pub amount: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nft: Option<Nft>,
}

impl Token {
    /// A fungible token amount.
    pub fn fungible(category: impl Into<String>, amount: u64) -> Self {
        Self {
            category: category.into(),
            amount: Some(amount),
            nft: None,
        }
    }

    /// A non-fungible token.
    pub fn non_fungible(
        category: impl Into<String>,
        capability: Capability,
        commitment: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            amount: None,
            nft: Some(Nft {
                capability,
                commitment: commitment.into(),
            }),
        }
    }

    /// Whether this token is an NFT.
    pub fn is_nft(&self) -> bool {
        self.nft.is_some()
    }

    /// Drop a zero fungible amount reported alongside an NFT.
    pub fn normalized(mut self) -> Self {
        if self.nft.is_some() && self.amount == Some(0) {
            self.amount = None;
        }
        self
    }

    /// Exactly one of `amount` and `nft` is present.
    pub fn is_well_formed(&self) -> bool {
        self.amount.is_some() != self.nft.is_some()
    }
}

/// Indexers report token amounts either as JSON numbers or decimal strings.
fn deserialize_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(u64),
        Text(String),
    }

    match Option::<Repr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Repr::Number(n)) => Ok(Some(n)),
        Some(Repr::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// One ABI entry of a contract function.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiFunction {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<AbiInput>,
}

/// A typed parameter of a contract function.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiInput {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

/// Named arguments passed to a contract function.
pub type ContractArgs = BTreeMap<String, serde_json::Value>;

/// Binds a coin to a deployed contract and the function chosen to spend it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractBinding {
    pub contract_name: String,
    #[serde(default)]
    pub abi: Vec<AbiFunction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_inputs: Option<ContractArgs>,
}

/// Unique identity of a stored coin.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtxoKey {
    pub wallet_id: u64,
    pub tx_hash: String,
    pub tx_pos: u32,
}

impl fmt::Display for UtxoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.tx_hash, self.tx_pos, self.wallet_id)
    }
}

/// An unspent output controlled by a wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoRecord {
    pub wallet_id: u64,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_address: Option<String>,
    pub height: u64,
    pub tx_hash: String,
    pub tx_pos: u32,
    /// Value in satoshis.
    pub amount: u64,
    pub prefix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Token>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<ContractBinding>,
}

impl UtxoRecord {
    /// The `(wallet_id, tx_hash, tx_pos)` identity.
    pub fn key(&self) -> UtxoKey {
        UtxoKey {
            wallet_id: self.wallet_id,
            tx_hash: self.tx_hash.clone(),
            tx_pos: self.tx_pos,
        }
    }

    /// Output 0 without token data: its hash can seed a new token category.
    pub fn is_genesis_candidate(&self) -> bool {
        self.tx_pos == 0 && self.token.is_none()
    }
}

/// A wallet known to the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub id: u64,
    pub name: String,
    pub network: Network,
}

/// A derived receiving or change address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub wallet_id: u64,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_address: Option<String>,
    pub balance: u64,
    pub hd_index: u32,
    pub change_index: u32,
    pub prefix: String,
}

/// Private key bytes, wiped from memory on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(Zeroizing<Vec<u8>>);

impl PrivateKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// Key material for one derived address, as held by the key manager.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyRecord {
    pub wallet_id: u64,
    pub address: String,
    pub token_address: String,
    pub account_index: u32,
    pub change_index: u32,
    pub address_index: u32,
    pub public_key: Vec<u8>,
    pub private_key: PrivateKey,
}

/// A desired transaction output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputSpec {
    /// OP_RETURN payload; `0x`-prefixed chunks are hex, the rest UTF-8.
    DataCarrier { op_return: Vec<String> },
    /// Value (and optionally tokens) sent to an address.
    Payment {
        recipient_address: String,
        amount: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<Token>,
    },
}

impl OutputSpec {
    /// A plain value output.
    pub fn payment(recipient_address: impl Into<String>, amount: u64) -> Self {
        Self::Payment {
            recipient_address: recipient_address.into(),
            amount,
            token: None,
        }
    }

    /// Satoshi value requested by this output. Data carriers request nothing.
    pub fn amount(&self) -> u64 {
        match self {
            Self::DataCarrier { .. } => 0,
            Self::Payment { amount, .. } => *amount,
        }
    }

    /// Token attached to a payment output.
    pub fn token(&self) -> Option<&Token> {
        match self {
            Self::DataCarrier { .. } => None,
            Self::Payment { token, .. } => token.as_ref(),
        }
    }

    /// Recipient of a payment output.
    pub fn recipient(&self) -> Option<&str> {
        match self {
            Self::DataCarrier { .. } => None,
            Self::Payment {
                recipient_address, ..
            } => Some(recipient_address),
        }
    }
}

/// A coin as reported by the network collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkUtxo {
    pub tx_hash: String,
    pub tx_pos: u32,
    pub value: u64,
    /// Confirmation height; zero or negative while unconfirmed.
    pub height: i64,
    #[serde(default, alias = "token_data", skip_serializing_if = "Option::is_none")]
    pub token: Option<Token>,
}

/// One transaction touching an address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub tx_hash: String,
    pub height: i64,
}

/// A deployed contract as resolved by the contract collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractInstance {
    pub address: String,
    pub token_address: String,
    pub contract_name: String,
    pub source_code: String,
    pub abi: Vec<AbiFunction>,
    pub utxos: Vec<UtxoRecord>,
    /// Declared time-predicate usage; `None` means unknown.
    pub uses_time_predicates: Option<bool>,
}
