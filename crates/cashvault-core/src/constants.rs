//! Protocol constants. All monetary values in satoshis.

use serde::{Deserialize, Serialize};

/// Smallest output value relays accept for a plain P2PKH output.
pub const DUST: u64 = 546;

/// Fee rate applied to the measured transaction size.
pub const DEFAULT_FEE_PER_BYTE: u64 = 1;

/// Transaction version emitted by the composer.
pub const TX_VERSION: u32 = 2;

/// Input sequence number. Anything below `0xffffffff` keeps locktime enforced.
pub const DEFAULT_SEQUENCE: u32 = 0xffff_fffe;

/// `SIGHASH_ALL | SIGHASH_FORKID`.
pub const SIGHASH_ALL_FORKID: u8 = 0x41;

/// Maximum NFT commitment length in bytes.
pub const MAX_COMMITMENT_LEN: usize = 40;

/// Maximum fungible token amount per output (`i64::MAX`).
pub const MAX_TOKEN_AMOUNT: u64 = 9_223_372_036_854_775_807;

/// Debounce window for coalescing durable snapshot writes, in milliseconds.
pub const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 500;

/// Network the wallet operates on.
///
/// Determines the CashAddr prefix stamped on stored records and used when
/// an address string arrives without one.
///
/// # Examples
///
/// ```
/// use cashvault_core::constants::Network;
/// assert_eq!(Network::Mainnet.prefix(), "bitcoincash");
/// assert_eq!(Network::Chipnet.prefix(), "bchtest");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production network.
    #[default]
    Mainnet,
    /// Public upgrade-preview network.
    Chipnet,
    /// Legacy public test network.
    Testnet,
}

impl Network {
    /// CashAddr human-readable prefix.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Mainnet => "bitcoincash",
            Self::Chipnet | Self::Testnet => "bchtest",
        }
    }

    /// BIP-44 coin type used by the key manager.
    pub fn coin_type(&self) -> u32 {
        match self {
            Self::Mainnet => 145,
            Self::Chipnet | Self::Testnet => 1,
        }
    }

    /// Lowercase name, as accepted by [`Network::from_name`].
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Chipnet => "chipnet",
            Self::Testnet => "testnet",
        }
    }

    /// Parse a network name as it appears in config files.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "mainnet" => Some(Self::Mainnet),
            "chipnet" => Some(Self::Chipnet),
            "testnet" => Some(Self::Testnet),
            _ => None,
        }
    }
}
