//! Composer configuration.

use cashvault_core::constants::{DEFAULT_FEE_PER_BYTE, DUST};
use serde::{Deserialize, Serialize};

/// Fee and placeholder settings for [`TransactionComposer`](crate::TransactionComposer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// Satoshis charged per serialized byte.
    pub fee_per_byte: u64,
    /// Value of the change placeholder used in the sizing pass.
    pub dust: u64,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            fee_per_byte: DEFAULT_FEE_PER_BYTE,
            dust: DUST,
        }
    }
}
