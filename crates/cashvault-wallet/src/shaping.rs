//! Output shaping and conversion of outputs and coins to wire form.

use cashvault_core::address::CashAddress;
use cashvault_core::encoding::data_carrier_script;
use cashvault_core::transaction::TxOutput;
use cashvault_core::types::{OutputSpec, Token, UtxoRecord};

use crate::error::ComposeError;

/// Keep only the token fields that apply: the category plus either the NFT
/// or a non-zero fungible amount. Data carriers pass through unchanged.
pub fn shape_output(spec: &OutputSpec) -> OutputSpec {
    match spec {
        OutputSpec::DataCarrier { .. } => spec.clone(),
        OutputSpec::Payment {
            recipient_address,
            amount,
            token,
        } => OutputSpec::Payment {
            recipient_address: recipient_address.clone(),
            amount: *amount,
            token: token.as_ref().map(shape_token),
        },
    }
}

fn shape_token(token: &Token) -> Token {
    Token {
        category: token.category.clone(),
        amount: if token.nft.is_some() {
            None
        } else {
            token.amount.filter(|a| *a > 0)
        },
        nft: token.nft.clone(),
    }
}

/// Wire output for a shaped spec. Addresses without a prefix take `default_prefix`.
pub fn to_tx_output(spec: &OutputSpec, default_prefix: &str) -> Result<TxOutput, ComposeError> {
    match spec {
        OutputSpec::DataCarrier { op_return } => Ok(TxOutput::new(0, data_carrier_script(op_return)?, None)?),
        OutputSpec::Payment {
            recipient_address,
            amount,
            token,
        } => {
            let address = CashAddress::decode_with_default(recipient_address, default_prefix)?;
            if token.is_some() && !address.kind().supports_tokens() {
                return Err(ComposeError::Validation(format!(
                    "{recipient_address} cannot receive tokens"
                )));
            }
            Ok(TxOutput::new(*amount, address.locking_bytecode(), token.as_ref())?)
        }
    }
}

/// The output a coin represents, as its spending input commits to it.
pub fn source_output(utxo: &UtxoRecord, default_prefix: &str) -> Result<TxOutput, ComposeError> {
    let prefix = if utxo.prefix.is_empty() {
        default_prefix
    } else {
        &utxo.prefix
    };
    let address = CashAddress::decode_with_default(&utxo.address, prefix)?;
    Ok(TxOutput::new(utxo.amount, address.locking_bytecode(), utxo.token.as_ref())?)
}
