//! Composer error types.

use cashvault_core::error::{AddressError, ContractError, EncodingError, KeyError, NetworkError, SigningError};
use cashvault_store::StoreError;
use thiserror::Error;

/// Errors raised while composing, signing or broadcasting a transaction.
///
/// `build_transaction` turns these into `BuildResult::error_msg`; they never
/// escape the composer's public build and send calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComposeError {
    /// No usable private key for a plain input's address.
    #[error("private key not found or empty for address: {0}")]
    MissingKey(String),

    /// A contract input lacks its function name or arguments.
    #[error("contract function and inputs must be provided for {address}")]
    MissingContractBinding {
        /// Contract address of the input.
        address: String,
    },

    /// Request or output data failed validation.
    #[error("validation: {0}")]
    Validation(String),

    /// The transaction could not be assembled.
    #[error("build: {0}")]
    Build(String),

    /// The node rejected or never received the transaction.
    #[error("broadcast: {0}")]
    Broadcast(String),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
