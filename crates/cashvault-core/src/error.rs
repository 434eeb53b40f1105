//! Error types shared across Cashvault crates.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("missing prefix separator")] MissingSeparator,
    #[error("unknown prefix: {0}")] UnknownPrefix(String),
    #[error("invalid length")] InvalidLength,
    #[error("invalid checksum")] InvalidChecksum,
    #[error("invalid character: {0}")] InvalidCharacter(char),
    #[error("invalid version byte: {0:#04x}")] InvalidVersion(u8),
    #[error("invalid padding bits")] InvalidPadding,
    #[error("mixed case")] MixedCase,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("invalid hex in {field}: {reason}")] InvalidHex { field: &'static str, reason: String },
    #[error("token category must be 32 bytes, got {0}")] InvalidCategoryLength(usize),
    #[error("commitment too long: {len} > {max}")] CommitmentTooLong { len: usize, max: usize },
    #[error("token amount out of range: {0}")] TokenAmountOutOfRange(u64),
    #[error("token has neither amount nor nft")] EmptyToken,
    #[error("input index out of bounds: {index} >= {len}")] InputIndexOutOfBounds { index: usize, len: usize },
    #[error("address: {0}")] Address(#[from] AddressError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("request failed: {0}")] Request(String),
    #[error("invalid response: {0}")] InvalidResponse(String),
    #[error("rejected by node: {0}")] Rejected(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("key store unavailable: {0}")] Unavailable(String),
    #[error("key derivation: {0}")] Derivation(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("no contract instance at {0}")] UnknownInstance(String),
    #[error("contract has no function {0}")] UnknownFunction(String),
    #[error("invalid arguments for {function}: {reason}")] InvalidArguments { function: String, reason: String },
    #[error("unlock failed: {0}")] Unlock(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("invalid private key")] InvalidPrivateKey,
    #[error("signing failed: {0}")] Failed(String),
}
