//! # cashvault-core
//! Data model, CashAddr and transaction wire encoding, and the collaborator
//! traits shared by the Cashvault ledger and composer.

pub mod address;
pub mod constants;
pub mod encoding;
pub mod error;
pub mod traits;
pub mod transaction;
pub mod types;
