//! # cashvault-wallet
//! Token-aware transaction composition.
//!
//! Turns output requests into CashTokens-aware outputs, resolves how each
//! selected coin is unlocked (P2PKH signature or contract function), and
//! builds signed transactions with a size-then-change two-pass build.
//! Also keeps the local coin ledger in step with the network.
//!
//! # Modules
//!
//! - [`error`]: `ComposeError` enum
//! - [`config`]: Fee and dust settings
//! - [`unlock`]: Per-input unlockers and time-predicate detection
//! - [`shaping`]: Output shaping and wire conversion
//! - [`builder`]: Wire-level transaction builder with signing
//! - [`composer`]: `TransactionComposer`: outputs, builds, broadcast
//! - [`sync`]: `LedgerSync`: network refresh of coins and history

pub mod builder;
pub mod composer;
pub mod config;
pub mod error;
pub mod shaping;
pub mod sync;
pub mod unlock;

// Re-exports for convenient access
pub use builder::TransactionBuilder;
pub use composer::{BuildResult, Collaborators, OutputRequest, TransactionComposer, compute_change};
pub use config::ComposerConfig;
pub use error::ComposeError;
pub use shaping::shape_output;
pub use sync::LedgerSync;
pub use unlock::{Unlocker, function_uses_time_predicates, resolve_unlockers};
