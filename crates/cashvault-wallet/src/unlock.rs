//! Per-input unlocking strategy.
//!
//! Plain coins are unlocked with a P2PKH signature; contract coins with the
//! unlocker their contract provider builds for the chosen function. All
//! inputs are resolved concurrently. A contract function that reads
//! `tx.time`, `tx.age` or `this.age` requires the transaction locktime to be
//! set, which is reported through a shared flag.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cashvault_core::constants::SIGHASH_ALL_FORKID;
use cashvault_core::encoding::push_data;
use cashvault_core::traits::{ContractProvider, KeyManager, ScriptUnlocker, SigningProvider};
use cashvault_core::transaction::InputContext;
use cashvault_core::types::{ContractArgs, ContractInstance, PrivateKey, UtxoRecord};
use futures::future::try_join_all;
use regex::Regex;
use tracing::debug;

use crate::error::ComposeError;

const TIME_PREDICATES: &[&str] = &["tx.time", "tx.age", "this.age"];

/// How one input gets unlocked.
#[derive(Clone)]
pub enum Unlocker {
    /// P2PKH spend with the key controlling the coin's address.
    Signature { private_key: PrivateKey },
    /// Contract spend through `function`.
    Contract {
        function: String,
        args: ContractArgs,
        script: Arc<dyn ScriptUnlocker>,
    },
}

impl fmt::Debug for Unlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signature { .. } => f.write_str("Signature"),
            Self::Contract { function, args, .. } => f
                .debug_struct("Contract")
                .field("function", function)
                .field("args", args)
                .finish_non_exhaustive(),
        }
    }
}

impl Unlocker {
    /// Unlocking bytecode for the input described by `ctx`.
    pub fn unlocking_bytecode(
        &self,
        ctx: &InputContext<'_>,
        signer: &dyn SigningProvider,
    ) -> Result<Vec<u8>, ComposeError> {
        match self {
            Self::Signature { private_key } => {
                let source = ctx.source()?;
                let digest = ctx.signature_digest(&source.locking_bytecode, SIGHASH_ALL_FORKID)?;
                let mut signature = signer.sign_digest(private_key, &digest)?;
                signature.push(SIGHASH_ALL_FORKID);
                let public_key = signer.public_key(private_key)?;

                let mut script = Vec::with_capacity(signature.len() + public_key.len() + 2);
                push_data(&mut script, &signature);
                push_data(&mut script, &public_key);
                Ok(script)
            }
            Self::Contract { script, .. } => Ok(script.unlocking_bytecode(ctx)?),
        }
    }
}

/// Resolve an unlocker for every coin, concurrently.
///
/// Returns the unlockers in input order and whether any contract input needs
/// the locktime set. The first failure aborts the whole resolution.
pub async fn resolve_unlockers(
    keys: &dyn KeyManager,
    contracts: &dyn ContractProvider,
    utxos: &[UtxoRecord],
) -> Result<(Vec<Unlocker>, bool), ComposeError> {
    let needs_locktime = AtomicBool::new(false);
    let unlockers = try_join_all(
        utxos
            .iter()
            .map(|utxo| resolve_one(keys, contracts, utxo, &needs_locktime)),
    )
    .await?;
    Ok((unlockers, needs_locktime.load(Ordering::SeqCst)))
}

async fn resolve_one(
    keys: &dyn KeyManager,
    contracts: &dyn ContractProvider,
    utxo: &UtxoRecord,
    needs_locktime: &AtomicBool,
) -> Result<Unlocker, ComposeError> {
    let Some(binding) = &utxo.contract else {
        let private_key = keys
            .fetch_private_key(&utxo.address)
            .await?
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ComposeError::MissingKey(utxo.address.clone()))?;
        return Ok(Unlocker::Signature { private_key });
    };

    let instance = contracts.instance_by_address(&utxo.address).await?;
    let (Some(function), Some(args)) = (&binding.function, &binding.function_inputs) else {
        return Err(ComposeError::MissingContractBinding {
            address: utxo.address.clone(),
        });
    };

    if needs_time_predicates(&instance, function) {
        debug!(address = %utxo.address, function = %function, "contract function reads time; locktime required");
        needs_locktime.store(true, Ordering::SeqCst);
    }

    let script = contracts.unlocker(utxo, function, args).await?;
    Ok(Unlocker::Contract {
        function: function.clone(),
        args: args.clone(),
        script,
    })
}

/// Declared time-predicate usage wins; otherwise scan the function source.
fn needs_time_predicates(instance: &ContractInstance, function: &str) -> bool {
    instance
        .uses_time_predicates
        .unwrap_or_else(|| function_uses_time_predicates(&instance.source_code, function))
}

/// Whether `function` in contract `source` reads a time predicate.
pub fn function_uses_time_predicates(source: &str, function: &str) -> bool {
    extract_function_body(source, function)
        .is_some_and(|body| TIME_PREDICATES.iter().any(|kw| body.contains(kw)))
}

/// Body of `function name(...) { ... }` in contract source, without the
/// outer braces. `None` if the function is absent or its braces never close.
pub fn extract_function_body<'a>(source: &'a str, name: &str) -> Option<&'a str> {
    let pattern = format!(r"(?s)function\s+{}\s*\(.*?\)\s*\{{", regex::escape(name));
    let header = Regex::new(&pattern).ok()?.find(source)?;

    let start = header.end();
    let mut depth = 1usize;
    for (offset, ch) in source[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(source[start..start + offset].trim());
                }
            }
            _ => {}
        }
    }
    None
}
