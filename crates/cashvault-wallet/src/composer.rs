//! Transaction composition.
//!
//! [`TransactionComposer::add_output`] turns a user request into an output
//! spec, attaching token data from the selected coins.
//! [`TransactionComposer::build_transaction`] resolves unlockers, shapes the
//! outputs and builds twice: once with a dust placeholder change output to
//! measure size, then with the real change.

use std::sync::Arc;

use cashvault_core::constants::Network;
use cashvault_core::traits::{ContractProvider, KeyManager, NetworkProvider, SigningProvider};
use cashvault_core::transaction::Transaction;
use cashvault_core::types::{Capability, Nft, OutputSpec, Token, UtxoRecord};
use cashvault_store::AddressDirectory;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::builder::TransactionBuilder;
use crate::config::ComposerConfig;
use crate::error::ComposeError;
use crate::shaping::shape_output;
use crate::unlock::resolve_unlockers;

/// A user's request for one output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRequest {
    pub recipient: String,
    /// Satoshis.
    pub amount: u64,
    #[serde(default)]
    pub token_amount: u64,
    /// Token category to transfer, or the transaction hash of a genesis coin
    /// when minting.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub nft_capability: Option<Capability>,
    #[serde(default)]
    pub nft_commitment: Option<String>,
}

/// Outcome of [`TransactionComposer::build_transaction`].
///
/// On failure `error_msg` is set and the other fields are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildResult {
    pub bytecode_size: usize,
    /// Hex-encoded signed transaction.
    pub final_transaction: String,
    pub final_outputs: Vec<OutputSpec>,
    pub error_msg: Option<String>,
}

impl BuildResult {
    fn failed(e: &ComposeError) -> Self {
        Self {
            error_msg: Some(e.to_string()),
            ..Self::default()
        }
    }
}

/// External services the composer depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub keys: Arc<dyn KeyManager>,
    pub contracts: Arc<dyn ContractProvider>,
    pub network: Arc<dyn NetworkProvider>,
    pub signer: Arc<dyn SigningProvider>,
}

/// Change left after paying outputs and fees, if any.
///
/// ```
/// use cashvault_wallet::compute_change;
/// assert_eq!(compute_change(10_000, 5_000, 250, 1), Some(4_750));
/// assert_eq!(compute_change(5_000, 5_000, 250, 1), None);
/// ```
pub fn compute_change(inputs_total: u64, outputs_total: u64, byte_len: usize, fee_per_byte: u64) -> Option<u64> {
    let fee = (byte_len as i128).saturating_mul(fee_per_byte as i128);
    let remainder = (inputs_total as i128 - outputs_total as i128).saturating_sub(fee);
    (remainder > 0).then(|| remainder as u64)
}

/// Builds, signs and broadcasts transactions for one wallet.
pub struct TransactionComposer {
    wallet_id: u64,
    network: Network,
    config: ComposerConfig,
    collaborators: Collaborators,
    directory: AddressDirectory,
    pending: Mutex<Vec<OutputSpec>>,
}

impl TransactionComposer {
    pub fn new(
        wallet_id: u64,
        network: Network,
        config: ComposerConfig,
        collaborators: Collaborators,
        directory: AddressDirectory,
    ) -> Self {
        Self {
            wallet_id,
            network,
            config,
            collaborators,
            directory,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Turn `request` into an output and append it to the pending outputs.
    ///
    /// With a non-empty category, the token comes from a selected coin of that
    /// category (transfer) or, failing that, from a genesis coin whose
    /// transaction hash equals the category (mint). Token outputs are sent
    /// to the recipient's token-aware address when the directory knows one.
    /// Returns `None`, with a warning, for an empty recipient, a request for
    /// nothing, or a category no selected coin can provide.
    pub fn add_output(&self, request: &OutputRequest, selected: &[UtxoRecord]) -> Option<OutputSpec> {
        if request.recipient.is_empty() {
            warn!(wallet_id = self.wallet_id, "output rejected: empty recipient");
            return None;
        }
        if request.amount == 0 && request.token_amount == 0 {
            warn!(wallet_id = self.wallet_id, recipient = %request.recipient, "output rejected: zero amount");
            return None;
        }

        let output = match request.category.as_deref().filter(|c| !c.is_empty()) {
            None => OutputSpec::payment(request.recipient.clone(), request.amount),
            Some(category) => {
                let token = transfer_token(request, category, selected)
                    .or_else(|| genesis_token(request, category, selected));
                let Some(token) = token else {
                    warn!(wallet_id = self.wallet_id, category = %category, "output rejected: no selected coin provides category");
                    return None;
                };
                let recipient = self
                    .directory
                    .resolve(self.wallet_id, &request.recipient)
                    .unwrap_or_else(|| request.recipient.clone());
                OutputSpec::Payment {
                    recipient_address: recipient,
                    amount: request.amount,
                    token: Some(token),
                }
            }
        };

        debug!(wallet_id = self.wallet_id, ?output, "output added");
        self.pending.lock().push(output.clone());
        Some(output)
    }

    pub fn pending_outputs(&self) -> Vec<OutputSpec> {
        self.pending.lock().clone()
    }

    /// Drain the pending outputs, e.g. to pass them to [`Self::build_transaction`].
    pub fn take_pending_outputs(&self) -> Vec<OutputSpec> {
        std::mem::take(&mut *self.pending.lock())
    }

    pub fn remove_output(&self, index: usize) -> Option<OutputSpec> {
        let mut pending = self.pending.lock();
        (index < pending.len()).then(|| pending.remove(index))
    }

    pub fn clear_outputs(&self) {
        self.pending.lock().clear();
    }

    /// Build and sign a transaction spending `selected` to `outputs`, sending
    /// any change to `change_address` (no change output when it is empty).
    ///
    /// Never fails outright: errors are reported through
    /// [`BuildResult::error_msg`].
    pub async fn build_transaction(
        &self,
        selected: &[UtxoRecord],
        outputs: &[OutputSpec],
        change_address: &str,
    ) -> BuildResult {
        match self.try_build(selected, outputs, change_address).await {
            Ok(result) => result,
            Err(e) => {
                error!(wallet_id = self.wallet_id, error = %e, "transaction build failed");
                BuildResult::failed(&e)
            }
        }
    }

    async fn try_build(
        &self,
        selected: &[UtxoRecord],
        outputs: &[OutputSpec],
        change_address: &str,
    ) -> Result<BuildResult, ComposeError> {
        let (unlockers, needs_locktime) = resolve_unlockers(
            self.collaborators.keys.as_ref(),
            self.collaborators.contracts.as_ref(),
            selected,
        )
        .await?;

        let shaped: Vec<OutputSpec> = outputs.iter().map(shape_output).collect();

        let locktime = if needs_locktime {
            self.collaborators.network.block_height().await?
        } else {
            0
        };

        let inputs_total: u64 = selected.iter().map(|u| u.amount).sum();
        let outputs_total: u64 = shaped.iter().map(OutputSpec::amount).sum();

        let build = |with_change: Option<u64>| -> Result<(Transaction, Vec<OutputSpec>), ComposeError> {
            let mut final_outputs = shaped.clone();
            if let Some(value) = with_change {
                final_outputs.push(OutputSpec::payment(change_address, value));
            }
            let tx = TransactionBuilder::new(self.network.prefix())
                .add_inputs(selected, unlockers.clone())
                .add_outputs(&final_outputs)
                .set_locktime(locktime)
                .build(self.collaborators.signer.as_ref())?;
            Ok((tx, final_outputs))
        };

        let change = if change_address.is_empty() {
            None
        } else {
            let (sizing, _) = build(Some(self.config.dust))?;
            let byte_len = sizing.byte_len();
            let change = compute_change(inputs_total, outputs_total, byte_len, self.config.fee_per_byte);
            if change.is_none() {
                warn!(
                    wallet_id = self.wallet_id,
                    inputs_total,
                    outputs_total,
                    byte_len,
                    "no change left after fees"
                );
            }
            change
        };

        let (tx, final_outputs) = build(change)?;
        let bytecode_size = tx.byte_len();
        info!(
            wallet_id = self.wallet_id,
            txid = %tx.txid(),
            inputs = tx.inputs.len(),
            outputs = tx.outputs.len(),
            bytecode_size,
            locktime,
            "transaction built"
        );

        Ok(BuildResult {
            bytecode_size,
            final_transaction: tx.to_hex(),
            final_outputs,
            error_msg: None,
        })
    }

    /// Broadcast a signed transaction. Returns the txid, or `None` on failure.
    pub async fn send_transaction(&self, tx_hex: &str) -> Option<String> {
        match self.collaborators.network.send_raw_transaction(tx_hex).await {
            Ok(txid) => {
                info!(wallet_id = self.wallet_id, %txid, "transaction broadcast");
                Some(txid)
            }
            Err(e) => {
                let e = ComposeError::Broadcast(e.to_string());
                error!(wallet_id = self.wallet_id, error = %e, "transaction broadcast failed");
                None
            }
        }
    }
}

/// Token for moving an existing category held by one of the selected coins.
fn transfer_token(request: &OutputRequest, category: &str, selected: &[UtxoRecord]) -> Option<Token> {
    let held = selected
        .iter()
        .filter_map(|u| u.token.as_ref())
        .find(|t| t.category == category)?;
    Some(match &held.nft {
        Some(nft) => Token {
            category: category.to_string(),
            amount: None,
            nft: Some(nft.clone()),
        },
        None => Token::fungible(category, request.token_amount),
    })
}

/// Token minted from a genesis coin whose transaction hash is `category`.
fn genesis_token(request: &OutputRequest, category: &str, selected: &[UtxoRecord]) -> Option<Token> {
    let genesis = selected
        .iter()
        .find(|u| u.is_genesis_candidate() && u.tx_hash == category)?;
    Some(match (request.nft_capability, &request.nft_commitment) {
        (Some(capability), Some(commitment)) => Token {
            category: genesis.tx_hash.clone(),
            amount: Some(0),
            nft: Some(Nft {
                capability,
                commitment: commitment.clone(),
            }),
        },
        _ => Token::fungible(genesis.tx_hash.clone(), request.token_amount),
    })
}
