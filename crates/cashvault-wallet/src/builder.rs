//! Wire-level transaction assembly.
//!
//! Inputs are added with their unlockers, outputs as already-shaped specs.
//! [`TransactionBuilder::build`] lays out the unsigned transaction, then
//! computes every input's unlocking bytecode against it:
//! 1. Resolve the coin each input spends (locking bytecode + token prefix)
//! 2. Build inputs with empty unlocking bytecode and outputs in wire form
//! 3. Unlock each input and fill its bytecode in

use cashvault_core::traits::SigningProvider;
use cashvault_core::transaction::{InputContext, OutPoint, Transaction, TxInput, TxOutput};
use cashvault_core::types::{OutputSpec, UtxoRecord};

use crate::error::ComposeError;
use crate::shaping::{source_output, to_tx_output};
use crate::unlock::Unlocker;

/// Builder for one signed transaction.
///
/// # Example
/// ```ignore
/// let tx = TransactionBuilder::new("bchtest")
///     .add_inputs(&utxos, unlockers)
///     .add_outputs(&outputs)
///     .set_locktime(height)
///     .build(&signer)?;
/// ```
pub struct TransactionBuilder {
    default_prefix: String,
    inputs: Vec<(UtxoRecord, Unlocker)>,
    outputs: Vec<OutputSpec>,
    locktime: u32,
}

impl TransactionBuilder {
    /// `default_prefix` applies to addresses given without a CashAddr prefix.
    pub fn new(default_prefix: impl Into<String>) -> Self {
        Self {
            default_prefix: default_prefix.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            locktime: 0,
        }
    }

    pub fn add_input(&mut self, utxo: UtxoRecord, unlocker: Unlocker) -> &mut Self {
        self.inputs.push((utxo, unlocker));
        self
    }

    /// Pair each coin with the unlocker at the same position.
    pub fn add_inputs(&mut self, utxos: &[UtxoRecord], unlockers: Vec<Unlocker>) -> &mut Self {
        for (utxo, unlocker) in utxos.iter().zip(unlockers) {
            self.add_input(utxo.clone(), unlocker);
        }
        self
    }

    pub fn add_output(&mut self, output: OutputSpec) -> &mut Self {
        self.outputs.push(output);
        self
    }

    pub fn add_outputs(&mut self, outputs: &[OutputSpec]) -> &mut Self {
        self.outputs.extend_from_slice(outputs);
        self
    }

    pub fn set_locktime(&mut self, locktime: u32) -> &mut Self {
        self.locktime = locktime;
        self
    }

    /// Assemble and sign.
    pub fn build(&self, signer: &dyn SigningProvider) -> Result<Transaction, ComposeError> {
        if self.inputs.is_empty() {
            return Err(ComposeError::Build("no inputs".into()));
        }
        if self.outputs.is_empty() {
            return Err(ComposeError::Build("no outputs".into()));
        }

        let sources = self
            .inputs
            .iter()
            .map(|(utxo, _)| source_output(utxo, &self.default_prefix))
            .collect::<Result<Vec<TxOutput>, _>>()?;

        let inputs = self
            .inputs
            .iter()
            .map(|(utxo, _)| Ok(TxInput::unsigned(OutPoint::from_display(&utxo.tx_hash, utxo.tx_pos)?)))
            .collect::<Result<Vec<_>, ComposeError>>()?;

        let outputs = self
            .outputs
            .iter()
            .map(|o| to_tx_output(o, &self.default_prefix))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tx = Transaction {
            inputs,
            outputs,
            locktime: self.locktime,
            ..Transaction::default()
        };

        let unlocking = self
            .inputs
            .iter()
            .enumerate()
            .map(|(index, (_, unlocker))| {
                let ctx = InputContext {
                    tx: &tx,
                    index,
                    sources: &sources,
                };
                unlocker.unlocking_bytecode(&ctx, signer)
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (input, bytecode) in tx.inputs.iter_mut().zip(unlocking) {
            input.unlocking_bytecode = bytecode;
        }
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cashvault_core::address::{AddressKind, CashAddress};
    use cashvault_core::error::SigningError;
    use cashvault_core::types::PrivateKey;

    struct FixedSigner;

    impl SigningProvider for FixedSigner {
        fn public_key(&self, _: &PrivateKey) -> Result<Vec<u8>, SigningError> {
            Ok(vec![0x02; 33])
        }

        fn sign_digest(&self, _: &PrivateKey, digest: &[u8; 32]) -> Result<Vec<u8>, SigningError> {
            Ok([digest.as_slice(), digest.as_slice()].concat())
        }
    }

    fn address() -> String {
        CashAddress::new("bchtest", AddressKind::P2pkh, &[0x22; 20])
            .unwrap()
            .encode()
    }

    fn utxo(tx_pos: u32, amount: u64) -> UtxoRecord {
        UtxoRecord {
            wallet_id: 1,
            address: address(),
            token_address: None,
            height: 10,
            tx_hash: "11".repeat(32),
            tx_pos,
            amount,
            prefix: "bchtest".into(),
            token: None,
            contract: None,
        }
    }

    fn signature() -> Unlocker {
        Unlocker::Signature {
            private_key: PrivateKey::new(vec![7; 32]),
        }
    }

    #[test]
    fn signs_every_input() {
        let tx = TransactionBuilder::new("bchtest")
            .add_input(utxo(0, 5_000), signature())
            .add_input(utxo(1, 6_000), signature())
            .add_output(OutputSpec::payment(address(), 10_000))
            .set_locktime(42)
            .build(&FixedSigner)
            .unwrap();

        assert_eq!(tx.locktime, 42);
        assert_eq!(tx.inputs.len(), 2);
        for input in &tx.inputs {
            // push(65-byte sig) + push(33-byte key)
            assert_eq!(input.unlocking_bytecode.len(), 1 + 65 + 1 + 33);
            assert_eq!(input.unlocking_bytecode[65], 0x41);
        }
        // Different inputs commit to different digests.
        assert_ne!(tx.inputs[0].unlocking_bytecode, tx.inputs[1].unlocking_bytecode);
    }

    #[test]
    fn empty_sides_are_rejected() {
        let no_inputs = TransactionBuilder::new("bchtest")
            .add_output(OutputSpec::payment(address(), 1))
            .build(&FixedSigner);
        assert!(matches!(no_inputs, Err(ComposeError::Build(_))));

        let no_outputs = TransactionBuilder::new("bchtest")
            .add_input(utxo(0, 1), signature())
            .build(&FixedSigner);
        assert!(matches!(no_outputs, Err(ComposeError::Build(_))));
    }

    #[test]
    fn malformed_tx_hash_is_encoding_error() {
        let mut bad = utxo(0, 1_000);
        bad.tx_hash = "zz".into();
        let result = TransactionBuilder::new("bchtest")
            .add_input(bad, signature())
            .add_output(OutputSpec::payment(address(), 500))
            .build(&FixedSigner);
        assert!(matches!(result, Err(ComposeError::Encoding(_))));
    }
}
