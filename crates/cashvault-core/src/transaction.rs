//! Transaction model, wire serialization and signature hashing.
//!
//! # Signing scheme
//!
//! Signature digests follow the replay-protected (`SIGHASH_FORKID`) scheme:
//! the preimage commits to the version, hashes of all prevouts, sequences and
//! outputs (subject to the hash type), the spent outpoint, the spent coin's
//! token prefix, the covered bytecode, the spent value, the sequence, the
//! locktime and the hash type. The digest is double SHA-256.

use sha2::{Digest, Sha256};

use crate::constants::{DEFAULT_SEQUENCE, TX_VERSION};
use crate::encoding::{decode_hash, token_prefix, write_compact_size, write_var_bytes};
use crate::error::EncodingError;
use crate::types::Token;

pub const SIGHASH_ALL: u8 = 0x01;
pub const SIGHASH_NONE: u8 = 0x02;
pub const SIGHASH_SINGLE: u8 = 0x03;
pub const SIGHASH_FORKID: u8 = 0x40;
pub const SIGHASH_ANYONECANPAY: u8 = 0x80;

/// Double SHA-256.
pub fn hash256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(Sha256::digest(data)).into()
}

/// Reference to a previous output. `txid` is in wire (internal) byte order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OutPoint {
    pub txid: [u8; 32],
    pub vout: u32,
}

impl OutPoint {
    /// Build from a display-order transaction hash.
    pub fn from_display(tx_hash: &str, vout: u32) -> Result<Self, EncodingError> {
        Ok(Self {
            txid: decode_hash(tx_hash, "tx hash")?,
            vout,
        })
    }

    fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.txid);
        buf.extend_from_slice(&self.vout.to_le_bytes());
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxInput {
    pub outpoint: OutPoint,
    pub unlocking_bytecode: Vec<u8>,
    pub sequence: u32,
}

impl TxInput {
    /// An input with empty unlocking bytecode and the locktime-enabling sequence.
    pub fn unsigned(outpoint: OutPoint) -> Self {
        Self {
            outpoint,
            unlocking_bytecode: Vec::new(),
            sequence: DEFAULT_SEQUENCE,
        }
    }
}

/// A transaction output, or the coin an input spends.
///
/// `token_prefix` holds the encoded CashTokens prefix and is empty for
/// outputs without tokens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOutput {
    pub value: u64,
    pub locking_bytecode: Vec<u8>,
    pub token_prefix: Vec<u8>,
}

impl TxOutput {
    pub fn new(value: u64, locking_bytecode: Vec<u8>, token: Option<&Token>) -> Result<Self, EncodingError> {
        let token_prefix = match token {
            Some(t) => token_prefix(t)?,
            None => Vec::new(),
        };
        Ok(Self {
            value,
            locking_bytecode,
            token_prefix,
        })
    }

    pub fn has_token(&self) -> bool {
        !self.token_prefix.is_empty()
    }

    fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.value.to_le_bytes());
        write_compact_size(buf, (self.token_prefix.len() + self.locking_bytecode.len()) as u64);
        buf.extend_from_slice(&self.token_prefix);
        buf.extend_from_slice(&self.locking_bytecode);
    }

    /// Wire encoding of this output.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(9 + self.token_prefix.len() + self.locking_bytecode.len());
        self.write(&mut buf);
        buf
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub locktime: u32,
}

impl Default for Transaction {
    fn default() -> Self {
        Self {
            version: TX_VERSION,
            inputs: Vec::new(),
            outputs: Vec::new(),
            locktime: 0,
        }
    }
}

impl Transaction {
    /// Wire encoding.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.version.to_le_bytes());
        write_compact_size(&mut buf, self.inputs.len() as u64);
        for input in &self.inputs {
            input.outpoint.write(&mut buf);
            write_var_bytes(&mut buf, &input.unlocking_bytecode);
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }
        write_compact_size(&mut buf, self.outputs.len() as u64);
        for output in &self.outputs {
            output.write(&mut buf);
        }
        buf.extend_from_slice(&self.locktime.to_le_bytes());
        buf
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }

    /// Serialized size in bytes.
    pub fn byte_len(&self) -> usize {
        self.serialize().len()
    }

    /// Display-order transaction id.
    pub fn txid(&self) -> String {
        let mut hash = hash256(&self.serialize());
        hash.reverse();
        hex::encode(hash)
    }

    /// Signature digest for input `index` spending `source`.
    pub fn signature_digest(
        &self,
        index: usize,
        source: &TxOutput,
        covered_bytecode: &[u8],
        hash_type: u8,
    ) -> Result<[u8; 32], EncodingError> {
        let input = self.inputs.get(index).ok_or(EncodingError::InputIndexOutOfBounds {
            index,
            len: self.inputs.len(),
        })?;
        let anyone_can_pay = hash_type & SIGHASH_ANYONECANPAY != 0;
        let base = hash_type & 0x1f;

        let hash_prevouts = if anyone_can_pay {
            [0u8; 32]
        } else {
            let mut buf = Vec::with_capacity(36 * self.inputs.len());
            for i in &self.inputs {
                i.outpoint.write(&mut buf);
            }
            hash256(&buf)
        };

        let hash_sequence = if anyone_can_pay || base == SIGHASH_SINGLE || base == SIGHASH_NONE {
            [0u8; 32]
        } else {
            let buf: Vec<u8> = self.inputs.iter().flat_map(|i| i.sequence.to_le_bytes()).collect();
            hash256(&buf)
        };

        let hash_outputs = if base != SIGHASH_SINGLE && base != SIGHASH_NONE {
            let mut buf = Vec::new();
            for o in &self.outputs {
                o.write(&mut buf);
            }
            hash256(&buf)
        } else if base == SIGHASH_SINGLE && index < self.outputs.len() {
            hash256(&self.outputs[index].serialize())
        } else {
            [0u8; 32]
        };

        let mut preimage = Vec::with_capacity(200 + covered_bytecode.len());
        preimage.extend_from_slice(&self.version.to_le_bytes());
        preimage.extend_from_slice(&hash_prevouts);
        preimage.extend_from_slice(&hash_sequence);
        input.outpoint.write(&mut preimage);
        preimage.extend_from_slice(&source.token_prefix);
        write_var_bytes(&mut preimage, covered_bytecode);
        preimage.extend_from_slice(&source.value.to_le_bytes());
        preimage.extend_from_slice(&input.sequence.to_le_bytes());
        preimage.extend_from_slice(&hash_outputs);
        preimage.extend_from_slice(&self.locktime.to_le_bytes());
        preimage.extend_from_slice(&u32::from(hash_type).to_le_bytes());
        Ok(hash256(&preimage))
    }
}

/// The view an unlocker gets of the input it is unlocking.
#[derive(Clone, Copy, Debug)]
pub struct InputContext<'a> {
    pub tx: &'a Transaction,
    pub index: usize,
    /// Coins spent by every input, in input order.
    pub sources: &'a [TxOutput],
}

impl<'a> InputContext<'a> {
    /// The coin this input spends.
    pub fn source(&self) -> Result<&'a TxOutput, EncodingError> {
        self.sources.get(self.index).ok_or(EncodingError::InputIndexOutOfBounds {
            index: self.index,
            len: self.sources.len(),
        })
    }

    pub fn signature_digest(&self, covered_bytecode: &[u8], hash_type: u8) -> Result<[u8; 32], EncodingError> {
        self.tx
            .signature_digest(self.index, self.source()?, covered_bytecode, hash_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SIGHASH_ALL_FORKID;

    const TXID_A: &str = "1111111111111111111111111111111111111111111111111111111111111111";
    const TXID_B: &str = "2222222222222222222222222222222222222222222222222222222222222222";
    const CATEGORY: &str = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";

    fn p2pkh_script() -> Vec<u8> {
        let mut s = vec![0x76, 0xa9, 0x14];
        s.extend_from_slice(&[0x42; 20]);
        s.extend_from_slice(&[0x88, 0xac]);
        s
    }

    fn sample_tx() -> (Transaction, Vec<TxOutput>) {
        let tx = Transaction {
            inputs: vec![
                TxInput::unsigned(OutPoint::from_display(TXID_A, 0).unwrap()),
                TxInput::unsigned(OutPoint::from_display(TXID_B, 3).unwrap()),
            ],
            outputs: vec![
                TxOutput::new(5000, p2pkh_script(), None).unwrap(),
                TxOutput::new(1000, p2pkh_script(), Some(&Token::fungible(CATEGORY, 10))).unwrap(),
            ],
            locktime: 800_000,
            ..Default::default()
        };
        let sources = vec![
            TxOutput::new(6000, p2pkh_script(), None).unwrap(),
            TxOutput::new(1000, p2pkh_script(), Some(&Token::fungible(CATEGORY, 10))).unwrap(),
        ];
        (tx, sources)
    }

    #[test]
    fn empty_transaction_layout() {
        let tx = Transaction::default();
        assert_eq!(tx.to_hex(), "02000000000000000000");
    }

    #[test]
    fn serialized_size_matches_parts() {
        let (tx, _) = sample_tx();
        // version + 2 inputs (36 + 1 + 4) + 2 outputs + locktime
        let plain = 8 + 1 + 25;
        // token prefix: marker, category, bitfield, one-byte amount
        let tokened = 8 + 1 + 35 + 25;
        assert_eq!(tx.byte_len(), 4 + 1 + 2 * 41 + 1 + plain + tokened + 4);
    }

    #[test]
    fn txid_is_display_order() {
        let tx = Transaction::default();
        let mut expected = hash256(&tx.serialize());
        expected.reverse();
        assert_eq!(tx.txid(), hex::encode(expected));
    }

    #[test]
    fn outpoint_reverses_display_hash() {
        let op = OutPoint::from_display(CATEGORY, 1).unwrap();
        assert_eq!(op.txid[0], 0xff);
    }

    #[test]
    fn digest_commits_to_locktime() {
        let (mut tx, sources) = sample_tx();
        let script = p2pkh_script();
        let a = tx.signature_digest(0, &sources[0], &script, SIGHASH_ALL_FORKID).unwrap();
        tx.locktime += 1;
        let b = tx.signature_digest(0, &sources[0], &script, SIGHASH_ALL_FORKID).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn digest_commits_to_spent_token() {
        let (tx, sources) = sample_tx();
        let script = p2pkh_script();
        let mut plain = sources[1].clone();
        plain.token_prefix.clear();
        let a = tx.signature_digest(1, &sources[1], &script, SIGHASH_ALL_FORKID).unwrap();
        let b = tx.signature_digest(1, &plain, &script, SIGHASH_ALL_FORKID).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn anyonecanpay_ignores_other_inputs() {
        let (mut tx, sources) = sample_tx();
        let script = p2pkh_script();
        let ht = SIGHASH_ALL_FORKID | SIGHASH_ANYONECANPAY;
        let a = tx.signature_digest(0, &sources[0], &script, ht).unwrap();
        tx.inputs[1].outpoint.vout = 9;
        let b = tx.signature_digest(0, &sources[0], &script, ht).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn single_ignores_other_outputs() {
        let (mut tx, sources) = sample_tx();
        let script = p2pkh_script();
        let ht = SIGHASH_SINGLE | SIGHASH_FORKID;
        let a = tx.signature_digest(0, &sources[0], &script, ht).unwrap();
        tx.outputs[1].value = 1;
        let b = tx.signature_digest(0, &sources[0], &script, ht).unwrap();
        assert_eq!(a, b);
        tx.outputs[0].value = 1;
        let c = tx.signature_digest(0, &sources[0], &script, ht).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn digest_rejects_bad_index() {
        let (tx, sources) = sample_tx();
        let err = tx.signature_digest(5, &sources[0], &[], SIGHASH_ALL_FORKID).unwrap_err();
        assert_eq!(err, EncodingError::InputIndexOutOfBounds { index: 5, len: 2 });
    }

    #[test]
    fn input_context_uses_own_source() {
        let (tx, sources) = sample_tx();
        let ctx = InputContext {
            tx: &tx,
            index: 1,
            sources: &sources,
        };
        let script = p2pkh_script();
        assert_eq!(
            ctx.signature_digest(&script, SIGHASH_ALL_FORKID).unwrap(),
            tx.signature_digest(1, &sources[1], &script, SIGHASH_ALL_FORKID).unwrap()
        );
    }
}
