//! Low-level wire encoding: compact sizes, data pushes, token prefixes and
//! data-carrier scripts.

use crate::constants::{MAX_COMMITMENT_LEN, MAX_TOKEN_AMOUNT};
use crate::error::EncodingError;
use crate::types::Token;

/// Marks a token prefix in front of locking bytecode.
pub const PREFIX_TOKEN: u8 = 0xef;

const HAS_COMMITMENT_LENGTH: u8 = 0x40;
const HAS_NFT: u8 = 0x20;
const HAS_AMOUNT: u8 = 0x10;

const OP_0: u8 = 0x00;
const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;
const OP_PUSHDATA4: u8 = 0x4e;
const OP_1NEGATE: u8 = 0x4f;
const OP_1: u8 = 0x51;
const OP_RETURN: u8 = 0x6a;

/// Append a Bitcoin compact-size integer.
pub fn write_compact_size(buf: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => buf.push(n as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}

/// Append length-prefixed bytes.
pub fn write_var_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_compact_size(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Append a minimally-encoded data push.
pub fn push_data(script: &mut Vec<u8>, data: &[u8]) {
    match data {
        [] => script.push(OP_0),
        [n @ 1..=16] => script.push(OP_1 + n - 1),
        [0x81] => script.push(OP_1NEGATE),
        _ => {
            let len = data.len();
            if len <= 75 {
                script.push(len as u8);
            } else if len <= 0xff {
                script.push(OP_PUSHDATA1);
                script.push(len as u8);
            } else if len <= 0xffff {
                script.push(OP_PUSHDATA2);
                script.extend_from_slice(&(len as u16).to_le_bytes());
            } else {
                script.push(OP_PUSHDATA4);
                script.extend_from_slice(&(len as u32).to_le_bytes());
            }
            script.extend_from_slice(data);
        }
    }
}

/// Decode a display-order 32-byte hash (txid, token category) into the
/// internal byte order used on the wire.
pub fn decode_hash(hex_str: &str, field: &'static str) -> Result<[u8; 32], EncodingError> {
    let bytes = hex::decode(hex_str).map_err(|e| EncodingError::InvalidHex {
        field,
        reason: e.to_string(),
    })?;
    let mut hash: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| EncodingError::InvalidCategoryLength(bytes.len()))?;
    hash.reverse();
    Ok(hash)
}

/// Encode the CashTokens prefix for an output or spent coin.
///
/// A zero fungible amount is not encoded; a token with neither an NFT nor a
/// positive amount is rejected.
pub fn token_prefix(token: &Token) -> Result<Vec<u8>, EncodingError> {
    let category = decode_hash(&token.category, "token category")?;
    let amount = token.amount.filter(|a| *a > 0);
    if token.nft.is_none() && amount.is_none() {
        return Err(EncodingError::EmptyToken);
    }

    let mut bitfield = 0u8;
    let mut commitment = Vec::new();
    if let Some(nft) = &token.nft {
        bitfield |= HAS_NFT | nft.capability.bits();
        commitment = hex::decode(&nft.commitment).map_err(|e| EncodingError::InvalidHex {
            field: "nft commitment",
            reason: e.to_string(),
        })?;
        if commitment.len() > MAX_COMMITMENT_LEN {
            return Err(EncodingError::CommitmentTooLong {
                len: commitment.len(),
                max: MAX_COMMITMENT_LEN,
            });
        }
        if !commitment.is_empty() {
            bitfield |= HAS_COMMITMENT_LENGTH;
        }
    }
    if let Some(a) = amount {
        if a > MAX_TOKEN_AMOUNT {
            return Err(EncodingError::TokenAmountOutOfRange(a));
        }
        bitfield |= HAS_AMOUNT;
    }

    let mut prefix = Vec::with_capacity(34 + commitment.len() + 9);
    prefix.push(PREFIX_TOKEN);
    prefix.extend_from_slice(&category);
    prefix.push(bitfield);
    if !commitment.is_empty() {
        write_var_bytes(&mut prefix, &commitment);
    }
    if let Some(a) = amount {
        write_compact_size(&mut prefix, a);
    }
    Ok(prefix)
}

/// Build an `OP_RETURN` script from payload chunks.
pub fn data_carrier_script(chunks: &[String]) -> Result<Vec<u8>, EncodingError> {
    let mut script = vec![OP_RETURN];
    for chunk in chunks {
        let bytes = match chunk.strip_prefix("0x") {
            Some(hex_part) => hex::decode(hex_part).map_err(|e| EncodingError::InvalidHex {
                field: "op_return chunk",
                reason: e.to_string(),
            })?,
            None => chunk.as_bytes().to_vec(),
        };
        push_data(&mut script, &bytes);
    }
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Capability;

    const CATEGORY: &str = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";

    #[test]
    fn compact_size_boundaries() {
        let cases: &[(u64, usize)] = &[(0, 1), (0xfc, 1), (0xfd, 3), (0xffff, 3), (0x10000, 5), (0x1_0000_0000, 9)];
        for &(n, len) in cases {
            let mut buf = Vec::new();
            write_compact_size(&mut buf, n);
            assert_eq!(buf.len(), len, "n = {n}");
        }
    }

    #[test]
    fn push_data_small_numbers_use_opcodes() {
        let mut script = Vec::new();
        push_data(&mut script, &[5]);
        assert_eq!(script, vec![0x55]);
    }

    #[test]
    fn push_data_pushdata1() {
        let mut script = Vec::new();
        push_data(&mut script, &[0xab; 80]);
        assert_eq!(&script[..2], &[OP_PUSHDATA1, 80]);
        assert_eq!(script.len(), 82);
    }

    #[test]
    fn decode_hash_reverses() {
        let hash = decode_hash(CATEGORY, "test").unwrap();
        assert_eq!(hash[0], 0xff);
        assert_eq!(hash[31], 0x00);
    }

    #[test]
    fn decode_hash_wrong_length() {
        let err = decode_hash("abcd", "test").unwrap_err();
        assert_eq!(err, EncodingError::InvalidCategoryLength(2));
    }

    #[test]
    fn fungible_prefix_layout() {
        let prefix = token_prefix(&Token::fungible(CATEGORY, 1000)).unwrap();
        assert_eq!(prefix[0], PREFIX_TOKEN);
        assert_eq!(prefix[33], HAS_AMOUNT);
        // 1000 needs the 0xfd marker plus two bytes.
        assert_eq!(&prefix[34..], &[0xfd, 0xe8, 0x03]);
    }

    #[test]
    fn nft_prefix_with_commitment() {
        let prefix = token_prefix(&Token::non_fungible(CATEGORY, Capability::Minting, "abcd")).unwrap();
        assert_eq!(prefix[33], HAS_NFT | HAS_COMMITMENT_LENGTH | 0x02);
        assert_eq!(&prefix[34..], &[0x02, 0xab, 0xcd]);
    }

    #[test]
    fn nft_prefix_ignores_zero_amount() {
        let mut token = Token::non_fungible(CATEGORY, Capability::None, "");
        token.amount = Some(0);
        let prefix = token_prefix(&token).unwrap();
        assert_eq!(prefix.len(), 34);
        assert_eq!(prefix[33], HAS_NFT);
    }

    #[test]
    fn zero_fungible_is_empty() {
        let err = token_prefix(&Token::fungible(CATEGORY, 0)).unwrap_err();
        assert_eq!(err, EncodingError::EmptyToken);
    }

    #[test]
    fn oversized_commitment_rejected() {
        let token = Token::non_fungible(CATEGORY, Capability::None, "00".repeat(41));
        assert!(matches!(token_prefix(&token), Err(EncodingError::CommitmentTooLong { .. })));
    }

    #[test]
    fn data_carrier_mixes_hex_and_text() {
        let script = data_carrier_script(&["0xdead".to_string(), "hi".to_string()]).unwrap();
        assert_eq!(script, vec![OP_RETURN, 0x02, 0xde, 0xad, 0x02, b'h', b'i']);
    }

    #[test]
    fn data_carrier_bad_hex() {
        assert!(data_carrier_script(&["0xzz".to_string()]).is_err());
    }
}
