//! CashAddr address encoding.
//!
//! Addresses are `prefix:payload` where the payload is base32 over a version
//! byte and a hash, followed by a 40-bit BCH-code checksum that also commits
//! to the prefix. The version byte carries the address type (bits 3..6) and
//! the hash size (bits 0..2).
//!
//! Token-aware types (`z...` / `r...`) lock to the same script as their plain
//! counterparts; they only signal that the receiving wallet understands
//! CashTokens.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::AddressError;

/// Base32 character set for 5-bit values.
const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Number of 5-bit checksum groups.
const CHECKSUM_LEN: usize = 8;

/// Prefixes accepted by [`CashAddress::decode`].
const KNOWN_PREFIXES: &[&str] = &["bitcoincash", "bchtest", "bchreg"];

/// The address type encoded in the version byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressKind {
    /// Pay to public key hash.
    P2pkh,
    /// Pay to script hash (20 or 32 byte hash).
    P2sh,
    /// Token-aware pay to public key hash.
    TokenP2pkh,
    /// Token-aware pay to script hash.
    TokenP2sh,
}

impl AddressKind {
    fn type_bits(&self) -> u8 {
        match self {
            Self::P2pkh => 0,
            Self::P2sh => 1,
            Self::TokenP2pkh => 2,
            Self::TokenP2sh => 3,
        }
    }

    fn from_type_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::P2pkh),
            1 => Some(Self::P2sh),
            2 => Some(Self::TokenP2pkh),
            3 => Some(Self::TokenP2sh),
            _ => None,
        }
    }

    /// Whether this address type signals CashTokens support.
    pub fn supports_tokens(&self) -> bool {
        matches!(self, Self::TokenP2pkh | Self::TokenP2sh)
    }

    fn is_script_hash(&self) -> bool {
        matches!(self, Self::P2sh | Self::TokenP2sh)
    }
}

/// A decoded CashAddr address.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CashAddress {
    prefix: String,
    kind: AddressKind,
    hash: Vec<u8>,
}

impl CashAddress {
    /// Build an address from its parts. The hash must be 20 bytes, or 32
    /// bytes for script-hash kinds.
    pub fn new(prefix: &str, kind: AddressKind, hash: &[u8]) -> Result<Self, AddressError> {
        size_code(kind, hash.len())?;
        Ok(Self {
            prefix: prefix.to_ascii_lowercase(),
            kind,
            hash: hash.to_vec(),
        })
    }

    /// The human-readable prefix, without the `:` separator.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The address type.
    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    /// The raw hash payload.
    pub fn hash(&self) -> &[u8] {
        &self.hash
    }

    /// The same destination re-encoded as its token-aware counterpart.
    pub fn to_token_aware(&self) -> Self {
        let kind = match self.kind {
            AddressKind::P2pkh | AddressKind::TokenP2pkh => AddressKind::TokenP2pkh,
            AddressKind::P2sh | AddressKind::TokenP2sh => AddressKind::TokenP2sh,
        };
        Self {
            kind,
            ..self.clone()
        }
    }

    /// Locking bytecode paying to this address.
    pub fn locking_bytecode(&self) -> Vec<u8> {
        let mut script = Vec::with_capacity(self.hash.len() + 5);
        if self.kind.is_script_hash() {
            // OP_HASH160 / OP_HASH256 <hash> OP_EQUAL
            script.push(if self.hash.len() == 32 { 0xaa } else { 0xa9 });
            script.push(self.hash.len() as u8);
            script.extend_from_slice(&self.hash);
            script.push(0x87);
        } else {
            // OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG
            script.extend_from_slice(&[0x76, 0xa9, 0x14]);
            script.extend_from_slice(&self.hash);
            script.extend_from_slice(&[0x88, 0xac]);
        }
        script
    }

    /// Encode as `prefix:payload`.
    pub fn encode(&self) -> String {
        // Size code validated at construction.
        let version = (self.kind.type_bits() << 3) | size_code(self.kind, self.hash.len()).unwrap_or(0);
        let mut raw = Vec::with_capacity(1 + self.hash.len());
        raw.push(version);
        raw.extend_from_slice(&self.hash);
        let payload = convert_bits(&raw, 8, 5, true).unwrap_or_default();

        let checksum = create_checksum(&self.prefix, &payload);

        let mut result = String::with_capacity(self.prefix.len() + 1 + payload.len() + CHECKSUM_LEN);
        result.push_str(&self.prefix);
        result.push(':');
        for &d in payload.iter().chain(checksum.iter()) {
            result.push(CHARSET[d as usize] as char);
        }
        result
    }

    /// Decode an address that must carry its prefix.
    pub fn decode(s: &str) -> Result<Self, AddressError> {
        if !s.contains(':') {
            return Err(AddressError::MissingSeparator);
        }
        Self::decode_with_default(s, "")
    }

    /// Decode an address, assuming `default_prefix` when none is present.
    pub fn decode_with_default(s: &str, default_prefix: &str) -> Result<Self, AddressError> {
        let has_lower = s.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = s.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper {
            return Err(AddressError::MixedCase);
        }
        let s = s.to_ascii_lowercase();

        let (prefix, payload) = match s.split_once(':') {
            Some((prefix, payload)) => (prefix.to_string(), payload.to_string()),
            None if !default_prefix.is_empty() => (default_prefix.to_ascii_lowercase(), s.clone()),
            None => return Err(AddressError::MissingSeparator),
        };
        if !KNOWN_PREFIXES.contains(&prefix.as_str()) {
            return Err(AddressError::UnknownPrefix(prefix));
        }
        if payload.len() <= CHECKSUM_LEN {
            return Err(AddressError::InvalidLength);
        }

        let mut data = Vec::with_capacity(payload.len());
        for c in payload.chars() {
            let pos = CHARSET
                .iter()
                .position(|&ch| ch as char == c)
                .ok_or(AddressError::InvalidCharacter(c))?;
            data.push(pos as u8);
        }

        if !verify_checksum(&prefix, &data) {
            return Err(AddressError::InvalidChecksum);
        }

        let raw = convert_bits(&data[..data.len() - CHECKSUM_LEN], 5, 8, false)
            .ok_or(AddressError::InvalidPadding)?;
        let (&version, hash) = raw.split_first().ok_or(AddressError::InvalidLength)?;
        if version & 0x80 != 0 {
            return Err(AddressError::InvalidVersion(version));
        }
        let kind = AddressKind::from_type_bits(version >> 3)
            .ok_or(AddressError::InvalidVersion(version))?;
        if size_code(kind, hash.len())? != version & 0x07 {
            return Err(AddressError::InvalidLength);
        }

        Ok(Self {
            prefix,
            kind,
            hash: hash.to_vec(),
        })
    }
}

impl fmt::Display for CashAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl FromStr for CashAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for CashAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for CashAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::decode(&s).map_err(serde::de::Error::custom)
    }
}

// --- CashAddr internals ---

/// Version-byte size code for a hash length.
fn size_code(kind: AddressKind, len: usize) -> Result<u8, AddressError> {
    match (len, kind.is_script_hash()) {
        (20, _) => Ok(0),
        (32, true) => Ok(3),
        _ => Err(AddressError::InvalidLength),
    }
}

/// 40-bit BCH-code checksum over 5-bit values.
fn polymod(values: impl Iterator<Item = u8>) -> u64 {
    const GEN: [u64; 5] = [
        0x98f2bc8e61,
        0x79b76d99e2,
        0xf33e5fb3c4,
        0xae2eabe2a8,
        0x1e4f43e470,
    ];
    let mut c: u64 = 1;
    for d in values {
        let c0 = (c >> 35) as u8;
        c = ((c & 0x07_ffff_ffff) << 5) ^ d as u64;
        for (i, &g) in GEN.iter().enumerate() {
            if (c0 >> i) & 1 != 0 {
                c ^= g;
            }
        }
    }
    c ^ 1
}

/// Lower five bits of each prefix character, then the zero separator.
fn prefix_expand(prefix: &str) -> impl Iterator<Item = u8> + '_ {
    prefix.bytes().map(|b| b & 0x1f).chain(std::iter::once(0))
}

fn create_checksum(prefix: &str, payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let pm = polymod(
        prefix_expand(prefix)
            .chain(payload.iter().copied())
            .chain([0u8; CHECKSUM_LEN]),
    );
    let mut out = [0u8; CHECKSUM_LEN];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = ((pm >> (5 * (CHECKSUM_LEN - 1 - i))) & 0x1f) as u8;
    }
    out
}

fn verify_checksum(prefix: &str, data: &[u8]) -> bool {
    polymod(prefix_expand(prefix).chain(data.iter().copied())) == 0
}

/// Convert between bit widths (8-bit bytes to 5-bit groups and back).
fn convert_bits(data: &[u8], from_bits: u32, to_bits: u32, pad: bool) -> Option<Vec<u8>> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut ret = Vec::new();
    let maxv = (1u32 << to_bits) - 1;
    for &value in data {
        let v = value as u32;
        if v >> from_bits != 0 {
            return None;
        }
        acc = (acc << from_bits) | v;
        bits += from_bits;
        while bits >= to_bits {
            bits -= to_bits;
            ret.push(((acc >> bits) & maxv) as u8);
        }
    }
    if pad {
        if bits > 0 {
            ret.push(((acc << (to_bits - bits)) & maxv) as u8);
        }
    } else if bits >= from_bits || ((acc << (to_bits - bits)) & maxv) != 0 {
        return None;
    }
    Some(ret)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE_ADDR: &str = "bitcoincash:qpm2qsznhks23z7629mms6s4cwef74vcwvy22gdx6a";
    const REFERENCE_HASH: &str = "76a04053bda0a88bda5177b86a15c3b29f559873";

    fn reference_hash() -> Vec<u8> {
        hex::decode(REFERENCE_HASH).unwrap()
    }

    #[test]
    fn decode_reference_p2pkh() {
        let addr = CashAddress::decode(REFERENCE_ADDR).unwrap();
        assert_eq!(addr.prefix(), "bitcoincash");
        assert_eq!(addr.kind(), AddressKind::P2pkh);
        assert_eq!(addr.hash(), reference_hash().as_slice());
    }

    #[test]
    fn encode_reference_p2pkh() {
        let addr = CashAddress::new("bitcoincash", AddressKind::P2pkh, &reference_hash()).unwrap();
        assert_eq!(addr.encode(), REFERENCE_ADDR);
    }

    #[test]
    fn decode_uppercase() {
        let addr = CashAddress::decode(&REFERENCE_ADDR.to_ascii_uppercase()).unwrap();
        assert_eq!(addr.hash(), reference_hash().as_slice());
    }

    #[test]
    fn decode_without_prefix_uses_default() {
        let bare = REFERENCE_ADDR.split_once(':').unwrap().1;
        let addr = CashAddress::decode_with_default(bare, "bitcoincash").unwrap();
        assert_eq!(addr.encode(), REFERENCE_ADDR);
    }

    #[test]
    fn decode_without_prefix_requires_default() {
        let bare = REFERENCE_ADDR.split_once(':').unwrap().1;
        assert_eq!(CashAddress::decode(bare).unwrap_err(), AddressError::MissingSeparator);
    }

    #[test]
    fn wrong_prefix_fails_checksum() {
        let bare = REFERENCE_ADDR.split_once(':').unwrap().1;
        let err = CashAddress::decode(&format!("bchtest:{bare}")).unwrap_err();
        assert_eq!(err, AddressError::InvalidChecksum);
    }

    #[test]
    fn unknown_prefix_rejected() {
        let err = CashAddress::decode("litecoin:qpm2qsznhks23z7629mms6s4cwef74vcwvy22gdx6a").unwrap_err();
        assert!(matches!(err, AddressError::UnknownPrefix(_)));
    }

    #[test]
    fn mixed_case_rejected() {
        let err = CashAddress::decode("bitcoincash:Qpm2qsznhks23z7629mms6s4cwef74vcwvy22gdx6a").unwrap_err();
        assert_eq!(err, AddressError::MixedCase);
    }

    #[test]
    fn flipped_character_fails_checksum() {
        let err = CashAddress::decode("bitcoincash:qpm2qsznhks23z7629mms6s4cwef74vcwvy22gdx6q").unwrap_err();
        assert_eq!(err, AddressError::InvalidChecksum);
    }

    #[test]
    fn invalid_character_rejected() {
        let err = CashAddress::decode("bitcoincash:qpm2qsznhks23z7629mms6s4cwef74vcwvy22gdxbo").unwrap_err();
        assert!(matches!(err, AddressError::InvalidCharacter(_)));
    }

    #[test]
    fn token_aware_roundtrip_keeps_hash() {
        let plain = CashAddress::decode(REFERENCE_ADDR).unwrap();
        let token = plain.to_token_aware();
        assert_eq!(token.kind(), AddressKind::TokenP2pkh);
        assert!(token.encode().starts_with("bitcoincash:z"));
        let decoded = CashAddress::decode(&token.encode()).unwrap();
        assert_eq!(decoded, token);
        assert_eq!(decoded.locking_bytecode(), plain.locking_bytecode());
    }

    #[test]
    fn p2pkh_locking_bytecode() {
        let addr = CashAddress::decode(REFERENCE_ADDR).unwrap();
        let script = addr.locking_bytecode();
        assert_eq!(script.len(), 25);
        assert_eq!(&script[..3], &[0x76, 0xa9, 0x14]);
        assert_eq!(&script[23..], &[0x88, 0xac]);
    }

    #[test]
    fn p2sh32_roundtrip_and_bytecode() {
        let addr = CashAddress::new("bchtest", AddressKind::P2sh, &[0x11; 32]).unwrap();
        let decoded = CashAddress::decode(&addr.encode()).unwrap();
        assert_eq!(decoded, addr);
        let script = decoded.locking_bytecode();
        assert_eq!(script.len(), 35);
        assert_eq!(script[0], 0xaa);
        assert_eq!(script[34], 0x87);
    }

    #[test]
    fn p2pkh_rejects_32_byte_hash() {
        let err = CashAddress::new("bitcoincash", AddressKind::P2pkh, &[0u8; 32]).unwrap_err();
        assert_eq!(err, AddressError::InvalidLength);
    }

    #[test]
    fn serde_as_string() {
        let addr = CashAddress::decode(REFERENCE_ADDR).unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{REFERENCE_ADDR}\""));
        let back: CashAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
