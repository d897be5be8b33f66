//! SHA-256 value hashes
//!
//! Stored values are compared by [`ContentHash`] only. The same hash names
//! blob entries (`<hex>.xref`) in the zip containers and is the leaf type of
//! the snapshot digest.

use sha2::{Digest, Sha256};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

const HASH_LEN: usize = 32;

/// SHA-256 of a value's canonical parts or of a blob's bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash([u8; HASH_LEN]);

impl ContentHash {
    /// Digest of an empty snapshot
    pub const ZERO: Self = Self([0; HASH_LEN]);

    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Hash of raw blob bytes
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Hash of a value given as its canonical parts (syntax name first)
    ///
    /// Each part is length-prefixed so `["ab", "c"]` and `["a", "bc"]` differ.
    #[must_use]
    pub fn compute_parts<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        let mut hasher = Sha256::new();
        for part in parts {
            let part = part.as_ref();
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        Self(hasher.finalize().into())
    }

    /// Lowercase hex, the stem of a `.xref` entry name
    #[inline]
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 16 hex digits, for log lines and debug strings
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }

    #[inline]
    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ContentHash {
    type Err = HashError;

    /// Parse the hex form written in `.xref` names and `xref` attributes
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let bytes: [u8; HASH_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| HashError::InvalidLength(bytes.len()))?;
        Ok(Self(bytes))
    }
}

impl serde::Serialize for ContentHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for ContentHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// A blob address that is not 64 hex digits
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HashError {
    #[error("blob address must be {HASH_LEN} bytes, got {0}")]
    InvalidLength(usize),

    #[error("blob address is not hex: {0}")]
    HexDecode(#[from] hex::FromHexError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_hash_is_plain_sha256() {
        assert_eq!(
            ContentHash::compute(b"abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn value_parts_keep_their_boundaries() {
        let a = ContentHash::compute_parts(["STRING", "ab", "c"]);
        let b = ContentHash::compute_parts(["STRING", "a", "bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn xref_stem_parses_back() {
        let hash = ContentHash::compute(b"-----BEGIN CERTIFICATE-----");
        assert_eq!(hash.to_hex().parse::<ContentHash>().unwrap(), hash);
        assert!(hash.to_hex().starts_with(&hash.short()));
    }

    #[test]
    fn short_or_non_hex_addresses_are_rejected() {
        assert_eq!("abcd".parse::<ContentHash>(), Err(HashError::InvalidLength(2)));
        assert!(matches!("zz".parse::<ContentHash>(), Err(HashError::HexDecode(_))));
    }

    #[test]
    fn file_records_carry_the_hash_as_hex() {
        let hash = ContentHash::compute(b"logo");
        let json = serde_json::to_value(hash).unwrap();
        assert_eq!(json, serde_json::Value::String(hash.to_hex()));
        assert_eq!(serde_json::from_value::<ContentHash>(json).unwrap(), hash);
    }
}
