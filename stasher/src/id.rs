//! 160-bit node/content identifiers and the XOR distance metric
//!
//! Grounded on the bit-twiddling style of the teacher's
//! `core/qnet-consensus/src/kademlia.rs` (`xor_distance`/`msb_position`),
//! generalized from its ad hoc `[u8; 32]` to the 160-bit SHA-1 space
//! spec.md §3 requires, with `bucket_index` matching the original
//! `stasher.py` `KHash` arithmetic (`floor(log2(a XOR b))`).

use sha2::{Digest, Sha1};
use std::fmt;

pub const ID_BYTES: usize = 20;
pub const ID_BITS: u32 = (ID_BYTES as u32) * 8;

/// A 160-bit identifier: either a node id (SHA-1 of a transport
/// destination) or a content key (SHA-1 of a caller-supplied name).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier([u8; ID_BYTES]);

impl Identifier {
    /// Derive an identifier from a transport destination (spec.md §3)
    pub fn from_destination(destination: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(destination);
        let digest = hasher.finalize();
        let mut bytes = [0u8; ID_BYTES];
        bytes.copy_from_slice(&digest);
        Identifier(bytes)
    }

    /// Derive a content-key identifier from a caller-supplied key (spec.md
    /// §4.10): `get`/`put` hash the raw key themselves rather than asking
    /// the caller to pre-hash it. Same SHA-1 as [`Identifier::from_destination`]
    /// — the two constructors exist to name the caller's intent, not because
    /// the hash differs.
    pub fn from_key(key: &[u8]) -> Self {
        Self::from_destination(key)
    }

    /// Construct directly from raw 20 bytes
    pub fn from_bytes(bytes: [u8; ID_BYTES]) -> Self {
        Identifier(bytes)
    }

    /// Parse from a 40-char hex string
    pub fn from_hex(s: &str) -> Result<Self, crate::error::StasherError> {
        let raw = hex::decode(s)
            .map_err(|e| crate::error::StasherError::BadIdentifier(e.to_string()))?;
        if raw.len() != ID_BYTES {
            return Err(crate::error::StasherError::BadIdentifier(format!(
                "expected {} bytes, got {}",
                ID_BYTES,
                raw.len()
            )));
        }
        let mut bytes = [0u8; ID_BYTES];
        bytes.copy_from_slice(&raw);
        Ok(Identifier(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; ID_BYTES] {
        &self.0
    }

    /// XOR distance to another identifier
    pub fn xor(&self, other: &Identifier) -> Identifier {
        let mut out = [0u8; ID_BYTES];
        for i in 0..ID_BYTES {
            out[i] = self.0[i] ^ other.0[i];
        }
        Identifier(out)
    }

    fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// `floor(log2(self XOR other))`, undefined (returns `None`) when the
    /// two identifiers are equal (spec.md §3, §4.1).
    pub fn bucket_index(&self, other: &Identifier) -> Option<u32> {
        let distance = self.xor(other);
        if distance.is_zero() {
            return None;
        }
        let mut leading_zeros = 0u32;
        for byte in distance.0.iter() {
            if *byte == 0 {
                leading_zeros += 8;
            } else {
                leading_zeros += byte.leading_zeros();
                break;
            }
        }
        Some(ID_BITS - 1 - leading_zeros)
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self.to_hex())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xor_self_is_zero() {
        let id = Identifier::from_destination(b"peer-a");
        assert!(id.xor(&id).is_zero());
    }

    #[test]
    fn bucket_index_undefined_for_equal_ids() {
        let id = Identifier::from_destination(b"peer-a");
        assert_eq!(id.bucket_index(&id), None);
    }

    #[test]
    fn bucket_index_matches_spec_example() {
        // A = ...0001, B = ...0003: differ in bits 0 and 1, XOR = ...0002
        let mut a = [0u8; ID_BYTES];
        a[ID_BYTES - 1] = 0x01;
        let mut b = [0u8; ID_BYTES];
        b[ID_BYTES - 1] = 0x03;
        let ida = Identifier::from_bytes(a);
        let idb = Identifier::from_bytes(b);
        assert_eq!(ida.bucket_index(&idb), Some(1));
    }

    #[test]
    fn bucket_index_in_range() {
        let a = Identifier::from_destination(b"node-a");
        let b = Identifier::from_destination(b"node-b");
        if let Some(idx) = a.bucket_index(&b) {
            assert!(idx < ID_BITS);
        }
    }

    #[test]
    fn hex_round_trip() {
        let id = Identifier::from_destination(b"node-x");
        let hex = id.to_hex();
        assert_eq!(hex.len(), 40);
        let back = Identifier::from_hex(&hex).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn bad_hex_length_is_rejected() {
        assert!(Identifier::from_hex("abcd").is_err());
    }
}
