//! Identity hashing utilities

use blake3::Hasher;

use crate::types::EntityId;

/// Derived identifiers stay below this bound.
const UID_MODULUS: u64 = 1_000_000_000;

/// blake3 digest of an entity id's text form.
pub fn hash_id(id: &EntityId) -> [u8; 32] {
    let mut hasher = Hasher::new();
    hasher.update(id.to_string().as_bytes());
    *hasher.finalize().as_bytes()
}

/// Stable numeric identifier: first 8 digest bytes little-endian, mod 10^9.
/// Same id gives the same value across runs and platforms.
pub fn derived_uid(id: &EntityId) -> u64 {
    let digest = hash_id(id);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(head) % UID_MODULUS
}

