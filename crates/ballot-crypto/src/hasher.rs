use ballot_types::Digest;
use sha2::{Digest as _, Sha256};

/// SHA-256 content hasher.
///
/// Unlike a domain-separated hasher, nothing is prepended: the ledger's
/// digests are part of a persisted, externally reproducible format and
/// must stay plain SHA-256 over the documented input.
pub struct ContentHasher;

impl ContentHasher {
    /// SHA-256 of raw bytes.
    pub fn hash(data: &[u8]) -> Digest {
        Digest::from_hash(Sha256::digest(data).into())
    }

    /// SHA-256 of the concatenation of `parts`, without separators.
    pub fn hash_parts(parts: &[&[u8]]) -> Digest {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        Digest::from_hash(hasher.finalize().into())
    }

    /// Hex digest of a UTF-8 string. Used for voter identity hashes.
    pub fn hash_hex(text: &str) -> String {
        Self::hash(text.as_bytes()).to_hex()
    }

    /// Verify that data produces the expected digest.
    pub fn verify(data: &[u8], expected: &Digest) -> bool {
        Self::hash(data) == *expected
    }
}

/// The block digest contract.
///
/// `SHA-256(index ‖ timestamp ‖ canonical(payload) ‖ previous_hash)` over the
/// UTF-8 string formed by plain concatenation, `index` rendered in decimal.
/// Reordering any field breaks reproducibility of every stored hash.
pub struct BlockHasher;

impl BlockHasher {
    pub fn compute(
        index: u64,
        timestamp: &str,
        canonical_payload: &str,
        previous_hash: &str,
    ) -> Digest {
        let index = index.to_string();
        ContentHasher::hash_parts(&[
            index.as_bytes(),
            timestamp.as_bytes(),
            canonical_payload.as_bytes(),
            previous_hash.as_bytes(),
        ])
    }
}
