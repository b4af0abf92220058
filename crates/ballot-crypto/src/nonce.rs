use rand::rngs::OsRng;
use rand::RngCore;

use crate::hasher::ContentHasher;

/// Number of CSPRNG bytes mixed into every nonce.
pub const NONCE_SALT_LEN: usize = 16;

/// Single-use submission nonces.
///
/// `SHA-256(voter_id ‖ timestamp ‖ salt)` with a fresh 16-byte salt from the
/// operating system's CSPRNG, hex-encoded. The salt makes nonces unguessable
/// even when identity and timestamp are known.
pub struct NonceGenerator;

impl NonceGenerator {
    pub fn generate(voter_id: &str, timestamp: &str) -> String {
        let mut salt = [0u8; NONCE_SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        Self::derive(voter_id, timestamp, &salt)
    }

    /// Deterministic core of [`Self::generate`], with the salt supplied.
    pub fn derive(voter_id: &str, timestamp: &str, salt: &[u8]) -> String {
        ContentHasher::hash_parts(&[voter_id.as_bytes(), timestamp.as_bytes(), salt]).to_hex()
    }
}
