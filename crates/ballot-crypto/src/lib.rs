//! Cryptographic primitives for the ballot ledger.
//!
//! Provides SHA-256 content hashing, the canonical JSON rendering that block
//! digests are computed over, hash chain verification, CSPRNG-salted nonce
//! generation, and ChaCha20-Poly1305 sealing for audit records.
//!
//! All crypto operations wrap established libraries - no custom cryptography.

pub mod canonical;
pub mod chain;
pub mod cipher;
pub mod hasher;
pub mod nonce;

pub use canonical::{canonical_json, CanonicalError};
pub use chain::{ChainError, HashChainVerifier, HashLinked};
pub use cipher::{AuditCipher, AuditKey, CipherError};
pub use hasher::{BlockHasher, ContentHasher};
pub use nonce::NonceGenerator;
