//! Append-only vote ledger.
//!
//! This crate is the tamper-evidence core. It provides:
//! - [`Block`] / [`BlockPayload`] with the persisted, hash-linked format
//! - [`BlockStore`] boundary with JSON file and in-memory stores
//! - [`Ledger`]: single-writer append, structural verify, voter index
//! - `LedgerWriter` / `LedgerReader` trait boundaries
//! - [`IntegrityVerifier`]: read-only full-chain audit
//! - [`ProofService`]: public inclusion-proof lookups

pub mod block;
pub mod error;
pub mod ledger;
pub mod proof;
pub mod store;
pub mod traits;
pub mod verifier;

pub use block::{Block, BlockPayload, GENESIS_MARKER};
pub use error::LedgerError;
pub use ledger::{ChainStatus, Ledger};
pub use proof::ProofService;
pub use store::{BlockStore, JsonFileStore, MemoryStore};
pub use traits::{LedgerReader, LedgerWriter};
pub use verifier::IntegrityVerifier;
