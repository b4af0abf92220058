//! Foundation types for the ballot ledger.
//!
//! Every other ballot crate depends on `ballot-types`. Nothing in here knows
//! how blocks are hashed or stored; it only fixes the shapes that cross
//! crate boundaries and the persisted format.
//!
//! # Key Types
//!
//! - [`Digest`]: 32-byte SHA-256 output, rendered as 64 lowercase hex chars
//! - [`VoteRecord`]: anonymized ledger payload (digests + coarse location)
//! - [`Geolocation`]: city/country pair, never finer
//! - [`Receipt`]: what a voter gets back after a counted vote
//! - [`Proof`]: inclusion proof returned by public lookups
//! - [`IntegrityReport`]: result of a full-chain audit

pub mod digest;
pub mod error;
pub mod proof;
pub mod receipt;
pub mod record;
pub mod temporal;

pub use digest::Digest;
pub use error::TypeError;
pub use proof::{IntegrityReport, Proof};
pub use receipt::Receipt;
pub use record::{Geolocation, VoteRecord};
