//! Replay protection for vote submissions.
//!
//! [`ReplayGuard`] owns the consumed-nonce set, the voted set and the
//! per-voter vote times behind one lock and exposes only atomic operations
//! on them. The voted set is a cache: the ledger is the source of truth for
//! who has voted, and [`ReplayGuard::restore_voter`] rebuilds the cache
//! from it at startup.

pub mod config;
pub mod error;
pub mod guard;

pub use config::GuardConfig;
pub use error::ReplayError;
pub use guard::{Admission, ReplayGuard};
