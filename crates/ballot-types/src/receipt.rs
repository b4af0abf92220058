use std::fmt;

use serde::{Deserialize, Serialize};

/// Voter-facing receipt for a counted vote.
///
/// Created exactly once per successful submission and never mutated. It
/// carries digests only; the vote choice cannot be recovered from it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub voter_id_hash: String,
    pub vote_hash: String,
    /// Hash of the ledger block that holds the vote.
    pub block_hash: String,
    pub timestamp: String,
    /// Where the voter can fetch an inclusion proof.
    pub verification_url: String,
}

impl Receipt {
    /// First eight characters of the block hash.
    pub fn short_block_hash(&self) -> &str {
        self.block_hash
            .char_indices()
            .nth(8)
            .map_or(&self.block_hash[..], |(end, _)| &self.block_hash[..end])
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "receipt [{}] at {}",
            self.short_block_hash(),
            self.timestamp
        )
    }
}
