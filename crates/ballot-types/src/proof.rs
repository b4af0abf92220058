use serde::{Deserialize, Serialize};

/// Proof of inclusion for a single voter.
///
/// Confirms that a vote was recorded, and where, without revealing the
/// choice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub block_index: u64,
    pub block_hash: String,
    pub timestamp: String,
    pub vote_hash: String,
}

/// Outcome of a full-chain structural audit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub valid: bool,
    pub total_blocks: u64,
    /// First block whose hash or predecessor link does not check out.
    pub error_at_block: Option<u64>,
}

impl IntegrityReport {
    pub fn intact(total_blocks: u64) -> Self {
        Self {
            valid: true,
            total_blocks,
            error_at_block: None,
        }
    }

    pub fn broken(total_blocks: u64, index: u64) -> Self {
        Self {
            valid: false,
            total_blocks,
            error_at_block: Some(index),
        }
    }
}
