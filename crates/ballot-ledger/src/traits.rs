use ballot_types::{Proof, VoteRecord};

use crate::block::Block;
use crate::error::LedgerError;
use crate::ledger::ChainStatus;

/// Write boundary for ledger appends.
pub trait LedgerWriter: Send + Sync {
    /// Append one vote record as the next block.
    ///
    /// The block is durably persisted before it becomes visible to readers.
    /// On failure nothing is appended.
    fn append(&self, record: VoteRecord) -> Result<Block, LedgerError>;
}

/// Read boundary for ledger queries and audits.
pub trait LedgerReader: Send + Sync {
    /// Structural verification over committed blocks.
    fn verify(&self) -> Result<ChainStatus, LedgerError>;

    /// Inclusion proof for the first block carrying `voter_hash`.
    fn get_proof(&self, voter_hash: &str) -> Result<Option<Proof>, LedgerError>;

    /// The block carrying `voter_hash`'s vote, if any.
    fn find_vote(&self, voter_hash: &str) -> Result<Option<Block>, LedgerError>;

    fn block(&self, index: u64) -> Result<Option<Block>, LedgerError>;

    fn head(&self) -> Result<Block, LedgerError>;

    fn read_all(&self) -> Result<Vec<Block>, LedgerError>;

    /// Number of blocks, genesis included.
    fn block_count(&self) -> Result<u64, LedgerError>;
}
