use std::sync::Arc;

use ballot_types::{Proof, Receipt};
use tracing::debug;

use crate::error::LedgerError;
use crate::traits::LedgerReader;

/// Public inclusion-proof lookups. Read-only.
pub struct ProofService {
    reader: Arc<dyn LedgerReader>,
}

impl ProofService {
    pub fn new(reader: Arc<dyn LedgerReader>) -> Self {
        Self { reader }
    }

    /// Proof for `voter_hash`, or `None` if that voter has not voted.
    /// Hex case is ignored.
    pub fn lookup(&self, voter_hash: &str) -> Result<Option<Proof>, LedgerError> {
        let proof = self.reader.get_proof(&voter_hash.trim().to_ascii_lowercase())?;
        debug!(found = proof.is_some(), "proof lookup");
        Ok(proof)
    }

    /// Check a voter-held receipt against the ledger: the voter's block must
    /// exist and carry the receipt's block and vote hashes.
    pub fn verify_receipt(&self, receipt: &Receipt) -> Result<bool, LedgerError> {
        Ok(self
            .lookup(&receipt.voter_id_hash)?
            .is_some_and(|proof| {
                proof.block_hash == receipt.block_hash && proof.vote_hash == receipt.vote_hash
            }))
    }
}
