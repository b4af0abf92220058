use std::sync::Arc;

use ballot_crypto::{ChainError, HashChainVerifier};
use ballot_types::IntegrityReport;
use tracing::{error, info};

use crate::block::Block;
use crate::error::LedgerError;
use crate::store::BlockStore;
use crate::traits::LedgerReader;

/// Read-only, full-chain structural audit.
///
/// Runs the same walk as [`crate::Ledger::verify`] but over a snapshot taken
/// under the ledger's read lock, so an in-flight append is either fully
/// visible or not at all, and the reported block count matches what was
/// checked. A failed audit is an alarm: it is logged at error level and
/// never repaired.
pub struct IntegrityVerifier {
    reader: Arc<dyn LedgerReader>,
}

impl IntegrityVerifier {
    pub fn new(reader: Arc<dyn LedgerReader>) -> Self {
        Self { reader }
    }

    /// Audit the live ledger.
    pub fn check(&self) -> Result<IntegrityReport, LedgerError> {
        let blocks = self.reader.read_all()?;
        Ok(Self::audit_blocks(&blocks))
    }

    /// Audit the live ledger and fail with
    /// [`LedgerError::IntegrityViolation`] if anything is off.
    pub fn ensure_intact(&self) -> Result<IntegrityReport, LedgerError> {
        let blocks = self.reader.read_all()?;
        match HashChainVerifier::verify_chain(&blocks) {
            Ok(()) => Ok(IntegrityReport::intact(blocks.len() as u64)),
            Err(e) => Err(violation(e)),
        }
    }

    /// Audit a persisted ledger without opening it. Unlike
    /// [`crate::Ledger::open`], a missing store is reported, not initialized.
    pub fn audit_store(store: &dyn BlockStore) -> Result<IntegrityReport, LedgerError> {
        let blocks = store
            .load()?
            .ok_or_else(|| LedgerError::NotFound(store.describe()))?;
        Ok(Self::audit_blocks(&blocks))
    }

    pub fn audit_blocks(blocks: &[Block]) -> IntegrityReport {
        let total = blocks.len() as u64;
        match HashChainVerifier::verify_chain(blocks) {
            Ok(()) => {
                info!(total_blocks = total, "chain integrity verified");
                IntegrityReport::intact(total)
            }
            Err(e) => {
                error!(total_blocks = total, index = e.index(), reason = %e, "INTEGRITY VIOLATION");
                IntegrityReport::broken(total, e.index())
            }
        }
    }
}

fn violation(e: ChainError) -> LedgerError {
    error!(index = e.index(), reason = %e, "INTEGRITY VIOLATION");
    LedgerError::IntegrityViolation {
        index: e.index(),
        reason: e.to_string(),
    }
}
