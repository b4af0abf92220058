/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Reading or durably writing the block store failed. Nothing was
    /// appended; the caller may retry the whole submission.
    #[error("ledger persistence failed: {0}")]
    IoFailure(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// Raised by the integrity audit, never by writes. The ledger is
    /// append-only, so this is never repaired automatically.
    #[error("integrity violation at block {index}: {reason}")]
    IntegrityViolation { index: u64, reason: String },

    /// The voter hash already has a block. At most one vote per voter is
    /// ever committed.
    #[error("voter {voter_hash} already has a block")]
    DuplicateVoter { voter_hash: String },

    #[error("ledger lock poisoned")]
    LockPoisoned,

    #[error("no ledger found at {0}")]
    NotFound(String),
}

impl LedgerError {
    /// Stable reason code for callers outside the process.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::IoFailure(_) => "ledger_io_failure",
            Self::Serialization(_) => "ledger_serialization_error",
            Self::IntegrityViolation { .. } => "integrity_violation",
            Self::DuplicateVoter { .. } => "already_voted",
            Self::LockPoisoned => "ledger_unavailable",
            Self::NotFound(_) => "ledger_not_found",
        }
    }
}
