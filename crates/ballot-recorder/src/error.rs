use ballot_crypto::CipherError;
use ballot_guard::ReplayError;
use ballot_ledger::LedgerError;

/// Session could not be resolved to a voter. The caller re-authenticates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("invalid or expired session")]
    InvalidSession,
}

/// Faults raised by collaborators outside the core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{service} unavailable: {detail}")]
    Unavailable { service: &'static str, detail: String },

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("audit record for {voter_hash} already bound to a different block")]
    Conflict { voter_hash: String },

    #[error("audit record unreadable: {0}")]
    Corrupt(String),
}

impl CollaboratorError {
    pub fn unavailable(service: &'static str, detail: impl Into<String>) -> Self {
        Self::Unavailable {
            service,
            detail: detail.into(),
        }
    }
}

impl From<CipherError> for CollaboratorError {
    fn from(e: CipherError) -> Self {
        Self::Corrupt(e.to_string())
    }
}

/// Why a submission was not counted, or why a recorder operation failed.
#[derive(Debug, thiserror::Error)]
pub enum VoteError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Replay(#[from] ReplayError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A collaborator fault, flattened to text so that its internals never
    /// cross the boundary.
    #[error("collaborator failure: {0}")]
    Collaborator(String),
}

impl From<CollaboratorError> for VoteError {
    fn from(e: CollaboratorError) -> Self {
        Self::Collaborator(e.to_string())
    }
}

impl VoteError {
    /// Stable reason code for callers outside the process.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Session(SessionError::InvalidSession) => "invalid_session",
            Self::Replay(e) => e.reason(),
            Self::Ledger(e) => e.reason(),
            Self::Collaborator(_) => "collaborator_failure",
        }
    }

    /// Whether the same submission may simply be retried. Replay rejections
    /// need a fresh nonce or session instead.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Ledger(LedgerError::IoFailure(_) | LedgerError::LockPoisoned)
                | Self::Collaborator(_)
        )
    }
}

/// Configuration could not be read or parsed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}
