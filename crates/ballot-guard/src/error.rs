/// Reasons a submission is rejected by the replay guard. Nothing is
/// recorded when any of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    #[error("duplicate transaction detected")]
    DuplicateNonce,

    #[error("voter has already cast a vote")]
    AlreadyVoted,

    #[error("transaction timestamp expired ({skew_secs}s from server time)")]
    ExpiredTimestamp { skew_secs: i64 },

    #[error("replay guard lock poisoned")]
    LockPoisoned,
}

impl ReplayError {
    /// Stable reason code for callers outside the process.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::DuplicateNonce => "duplicate_nonce",
            Self::AlreadyVoted => "already_voted",
            Self::ExpiredTimestamp { .. } => "expired_timestamp",
            Self::LockPoisoned => "replay_guard_unavailable",
        }
    }
}
