//! Vote submission pipeline.
//!
//! [`VoteRecorder`] drives one submission through session resolution,
//! replay protection, the ledger append, the sealed audit mirror, the voter
//! directory mirror and finally the receipt. Everything outside this
//! process sits behind an async collaborator trait in [`collaborators`].

pub mod audit;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod recorder;
pub mod retry;

pub use audit::{AuditRecord, AuditRow, SealedAuditStore};
pub use collaborators::{
    AuditStore, FixedGeoResolver, GeoResolver, MemoryDirectory, SessionVerifier, StaticSessions,
    UnknownGeoResolver, VoterDirectory, VoterIdentity,
};
pub use config::BallotConfig;
pub use error::{CollaboratorError, ConfigError, SessionError, VoteError};
pub use recorder::{Collaborators, MirrorKind, MirrorLag, VoteRecorder, VoteSubmission};
pub use retry::RetryPolicy;
