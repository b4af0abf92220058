//! Contracts for everything the recorder consumes from outside the core,
//! plus small in-process implementations for embedding and tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use ballot_types::Geolocation;

use crate::audit::AuditRecord;
use crate::error::CollaboratorError;

/// Who a session belongs to.
#[derive(Clone, PartialEq, Eq)]
pub struct VoterIdentity {
    pub voter_id: String,
    pub voter_name: String,
}

impl VoterIdentity {
    pub fn new(voter_id: impl Into<String>, voter_name: impl Into<String>) -> Self {
        Self {
            voter_id: voter_id.into(),
            voter_name: voter_name.into(),
        }
    }
}

impl std::fmt::Debug for VoterIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoterIdentity").finish_non_exhaustive()
    }
}

/// Auth collaborator. `Ok(None)` means the token is unknown or expired.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    async fn verify_session(&self, token: &str) -> Result<Option<VoterIdentity>, CollaboratorError>;
}

/// Coarse IP geolocation. Called under a timeout; any error or timeout
/// degrades to an unknown location.
#[async_trait]
pub trait GeoResolver: Send + Sync {
    async fn resolve(&self, address: &str) -> Result<Geolocation, CollaboratorError>;
}

/// Voter registry that carries a "has voted" flag. Must be idempotent.
#[async_trait]
pub trait VoterDirectory: Send + Sync {
    async fn mark_voted(&self, voter_id: &str) -> Result<(), CollaboratorError>;
}

/// Encrypted audit records keyed by voter hash.
///
/// `put` must be idempotent for the same voter hash and block hash, and
/// must refuse to rebind a voter hash to a different block.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn put(&self, voter_hash: &str, record: &AuditRecord) -> Result<(), CollaboratorError>;

    async fn get(&self, voter_hash: &str) -> Result<Option<AuditRecord>, CollaboratorError>;

    /// Every stored `(voter_hash, record)`, decrypted, in no particular order.
    async fn entries(&self) -> Result<Vec<(String, AuditRecord)>, CollaboratorError>;
}

/// Sessions from a fixed token table.
#[derive(Default)]
pub struct StaticSessions {
    sessions: RwLock<HashMap<String, VoterIdentity>>,
}

impl StaticSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(self, token: impl Into<String>, identity: VoterIdentity) -> Self {
        self.insert(token, identity);
        self
    }

    pub fn insert(&self, token: impl Into<String>, identity: VoterIdentity) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.insert(token.into(), identity);
        }
    }

    /// Expire a session.
    pub fn revoke(&self, token: &str) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.remove(token);
        }
    }
}

#[async_trait]
impl SessionVerifier for StaticSessions {
    async fn verify_session(&self, token: &str) -> Result<Option<VoterIdentity>, CollaboratorError> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| CollaboratorError::unavailable("sessions", "lock poisoned"))?;
        Ok(sessions.get(token).cloned())
    }
}

/// Resolves every address to the same location.
pub struct FixedGeoResolver(pub Geolocation);

#[async_trait]
impl GeoResolver for FixedGeoResolver {
    async fn resolve(&self, _address: &str) -> Result<Geolocation, CollaboratorError> {
        Ok(self.0.clone())
    }
}

/// For deployments without a geolocation service.
pub struct UnknownGeoResolver;

#[async_trait]
impl GeoResolver for UnknownGeoResolver {
    async fn resolve(&self, _address: &str) -> Result<Geolocation, CollaboratorError> {
        Ok(Geolocation::unknown())
    }
}

/// In-memory voter directory with an outage switch.
#[derive(Default)]
pub struct MemoryDirectory {
    voted: RwLock<HashSet<String>>,
    unavailable: AtomicBool,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn has_voted(&self, voter_id: &str) -> bool {
        self.voted
            .read()
            .map(|v| v.contains(voter_id))
            .unwrap_or(false)
    }

    pub fn voted_count(&self) -> usize {
        self.voted.read().map(|v| v.len()).unwrap_or(0)
    }
}

#[async_trait]
impl VoterDirectory for MemoryDirectory {
    async fn mark_voted(&self, voter_id: &str) -> Result<(), CollaboratorError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CollaboratorError::unavailable("voter directory", "offline"));
        }
        self.voted
            .write()
            .map_err(|_| CollaboratorError::unavailable("voter directory", "lock poisoned"))?
            .insert(voter_id.to_string());
        Ok(())
    }
}
