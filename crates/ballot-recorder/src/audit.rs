use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use ballot_crypto::{AuditCipher, AuditKey};
use ballot_types::Geolocation;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collaborators::AuditStore;
use crate::error::CollaboratorError;

/// Plaintext audit record. Only ever stored sealed; `Debug` hides the
/// identity and choice.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub voter_id: String,
    pub voter_name: String,
    pub vote_choice: String,
    pub timestamp: String,
    pub block_hash: String,
}

impl fmt::Debug for AuditRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditRecord")
            .field("timestamp", &self.timestamp)
            .field("block_hash", &self.block_hash)
            .finish_non_exhaustive()
    }
}

/// One decrypted row of an authorized audit export: the sealed record
/// joined with the public fields of its ledger block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRow {
    pub timestamp: String,
    pub voter_id: String,
    pub voter_name: String,
    pub vote_choice: String,
    pub geolocation: Geolocation,
    pub kyc_image_hash: String,
    pub block_hash: String,
    pub vote_hash: String,
}

/// In-process [`AuditStore`] holding ChaCha20-Poly1305 sealed records.
///
/// Each record is sealed under a fresh random nonce with the voter hash as
/// associated data, so a ciphertext copied into another voter's slot fails
/// to open.
pub struct SealedAuditStore {
    cipher: AuditCipher,
    sealed: RwLock<HashMap<String, Vec<u8>>>,
    unavailable: AtomicBool,
}

impl SealedAuditStore {
    pub fn new(key: &AuditKey) -> Self {
        Self {
            cipher: AuditCipher::new(key),
            sealed: RwLock::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Simulate an outage: every `put` fails while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.sealed.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw sealed bytes for `voter_hash`.
    pub fn sealed_bytes(&self, voter_hash: &str) -> Option<Vec<u8>> {
        self.sealed.read().ok()?.get(voter_hash).cloned()
    }

    fn open(&self, voter_hash: &str, sealed: &[u8]) -> Result<AuditRecord, CollaboratorError> {
        let plain = self.cipher.open(sealed, voter_hash.as_bytes())?;
        serde_json::from_slice(&plain).map_err(|e| CollaboratorError::Corrupt(e.to_string()))
    }

    fn poisoned() -> CollaboratorError {
        CollaboratorError::unavailable("audit store", "lock poisoned")
    }
}

#[async_trait]
impl AuditStore for SealedAuditStore {
    async fn put(&self, voter_hash: &str, record: &AuditRecord) -> Result<(), CollaboratorError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CollaboratorError::unavailable("audit store", "offline"));
        }

        let mut sealed = self.sealed.write().map_err(|_| Self::poisoned())?;
        if let Some(existing) = sealed.get(voter_hash) {
            let stored = self.open(voter_hash, existing)?;
            if stored.block_hash == record.block_hash {
                debug!(voter_hash, "audit record already present");
                return Ok(());
            }
            return Err(CollaboratorError::Conflict {
                voter_hash: voter_hash.to_string(),
            });
        }

        let plain =
            serde_json::to_vec(record).map_err(|e| CollaboratorError::Corrupt(e.to_string()))?;
        let bytes = self.cipher.seal(&plain, voter_hash.as_bytes())?;
        sealed.insert(voter_hash.to_string(), bytes);
        debug!(voter_hash, block_hash = %record.block_hash, "audit record sealed");
        Ok(())
    }

    async fn get(&self, voter_hash: &str) -> Result<Option<AuditRecord>, CollaboratorError> {
        let sealed = self.sealed.read().map_err(|_| Self::poisoned())?;
        sealed
            .get(voter_hash)
            .map(|bytes| self.open(voter_hash, bytes))
            .transpose()
    }

    async fn entries(&self) -> Result<Vec<(String, AuditRecord)>, CollaboratorError> {
        let sealed = self.sealed.read().map_err(|_| Self::poisoned())?;
        sealed
            .iter()
            .map(|(voter_hash, bytes)| Ok((voter_hash.clone(), self.open(voter_hash, bytes)?)))
            .collect()
    }
}
