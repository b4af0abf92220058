use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use ballot_crypto::NonceGenerator;
use ballot_types::temporal::parse_iso;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::GuardConfig;
use crate::error::ReplayError;

/// A submission that passed every replay check but has not been recorded.
///
/// Produced by [`ReplayGuard::admit`], consumed by [`ReplayGuard::commit`].
/// While it is alive its voter hash and nonce are reserved: any other
/// admission or registration for either is rejected, whichever recorder it
/// comes from. Dropping it releases both and records nothing, which is what
/// a caller wants when the ledger append between the two fails.
#[must_use = "an admission records nothing until it is committed"]
pub struct Admission<'g> {
    guard: &'g ReplayGuard,
    voter_hash: String,
    nonce: String,
    timestamp: String,
    settled: bool,
}

impl Admission<'_> {
    pub fn voter_hash(&self) -> &str {
        &self.voter_hash
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }
}

impl fmt::Debug for Admission<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Admission")
            .field("voter_hash", &self.voter_hash)
            .field("nonce", &self.nonce)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

impl PartialEq for Admission<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.voter_hash == other.voter_hash
            && self.nonce == other.nonce
            && self.timestamp == other.timestamp
    }
}

impl Eq for Admission<'_> {}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        // Released even through a poisoned lock.
        let mut state = self
            .guard
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        state.release(&self.voter_hash, &self.nonce);
        debug!(voter_hash = %self.voter_hash, "admission released");
    }
}

#[derive(Default)]
struct ReplayState {
    used_nonces: HashSet<String>,
    voted: HashSet<String>,
    vote_times: HashMap<String, String>,
    /// Held by live [`Admission`]s.
    reserved_nonces: HashSet<String>,
    reserved_voters: HashSet<String>,
}

impl ReplayState {
    fn check(
        &self,
        window_secs: u64,
        voter_hash: &str,
        nonce: &str,
        timestamp: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ReplayError> {
        if self.used_nonces.contains(nonce) || self.reserved_nonces.contains(nonce) {
            return Err(ReplayError::DuplicateNonce);
        }
        if self.voted.contains(voter_hash) || self.reserved_voters.contains(voter_hash) {
            return Err(ReplayError::AlreadyVoted);
        }

        match parse_iso(timestamp) {
            Ok(submitted) => {
                let skew_ms = (now - submitted).num_milliseconds();
                let window_ms = i64::try_from(window_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
                if skew_ms.abs() > window_ms {
                    return Err(ReplayError::ExpiredTimestamp {
                        skew_secs: skew_ms / 1000,
                    });
                }
            }
            // Unreadable timestamps skip the freshness check; the vote proceeds.
            Err(e) => {
                warn!(voter_hash, error = %e, "unparseable submission timestamp; freshness check skipped");
            }
        }

        Ok(())
    }

    fn record(&mut self, voter_hash: String, nonce: String, timestamp: String) {
        self.used_nonces.insert(nonce);
        self.voted.insert(voter_hash.clone());
        self.vote_times.insert(voter_hash, timestamp);
    }

    fn reserve(&mut self, voter_hash: &str, nonce: &str) {
        self.reserved_voters.insert(voter_hash.to_string());
        self.reserved_nonces.insert(nonce.to_string());
    }

    fn release(&mut self, voter_hash: &str, nonce: &str) {
        self.reserved_voters.remove(voter_hash);
        self.reserved_nonces.remove(nonce);
    }
}

/// Single-use nonce and one-vote-per-voter enforcement.
///
/// All state sits behind one mutex. A nonce and the voter hash it was
/// submitted with are always recorded together: no caller can observe one
/// without the other. Share one guard (in an `Arc`) between every recorder
/// that writes to the same ledger.
pub struct ReplayGuard {
    config: GuardConfig,
    state: Mutex<ReplayState>,
}

impl ReplayGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ReplayState::default()),
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// `true` if `voter_hash` may still vote. Fails closed if the guard's
    /// lock is poisoned.
    pub fn check_duplicate_voter(&self, voter_hash: &str) -> bool {
        match self.lock() {
            Ok(state) => !state.voted.contains(voter_hash),
            Err(e) => {
                warn!(voter_hash, error = %e, "replay guard unavailable; treating voter as already voted");
                false
            }
        }
    }

    /// Check and record a submission in one step.
    pub fn register_vote(
        &self,
        voter_hash: &str,
        nonce: &str,
        timestamp: &str,
    ) -> Result<(), ReplayError> {
        self.register_vote_at(voter_hash, nonce, timestamp, Utc::now())
    }

    /// [`Self::register_vote`] against an explicit clock reading.
    pub fn register_vote_at(
        &self,
        voter_hash: &str,
        nonce: &str,
        timestamp: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ReplayError> {
        let mut state = self.lock()?;
        state.check(
            self.config.freshness_window_secs,
            voter_hash,
            nonce,
            timestamp,
            now,
        )?;
        state.record(voter_hash.to_string(), nonce.to_string(), timestamp.to_string());
        debug!(voter_hash, "vote registered");
        Ok(())
    }

    /// Run every check and reserve the voter hash and nonce without
    /// recording them.
    pub fn admit(
        &self,
        voter_hash: &str,
        nonce: &str,
        timestamp: &str,
    ) -> Result<Admission<'_>, ReplayError> {
        self.admit_at(voter_hash, nonce, timestamp, Utc::now())
    }

    pub fn admit_at(
        &self,
        voter_hash: &str,
        nonce: &str,
        timestamp: &str,
        now: DateTime<Utc>,
    ) -> Result<Admission<'_>, ReplayError> {
        let mut state = self.lock()?;
        state.check(
            self.config.freshness_window_secs,
            voter_hash,
            nonce,
            timestamp,
            now,
        )?;
        state.reserve(voter_hash, nonce);
        Ok(Admission {
            guard: self,
            voter_hash: voter_hash.to_string(),
            nonce: nonce.to_string(),
            timestamp: timestamp.to_string(),
            settled: false,
        })
    }

    /// Record an admitted submission in the guard that issued it.
    ///
    /// The reservation taken by `admit` already excludes every competing
    /// submission, so nothing is re-checked here.
    pub fn commit(&self, mut admission: Admission<'_>) -> Result<(), ReplayError> {
        debug_assert!(std::ptr::eq(self, admission.guard), "admission from another guard");
        let guard = admission.guard;
        let mut state = guard.lock()?;
        debug!(voter_hash = %admission.voter_hash, "admission committed");
        state.release(&admission.voter_hash, &admission.nonce);
        state.record(
            std::mem::take(&mut admission.voter_hash),
            std::mem::take(&mut admission.nonce),
            std::mem::take(&mut admission.timestamp),
        );
        admission.settled = true;
        Ok(())
    }

    /// Mark a voter as having voted, without a nonce. Used when rebuilding
    /// from committed ledger blocks.
    pub fn restore_voter(&self, voter_hash: &str, timestamp: &str) -> Result<(), ReplayError> {
        let mut state = self.lock()?;
        state.voted.insert(voter_hash.to_string());
        state
            .vote_times
            .entry(voter_hash.to_string())
            .or_insert_with(|| timestamp.to_string());
        Ok(())
    }

    /// Fresh single-use nonce bound to a voter and submission time.
    pub fn generate_nonce(&self, voter_id: &str, timestamp: &str) -> String {
        NonceGenerator::generate(voter_id, timestamp)
    }

    pub fn vote_timestamp(&self, voter_hash: &str) -> Option<String> {
        self.lock().ok()?.vote_times.get(voter_hash).cloned()
    }

    pub fn is_nonce_used(&self, nonce: &str) -> bool {
        self.lock()
            .map(|s| s.used_nonces.contains(nonce))
            .unwrap_or(true)
    }

    pub fn voted_count(&self) -> usize {
        self.lock().map(|s| s.voted.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, ReplayState>, ReplayError> {
        self.state.lock().map_err(|_| ReplayError::LockPoisoned)
    }
}

impl Default for ReplayGuard {
    fn default() -> Self {
        Self::new(GuardConfig::default())
    }
}
