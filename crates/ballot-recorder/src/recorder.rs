use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ballot_crypto::ContentHasher;
use ballot_guard::{ReplayError, ReplayGuard};
use ballot_ledger::{
    Block, IntegrityVerifier, Ledger, LedgerError, LedgerReader, LedgerWriter, ProofService,
};
use ballot_types::temporal::now_iso;
use ballot_types::{Geolocation, Receipt, VoteRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::audit::{AuditRecord, AuditRow};
use crate::collaborators::{AuditStore, GeoResolver, SessionVerifier, VoterDirectory, VoterIdentity};
use crate::config::BallotConfig;
use crate::error::{CollaboratorError, SessionError, VoteError};
use crate::retry::RetryPolicy;

/// The external services a recorder talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub sessions: Arc<dyn SessionVerifier>,
    pub geo: Arc<dyn GeoResolver>,
    pub directory: Arc<dyn VoterDirectory>,
    pub audit: Arc<dyn AuditStore>,
}

/// One vote as submitted by a client.
#[derive(Clone)]
pub struct VoteSubmission {
    pub session_token: String,
    pub vote_choice: String,
    /// Opaque reference produced by the KYC step.
    pub kyc_image_hash: String,
    /// Client network address, used only for coarse geolocation.
    pub client_address: String,
    pub nonce: String,
    /// Client-side submission time, ISO-8601.
    pub timestamp: String,
}

impl fmt::Debug for VoteSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoteSubmission")
            .field("nonce", &self.nonce)
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}

/// Which downstream mirror is behind the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorKind {
    Audit,
    Directory,
}

/// A committed vote whose mirror write has not landed yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorLag {
    pub kind: MirrorKind,
    pub voter_hash: String,
    pub block_hash: String,
}

enum MirrorJob {
    Audit {
        voter_hash: String,
        record: AuditRecord,
    },
    Directory {
        voter_hash: String,
        voter_id: String,
        block_hash: String,
    },
}

impl MirrorJob {
    fn lag(&self) -> MirrorLag {
        match self {
            Self::Audit { voter_hash, record } => MirrorLag {
                kind: MirrorKind::Audit,
                voter_hash: voter_hash.clone(),
                block_hash: record.block_hash.clone(),
            },
            Self::Directory {
                voter_hash,
                block_hash,
                ..
            } => MirrorLag {
                kind: MirrorKind::Directory,
                voter_hash: voter_hash.clone(),
                block_hash: block_hash.clone(),
            },
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Audit { .. } => "audit mirror",
            Self::Directory { .. } => "directory mirror",
        }
    }
}

/// Vote submission pipeline.
///
/// A vote counts once its block is durably in the ledger. Everything before
/// the append can reject the submission and leaves no trace. Everything
/// after it (audit record, directory flag) is a mirror: failures there are
/// retried, then queued for [`VoteRecorder::flush_mirrors`], and never undo
/// the vote.
///
/// Replay admission, the ledger append and the audit write run under one
/// async writer gate. Across recorders, a guard shared through
/// [`VoteRecorder::with_guard`] reserves the voter hash and nonce from
/// admission to commit, and the ledger itself refuses a second block for a
/// voter. At most one submission per voter hash and per nonce succeeds.
pub struct VoteRecorder {
    ledger: Arc<Ledger>,
    guard: Arc<ReplayGuard>,
    collaborators: Collaborators,
    config: BallotConfig,
    retry: RetryPolicy,
    writer: tokio::sync::Mutex<()>,
    pending: Mutex<Vec<MirrorJob>>,
}

impl VoteRecorder {
    /// Build a recorder with a fresh replay guard restored from `ledger`.
    pub fn new(
        ledger: Arc<Ledger>,
        collaborators: Collaborators,
        config: BallotConfig,
    ) -> Result<Self, VoteError> {
        let guard = Arc::new(ReplayGuard::new(config.guard.clone()));
        Self::with_guard(ledger, guard, collaborators, config)
    }

    /// Build around an existing guard. Every voter already in `ledger` is
    /// restored into it: the ledger decides who has voted.
    pub fn with_guard(
        ledger: Arc<Ledger>,
        guard: Arc<ReplayGuard>,
        collaborators: Collaborators,
        config: BallotConfig,
    ) -> Result<Self, VoteError> {
        let entries = ledger.voted_entries()?;
        for (voter_hash, timestamp) in &entries {
            guard.restore_voter(voter_hash, timestamp)?;
        }
        info!(
            store = %ledger.store_location(),
            restored = entries.len(),
            "replay guard restored from ledger"
        );

        let retry = RetryPolicy::from(&config.retry);
        Ok(Self {
            ledger,
            guard,
            collaborators,
            config,
            retry,
            writer: tokio::sync::Mutex::new(()),
            pending: Mutex::new(Vec::new()),
        })
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn guard(&self) -> &Arc<ReplayGuard> {
        &self.guard
    }

    pub fn config(&self) -> &BallotConfig {
        &self.config
    }

    pub fn proof_service(&self) -> ProofService {
        ProofService::new(self.ledger.clone())
    }

    pub fn integrity_verifier(&self) -> IntegrityVerifier {
        IntegrityVerifier::new(self.ledger.clone())
    }

    /// Hand a single-use nonce to the holder of `session_token`.
    pub async fn issue_nonce(
        &self,
        session_token: &str,
        timestamp: &str,
    ) -> Result<String, VoteError> {
        let identity = self.resolve_session(session_token).await?;
        Ok(self.guard.generate_nonce(&identity.voter_id, timestamp))
    }

    /// Record one vote and return its receipt.
    pub async fn submit(&self, submission: VoteSubmission) -> Result<Receipt, VoteError> {
        let identity = self.resolve_session(&submission.session_token).await?;
        let voter_hash = ContentHasher::hash_hex(&identity.voter_id);

        if !self.guard.check_duplicate_voter(&voter_hash) {
            debug!(voter_hash = %voter_hash, "submission rejected: voter already voted");
            return Err(ReplayError::AlreadyVoted.into());
        }

        let vote_hash = ContentHasher::hash_parts(&[
            submission.vote_choice.as_bytes(),
            identity.voter_id.as_bytes(),
            now_iso().as_bytes(),
        ])
        .to_hex();

        let geolocation = self.resolve_geolocation(&submission.client_address).await;

        let record = VoteRecord {
            voter_id_hash: voter_hash.clone(),
            vote_hash: vote_hash.clone(),
            kyc_image_hash: submission.kyc_image_hash.clone(),
            timestamp: submission.timestamp.clone(),
            geolocation,
        };

        let block = {
            let _gate = self.writer.lock().await;

            let admission =
                self.guard
                    .admit(&voter_hash, &submission.nonce, &submission.timestamp)?;
            let block = self.append(record).await?;
            if let Err(e) = self.guard.commit(admission) {
                // The block is durable; the guard is rebuilt from the
                // ledger on the next start.
                error!(voter_hash = %voter_hash, error = %e, "replay guard commit failed after append");
            }

            self.mirror(MirrorJob::Audit {
                voter_hash: voter_hash.clone(),
                record: AuditRecord {
                    voter_id: identity.voter_id.clone(),
                    voter_name: identity.voter_name.clone(),
                    vote_choice: submission.vote_choice.clone(),
                    timestamp: submission.timestamp.clone(),
                    block_hash: block.hash.clone(),
                },
            })
            .await;

            block
        };

        self.mirror(MirrorJob::Directory {
            voter_hash: voter_hash.clone(),
            voter_id: identity.voter_id,
            block_hash: block.hash.clone(),
        })
        .await;

        info!(
            voter_hash = %voter_hash,
            block = block.index,
            block_hash = %block.hash,
            "vote recorded"
        );

        Ok(Receipt {
            verification_url: self.config.receipts.verification_url(&voter_hash),
            voter_id_hash: voter_hash,
            vote_hash,
            block_hash: block.hash,
            timestamp: submission.timestamp,
        })
    }

    /// Committed votes whose mirrors are behind.
    pub fn pending_mirrors(&self) -> Vec<MirrorLag> {
        self.pending_queue().iter().map(MirrorJob::lag).collect()
    }

    /// Retry every lagging mirror write. Returns how many landed; the rest
    /// stay queued. Never touches the ledger.
    pub async fn flush_mirrors(&self) -> usize {
        let _gate = self.writer.lock().await;
        let jobs = std::mem::take(&mut *self.pending_queue());
        let total = jobs.len();

        let mut failed = Vec::new();
        for job in jobs {
            if let Err(e) = self.apply(&job).await {
                warn!(
                    mirror = job.label(),
                    voter_hash = %job.lag().voter_hash,
                    error = %e,
                    "mirror still lagging"
                );
                failed.push(job);
            }
        }

        let flushed = total - failed.len();
        self.pending_queue().extend(failed);
        info!(flushed, remaining = total - flushed, "mirror flush finished");
        flushed
    }

    /// Decrypt every audit record and join it with its ledger block.
    /// Rows come back in block order.
    pub async fn export_audit(&self) -> Result<Vec<AuditRow>, VoteError> {
        let entries = self.collaborators.audit.entries().await?;

        let mut rows = Vec::with_capacity(entries.len());
        for (voter_hash, record) in entries {
            let Some(block) = self.ledger.find_vote(&voter_hash)? else {
                warn!(voter_hash = %voter_hash, "audit record without a ledger block; skipped");
                continue;
            };
            let Some(vote) = block.vote() else {
                continue;
            };
            rows.push((
                block.index,
                AuditRow {
                    timestamp: record.timestamp,
                    voter_id: record.voter_id,
                    voter_name: record.voter_name,
                    vote_choice: record.vote_choice,
                    geolocation: vote.geolocation.clone(),
                    kyc_image_hash: vote.kyc_image_hash.clone(),
                    block_hash: block.hash.clone(),
                    vote_hash: vote.vote_hash.clone(),
                },
            ));
        }

        rows.sort_by_key(|(index, _)| *index);
        debug!(rows = rows.len(), "audit export built");
        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }

    async fn resolve_session(&self, token: &str) -> Result<VoterIdentity, VoteError> {
        self.collaborators
            .sessions
            .verify_session(token)
            .await?
            .ok_or_else(|| SessionError::InvalidSession.into())
    }

    async fn resolve_geolocation(&self, address: &str) -> Geolocation {
        let timeout = self.config.geolocation.timeout();
        match tokio::time::timeout(timeout, self.collaborators.geo.resolve(address)).await {
            Ok(Ok(location)) => location,
            Ok(Err(e)) => {
                warn!(error = %e, "geolocation lookup failed; using unknown location");
                Geolocation::unknown()
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.config.geolocation.timeout_ms,
                    "geolocation lookup timed out; using unknown location"
                );
                Geolocation::unknown()
            }
        }
    }

    /// Ledger writes block on file I/O and fsync.
    async fn append(&self, record: VoteRecord) -> Result<Block, LedgerError> {
        let ledger = Arc::clone(&self.ledger);
        tokio::task::spawn_blocking(move || ledger.append(record))
            .await
            .map_err(|e| LedgerError::IoFailure(format!("append task failed: {e}")))?
    }

    async fn mirror(&self, job: MirrorJob) {
        let this = self;
        let pending = &job;
        let outcome = self
            .retry
            .run(job.label(), move || this.apply(pending))
            .await;
        match outcome {
            Ok(()) => {}
            Err(e @ CollaboratorError::Conflict { .. }) => {
                error!(mirror = job.label(), error = %e, "mirror rejected write; not queued");
            }
            Err(e) => {
                warn!(
                    mirror = job.label(),
                    voter_hash = %job.lag().voter_hash,
                    error = %e,
                    "mirror lagging; queued for flush"
                );
                self.pending_queue().push(job);
            }
        }
    }

    async fn apply(&self, job: &MirrorJob) -> Result<(), CollaboratorError> {
        match job {
            MirrorJob::Audit { voter_hash, record } => {
                self.collaborators.audit.put(voter_hash, record).await
            }
            MirrorJob::Directory { voter_id, .. } => {
                self.collaborators.directory.mark_voted(voter_id).await
            }
        }
    }

    fn pending_queue(&self) -> MutexGuard<'_, Vec<MirrorJob>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use ballot_crypto::AuditKey;
    use ballot_ledger::{BlockStore, JsonFileStore, MemoryStore};
    use ballot_types::digest::is_digest_hex;

    use super::*;
    use crate::audit::SealedAuditStore;
    use crate::collaborators::{FixedGeoResolver, MemoryDirectory, StaticSessions};

    struct SharedStore(Arc<MemoryStore>);

    impl BlockStore for SharedStore {
        fn load(&self) -> Result<Option<Vec<Block>>, LedgerError> {
            self.0.load()
        }

        fn save(&self, blocks: &[Block]) -> Result<(), LedgerError> {
            self.0.save(blocks)
        }

        fn describe(&self) -> String {
            "shared memory".into()
        }
    }

    /// Slow saves keep concurrent appends in flight together.
    struct SlowStore(Arc<MemoryStore>);

    impl BlockStore for SlowStore {
        fn load(&self) -> Result<Option<Vec<Block>>, LedgerError> {
            self.0.load()
        }

        fn save(&self, blocks: &[Block]) -> Result<(), LedgerError> {
            std::thread::sleep(Duration::from_millis(100));
            self.0.save(blocks)
        }

        fn describe(&self) -> String {
            "slow memory".into()
        }
    }

    struct SlowGeo;

    #[async_trait]
    impl GeoResolver for SlowGeo {
        async fn resolve(&self, _address: &str) -> Result<Geolocation, CollaboratorError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Geolocation::new("Late", "Nowhere"))
        }
    }

    struct BrokenGeo;

    #[async_trait]
    impl GeoResolver for BrokenGeo {
        async fn resolve(&self, _address: &str) -> Result<Geolocation, CollaboratorError> {
            Err(CollaboratorError::unavailable("geolocation", "503"))
        }
    }

    struct Harness {
        sessions: Arc<StaticSessions>,
        directory: Arc<MemoryDirectory>,
        audit: Arc<SealedAuditStore>,
        recorder: Arc<VoteRecorder>,
    }

    fn test_config() -> BallotConfig {
        let mut config = BallotConfig::default();
        config.retry.attempts = 2;
        config.retry.backoff_ms = 1;
        config.geolocation.timeout_ms = 50;
        config
    }

    fn harness_with(ledger: Arc<Ledger>, geo: Arc<dyn GeoResolver>) -> Harness {
        let sessions = Arc::new(StaticSessions::new());
        for n in 1..=32 {
            sessions.insert(
                format!("tok-{n}"),
                VoterIdentity::new(format!("V-{n}"), format!("Voter {n}")),
            );
        }
        let directory = Arc::new(MemoryDirectory::new());
        let audit = Arc::new(SealedAuditStore::new(&AuditKey::generate()));
        let collaborators = Collaborators {
            sessions: sessions.clone(),
            geo,
            directory: directory.clone(),
            audit: audit.clone(),
        };
        let recorder = Arc::new(VoteRecorder::new(ledger, collaborators, test_config()).unwrap());
        Harness {
            sessions,
            directory,
            audit,
            recorder,
        }
    }

    fn harness() -> Harness {
        harness_with(
            Arc::new(Ledger::in_memory().unwrap()),
            Arc::new(FixedGeoResolver(Geolocation::new("Lyon", "France"))),
        )
    }

    /// A second recorder over the same ledger and collaborators.
    fn sibling(h: &Harness, guard: Arc<ReplayGuard>) -> VoteRecorder {
        VoteRecorder::with_guard(
            Arc::clone(h.recorder.ledger()),
            guard,
            h.recorder.collaborators.clone(),
            test_config(),
        )
        .unwrap()
    }

    fn slow_harness() -> Harness {
        let ledger = Ledger::open(SlowStore(Arc::new(MemoryStore::new()))).unwrap();
        harness_with(
            Arc::new(ledger),
            Arc::new(FixedGeoResolver(Geolocation::new("Lyon", "France"))),
        )
    }

    fn submission(voter: u32, nonce: &str) -> VoteSubmission {
        VoteSubmission {
            session_token: format!("tok-{voter}"),
            vote_choice: "Candidate A".into(),
            kyc_image_hash: format!("kyc-{voter}"),
            client_address: "203.0.113.7".into(),
            nonce: nonce.into(),
            timestamp: now_iso(),
        }
    }

    #[tokio::test]
    async fn accepted_vote_produces_receipt_and_proof() {
        let h = harness();
        let receipt = h.recorder.submit(submission(1, "n1")).await.unwrap();

        let voter_hash = ContentHasher::hash_hex("V-1");
        assert_eq!(receipt.voter_id_hash, voter_hash);
        assert!(is_digest_hex(&receipt.vote_hash));
        assert_eq!(receipt.verification_url, format!("/api/verify/{voter_hash}"));

        let head = h.recorder.ledger().head().unwrap();
        assert_eq!(head.index, 1);
        assert_eq!(head.hash, receipt.block_hash);
        let vote = head.vote().unwrap();
        assert_eq!(vote.geolocation, Geolocation::new("Lyon", "France"));
        assert_eq!(vote.kyc_image_hash, "kyc-1");

        let proofs = h.recorder.proof_service();
        let proof = proofs.lookup(&voter_hash).unwrap().unwrap();
        assert_eq!(proof.block_index, 1);
        assert_eq!(proof.vote_hash, receipt.vote_hash);
        assert!(proofs.verify_receipt(&receipt).unwrap());

        assert!(h.directory.has_voted("V-1"));
        let sealed = h.audit.get(&voter_hash).await.unwrap().unwrap();
        assert_eq!(sealed.block_hash, receipt.block_hash);
        assert_eq!(sealed.vote_choice, "Candidate A");
        assert!(h.recorder.pending_mirrors().is_empty());
        assert!(h.recorder.integrity_verifier().check().unwrap().valid);
    }

    #[tokio::test]
    async fn ledger_payload_carries_no_plaintext() {
        let h = harness();
        h.recorder.submit(submission(1, "n1")).await.unwrap();
        let json = serde_json::to_string(&h.recorder.ledger().read_all().unwrap()).unwrap();
        assert!(!json.contains("Candidate A"));
        assert!(!json.contains("V-1"));
        assert!(!json.contains("Voter 1"));
    }

    #[tokio::test]
    async fn unknown_session_rejected() {
        let h = harness();
        let mut s = submission(1, "n1");
        s.session_token = "expired".into();
        let err = h.recorder.submit(s).await.unwrap_err();
        assert_eq!(err.reason(), "invalid_session");
        assert_eq!(h.recorder.ledger().block_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn revoked_session_rejected() {
        let h = harness();
        h.sessions.revoke("tok-1");
        let err = h.recorder.submit(submission(1, "n1")).await.unwrap_err();
        assert!(matches!(err, VoteError::Session(SessionError::InvalidSession)));
    }

    #[tokio::test]
    async fn second_vote_rejected() {
        let h = harness();
        h.recorder.submit(submission(1, "n1")).await.unwrap();
        let err = h.recorder.submit(submission(1, "n2")).await.unwrap_err();
        assert_eq!(err.reason(), "already_voted");
        assert_eq!(h.recorder.ledger().block_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn reused_nonce_rejected_for_another_voter() {
        let h = harness();
        h.recorder.submit(submission(1, "n1")).await.unwrap();
        let err = h.recorder.submit(submission(2, "n1")).await.unwrap_err();
        assert_eq!(err.reason(), "duplicate_nonce");
        assert!(h.recorder.guard().check_duplicate_voter(&ContentHasher::hash_hex("V-2")));
    }

    #[tokio::test]
    async fn stale_timestamp_rejected_without_trace() {
        let h = harness();
        let mut s = submission(1, "n1");
        s.timestamp = "2001-01-01T00:00:00.000000".into();
        let err = h.recorder.submit(s).await.unwrap_err();
        assert_eq!(err.reason(), "expired_timestamp");
        assert_eq!(h.recorder.ledger().block_count().unwrap(), 1);
        assert!(h.audit.is_empty());

        h.recorder.submit(submission(1, "n1")).await.unwrap();
    }

    #[tokio::test]
    async fn identical_choices_hash_differently() {
        let h = harness();
        let a = h.recorder.submit(submission(1, "n1")).await.unwrap();
        let b = h.recorder.submit(submission(2, "n2")).await.unwrap();
        assert_ne!(a.vote_hash, b.vote_hash);
    }

    #[tokio::test]
    async fn ledger_outage_aborts_and_is_retryable() {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(Ledger::open(SharedStore(store.clone())).unwrap());
        let h = harness_with(
            ledger,
            Arc::new(FixedGeoResolver(Geolocation::new("Lyon", "France"))),
        );

        store.set_unavailable(true);
        let err = h.recorder.submit(submission(1, "n1")).await.unwrap_err();
        assert_eq!(err.reason(), "ledger_io_failure");
        assert!(err.is_retryable());
        assert_eq!(h.recorder.ledger().block_count().unwrap(), 1);
        assert!(h.recorder.guard().check_duplicate_voter(&ContentHasher::hash_hex("V-1")));
        assert!(h.audit.is_empty());
        assert!(!h.directory.has_voted("V-1"));

        store.set_unavailable(false);
        h.recorder.submit(submission(1, "n1")).await.unwrap();
        assert_eq!(store.snapshot().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn slow_geolocation_degrades_to_unknown() {
        let h = harness_with(Arc::new(Ledger::in_memory().unwrap()), Arc::new(SlowGeo));
        let started = std::time::Instant::now();
        h.recorder.submit(submission(1, "n1")).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        let head = h.recorder.ledger().head().unwrap();
        assert!(head.vote().unwrap().geolocation.is_unknown());
    }

    #[tokio::test]
    async fn failing_geolocation_degrades_to_unknown() {
        let h = harness_with(Arc::new(Ledger::in_memory().unwrap()), Arc::new(BrokenGeo));
        h.recorder.submit(submission(1, "n1")).await.unwrap();
        let head = h.recorder.ledger().head().unwrap();
        assert!(head.vote().unwrap().geolocation.is_unknown());
    }

    #[tokio::test]
    async fn audit_outage_queues_and_flushes() {
        let h = harness();
        h.audit.set_unavailable(true);
        let receipt = h.recorder.submit(submission(1, "n1")).await.unwrap();

        let lag = h.recorder.pending_mirrors();
        assert_eq!(lag.len(), 1);
        assert_eq!(lag[0].kind, MirrorKind::Audit);
        assert_eq!(lag[0].block_hash, receipt.block_hash);
        assert!(h.directory.has_voted("V-1"));

        assert_eq!(h.recorder.flush_mirrors().await, 0);
        assert_eq!(h.recorder.pending_mirrors().len(), 1);

        h.audit.set_unavailable(false);
        assert_eq!(h.recorder.flush_mirrors().await, 1);
        assert!(h.recorder.pending_mirrors().is_empty());
        assert_eq!(h.recorder.ledger().block_count().unwrap(), 2);
        assert!(h.audit.get(&receipt.voter_id_hash).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn directory_outage_queues_and_flushes() {
        let h = harness();
        h.directory.set_unavailable(true);
        h.recorder.submit(submission(1, "n1")).await.unwrap();
        assert_eq!(h.recorder.pending_mirrors()[0].kind, MirrorKind::Directory);

        h.directory.set_unavailable(false);
        assert_eq!(h.recorder.flush_mirrors().await, 1);
        assert!(h.directory.has_voted("V-1"));
    }

    #[tokio::test]
    async fn restart_restores_voted_set_from_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vote_chain.json");

        let first = harness_with(
            Arc::new(Ledger::open(JsonFileStore::new(&path)).unwrap()),
            Arc::new(FixedGeoResolver(Geolocation::unknown())),
        );
        first.recorder.submit(submission(1, "n1")).await.unwrap();
        drop(first);

        let second = harness_with(
            Arc::new(Ledger::open(JsonFileStore::new(&path)).unwrap()),
            Arc::new(FixedGeoResolver(Geolocation::unknown())),
        );
        assert_eq!(second.recorder.guard().voted_count(), 1);
        let err = second.recorder.submit(submission(1, "n9")).await.unwrap_err();
        assert_eq!(err.reason(), "already_voted");
        second.recorder.submit(submission(2, "n2")).await.unwrap();
    }

    #[tokio::test]
    async fn issued_nonce_is_usable_once() {
        let h = harness();
        let ts = now_iso();
        let nonce = h.recorder.issue_nonce("tok-1", &ts).await.unwrap();
        assert!(is_digest_hex(&nonce));

        let mut s = submission(1, &nonce);
        s.timestamp = ts;
        h.recorder.submit(s).await.unwrap();
        let err = h.recorder.submit(submission(2, &nonce)).await.unwrap_err();
        assert_eq!(err.reason(), "duplicate_nonce");

        let err = h.recorder.issue_nonce("nope", &now_iso()).await.unwrap_err();
        assert_eq!(err.reason(), "invalid_session");
    }

    #[tokio::test]
    async fn audit_export_joins_ledger_in_block_order() {
        let h = harness();
        for n in 1..=5 {
            h.recorder
                .submit(submission(n, &format!("n{n}")))
                .await
                .unwrap();
        }

        let rows = h.recorder.export_audit().await.unwrap();
        assert_eq!(rows.len(), 5);
        let blocks = h.recorder.ledger().read_all().unwrap();
        for (i, row) in rows.iter().enumerate() {
            let block = &blocks[i + 1];
            let vote = block.vote().unwrap();
            assert_eq!(row.voter_id, format!("V-{}", i + 1));
            assert_eq!(row.voter_name, format!("Voter {}", i + 1));
            assert_eq!(row.vote_choice, "Candidate A");
            assert_eq!(row.block_hash, block.hash);
            assert_eq!(row.vote_hash, vote.vote_hash);
            assert_eq!(row.kyc_image_hash, vote.kyc_image_hash);
            assert_eq!(row.geolocation, vote.geolocation);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submissions_for_one_voter() {
        let h = harness();
        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let recorder = Arc::clone(&h.recorder);
                tokio::spawn(async move { recorder.submit(submission(1, &format!("n{i}"))).await })
            })
            .collect();

        let mut accepted = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(h.recorder.ledger().block_count().unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submissions_for_distinct_voters() {
        let h = harness();
        let tasks: Vec<_> = (1..=20)
            .map(|n| {
                let recorder = Arc::clone(&h.recorder);
                tokio::spawn(async move { recorder.submit(submission(n, &format!("n{n}"))).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(h.recorder.ledger().block_count().unwrap(), 21);
        assert!(h.recorder.ledger().verify().unwrap().valid);
        assert_eq!(h.directory.voted_count(), 20);
        assert_eq!(h.audit.len(), 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn recorders_sharing_a_guard_count_a_voter_once() {
        let h = slow_harness();
        let other = sibling(&h, Arc::clone(h.recorder.guard()));

        let (a, b) = tokio::join!(
            h.recorder.submit(submission(1, "n1")),
            other.submit(submission(1, "n2"))
        );
        assert!(a.is_ok() != b.is_ok());
        let err = a.err().or(b.err()).unwrap();
        assert_eq!(err.reason(), "already_voted");

        assert_eq!(h.recorder.ledger().block_count().unwrap(), 2);
        assert_eq!(h.directory.voted_count(), 1);
        assert_eq!(h.audit.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn recorders_sharing_a_guard_spend_a_nonce_once() {
        let h = slow_harness();
        let other = sibling(&h, Arc::clone(h.recorder.guard()));

        let (a, b) = tokio::join!(
            h.recorder.submit(submission(1, "n1")),
            other.submit(submission(2, "n1"))
        );
        assert!(a.is_ok() != b.is_ok());
        assert_eq!(a.err().or(b.err()).unwrap().reason(), "duplicate_nonce");
        assert_eq!(h.recorder.ledger().block_count().unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn ledger_refuses_a_voter_admitted_by_two_guards() {
        let h = slow_harness();
        let other = sibling(&h, Arc::new(ReplayGuard::new(test_config().guard)));

        let (a, b) = tokio::join!(
            h.recorder.submit(submission(1, "n1")),
            other.submit(submission(1, "n2"))
        );
        assert!(a.is_ok() != b.is_ok());
        let err = a.err().or(b.err()).unwrap();
        assert!(matches!(err, VoteError::Ledger(LedgerError::DuplicateVoter { .. })));
        assert_eq!(err.reason(), "already_voted");

        assert_eq!(h.recorder.ledger().block_count().unwrap(), 2);
        assert!(h.recorder.ledger().verify().unwrap().valid);
        assert_eq!(h.audit.len(), 1);
        assert_eq!(h.directory.voted_count(), 1);

        // The guard that lost the race holds no reservation afterwards.
        let late = other.submit(submission(2, "n3")).await.unwrap();
        assert_eq!(h.recorder.ledger().head().unwrap().hash, late.block_hash);
    }
}
