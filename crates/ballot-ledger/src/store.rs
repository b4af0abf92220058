use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::block::Block;
use crate::error::LedgerError;

/// Durable home of the block sequence.
///
/// `save` receives the full ordered sequence every time. Implementations
/// must make the write all-or-nothing: after a failed `save` the previously
/// saved sequence is still what `load` returns.
pub trait BlockStore: Send + Sync {
    /// `None` if nothing has ever been saved.
    fn load(&self) -> Result<Option<Vec<Block>>, LedgerError>;

    fn save(&self, blocks: &[Block]) -> Result<(), LedgerError>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Bounded retry for transient store contention.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreRetry {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for StoreRetry {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(100),
        }
    }
}

/// JSON array of blocks in a single file.
///
/// Every save rewrites the whole file, which is O(n) per append. Prior
/// entries are never altered: the rewrite goes to a sibling temp file that
/// is fsynced and renamed over the old one, so a crash leaves either the
/// old sequence or the new one.
pub struct JsonFileStore {
    path: PathBuf,
    retry: StoreRetry,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            retry: StoreRetry::default(),
        }
    }

    pub fn with_retry(mut self, retry: StoreRetry) -> Self {
        self.retry = retry;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn write_once(&self, data: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(data)?;
            file.flush()?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)
    }
}

impl BlockStore for JsonFileStore {
    fn load(&self) -> Result<Option<Vec<Block>>, LedgerError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = fs::read(&self.path).map_err(|e| LedgerError::IoFailure(e.to_string()))?;
        let blocks = serde_json::from_slice::<Vec<Block>>(&data)
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;
        debug!(path = %self.path.display(), blocks = blocks.len(), "ledger loaded");
        Ok(Some(blocks))
    }

    fn save(&self, blocks: &[Block]) -> Result<(), LedgerError> {
        let data = serde_json::to_vec_pretty(blocks)
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;

        let attempts = self.retry.attempts.max(1);
        let mut last_err = None;
        for attempt in 1..=attempts {
            match self.write_once(&data) {
                Ok(()) => {
                    debug!(path = %self.path.display(), blocks = blocks.len(), bytes = data.len(), "ledger persisted");
                    return Ok(());
                }
                Err(e) => {
                    warn!(path = %self.path.display(), attempt, attempts, error = %e, "ledger write failed");
                    last_err = Some(e);
                    if attempt < attempts {
                        thread::sleep(self.retry.backoff);
                    }
                }
            }
        }

        Err(LedgerError::IoFailure(
            last_err.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory store for tests, demos and embedding.
///
/// [`MemoryStore::set_unavailable`] makes every save fail, which simulates
/// a store outage.
#[derive(Default)]
pub struct MemoryStore {
    blocks: Mutex<Option<Vec<Block>>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `blocks`, as if loaded from disk.
    pub fn with_blocks(blocks: Vec<Block>) -> Self {
        Self {
            blocks: Mutex::new(Some(blocks)),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// What a fresh `load` would return.
    pub fn snapshot(&self) -> Option<Vec<Block>> {
        self.blocks.lock().ok().and_then(|b| b.clone())
    }
}

impl BlockStore for MemoryStore {
    fn load(&self) -> Result<Option<Vec<Block>>, LedgerError> {
        let blocks = self.blocks.lock().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(blocks.clone())
    }

    fn save(&self, blocks: &[Block]) -> Result<(), LedgerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::IoFailure("memory store unavailable".into()));
        }
        let mut stored = self.blocks.lock().map_err(|_| LedgerError::LockPoisoned)?;
        *stored = Some(blocks.to_vec());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}
