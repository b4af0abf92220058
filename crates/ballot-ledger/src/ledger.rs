use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use ballot_crypto::HashChainVerifier;
use ballot_types::temporal::now_iso;
use ballot_types::{Proof, VoteRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::block::Block;
use crate::error::LedgerError;
use crate::store::{BlockStore, MemoryStore};
use crate::traits::{LedgerReader, LedgerWriter};

/// Result of [`Ledger::verify`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStatus {
    pub valid: bool,
    pub first_bad_index: Option<u64>,
}

impl ChainStatus {
    fn from_first_bad(first_bad_index: Option<u64>) -> Self {
        Self {
            valid: first_bad_index.is_none(),
            first_bad_index,
        }
    }
}

/// Append-only, hash-linked vote ledger.
///
/// Single writer: `append` holds the write lock while the new sequence is
/// persisted, so readers only ever see durably committed blocks. The voter
/// index is derived from the blocks themselves, on open and on each append,
/// and is never loaded from anywhere else.
pub struct Ledger {
    store: Box<dyn BlockStore>,
    inner: RwLock<LedgerState>,
}

struct LedgerState {
    blocks: Vec<Block>,
    /// voter hash → position in `blocks` of the first block carrying it.
    /// Positions, not stored `index` fields: a gapped ledger still resolves
    /// each voter to their own block.
    voter_index: HashMap<String, usize>,
}

impl LedgerState {
    fn from_blocks(blocks: Vec<Block>) -> Self {
        let mut voter_index = HashMap::new();
        for (position, block) in blocks.iter().enumerate() {
            if let Some(record) = block.vote() {
                voter_index
                    .entry(record.voter_id_hash.clone())
                    .or_insert(position);
            }
        }
        Self {
            blocks,
            voter_index,
        }
    }

    fn block_for(&self, voter_hash: &str) -> Option<&Block> {
        self.voter_index
            .get(voter_hash)
            .and_then(|&position| self.blocks.get(position))
    }
}

impl Ledger {
    /// Load the ledger from `store`, or create and persist a genesis block
    /// if the store is empty. Nothing else happens until genesis is durable.
    pub fn open(store: impl BlockStore + 'static) -> Result<Self, LedgerError> {
        let store: Box<dyn BlockStore> = Box::new(store);

        let blocks = match store.load()? {
            Some(blocks) if !blocks.is_empty() => {
                if let Some(index) = HashChainVerifier::first_bad_index(&blocks) {
                    warn!(
                        store = %store.describe(),
                        index,
                        "ledger loaded with an integrity violation"
                    );
                }
                info!(store = %store.describe(), blocks = blocks.len(), "ledger opened");
                blocks
            }
            _ => {
                let genesis = Block::genesis(now_iso());
                store.save(std::slice::from_ref(&genesis))?;
                info!(store = %store.describe(), hash = %genesis.hash, "genesis block created");
                vec![genesis]
            }
        };

        Ok(Self {
            store,
            inner: RwLock::new(LedgerState::from_blocks(blocks)),
        })
    }

    /// A fresh ledger backed by a [`MemoryStore`].
    pub fn in_memory() -> Result<Self, LedgerError> {
        Self::open(MemoryStore::new())
    }

    /// `(voter_hash, vote timestamp)` for every recorded vote, in block
    /// order. Used to rebuild replay-protection state after a restart.
    pub fn voted_entries(&self) -> Result<Vec<(String, String)>, LedgerError> {
        let state = self.read()?;
        Ok(state
            .blocks
            .iter()
            .filter_map(Block::vote)
            .map(|r| (r.voter_id_hash.clone(), r.timestamp.clone()))
            .collect())
    }

    pub fn has_voted(&self, voter_hash: &str) -> Result<bool, LedgerError> {
        Ok(self.read()?.voter_index.contains_key(voter_hash))
    }

    pub fn store_location(&self) -> String {
        self.store.describe()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, LedgerState>, LedgerError> {
        self.inner.read().map_err(|_| LedgerError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, LedgerState>, LedgerError> {
        self.inner.write().map_err(|_| LedgerError::LockPoisoned)
    }
}

impl LedgerWriter for Ledger {
    fn append(&self, record: VoteRecord) -> Result<Block, LedgerError> {
        let mut state = self.write()?;

        let prev = state.blocks.last().ok_or(LedgerError::IntegrityViolation {
            index: 0,
            reason: "ledger has no genesis block".into(),
        })?;
        if state.voter_index.contains_key(&record.voter_id_hash) {
            warn!(voter_hash = %record.voter_id_hash, "append refused: voter already has a block");
            return Err(LedgerError::DuplicateVoter {
                voter_hash: record.voter_id_hash,
            });
        }
        let block = Block::next(prev, now_iso(), record);

        // Readers are locked out, so the tentative push is never observed.
        state.blocks.push(block.clone());
        if let Err(e) = self.store.save(&state.blocks) {
            state.blocks.pop();
            warn!(index = block.index, error = %e, "append aborted; ledger unchanged");
            return Err(e);
        }

        if let Some(record) = block.vote() {
            let position = state.blocks.len() - 1;
            state
                .voter_index
                .insert(record.voter_id_hash.clone(), position);
        }

        debug!(index = block.index, hash = %block.hash, "block appended");
        Ok(block)
    }
}

impl LedgerReader for Ledger {
    fn verify(&self) -> Result<ChainStatus, LedgerError> {
        let state = self.read()?;
        Ok(ChainStatus::from_first_bad(
            HashChainVerifier::first_bad_index(&state.blocks),
        ))
    }

    fn get_proof(&self, voter_hash: &str) -> Result<Option<Proof>, LedgerError> {
        let state = self.read()?;
        Ok(state.block_for(voter_hash).and_then(|block| {
            block.vote().map(|record| Proof {
                block_index: block.index,
                block_hash: block.hash.clone(),
                timestamp: block.timestamp.clone(),
                vote_hash: record.vote_hash.clone(),
            })
        }))
    }

    fn find_vote(&self, voter_hash: &str) -> Result<Option<Block>, LedgerError> {
        Ok(self.read()?.block_for(voter_hash).cloned())
    }

    fn block(&self, index: u64) -> Result<Option<Block>, LedgerError> {
        Ok(self.read()?.blocks.get(index as usize).cloned())
    }

    fn head(&self) -> Result<Block, LedgerError> {
        self.read()?
            .blocks
            .last()
            .cloned()
            .ok_or(LedgerError::IntegrityViolation {
                index: 0,
                reason: "ledger has no genesis block".into(),
            })
    }

    fn read_all(&self) -> Result<Vec<Block>, LedgerError> {
        Ok(self.read()?.blocks.clone())
    }

    fn block_count(&self) -> Result<u64, LedgerError> {
        Ok(self.read()?.blocks.len() as u64)
    }
}
