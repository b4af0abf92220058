use ballot_types::Digest;

/// Trait for entries that participate in a hash chain.
pub trait HashLinked {
    /// The entry's stored position in the chain.
    fn position(&self) -> u64;
    /// The entry's stored hash, as persisted.
    fn stored_hash(&self) -> &str;
    /// The stored link to the predecessor's hash.
    fn previous_hash(&self) -> &str;
    /// Re-derive the digest from the entry's stored fields.
    fn recompute_hash(&self) -> Digest;
}

/// Hash chain integrity verifier.
///
/// The first entry is the anchor and is taken as given. Every later entry
/// must sit at its slice position, hash to its stored digest, and link to
/// the stored hash of the entry before it.
pub struct HashChainVerifier;

impl HashChainVerifier {
    /// Verify a chain, stopping at the first bad entry.
    pub fn verify_chain(entries: &[impl HashLinked]) -> Result<(), ChainError> {
        for i in 1..entries.len() {
            let entry = &entries[i];
            let index = i as u64;

            if entry.position() != index {
                return Err(ChainError::SequenceGap {
                    index,
                    found: entry.position(),
                });
            }

            if entry.recompute_hash().to_hex() != entry.stored_hash() {
                return Err(ChainError::HashMismatch { index });
            }

            if entry.previous_hash() != entries[i - 1].stored_hash() {
                return Err(ChainError::BrokenLink { index });
            }
        }

        Ok(())
    }

    /// Index of the first bad entry, or `None` if the chain checks out.
    pub fn first_bad_index(entries: &[impl HashLinked]) -> Option<u64> {
        Self::verify_chain(entries).err().map(|e| e.index())
    }
}

/// Errors from chain verification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("sequence gap at index {index}: entry claims position {found}")]
    SequenceGap { index: u64, found: u64 },

    #[error("hash mismatch at index {index}: computed hash differs from stored")]
    HashMismatch { index: u64 },

    #[error("broken link at index {index}: previous_hash does not match")]
    BrokenLink { index: u64 },
}

impl ChainError {
    /// Position of the offending entry.
    pub fn index(&self) -> u64 {
        match self {
            Self::SequenceGap { index, .. }
            | Self::HashMismatch { index }
            | Self::BrokenLink { index } => *index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::BlockHasher;

    struct TestEntry {
        index: u64,
        payload: String,
        prev: String,
        hash: String,
    }

    impl HashLinked for TestEntry {
        fn position(&self) -> u64 {
            self.index
        }
        fn stored_hash(&self) -> &str {
            &self.hash
        }
        fn previous_hash(&self) -> &str {
            &self.prev
        }
        fn recompute_hash(&self) -> Digest {
            BlockHasher::compute(self.index, "t", &self.payload, &self.prev)
        }
    }

    fn build_chain(count: usize) -> Vec<TestEntry> {
        let mut chain: Vec<TestEntry> = Vec::new();
        for i in 0..count as u64 {
            let prev = chain
                .last()
                .map(|e| e.hash.clone())
                .unwrap_or_else(|| Digest::zero().to_hex());
            let payload = format!("entry-{i}");
            let hash = BlockHasher::compute(i, "t", &payload, &prev).to_hex();
            chain.push(TestEntry {
                index: i,
                payload,
                prev,
                hash,
            });
        }
        chain
    }

    #[test]
    fn empty_and_single_chains_are_valid() {
        assert!(HashChainVerifier::verify_chain(&build_chain(0)).is_ok());
        assert!(HashChainVerifier::verify_chain(&build_chain(1)).is_ok());
    }

    #[test]
    fn multi_entry_chain() {
        assert!(HashChainVerifier::verify_chain(&build_chain(10)).is_ok());
        assert_eq!(HashChainVerifier::first_bad_index(&build_chain(10)), None);
    }

    #[test]
    fn anchor_is_not_rehashed() {
        let mut chain = build_chain(3);
        chain[0].payload = "rewritten".into();
        assert!(HashChainVerifier::verify_chain(&chain).is_ok());
    }

    #[test]
    fn tampered_payload_detected() {
        let mut chain = build_chain(3);
        chain[1].payload = "tampered".into();
        assert_eq!(
            HashChainVerifier::verify_chain(&chain).unwrap_err(),
            ChainError::HashMismatch { index: 1 }
        );
    }

    #[test]
    fn rehashed_entry_breaks_next_link() {
        let mut chain = build_chain(4);
        chain[2].payload = "forged".into();
        chain[2].hash = chain[2].recompute_hash().to_hex();
        assert_eq!(
            HashChainVerifier::verify_chain(&chain).unwrap_err(),
            ChainError::BrokenLink { index: 3 }
        );
    }

    #[test]
    fn sequence_gap_detected() {
        let mut chain = build_chain(3);
        chain[2].index = 5;
        assert_eq!(HashChainVerifier::first_bad_index(&chain), Some(2));
    }
}
