use ballot_crypto::{canonical_json, BlockHasher, HashLinked};
use ballot_types::{Digest, VoteRecord};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::json;

/// Payload of the first block in every ledger.
pub const GENESIS_MARKER: &str = "GENESIS_BLOCK";

/// What a block carries.
///
/// Persisted as either the bare string `"GENESIS_BLOCK"` or a vote record
/// object. Decoding is exhaustive: any other string is rejected rather than
/// silently treated as one of the two.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockPayload {
    Genesis,
    VoteRecord(VoteRecord),
}

impl BlockPayload {
    /// The payload's contribution to the block digest.
    ///
    /// The genesis marker contributes its bare text; a vote record
    /// contributes its canonical JSON.
    pub fn canonical(&self) -> String {
        match self {
            Self::Genesis => GENESIS_MARKER.to_string(),
            Self::VoteRecord(record) => canonical_json(&json!({
                "voter_id_hash": record.voter_id_hash,
                "vote_hash": record.vote_hash,
                "kyc_image_hash": record.kyc_image_hash,
                "timestamp": record.timestamp,
                "geolocation": {
                    "city": record.geolocation.city,
                    "country": record.geolocation.country,
                },
            })),
        }
    }

    pub fn as_vote(&self) -> Option<&VoteRecord> {
        match self {
            Self::VoteRecord(record) => Some(record),
            Self::Genesis => None,
        }
    }
}

impl Serialize for BlockPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Genesis => serializer.serialize_str(GENESIS_MARKER),
            Self::VoteRecord(record) => record.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for BlockPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Stored {
            Marker(String),
            Record(VoteRecord),
        }

        match Stored::deserialize(deserializer)? {
            Stored::Marker(marker) if marker == GENESIS_MARKER => Ok(Self::Genesis),
            Stored::Marker(other) => Err(serde::de::Error::custom(format!(
                "unknown block payload marker {other:?}"
            ))),
            Stored::Record(record) => Ok(Self::VoteRecord(record)),
        }
    }
}

/// One ledger entry.
///
/// Field names and order follow the persisted format:
/// `{index, timestamp, data, previous_hash, hash}`. Hashes are kept as the
/// stored strings so that a tampered file still loads and can be audited.
/// Fields outside the hashed set are rejected, here and inside `data`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Block {
    pub index: u64,
    pub timestamp: String,
    #[serde(rename = "data")]
    pub payload: BlockPayload,
    pub previous_hash: String,
    pub hash: String,
}

impl Block {
    /// Block 0: genesis marker, all-zero predecessor.
    pub fn genesis(timestamp: String) -> Self {
        Self::sealed(0, timestamp, BlockPayload::Genesis, Digest::zero().to_hex())
    }

    /// The block that follows `prev`, carrying `record`.
    pub fn next(prev: &Block, timestamp: String, record: VoteRecord) -> Self {
        Self::sealed(
            prev.index + 1,
            timestamp,
            BlockPayload::VoteRecord(record),
            prev.hash.clone(),
        )
    }

    fn sealed(index: u64, timestamp: String, payload: BlockPayload, previous_hash: String) -> Self {
        let hash =
            BlockHasher::compute(index, &timestamp, &payload.canonical(), &previous_hash).to_hex();
        Self {
            index,
            timestamp,
            payload,
            previous_hash,
            hash,
        }
    }

    /// Re-derive the digest from the stored fields.
    pub fn compute_hash(&self) -> Digest {
        BlockHasher::compute(
            self.index,
            &self.timestamp,
            &self.payload.canonical(),
            &self.previous_hash,
        )
    }

    pub fn is_genesis(&self) -> bool {
        matches!(self.payload, BlockPayload::Genesis)
    }

    pub fn vote(&self) -> Option<&VoteRecord> {
        self.payload.as_vote()
    }
}

impl HashLinked for Block {
    fn position(&self) -> u64 {
        self.index
    }

    fn stored_hash(&self) -> &str {
        &self.hash
    }

    fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    fn recompute_hash(&self) -> Digest {
        self.compute_hash()
    }
}
