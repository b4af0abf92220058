use std::fmt;

use serde::{Deserialize, Serialize};

/// Placeholder used when a location cannot be resolved.
pub const UNKNOWN_LOCATION: &str = "Unknown";

/// Coarse, IP-derived location. City and country only; never an address
/// or coordinates.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Geolocation {
    pub city: String,
    pub country: String,
}

impl Geolocation {
    pub fn new(city: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            country: country.into(),
        }
    }

    /// `("Unknown", "Unknown")`, the fallback when lookup fails or times out.
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_LOCATION, UNKNOWN_LOCATION)
    }

    pub fn is_unknown(&self) -> bool {
        self.city == UNKNOWN_LOCATION && self.country == UNKNOWN_LOCATION
    }
}

impl Default for Geolocation {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for Geolocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.city, self.country)
    }
}

/// Anonymized vote payload as it appears inside a ledger block.
///
/// Every field is either a digest, an opaque reference, a timestamp or a
/// coarse location. Plaintext identity and vote choice never appear here.
///
/// The digest fields are kept as the stored strings rather than parsed
/// [`crate::Digest`] values: a tampered ledger must still load so that the
/// integrity audit can point at the damaged block.
///
/// Unknown fields are rejected on decode. Only the fields above are hashed,
/// so anything else in a stored record would be unauthenticated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VoteRecord {
    /// SHA-256 of the voter identity, hex.
    pub voter_id_hash: String,
    /// SHA-256 of choice + identity + submission time, hex.
    pub vote_hash: String,
    /// Opaque reference produced by the KYC collaborator.
    pub kyc_image_hash: String,
    /// UTC ISO-8601 submission time.
    pub timestamp: String,
    pub geolocation: Geolocation,
}
