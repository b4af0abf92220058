use std::path::{Path, PathBuf};
use std::time::Duration;

use ballot_guard::GuardConfig;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration, usually read from `ballot.toml`.
///
/// Every section and field is optional; anything missing takes its
/// default.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallotConfig {
    pub ledger: LedgerConfig,
    pub guard: GuardConfig,
    pub geolocation: GeolocationConfig,
    pub retry: RetryConfig,
    pub receipts: ReceiptConfig,
}

impl BallotConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Render back to TOML. Infallible for this shape; an error here would
    /// mean a non-table root, which the type rules out.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("vote_chain.json"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeolocationConfig {
    /// Upper bound on one lookup. Past it the vote proceeds with an
    /// unknown location.
    pub timeout_ms: u64,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self { timeout_ms: 2000 }
    }
}

impl GeolocationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_ms: 100,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptConfig {
    /// Prefix of the proof lookup URL handed back in receipts.
    pub verification_base: String,
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self {
            verification_base: "/api/verify".into(),
        }
    }
}

impl ReceiptConfig {
    pub fn verification_url(&self, voter_hash: &str) -> String {
        format!(
            "{}/{voter_hash}",
            self.verification_base.trim_end_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = BallotConfig::default();
        assert_eq!(c.ledger.path, PathBuf::from("vote_chain.json"));
        assert_eq!(c.guard.freshness_window_secs, 300);
        assert_eq!(c.geolocation.timeout(), Duration::from_secs(2));
        assert_eq!(c.retry.attempts, 3);
        assert_eq!(c.retry.backoff_ms, 100);
        assert_eq!(c.receipts.verification_base, "/api/verify");
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(BallotConfig::from_toml_str("").unwrap(), BallotConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let c = BallotConfig::from_toml_str(
            r#"
            [ledger]
            path = "/var/lib/ballot/chain.json"

            [guard]
            freshness_window_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(c.ledger.path, PathBuf::from("/var/lib/ballot/chain.json"));
        assert_eq!(c.guard.freshness_window_secs, 60);
        assert_eq!(c.retry, RetryConfig::default());
    }

    #[test]
    fn bad_types_rejected() {
        assert!(matches!(
            BallotConfig::from_toml_str("[retry]\nattempts = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ballot.toml");
        std::fs::write(&path, "[geolocation]\ntimeout_ms = 250\n").unwrap();
        let c = BallotConfig::load(&path).unwrap();
        assert_eq!(c.geolocation.timeout_ms, 250);

        assert!(matches!(
            BallotConfig::load(dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn toml_rendering_reparses() {
        let mut c = BallotConfig::default();
        c.retry.attempts = 5;
        let back = BallotConfig::from_toml_str(&c.to_toml_string()).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn verification_url_joins_cleanly() {
        let r = ReceiptConfig {
            verification_base: "https://vote.example/api/verify/".into(),
        };
        assert_eq!(r.verification_url("ab"), "https://vote.example/api/verify/ab");
        assert_eq!(ReceiptConfig::default().verification_url("ab"), "/api/verify/ab");
    }
}
