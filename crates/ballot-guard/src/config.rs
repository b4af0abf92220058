use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default freshness window: five minutes either side of "now".
pub const DEFAULT_FRESHNESS_WINDOW_SECS: u64 = 300;

/// Configuration for the replay guard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Maximum allowed distance, in seconds, between a submission's
    /// timestamp and the server clock.
    pub freshness_window_secs: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            freshness_window_secs: DEFAULT_FRESHNESS_WINDOW_SECS,
        }
    }
}

impl GuardConfig {
    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_window_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_window_is_five_minutes() {
        let c = GuardConfig::default();
        assert_eq!(c.freshness_window(), Duration::from_secs(300));
    }

    #[test]
    fn missing_field_falls_back_to_default() {
        let c: GuardConfig = toml::from_str("").unwrap();
        assert_eq!(c, GuardConfig::default());
        let c: GuardConfig = toml::from_str("freshness_window_secs = 60").unwrap();
        assert_eq!(c.freshness_window_secs, 60);
    }
}
