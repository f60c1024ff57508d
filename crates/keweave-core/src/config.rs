//! # Reasoner Configuration
//!
//! Tunable parameters of one reasoning execution. Defaults come from
//! [`crate::primitives`].

use crate::primitives::{DEFAULT_MAX_ROUNDS, MAX_ROUND_TIMEOUT_MS, MAX_ROUNDS_LIMIT};
use crate::strategy::MatchStrategy;
use crate::types::KeweaveError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReasonerConfig {
    /// Matching strategy used while planning.
    pub strategy: MatchStrategy,
    /// Rounds (plan pass + drain) before giving up.
    pub max_rounds: usize,
    /// Per-round handler timeout. `None` waits indefinitely.
    pub round_timeout_ms: Option<u64>,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            strategy: MatchStrategy::default(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            round_timeout_ms: None,
        }
    }
}

impl ReasonerConfig {
    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when `max_rounds` is zero or above
    /// [`MAX_ROUNDS_LIMIT`], or the timeout is zero or above
    /// [`MAX_ROUND_TIMEOUT_MS`].
    pub fn validate(&self) -> Result<(), KeweaveError> {
        if self.max_rounds == 0 || self.max_rounds > MAX_ROUNDS_LIMIT {
            return Err(KeweaveError::InvalidConfig(format!(
                "max_rounds must be between 1 and {MAX_ROUNDS_LIMIT}, got {}",
                self.max_rounds
            )));
        }
        match self.round_timeout_ms {
            Some(ms) if ms == 0 || ms > MAX_ROUND_TIMEOUT_MS => {
                Err(KeweaveError::InvalidConfig(format!(
                    "round_timeout_ms must be between 1 and {MAX_ROUND_TIMEOUT_MS}, got {ms}"
                )))
            }
            _ => Ok(()),
        }
    }

    /// The timeout as a `Duration`.
    #[must_use]
    pub fn round_timeout(&self) -> Option<Duration> {
        self.round_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ReasonerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.strategy, MatchStrategy::Normal);
        assert_eq!(config.max_rounds, DEFAULT_MAX_ROUNDS);
        assert_eq!(config.round_timeout(), None);
    }

    #[test]
    fn zero_rounds_rejected() {
        let config = ReasonerConfig {
            max_rounds: 0,
            ..ReasonerConfig::default()
        };
        assert!(matches!(config.validate(), Err(KeweaveError::InvalidConfig(_))));
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = ReasonerConfig {
            round_timeout_ms: Some(0),
            ..ReasonerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ReasonerConfig {
            round_timeout_ms: Some(250),
            ..ReasonerConfig::default()
        };
        assert_eq!(config.round_timeout(), Some(Duration::from_millis(250)));
    }
}
