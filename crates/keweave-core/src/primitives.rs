//! # Innate Primitives
//!
//! Hardcoded runtime constants for the Keweave engine.
//!
//! These values are compiled into the binary and are immutable at runtime.
//! Tunable parameters live in [`crate::config::ReasonerConfig`]; the values
//! here are the defaults and hard ceilings it validates against.

/// Default number of rounds (plan pass + board drain) before giving up.
///
/// A plan of depth `d` needs at most `d` rounds when every handler answers,
/// so 64 rounds is generous for any realistic rule chain.
pub const DEFAULT_MAX_ROUNDS: usize = 64;

/// Hard ceiling for `max_rounds` accepted by the configuration.
pub const MAX_ROUNDS_LIMIT: usize = 10_000;

/// Maximum number of triples in a single graph pattern.
///
/// The matcher enumerates combinations over the triples of a pattern.
/// Rules above this size are rejected by `Rule::new`, goals above it by
/// `ReasoningPlan::build`.
pub const MAX_PATTERN_SIZE: usize = 64;

/// Binding set size above which a merge is reported at `warn` level.
///
/// Merging is a cross product; crossing this size usually means the
/// graph pattern is under-constrained.
pub const LARGE_MERGE_WARNING: usize = 300_000;

/// Largest accepted per-round handler timeout, in milliseconds (one hour).
pub const MAX_ROUND_TIMEOUT_MS: u64 = 3_600_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rounds_within_limit() {
        assert!(DEFAULT_MAX_ROUNDS > 0);
        assert!(DEFAULT_MAX_ROUNDS <= MAX_ROUNDS_LIMIT);
    }

    #[test]
    fn round_timeout_ceiling_is_one_hour() {
        assert_eq!(MAX_ROUND_TIMEOUT_MS, 60 * 60 * 1000);
    }

    #[test]
    fn large_merge_warning_above_single_pattern_product() {
        // crossing two full-size patterns alone must not warn
        assert!(LARGE_MERGE_WARNING > MAX_PATTERN_SIZE * MAX_PATTERN_SIZE);
    }
}
