//! # Match Strategies
//!
//! A `MatchStrategy` names a trade-off between matching exhaustiveness and
//! cost. Each strategy expands to a set of orthogonal [`MatchFlags`] that
//! steer the combination step of the rule matcher.

use crate::types::KeweaveError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// MATCH FLAGS
// =============================================================================

/// Orthogonal switches for the combination step of the matcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MatchFlags(u8);

impl MatchFlags {
    /// A candidate-side triple is used by at most one match per rule.
    pub const ONE_TO_ONE: Self = Self(1);
    /// Drop combinations contained in a bigger one.
    pub const ONLY_BIGGEST: Self = Self(1 << 1);
    /// No combination across rules; stop at the first rule that matches.
    pub const SINGLE_RULE: Self = Self(1 << 2);
    /// Every target triple must be accounted for.
    pub const FULLY_COVERED: Self = Self(1 << 3);

    /// No flags set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl std::ops::BitOr for MatchFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

// =============================================================================
// MATCH STRATEGY
// =============================================================================

/// Named matching strategies, from cheapest to most exhaustive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    Entry,
    #[default]
    Normal,
    Advanced,
    Ultra,
    Supreme,
}

impl MatchStrategy {
    /// All strategies in order of increasing exhaustiveness.
    pub const ALL: [Self; 5] = [
        Self::Entry,
        Self::Normal,
        Self::Advanced,
        Self::Ultra,
        Self::Supreme,
    ];

    /// Expand the strategy to its flags.
    ///
    /// `antecedent_target` tells whether the pattern being matched is the
    /// antecedent of a node (backward chaining) rather than a consequent.
    #[must_use]
    pub fn flags(self, antecedent_target: bool) -> MatchFlags {
        let fully_covered = if antecedent_target {
            MatchFlags::FULLY_COVERED
        } else {
            MatchFlags::empty()
        };

        match self {
            Self::Entry => {
                MatchFlags::ONE_TO_ONE
                    | MatchFlags::ONLY_BIGGEST
                    | MatchFlags::SINGLE_RULE
                    | MatchFlags::FULLY_COVERED
            }
            Self::Normal => MatchFlags::ONE_TO_ONE | MatchFlags::ONLY_BIGGEST | fully_covered,
            Self::Advanced => MatchFlags::ONLY_BIGGEST | fully_covered,
            Self::Ultra => MatchFlags::ONLY_BIGGEST,
            Self::Supreme => MatchFlags::empty(),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Normal => "normal",
            Self::Advanced => "advanced",
            Self::Ultra => "ultra",
            Self::Supreme => "supreme",
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStrategy {
    type Err = KeweaveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| KeweaveError::InvalidConfig(format!("unknown match strategy '{s}'")))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn row(strategy: MatchStrategy, antecedent: bool) -> [bool; 4] {
        let flags = strategy.flags(antecedent);
        [
            flags.contains(MatchFlags::ONE_TO_ONE),
            flags.contains(MatchFlags::ONLY_BIGGEST),
            flags.contains(MatchFlags::SINGLE_RULE),
            flags.contains(MatchFlags::FULLY_COVERED),
        ]
    }

    #[test]
    fn flag_table_for_antecedent_targets() {
        assert_eq!(row(MatchStrategy::Entry, true), [true, true, true, true]);
        assert_eq!(row(MatchStrategy::Normal, true), [true, true, false, true]);
        assert_eq!(row(MatchStrategy::Advanced, true), [false, true, false, true]);
        assert_eq!(row(MatchStrategy::Ultra, true), [false, true, false, false]);
        assert_eq!(row(MatchStrategy::Supreme, true), [false, false, false, false]);
    }

    #[test]
    fn fully_covered_only_for_antecedent_targets() {
        assert_eq!(row(MatchStrategy::Entry, false), [true, true, true, true]);
        assert_eq!(row(MatchStrategy::Normal, false), [true, true, false, false]);
        assert_eq!(row(MatchStrategy::Advanced, false), [false, true, false, false]);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("ADVANCED".parse::<MatchStrategy>().ok(), Some(MatchStrategy::Advanced));
        assert!("bogus".parse::<MatchStrategy>().is_err());
        assert_eq!(MatchStrategy::default(), MatchStrategy::Normal);
    }

    #[test]
    fn difference_clears_flags() {
        let flags = MatchStrategy::Normal
            .flags(true)
            .difference(MatchFlags::FULLY_COVERED);
        assert!(!flags.contains(MatchFlags::FULLY_COVERED));
        assert!(flags.contains(MatchFlags::ONE_TO_ONE));
    }
}
