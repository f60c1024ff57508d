//! # Match Algebra
//!
//! A `Match` records how a set of goal-side triple patterns lines up with a
//! set of rule-side triple patterns, together with the substitution that
//! makes them equal.
//!
//! The substitution is kept per position ([`TripleNode`]), so two goal
//! variables may land on the same rule value inside one triple (`?a knows ?b`
//! against `<s1> knows <s1>`) and `inverse` still loses nothing.
//!
//! Merge is a partial, commutative, associative operation: the empty match
//! is its identity and `None` absorbs. `inverse` swaps both sides and is an
//! involution.

use crate::types::{TriplePattern, Value, match_triple};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A value at one position (0 subject, 1 predicate, 2 object) of a triple
/// pattern.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TripleNode {
    pub pattern: TriplePattern,
    pub position: usize,
    pub value: Value,
}

/// A verified correspondence between goal-side and rule-side patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Match {
    /// Goal-side triple -> rule-side triple. A partial bijection.
    matching_patterns: BTreeMap<TriplePattern, TriplePattern>,
    /// Goal-side node -> rule-side node, for every position involving a
    /// variable. Literal-literal positions are left out.
    mapping: BTreeMap<TripleNode, TripleNode>,
}

impl Match {
    /// The empty match (merge identity).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Match a single goal triple onto a single rule triple.
    ///
    /// Returns `None` when the triples do not unify.
    #[must_use]
    pub fn single(goal: &TriplePattern, rule: &TriplePattern) -> Option<Self> {
        match_triple(goal, rule)?;

        let mut mapping = BTreeMap::new();
        for (position, (from, to)) in goal.positions().into_iter().zip(rule.positions()).enumerate() {
            if !from.is_variable() && !to.is_variable() {
                continue;
            }
            mapping.insert(
                TripleNode {
                    pattern: goal.clone(),
                    position,
                    value: from.clone(),
                },
                TripleNode {
                    pattern: rule.clone(),
                    position,
                    value: to.clone(),
                },
            );
        }

        Some(Self {
            matching_patterns: BTreeMap::from([(goal.clone(), rule.clone())]),
            mapping,
        })
    }

    #[must_use]
    pub fn matching_patterns(&self) -> &BTreeMap<TriplePattern, TriplePattern> {
        &self.matching_patterns
    }

    #[must_use]
    pub fn mapping(&self) -> &BTreeMap<TripleNode, TripleNode> {
        &self.mapping
    }

    /// Value pairs of the mapping, without positions.
    pub fn value_pairs(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.mapping.iter().map(|(from, to)| (&from.value, &to.value))
    }

    /// The rule-side value `value` is mapped onto, if any.
    #[must_use]
    pub fn image(&self, value: &Value) -> Option<&Value> {
        self.value_pairs()
            .find(|(from, _)| *from == value)
            .map(|(_, to)| to)
    }

    /// Goal-side triples covered by this match.
    #[must_use]
    pub fn goal_patterns(&self) -> BTreeSet<TriplePattern> {
        self.matching_patterns.keys().cloned().collect()
    }

    /// Rule-side triples used by this match.
    #[must_use]
    pub fn rule_patterns(&self) -> BTreeSet<TriplePattern> {
        self.matching_patterns.values().cloned().collect()
    }

    /// Number of matched triple pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.matching_patterns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matching_patterns.is_empty()
    }

    /// Combine two matches into one, keeping rule values distinct.
    ///
    /// Same as [`Self::merge_with`] with `distinct_images` set.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Option<Self> {
        self.merge_with(other, true)
    }

    /// Combine two matches into one.
    ///
    /// Fails when a triple is matched twice on either side or when a goal
    /// value is mapped to two different rule values. With
    /// `distinct_images`, it also fails when two different goal values of
    /// different triples would share one rule value.
    #[must_use]
    pub fn merge_with(&self, other: &Self, distinct_images: bool) -> Option<Self> {
        let mut matching_patterns = self.matching_patterns.clone();
        let mut used_rule_side: BTreeSet<&TriplePattern> =
            self.matching_patterns.values().collect();

        for (goal, rule) in &other.matching_patterns {
            if matching_patterns.contains_key(goal) || !used_rule_side.insert(rule) {
                return None;
            }
            matching_patterns.insert(goal.clone(), rule.clone());
        }

        for (from, to) in other.value_pairs() {
            for (existing_from, existing_to) in self.value_pairs() {
                let same_from = existing_from == from;
                let same_to = existing_to == to;
                if same_from && !same_to {
                    return None;
                }
                if distinct_images && same_to && !same_from {
                    return None;
                }
            }
        }

        let mut mapping = self.mapping.clone();
        mapping.extend(other.mapping.iter().map(|(k, v)| (k.clone(), v.clone())));

        Some(Self {
            matching_patterns,
            mapping,
        })
    }

    /// Swap goal side and rule side.
    #[must_use]
    pub fn inverse(&self) -> Self {
        Self {
            matching_patterns: self
                .matching_patterns
                .iter()
                .map(|(goal, rule)| (rule.clone(), goal.clone()))
                .collect(),
            mapping: self
                .mapping
                .iter()
                .map(|(from, to)| (to.clone(), from.clone()))
                .collect(),
        }
    }

    /// Whether every pair of `self` also occurs in `other`.
    #[must_use]
    pub fn is_sub_match(&self, other: &Self) -> bool {
        self.matching_patterns
            .iter()
            .all(|(goal, rule)| other.matching_patterns.get(goal) == Some(rule))
            && self
                .mapping
                .iter()
                .all(|(from, to)| other.mapping.get(from) == Some(to))
    }
}

/// Invert every match of a set.
#[must_use]
pub fn invert_all(matches: &BTreeSet<Match>) -> BTreeSet<Match> {
    matches.iter().map(Match::inverse).collect()
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (goal, rule)) in self.matching_patterns.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{goal} => {rule}")?;
        }
        f.write_str("}")
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tp(s: Value, p: Value, o: Value) -> TriplePattern {
        TriplePattern::new(s, p, o)
    }

    fn knows(a: &str, b: &str) -> TriplePattern {
        tp(Value::var(a), Value::lit("knows"), Value::var(b))
    }

    #[test]
    fn single_match_records_both_sides() {
        let m = Match::single(&knows("a", "b"), &knows("x", "y")).expect("match");

        assert_eq!(m.len(), 1);
        assert_eq!(m.image(&Value::var("a")), Some(&Value::var("x")));
        assert_eq!(m.mapping().len(), 2);
        assert_eq!(m.goal_patterns(), BTreeSet::from([knows("a", "b")]));
        assert_eq!(m.rule_patterns(), BTreeSet::from([knows("x", "y")]));
    }

    #[test]
    fn single_match_allows_repeated_rule_value() {
        let reflexive = tp(Value::lit("<s1>"), Value::lit("knows"), Value::lit("<s1>"));
        let m = Match::single(&knows("a", "b"), &reflexive).expect("match");

        assert_eq!(m.image(&Value::var("a")), Some(&Value::lit("<s1>")));
        assert_eq!(m.image(&Value::var("b")), Some(&Value::lit("<s1>")));
        assert_eq!(m.inverse().inverse(), m);
        assert!(Match::single(&knows("a", "b"), &knows("x", "x")).is_some());
    }

    #[test]
    fn distinct_images_only_across_triples() {
        // ?a -> ?x in the first triple, ?c -> ?x in the second
        let m1 = Match::single(&knows("a", "b"), &knows("x", "y")).expect("m1");
        let m2 = Match::single(
            &tp(Value::var("c"), Value::lit("likes"), Value::var("d")),
            &tp(Value::var("x"), Value::lit("likes"), Value::var("z")),
        )
        .expect("m2");

        assert!(m1.merge(&m2).is_none());
        let relaxed = m1.merge_with(&m2, false).expect("relaxed");
        assert_eq!(relaxed.len(), 2);
    }

    #[test]
    fn merge_rejects_reused_rule_triple() {
        let m1 = Match::single(&knows("a", "b"), &knows("x", "y")).expect("m1");
        let m2 = Match::single(&knows("b", "c"), &knows("x", "y")).expect("m2");

        assert!(m1.merge(&m2).is_none());
    }

    #[test]
    fn merge_rejects_conflicting_mapping() {
        let goal_1 = knows("a", "b");
        let goal_2 = tp(Value::var("a"), Value::lit("likes"), Value::var("c"));
        let m1 = Match::single(&goal_1, &knows("x", "y")).expect("m1");
        let m2 = Match::single(
            &goal_2,
            &tp(Value::var("z"), Value::lit("likes"), Value::var("w")),
        )
        .expect("m2");

        // ?a -> ?x versus ?a -> ?z
        assert!(m1.merge(&m2).is_none());
    }

    #[test]
    fn merge_joins_consistent_matches() {
        let goal_2 = tp(Value::var("a"), Value::lit("likes"), Value::var("c"));
        let m1 = Match::single(&knows("a", "b"), &knows("x", "y")).expect("m1");
        let m2 = Match::single(
            &goal_2,
            &tp(Value::var("x"), Value::lit("likes"), Value::var("w")),
        )
        .expect("m2");

        let merged = m1.merge(&m2).expect("merged");
        assert_eq!(merged.len(), 2);
        assert!(m1.is_sub_match(&merged));
        assert!(m2.is_sub_match(&merged));
        assert_eq!(merged, m2.merge(&m1).expect("commuted"));
    }

    #[test]
    fn empty_match_is_identity() {
        let m = Match::single(&knows("a", "b"), &knows("x", "y")).expect("match");
        assert_eq!(m.merge(&Match::empty()), Some(m.clone()));
        assert_eq!(Match::empty().merge(&m), Some(m));
    }

    #[test]
    fn inverse_is_involution() {
        let goal = tp(Value::lit("<s1>"), Value::lit("knows"), Value::var("b"));
        let m = Match::single(&goal, &knows("x", "y")).expect("match");

        let inverted = m.inverse();
        assert_eq!(inverted.image(&Value::var("x")), Some(&Value::lit("<s1>")));
        assert_eq!(inverted.inverse(), m);
    }
}
