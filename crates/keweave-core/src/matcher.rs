//! # Rule Matcher
//!
//! Graph-pattern matching of a target pattern (a goal or a node antecedent)
//! against the patterns of one or more candidate rules.
//!
//! ## Algorithm
//!
//! 1. For every target triple, compute its *atoms*: the single-triple
//!    matches against every candidate triple of every rule.
//! 2. Walk the target triples in order with an explicit stack. At each
//!    triple, a partial combination is extended by one of its atoms (or the
//!    triple is skipped when full coverage is not required).
//! 3. Filter the finished combinations according to the [`MatchFlags`].
//!
//! The combination step never recurses, so very large graph patterns do
//! not consume call stack.

use crate::matching::Match;
use crate::strategy::{MatchFlags, MatchStrategy};
use crate::types::{RuleId, TriplePattern};
use std::collections::{BTreeMap, BTreeSet};

/// Matches of several rules that together cover (part of) a target pattern.
pub type CombiMatch = BTreeMap<RuleId, BTreeSet<Match>>;

/// Match `target` against the pattern of every candidate rule.
///
/// Returns, per rule, every match that took part in an accepted
/// combination. Rules that did not take part are absent.
#[must_use]
pub fn find_rule_matches(
    target: &BTreeSet<TriplePattern>,
    candidates: &[(RuleId, &BTreeSet<TriplePattern>)],
    flags: MatchFlags,
) -> BTreeMap<RuleId, BTreeSet<Match>> {
    let combinations = find_combinations(target, candidates, flags);

    let mut per_rule: BTreeMap<RuleId, BTreeSet<Match>> = BTreeMap::new();
    for combination in combinations {
        for (rule, matches) in combination {
            per_rule.entry(rule).or_default().extend(matches);
        }
    }
    per_rule
}

/// Match `target` against a single candidate pattern.
///
/// The target is treated as an antecedent, so strategies that require full
/// coverage of antecedents apply it here.
#[must_use]
pub fn find_matches(
    target: &BTreeSet<TriplePattern>,
    candidate: &BTreeSet<TriplePattern>,
    strategy: MatchStrategy,
) -> BTreeSet<Match> {
    find_rule_matches(target, &[(RuleId(0), candidate)], strategy.flags(true))
        .into_values()
        .flatten()
        .collect()
}

/// Every accepted combination of atoms, before per-rule flattening.
#[must_use]
pub fn find_combinations(
    target: &BTreeSet<TriplePattern>,
    candidates: &[(RuleId, &BTreeSet<TriplePattern>)],
    flags: MatchFlags,
) -> BTreeSet<CombiMatch> {
    if target.is_empty() {
        return BTreeSet::new();
    }

    let atoms: Vec<Vec<(RuleId, Match)>> = target
        .iter()
        .map(|goal| {
            candidates
                .iter()
                .flat_map(|(rule, pattern)| {
                    pattern
                        .iter()
                        .filter_map(move |candidate| Match::single(goal, candidate).map(|m| (*rule, m)))
                })
                .collect()
        })
        .collect();

    let fully_covered = flags.contains(MatchFlags::FULLY_COVERED);
    if fully_covered && atoms.iter().any(Vec::is_empty) {
        tracing::trace!(
            target_triples = target.len(),
            "target pattern not fully coverable"
        );
        return BTreeSet::new();
    }

    let mut combinations: BTreeSet<CombiMatch> = BTreeSet::new();
    let mut stack: Vec<(usize, CombiMatch)> = vec![(0, CombiMatch::new())];
    let mut pruned = 0usize;

    while let Some((index, combination)) = stack.pop() {
        let Some(triple_atoms) = atoms.get(index) else {
            if !combination.is_empty() {
                combinations.insert(combination);
            }
            continue;
        };

        if !fully_covered {
            stack.push((index + 1, combination.clone()));
        }

        for (rule, atom) in triple_atoms {
            match extend(&combination, *rule, atom, flags) {
                Some(next) => stack.push((index + 1, next)),
                None => pruned += 1,
            }
        }
    }

    if flags.contains(MatchFlags::ONLY_BIGGEST) {
        combinations = keep_biggest(combinations);
    }

    if flags.contains(MatchFlags::SINGLE_RULE) {
        let first_rule = combinations
            .iter()
            .filter_map(|c| c.keys().next().copied())
            .min();
        combinations.retain(|c| c.keys().next().copied() == first_rule);
    }

    tracing::trace!(
        target_triples = target.len(),
        candidates = candidates.len(),
        combinations = combinations.len(),
        pruned,
        "matched graph pattern"
    );

    combinations
}

/// Add one atom to a partial combination, or `None` if the flags forbid it.
fn extend(
    combination: &CombiMatch,
    rule: RuleId,
    atom: &Match,
    flags: MatchFlags,
) -> Option<CombiMatch> {
    match combination.get(&rule) {
        Some(matches) => {
            let distinct_images = flags.contains(MatchFlags::ONE_TO_ONE);
            for existing in matches {
                if let Some(merged) = existing.merge_with(atom, distinct_images) {
                    let mut next = combination.clone();
                    let slot = next.entry(rule).or_default();
                    slot.remove(existing);
                    slot.insert(merged);
                    return Some(next);
                }
            }

            // The same rule triple may answer a second target triple as a
            // separate match when candidates need not be used one-to-one.
            let reuses_rule_triple = atom
                .rule_patterns()
                .iter()
                .any(|t| matches.iter().any(|m| m.rule_patterns().contains(t)));
            if !flags.contains(MatchFlags::ONE_TO_ONE) && reuses_rule_triple {
                let mut next = combination.clone();
                next.entry(rule).or_default().insert(atom.clone());
                return Some(next);
            }
            None
        }
        None => {
            if flags.contains(MatchFlags::SINGLE_RULE) && !combination.is_empty() {
                return None;
            }
            let mut next = combination.clone();
            next.insert(rule, BTreeSet::from([atom.clone()]));
            Some(next)
        }
    }
}

/// Whether `big` accounts for every match of `small`.
fn contains(big: &CombiMatch, small: &CombiMatch) -> bool {
    small.iter().all(|(rule, small_matches)| {
        big.get(rule).is_some_and(|big_matches| {
            small_matches
                .iter()
                .all(|s| big_matches.iter().any(|b| s.is_sub_match(b)))
        })
    })
}

fn keep_biggest(combinations: BTreeSet<CombiMatch>) -> BTreeSet<CombiMatch> {
    combinations
        .iter()
        .filter(|candidate| {
            !combinations.iter().any(|other| {
                other != *candidate
                    && contains(other, candidate)
                    && (!contains(candidate, other) || other < *candidate)
            })
        })
        .cloned()
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
