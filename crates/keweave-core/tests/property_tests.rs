//! # Property Tests
//!
//! Algebraic laws of matching and binding translation, and structural
//! bounds of planning, checked over generated inputs.

use keweave_core::{
    Binding, Literal, Match, MatchStrategy, ReasoningPlan, Rule, RuleSet, TriplePattern, Value,
    match_triple,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

// =============================================================================
// GENERATORS
// =============================================================================

fn goal_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        prop::sample::select(vec!["a", "b", "c"]).prop_map(|name| Value::var(name)),
        prop::sample::select(vec!["x", "y"]).prop_map(|lexical| Value::lit(lexical)),
    ]
}

fn rule_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        prop::sample::select(vec!["u", "v", "w"]).prop_map(|name| Value::var(name)),
        prop::sample::select(vec!["x", "y"]).prop_map(|lexical| Value::lit(lexical)),
    ]
}

fn predicate() -> impl Strategy<Value = Value> {
    prop::sample::select(vec!["p", "q"]).prop_map(|lexical| Value::lit(lexical))
}

fn goal_triple() -> impl Strategy<Value = TriplePattern> {
    (goal_value(), predicate(), goal_value()).prop_map(|(s, p, o)| TriplePattern::new(s, p, o))
}

fn rule_triple() -> impl Strategy<Value = TriplePattern> {
    (rule_value(), predicate(), rule_value()).prop_map(|(s, p, o)| TriplePattern::new(s, p, o))
}

fn ground_triple() -> impl Strategy<Value = TriplePattern> {
    let lexical = || prop::sample::select(vec!["x", "y", "z"]).prop_map(|l| Value::lit(l));
    (lexical(), predicate(), lexical()).prop_map(|(s, p, o)| TriplePattern::new(s, p, o))
}

fn single_match() -> impl Strategy<Value = Match> {
    (goal_triple(), rule_triple()).prop_filter_map("triples do not match", |(goal, rule)| {
        Match::single(&goal, &rule)
    })
}

/// Rule triples made of variables only, so every goal variable maps to a
/// rule variable.
fn open_rule_triple() -> impl Strategy<Value = TriplePattern> {
    let variable = || prop::sample::select(vec!["u", "v", "w"]).prop_map(|n| Value::var(n));
    (variable(), predicate(), variable()).prop_map(|(s, p, o)| TriplePattern::new(s, p, o))
}

fn rule_pattern() -> impl Strategy<Value = BTreeSet<TriplePattern>> {
    prop::collection::btree_set(rule_triple(), 0..=2)
}

// =============================================================================
// PROPERTY TESTS: Triple Matching
// =============================================================================

proptest! {
    /// A substitution returned by `match_triple` turns the pattern into the
    /// candidate.
    #[test]
    fn prop_match_triple_is_sound(pattern in goal_triple(), candidate in ground_triple()) {
        if let Some(substitution) = match_triple(&pattern, &candidate) {
            prop_assert_eq!(pattern.substitute(&substitution), candidate);
        }
    }

    /// Abstracting literals of a ground triple into variables always matches
    /// back.
    #[test]
    fn prop_abstraction_matches(
        ground in ground_triple(),
        mask in prop::array::uniform3(any::<bool>()),
    ) {
        let abstract_value = |value: &Value, hide: bool| match value.as_literal() {
            Some(literal) if hide => Value::var(format!("v_{}", literal.as_str())),
            _ => value.clone(),
        };
        let [s, p, o] = ground.positions();
        let pattern = TriplePattern::new(
            abstract_value(s, mask[0]),
            abstract_value(p, mask[1]),
            abstract_value(o, mask[2]),
        );

        let substitution = match_triple(&pattern, &ground);
        prop_assert!(substitution.is_some());
        if let Some(substitution) = substitution {
            prop_assert_eq!(pattern.substitute(&substitution), ground);
        }
    }
}

// =============================================================================
// PROPERTY TESTS: Match Algebra
// =============================================================================

proptest! {
    #[test]
    fn prop_merge_commutative(a in single_match(), b in single_match()) {
        prop_assert_eq!(a.merge(&b), b.merge(&a));
    }

    #[test]
    fn prop_merge_associative(
        a in single_match(),
        b in single_match(),
        c in single_match(),
    ) {
        let left = a.merge(&b).and_then(|ab| ab.merge(&c));
        let right = b.merge(&c).and_then(|bc| a.merge(&bc));
        prop_assert_eq!(left, right);
    }

    #[test]
    fn prop_empty_match_is_identity(a in single_match()) {
        prop_assert_eq!(a.merge(&Match::empty()), Some(a.clone()));
        prop_assert_eq!(Match::empty().merge(&a), Some(a));
    }

    #[test]
    fn prop_merge_with_self_fails(a in single_match()) {
        prop_assert_eq!(a.merge(&a), None);
    }

    #[test]
    fn prop_inverse_is_involution(a in single_match(), b in single_match()) {
        prop_assert_eq!(a.inverse().inverse(), a.clone());
        if let Some(merged) = a.merge(&b) {
            prop_assert_eq!(merged.inverse().inverse(), merged);
        }
    }

    #[test]
    fn prop_merged_match_covers_both(a in single_match(), b in single_match()) {
        if let Some(merged) = a.merge(&b) {
            prop_assert!(a.is_sub_match(&merged));
            prop_assert!(b.is_sub_match(&merged));
            prop_assert_eq!(merged.len(), a.len() + b.len());
        }
    }
}

// =============================================================================
// PROPERTY TESTS: Binding Translation
// =============================================================================

proptest! {
    /// Translating into a rule's names and back restores the goal binding,
    /// restricted to the variables the match maps. Translation only fails
    /// when two goal values share one rule variable and disagree.
    #[test]
    fn prop_translation_round_trip(
        goal in goal_triple(),
        rule in open_rule_triple(),
        values in prop::collection::vec(prop::sample::select(vec!["1", "2", "3"]), 3),
    ) {
        let Some(m) = Match::single(&goal, &rule) else {
            return Ok(());
        };
        let mapped: BTreeSet<_> = m
            .mapping()
            .keys()
            .filter_map(|node| node.value.as_variable())
            .cloned()
            .collect();
        let binding: Binding = goal
            .variables()
            .into_iter()
            .zip(values)
            .map(|(variable, value)| (variable, Literal::new(value)))
            .collect();

        match binding.translate(&m) {
            Some(there) => {
                let back = there.translate(&m.inverse());
                prop_assert_eq!(back, Some(binding.project(&mapped)));
            }
            None => prop_assert!(collapses_values(&m)),
        }
    }
}

/// Whether two different goal values are mapped onto one rule value.
fn collapses_values(m: &Match) -> bool {
    let pairs: BTreeSet<(&Value, &Value)> = m.value_pairs().collect();
    let goal_side: BTreeSet<&Value> = pairs.iter().map(|(from, _)| *from).collect();
    let rule_side: BTreeSet<&Value> = pairs.iter().map(|(_, to)| *to).collect();
    rule_side.len() < goal_side.len()
}

// =============================================================================
// PROPERTY TESTS: Planning
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// No root-to-leaf path applies a rule twice, so depth never exceeds the
    /// number of rules.
    #[test]
    fn prop_plan_depth_bounded(
        rule_patterns in prop::collection::vec((rule_pattern(), rule_pattern()), 0..=4),
        goal in prop::collection::btree_set(goal_triple(), 1..=2),
        strategy in prop::sample::select(MatchStrategy::ALL.to_vec()),
    ) {
        let mut rules = RuleSet::new();
        for (index, (antecedent, consequent)) in rule_patterns.into_iter().enumerate() {
            if let Ok(rule) = Rule::local(format!("r{index}"), antecedent, consequent) {
                rules.add(rule);
            }
        }

        let plan = ReasoningPlan::build(goal, &rules, strategy);
        prop_assert!(plan.is_ok());
        if let Ok(plan) = plan {
            prop_assert!(plan.depth() <= rules.len());
            prop_assert!(plan.verify_acyclic().is_ok());
            prop_assert!(plan.knowledge_gaps(plan.root()).is_ok());
        }
    }
}
