//! # Graph-Aware Bindings
//!
//! Bindings that remember which triple of a graph pattern each value was
//! found for. A node collects the answers of its children this way: every
//! child covers only some triples of the node's antecedent, and only the
//! combinations that cover the whole antecedent become answers.

use crate::binding::{Binding, BindingSet};
use crate::matching::Match;
use crate::primitives::LARGE_MERGE_WARNING;
use crate::types::{Literal, TriplePattern, Variable};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// TRIPLE VAR
// =============================================================================

/// A variable occurrence inside a specific triple pattern.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TripleVar {
    pub pattern: TriplePattern,
    pub variable: Variable,
}

/// Every variable occurrence of a graph pattern.
#[must_use]
pub fn triple_vars(graph_pattern: &BTreeSet<TriplePattern>) -> BTreeSet<TripleVar> {
    graph_pattern
        .iter()
        .flat_map(|pattern| {
            pattern.variables().into_iter().map(|variable| TripleVar {
                pattern: pattern.clone(),
                variable,
            })
        })
        .collect()
}

// =============================================================================
// TRIPLE VAR BINDING
// =============================================================================

/// A binding keyed by variable occurrence, plus the triples it covers.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TripleVarBinding {
    values: BTreeMap<TripleVar, Literal>,
    triples: BTreeSet<TriplePattern>,
}

impl TripleVarBinding {
    /// Spread `binding` over the triples in `covered`.
    #[must_use]
    pub fn new(covered: &BTreeSet<TriplePattern>, binding: &Binding) -> Self {
        let mut values = BTreeMap::new();
        for pattern in covered {
            for variable in pattern.variables() {
                if let Some(literal) = binding.get(&variable) {
                    values.insert(
                        TripleVar {
                            pattern: pattern.clone(),
                            variable,
                        },
                        literal.clone(),
                    );
                }
            }
        }
        Self {
            values,
            triples: covered.clone(),
        }
    }

    #[must_use]
    pub fn triples(&self) -> &BTreeSet<TriplePattern> {
        &self.triples
    }

    #[must_use]
    pub fn get(&self, triple_var: &TripleVar) -> Option<&Literal> {
        self.values.get(triple_var)
    }

    /// Collapse occurrences into a plain variable binding.
    #[must_use]
    pub fn to_binding(&self) -> Binding {
        self.values
            .iter()
            .map(|(tv, lit)| (tv.variable.clone(), lit.clone()))
            .collect()
    }

    /// Two bindings conflict when one variable has different values.
    #[must_use]
    pub fn is_conflicting(&self, other: &Self) -> bool {
        !self.to_binding().is_compatible(&other.to_binding())
    }

    /// Union of both bindings. Callers check [`Self::is_conflicting`] first.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged
            .values
            .extend(other.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged.triples.extend(other.triples.iter().cloned());
        merged
    }

    /// Whether every triple and every variable occurrence of the graph
    /// pattern is accounted for.
    #[must_use]
    pub fn is_full(&self, graph_pattern: &BTreeSet<TriplePattern>, vars: &BTreeSet<TripleVar>) -> bool {
        graph_pattern.is_subset(&self.triples) && vars.iter().all(|tv| self.values.contains_key(tv))
    }
}

// =============================================================================
// TRIPLE VAR BINDING SET
// =============================================================================

/// A set of graph-aware bindings over one graph pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TripleVarBindingSet {
    graph_pattern: BTreeSet<TriplePattern>,
    bindings: BTreeSet<TripleVarBinding>,
}

impl TripleVarBindingSet {
    /// Create an empty set over `graph_pattern`.
    #[must_use]
    pub fn new(graph_pattern: BTreeSet<TriplePattern>) -> Self {
        Self {
            graph_pattern,
            bindings: BTreeSet::new(),
        }
    }

    /// Bring the answers of a child back into this graph pattern.
    ///
    /// Each child answer is renamed through the inverse of every connecting
    /// match and spread over the triples that match covers.
    #[must_use]
    pub fn from_child_result(
        graph_pattern: BTreeSet<TriplePattern>,
        result: &BindingSet,
        matches: &BTreeSet<Match>,
    ) -> Self {
        let mut set = Self::new(graph_pattern);
        for m in matches {
            let inverse = m.inverse();
            let covered = m.goal_patterns();
            for binding in result {
                if let Some(translated) = binding.translate(&inverse) {
                    set.bindings.insert(TripleVarBinding::new(&covered, &translated));
                }
            }
        }
        set
    }

    #[must_use]
    pub fn graph_pattern(&self) -> &BTreeSet<TriplePattern> {
        &self.graph_pattern
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TripleVarBinding> {
        self.bindings.iter()
    }

    /// Cross product of both sets, skipping conflicting pairs.
    ///
    /// Combining with an empty set yields the other set unchanged.
    #[must_use]
    pub fn combine(&self, other: &Self) -> Self {
        let total = self.bindings.len().saturating_mul(other.bindings.len());
        if total > LARGE_MERGE_WARNING {
            tracing::warn!(
                left = self.bindings.len(),
                right = other.bindings.len(),
                total,
                "combining large binding sets"
            );
        }

        let mut combined = Self::new(self.graph_pattern.clone());
        if self.bindings.is_empty() {
            combined.bindings = other.bindings.clone();
            return combined;
        }

        for left in &self.bindings {
            for right in &other.bindings {
                if !left.is_conflicting(right) {
                    combined.bindings.insert(left.merge(right));
                }
            }
        }
        combined
    }

    /// The combination of both sets plus both sets themselves.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.combine(other);
        merged.bindings.extend(self.bindings.iter().cloned());
        merged.bindings.extend(other.bindings.iter().cloned());
        merged
    }

    /// Bindings that cover the entire graph pattern.
    #[must_use]
    pub fn full_bindings(&self) -> Self {
        let vars = triple_vars(&self.graph_pattern);
        self.filtered(|b| b.is_full(&self.graph_pattern, &vars))
    }

    /// Bindings that cover only part of the graph pattern.
    #[must_use]
    pub fn partial_bindings(&self) -> Self {
        let vars = triple_vars(&self.graph_pattern);
        self.filtered(|b| !b.is_full(&self.graph_pattern, &vars))
    }

    /// Forget the provenance.
    #[must_use]
    pub fn to_binding_set(&self) -> BindingSet {
        self.bindings.iter().map(TripleVarBinding::to_binding).collect()
    }

    fn filtered(&self, keep: impl Fn(&TripleVarBinding) -> bool) -> Self {
        Self {
            graph_pattern: self.graph_pattern.clone(),
            bindings: self.bindings.iter().filter(|b| keep(b)).cloned().collect(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    fn tp(s: Value, p: Value, o: Value) -> TriplePattern {
        TriplePattern::new(s, p, o)
    }

    fn answers(pairs: &[&[(&str, &str)]]) -> BindingSet {
        pairs
            .iter()
            .map(|b| {
                b.iter()
                    .map(|(v, l)| (Variable::new(*v), Literal::new(*l)))
                    .collect::<Binding>()
            })
            .collect()
    }

    /// Antecedent `?a p ?b . ?a q ?c`, covered by two different children.
    fn two_children() -> (BTreeSet<TriplePattern>, TripleVarBindingSet, TripleVarBindingSet) {
        let t1 = tp(Value::var("a"), Value::lit("p"), Value::var("b"));
        let t2 = tp(Value::var("a"), Value::lit("q"), Value::var("c"));
        let antecedent: BTreeSet<_> = [t1.clone(), t2.clone()].into_iter().collect();

        let c1 = tp(Value::var("x"), Value::lit("p"), Value::var("y"));
        let c2 = tp(Value::var("u"), Value::lit("q"), Value::var("w"));
        let m1 = Match::single(&t1, &c1).expect("m1");
        let m2 = Match::single(&t2, &c2).expect("m2");

        let r1 = answers(&[&[("x", "1"), ("y", "b1")], &[("x", "2"), ("y", "b2")]]);
        let r2 = answers(&[&[("u", "1"), ("w", "c1")], &[("u", "3"), ("w", "c3")]]);

        let s1 = TripleVarBindingSet::from_child_result(antecedent.clone(), &r1, &BTreeSet::from([m1]));
        let s2 = TripleVarBindingSet::from_child_result(antecedent.clone(), &r2, &BTreeSet::from([m2]));
        (antecedent, s1, s2)
    }

    #[test]
    fn child_results_are_partial_alone() {
        let (_, s1, s2) = two_children();
        assert_eq!(s1.len(), 2);
        assert!(s1.full_bindings().is_empty());
        assert!(s2.full_bindings().is_empty());
        assert_eq!(s1.partial_bindings().len(), 2);
    }

    #[test]
    fn merge_keeps_only_agreeing_full_bindings() {
        let (_, s1, s2) = two_children();
        let full = s1.merge(&s2).full_bindings().to_binding_set();

        assert_eq!(full, answers(&[&[("a", "1"), ("b", "b1"), ("c", "c1")]]));
    }

    #[test]
    fn combine_with_empty_is_other() {
        let (antecedent, s1, _) = two_children();
        let empty = TripleVarBindingSet::new(antecedent);
        assert_eq!(empty.combine(&s1), s1);
        assert!(s1.combine(&empty).is_empty());
    }

    #[test]
    fn triple_vars_counts_occurrences() {
        let (antecedent, _, _) = two_children();
        // ?a occurs in both triples
        assert_eq!(triple_vars(&antecedent).len(), 4);
    }
}
