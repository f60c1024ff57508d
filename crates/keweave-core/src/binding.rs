//! # Binding Algebra
//!
//! A `Binding` is a conjunction of `Variable -> Literal` assignments.
//! A `BindingSet` is a disjunction of bindings.
//!
//! Both are immutable value types: every operation returns a new value.
//! Ordering is `BTreeMap`/`BTreeSet` based, so printing and iterating a
//! binding set is deterministic.

use crate::matching::Match;
use crate::types::{Literal, Value, Variable};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// =============================================================================
// BINDING
// =============================================================================

/// A finite map from variables to literals.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Binding(BTreeMap<Variable, Literal>);

impl Binding {
    /// Create an empty binding.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a binding from `(variable, literal)` name pairs.
    #[must_use]
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        pairs
            .iter()
            .map(|(v, l)| (Variable::new(*v), Literal::new(*l)))
            .collect()
    }

    /// Assign `literal` to `variable`, returning the previous value if any.
    pub fn insert(&mut self, variable: Variable, literal: Literal) -> Option<Literal> {
        self.0.insert(variable, literal)
    }

    #[must_use]
    pub fn get(&self, variable: &Variable) -> Option<&Literal> {
        self.0.get(variable)
    }

    #[must_use]
    pub fn contains(&self, variable: &Variable) -> bool {
        self.0.contains_key(variable)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Variable, &Literal)> {
        self.0.iter()
    }

    /// The variables this binding assigns.
    #[must_use]
    pub fn variables(&self) -> BTreeSet<Variable> {
        self.0.keys().cloned().collect()
    }

    /// Two bindings are compatible when they agree on every shared variable.
    #[must_use]
    pub fn is_compatible(&self, other: &Self) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .0
            .iter()
            .all(|(var, lit)| large.0.get(var).is_none_or(|l| l == lit))
    }

    /// Union of two compatible bindings, `None` on conflict.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Option<Self> {
        if !self.is_compatible(other) {
            return None;
        }
        let mut merged = self.clone();
        for (var, lit) in &other.0 {
            merged.0.insert(var.clone(), lit.clone());
        }
        Some(merged)
    }

    /// Keep only the assignments of `variables`.
    #[must_use]
    pub fn project(&self, variables: &BTreeSet<Variable>) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(var, _)| variables.contains(*var))
                .map(|(var, lit)| (var.clone(), lit.clone()))
                .collect(),
        )
    }

    /// Rename this binding across the substitution of `m`.
    ///
    /// For every `from -> to` pair of the match mapping:
    /// - variable to variable: the value is carried over under the new name
    /// - variable to literal: the bound value must equal the literal, the
    ///   variable itself disappears
    /// - literal to variable: the target variable is bound to the literal
    ///
    /// Variables that the mapping does not mention are dropped. Returns
    /// `None` when the binding contradicts a literal of the match.
    #[must_use]
    pub fn translate(&self, m: &Match) -> Option<Self> {
        let mut translated = Self::new();

        for (from, to) in m.value_pairs() {
            let value = match from {
                Value::Variable(var) => match self.0.get(var) {
                    Some(lit) => lit.clone(),
                    None => continue,
                },
                Value::Literal(lit) => lit.clone(),
            };

            match to {
                Value::Variable(target) => match translated.0.get(target) {
                    Some(existing) if *existing != value => return None,
                    Some(_) => {}
                    None => {
                        translated.0.insert(target.clone(), value);
                    }
                },
                Value::Literal(expected) => {
                    if *expected != value {
                        return None;
                    }
                }
            }
        }

        Some(translated)
    }
}

impl FromIterator<(Variable, Literal)> for Binding {
    fn from_iter<I: IntoIterator<Item = (Variable, Literal)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (var, lit)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{var}={lit}")?;
        }
        f.write_str("}")
    }
}

// =============================================================================
// BINDING SET
// =============================================================================

/// A set of alternative bindings.
///
/// The empty set means "no answers". The set holding only the empty binding
/// ([`BindingSet::unconstrained`]) means "no constraints".
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BindingSet(BTreeSet<Binding>);

impl BindingSet {
    /// Create an empty binding set (no answers).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The binding set containing exactly one empty binding.
    #[must_use]
    pub fn unconstrained() -> Self {
        Self(BTreeSet::from([Binding::new()]))
    }

    pub fn insert(&mut self, binding: Binding) -> bool {
        self.0.insert(binding)
    }

    #[must_use]
    pub fn contains(&self, binding: &Binding) -> bool {
        self.0.contains(binding)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.0.iter()
    }

    /// Every variable assigned by some binding.
    #[must_use]
    pub fn variables(&self) -> BTreeSet<Variable> {
        self.0.iter().flat_map(Binding::variables).collect()
    }

    /// Set union.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self(self.0.union(&other.0).cloned().collect())
    }

    /// Join: every compatible pair of bindings merged into one.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut joined = Self::new();
        for left in &self.0 {
            for right in &other.0 {
                if let Some(merged) = left.merge(right) {
                    joined.0.insert(merged);
                }
            }
        }
        joined
    }

    /// Rename every binding across `m`, dropping those that contradict it.
    #[must_use]
    pub fn translate(&self, m: &Match) -> Self {
        Self(self.0.iter().filter_map(|b| b.translate(m)).collect())
    }

    /// Union of the translations across every match in `matches`.
    #[must_use]
    pub fn translate_all(&self, matches: &BTreeSet<Match>) -> Self {
        matches
            .iter()
            .fold(Self::new(), |acc, m| acc.union(&self.translate(m)))
    }

    /// Keep the bindings compatible with at least one binding of `filter`.
    ///
    /// An empty `filter` keeps everything.
    #[must_use]
    pub fn keep_compatible(&self, filter: &Self) -> Self {
        if filter.is_empty() {
            return self.clone();
        }
        Self(
            self.0
                .iter()
                .filter(|b| filter.0.iter().any(|f| b.is_compatible(f)))
                .cloned()
                .collect(),
        )
    }

    /// Project every binding onto `variables`.
    #[must_use]
    pub fn project(&self, variables: &BTreeSet<Variable>) -> Self {
        Self(self.0.iter().map(|b| b.project(variables)).collect())
    }
}

impl FromIterator<Binding> for BindingSet {
    fn from_iter<I: IntoIterator<Item = Binding>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for BindingSet {
    type Item = Binding;
    type IntoIter = std::collections::btree_set::IntoIter<Binding>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a BindingSet {
    type Item = &'a Binding;
    type IntoIter = std::collections::btree_set::Iter<'a, Binding>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for BindingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, binding) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            binding.fmt(f)?;
        }
        f.write_str("]")
    }
}

// =============================================================================
// TESTS
// =============================================================================
