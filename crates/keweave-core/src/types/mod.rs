//! # Core Type Definitions
//!
//! This module contains the value model shared by every other module:
//! - Arena identifiers (`RuleId`, `NodeId`)
//! - Triple components (`Variable`, `Literal`, `Value`)
//! - Triple patterns and single-triple unification (`TriplePattern`, `match_triple`)
//! - Error types (`KeweaveError`, `HandlerError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Are immutable once constructed
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`
//! - Compare structurally (two equal patterns are interchangeable)

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

// =============================================================================
// ARENA IDENTIFIERS
// =============================================================================

/// Identifier of a rule inside a `RuleSet`.
/// Rule identity (not structural equality) is what cycle detection compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RuleId(pub u32);

/// Identifier of a node inside a `ReasoningPlan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

// =============================================================================
// TRIPLE COMPONENTS
// =============================================================================

/// A named variable, written `?name` when displayed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variable(String);

impl Variable {
    /// Create a variable from its name (without the leading `?`).
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the variable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

/// A fixed value in lexical form (an IRI, a prefixed name or a literal).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Literal(String);

impl Literal {
    /// Create a literal from its lexical form.
    #[must_use]
    pub fn new(lexical: impl Into<String>) -> Self {
        Self(lexical.into())
    }

    /// Get the lexical form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One position of a triple pattern: either a variable or a fixed literal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Value {
    #[serde(rename = "var")]
    Variable(Variable),
    #[serde(rename = "lit")]
    Literal(Literal),
}

impl Value {
    /// Variable helper.
    #[must_use]
    pub fn var(name: impl Into<String>) -> Self {
        Self::Variable(Variable::new(name))
    }

    /// Literal helper.
    #[must_use]
    pub fn lit(lexical: impl Into<String>) -> Self {
        Self::Literal(Literal::new(lexical))
    }

    #[must_use]
    pub fn is_variable(&self) -> bool {
        matches!(self, Self::Variable(_))
    }

    #[must_use]
    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Self::Variable(v) => Some(v),
            Self::Literal(_) => None,
        }
    }

    #[must_use]
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Literal(l) => Some(l),
            Self::Variable(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Variable(v) => v.fmt(f),
            Self::Literal(l) => l.fmt(f),
        }
    }
}

// =============================================================================
// TRIPLE PATTERN
// =============================================================================

/// A substitution produced by unifying two triple patterns.
///
/// Keys are values of the pattern being matched, values are what they map
/// onto. Literal-to-literal pairs are never recorded.
pub type Substitution = BTreeMap<Value, Value>;

/// An ordered `(subject, predicate, object)` triple of values.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TriplePattern {
    pub subject: Value,
    pub predicate: Value,
    pub object: Value,
}

impl TriplePattern {
    /// Create a new triple pattern.
    #[must_use]
    pub fn new(subject: Value, predicate: Value, object: Value) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    /// The three positions in subject, predicate, object order.
    #[must_use]
    pub fn positions(&self) -> [&Value; 3] {
        [&self.subject, &self.predicate, &self.object]
    }

    /// All variables occurring in this pattern.
    #[must_use]
    pub fn variables(&self) -> BTreeSet<Variable> {
        self.positions()
            .into_iter()
            .filter_map(Value::as_variable)
            .cloned()
            .collect()
    }

    /// Whether the pattern contains no variables.
    #[must_use]
    pub fn is_ground(&self) -> bool {
        self.positions().into_iter().all(|v| !v.is_variable())
    }

    /// Replace every position found as a key in `substitution` with its image.
    #[must_use]
    pub fn substitute(&self, substitution: &Substitution) -> Self {
        let apply = |value: &Value| {
            if value.is_variable() {
                substitution.get(value).cloned().unwrap_or_else(|| value.clone())
            } else {
                value.clone()
            }
        };
        Self::new(
            apply(&self.subject),
            apply(&self.predicate),
            apply(&self.object),
        )
    }

    /// Unify with `other`. See [`match_triple`].
    #[must_use]
    pub fn matches(&self, other: &Self) -> Option<Substitution> {
        match_triple(self, other)
    }
}

impl fmt::Display for TriplePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

/// Collect the variables of a whole graph pattern.
#[must_use]
pub fn pattern_variables(pattern: &BTreeSet<TriplePattern>) -> BTreeSet<Variable> {
    pattern.iter().flat_map(TriplePattern::variables).collect()
}

/// Render a graph pattern as `t1 . t2 . t3`.
#[must_use]
pub fn format_pattern(pattern: &BTreeSet<TriplePattern>) -> String {
    pattern
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" . ")
}

/// Unify `pattern` with `candidate`, position by position.
///
/// - Two equal literals contribute nothing.
/// - Two different literals make the whole match fail.
/// - Otherwise the value of `pattern` is bound to the value of `candidate`,
///   and that binding must stay the same across all three positions.
///
/// Returns `None` when no consistent substitution exists. Never partial.
#[must_use]
pub fn match_triple(pattern: &TriplePattern, candidate: &TriplePattern) -> Option<Substitution> {
    let mut substitution = Substitution::new();

    for (left, right) in pattern.positions().into_iter().zip(candidate.positions()) {
        if let (Value::Literal(a), Value::Literal(b)) = (left, right) {
            if a != b {
                return None;
            }
            continue;
        }

        match substitution.get(left) {
            Some(bound) if bound != right => return None,
            Some(_) => {}
            None => {
                substitution.insert(left.clone(), right.clone());
            }
        }
    }

    Some(substitution)
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Failure reported by a binding set handler.
///
/// This is the only failure channel between the TaskBoard and the
/// capabilities it invokes. A node whose handler fails moves to the
/// terminal `Failed` state instead of waiting forever.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum HandlerError {
    /// The capability answered with an error.
    #[error("capability '{capability}' failed: {reason}")]
    Failed { capability: String, reason: String },

    /// The capability did not answer within the round timeout.
    #[error("capability '{capability}' timed out after {after_ms} ms")]
    TimedOut { capability: String, after_ms: u64 },
}

/// Errors that can occur in the Keweave engine.
///
/// Matching and merging never produce errors; absence of a match is
/// `None` or an empty set. Errors are reserved for construction,
/// configuration and the execution driver.
#[derive(Debug, Error)]
pub enum KeweaveError {
    /// A rule was rejected at construction time.
    #[error("Invalid rule '{name}': {reason}")]
    InvalidRule { name: String, reason: String },

    /// The requested rule does not exist in the rule set.
    #[error("Rule not found: {0}")]
    UnknownRule(RuleId),

    /// The requested node does not exist in the plan.
    #[error("Node not found: {0}")]
    UnknownNode(NodeId),

    /// A rule recurs along its own ancestor path.
    #[error("Rule {rule} recurs on its own ancestor path at node {node}")]
    CycleViolation { rule: RuleId, node: NodeId },

    /// A round left nothing pending while the root was still unresolved.
    #[error("Reasoning stalled after {rounds} rounds")]
    Stalled { rounds: usize },

    /// The round budget ran out before the root resolved.
    #[error("Reasoning did not finish within {rounds} rounds")]
    RoundLimitExceeded { rounds: usize },

    /// A configuration value is out of range or malformed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A handler failure surfaced to the caller.
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

// =============================================================================
// TESTS
// =============================================================================
