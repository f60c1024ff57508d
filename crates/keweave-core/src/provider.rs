//! # Rule Provider
//!
//! Knowledge bases register capabilities; the planner only understands
//! rules. This module converts one into the other.
//!
//! | Capability | Rule produced                           |
//! |------------|-----------------------------------------|
//! | Answer     | `∅ -> result`, remote                   |
//! | React      | `argument -> result`, remote            |
//! | Ask, Post  | none (these are requests, not supplies) |
//!
//! Ground facts become `Fact` rules and domain rules are added as they are.

use crate::rule::{BindingSetHandler, Rule, RuleSet};
use crate::types::{KeweaveError, TriplePattern};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// The four interaction types a knowledge base can register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityKind {
    Ask,
    Answer,
    Post,
    React,
}

impl CapabilityKind {
    /// Whether capabilities of this kind supply data to others.
    #[must_use]
    pub fn is_supplier(self) -> bool {
        matches!(self, Self::Answer | Self::React)
    }
}

/// A registered capability of a knowledge base.
///
/// `Ask` and `Answer` only use `result`; `Post` and `React` use both
/// patterns.
#[derive(Clone)]
pub struct Capability {
    pub id: String,
    pub kind: CapabilityKind,
    pub argument: BTreeSet<TriplePattern>,
    pub result: BTreeSet<TriplePattern>,
    pub handler: Arc<dyn BindingSetHandler>,
}

impl Capability {
    /// An `Answer` capability supplying `result`.
    #[must_use]
    pub fn answer(
        id: impl Into<String>,
        result: BTreeSet<TriplePattern>,
        handler: Arc<dyn BindingSetHandler>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: CapabilityKind::Answer,
            argument: BTreeSet::new(),
            result,
            handler,
        }
    }

    /// A `React` capability turning `argument` bindings into `result` bindings.
    #[must_use]
    pub fn react(
        id: impl Into<String>,
        argument: BTreeSet<TriplePattern>,
        result: BTreeSet<TriplePattern>,
        handler: Arc<dyn BindingSetHandler>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: CapabilityKind::React,
            argument,
            result,
            handler,
        }
    }

    /// Convert into a rule, or `None` for requester-side capabilities.
    fn to_rule(&self) -> Result<Option<Rule>, KeweaveError> {
        let (antecedent, consequent) = match self.kind {
            CapabilityKind::Ask | CapabilityKind::Post => return Ok(None),
            CapabilityKind::Answer => {
                if !self.argument.is_empty() {
                    return Err(KeweaveError::InvalidConfig(format!(
                        "answer capability '{}' must not have an argument pattern",
                        self.id
                    )));
                }
                (BTreeSet::new(), self.result.clone())
            }
            CapabilityKind::React => {
                if self.argument.is_empty() {
                    return Err(KeweaveError::InvalidConfig(format!(
                        "react capability '{}' needs an argument pattern",
                        self.id
                    )));
                }
                (self.argument.clone(), self.result.clone())
            }
        };

        Rule::remote(
            self.id.clone(),
            self.id.clone(),
            antecedent,
            consequent,
            Arc::clone(&self.handler),
        )
        .map(Some)
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("argument", &self.argument)
            .field("result", &self.result)
            .finish()
    }
}

/// Anything that can hand the planner a rule set.
pub trait RuleProvider {
    fn rules(&self) -> Result<RuleSet, KeweaveError>;
}

/// Collects facts, domain rules and capabilities of a knowledge network.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    facts: BTreeMap<String, BTreeSet<TriplePattern>>,
    domain_rules: Vec<Rule>,
    capabilities: BTreeMap<String, Capability>,
}

impl CapabilityRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a group of ground triples under `name`.
    pub fn add_fact(&mut self, name: impl Into<String>, triples: BTreeSet<TriplePattern>) {
        self.facts.entry(name.into()).or_default().extend(triples);
    }

    /// Register a local domain rule.
    pub fn add_rule(&mut self, rule: Rule) {
        self.domain_rules.push(rule);
    }

    /// Register a capability.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if a capability with the same id exists.
    pub fn add_capability(&mut self, capability: Capability) -> Result<(), KeweaveError> {
        if self.capabilities.contains_key(&capability.id) {
            return Err(KeweaveError::InvalidConfig(format!(
                "duplicate capability id '{}'",
                capability.id
            )));
        }
        self.capabilities.insert(capability.id.clone(), capability);
        Ok(())
    }

    #[must_use]
    pub fn capability(&self, id: &str) -> Option<&Capability> {
        self.capabilities.get(id)
    }

    /// The pattern an `Ask` capability requests, usable as a goal.
    #[must_use]
    pub fn ask_pattern(&self, id: &str) -> Option<&BTreeSet<TriplePattern>> {
        self.capabilities
            .get(id)
            .filter(|c| c.kind == CapabilityKind::Ask)
            .map(|c| &c.result)
    }

    pub fn capabilities(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.values()
    }
}

impl RuleProvider for CapabilityRegistry {
    fn rules(&self) -> Result<RuleSet, KeweaveError> {
        let mut rules = RuleSet::new();

        for (name, triples) in &self.facts {
            rules.add(Rule::fact(name.clone(), triples.clone())?);
        }
        for rule in &self.domain_rules {
            rules.add(rule.clone());
        }
        for capability in self.capabilities.values() {
            if let Some(rule) = capability.to_rule()? {
                rules.add(rule);
            }
        }

        tracing::debug!(
            facts = self.facts.len(),
            domain_rules = self.domain_rules.len(),
            capabilities = self.capabilities.len(),
            rules = rules.len(),
            "converted capabilities into rules"
        );
        Ok(rules)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{RuleKind, StaticHandler};
    use crate::types::Value;

    fn tp(s: Value, p: Value, o: Value) -> TriplePattern {
        TriplePattern::new(s, p, o)
    }

    fn pattern(triples: &[TriplePattern]) -> BTreeSet<TriplePattern> {
        triples.iter().cloned().collect()
    }

    fn temperature() -> BTreeSet<TriplePattern> {
        pattern(&[tp(Value::var("s"), Value::lit("hasTemp"), Value::var("t"))])
    }

    fn handler() -> Arc<dyn BindingSetHandler> {
        Arc::new(StaticHandler::default())
    }

    #[test]
    fn registry_converts_every_supplier() {
        let mut registry = CapabilityRegistry::new();
        registry.add_fact(
            "sensors",
            pattern(&[tp(Value::lit("<s1>"), Value::lit("rdf:type"), Value::lit("Sensor"))]),
        );
        registry
            .add_capability(Capability::answer("kb1/temp", temperature(), handler()))
            .expect("answer");
        registry
            .add_capability(Capability::react(
                "kb2/convert",
                temperature(),
                pattern(&[tp(Value::var("s"), Value::lit("hasFahrenheit"), Value::var("f"))]),
                handler(),
            ))
            .expect("react");
        registry
            .add_capability(Capability {
                id: "kb3/ask".to_string(),
                kind: CapabilityKind::Ask,
                argument: BTreeSet::new(),
                result: temperature(),
                handler: handler(),
            })
            .expect("ask");

        let rules = registry.rules().expect("rules");
        assert_eq!(rules.len(), 3);

        let kinds: Vec<RuleKind> = rules.iter().map(|(_, r)| r.kind().clone()).collect();
        assert_eq!(kinds[0], RuleKind::Fact);
        assert!(matches!(kinds[1], RuleKind::Remote { .. }));
        assert_eq!(registry.ask_pattern("kb3/ask"), Some(&temperature()));
        assert_eq!(registry.ask_pattern("kb1/temp"), None);
    }

    #[test]
    fn duplicate_capability_rejected() {
        let mut registry = CapabilityRegistry::new();
        registry
            .add_capability(Capability::answer("kb1/temp", temperature(), handler()))
            .expect("first");
        let second = registry.add_capability(Capability::answer("kb1/temp", temperature(), handler()));
        assert!(matches!(second, Err(KeweaveError::InvalidConfig(_))));
    }

    #[test]
    fn react_without_argument_rejected() {
        let mut registry = CapabilityRegistry::new();
        registry
            .add_capability(Capability::react("kb/r", BTreeSet::new(), temperature(), handler()))
            .expect("registered");
        assert!(registry.rules().is_err());
    }

    #[test]
    fn non_ground_fact_rejected() {
        let mut registry = CapabilityRegistry::new();
        registry.add_fact("broken", temperature());
        assert!(matches!(
            registry.rules(),
            Err(KeweaveError::InvalidRule { .. })
        ));
    }
}
