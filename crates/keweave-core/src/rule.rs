//! # Rules and Handlers
//!
//! A `Rule` pairs an antecedent pattern with a consequent pattern and a
//! binding set handler. Rules are plain values kept in a [`RuleSet`] arena;
//! their [`RuleId`] is the identity used by cycle detection.
//!
//! ## Rule kinds
//!
//! - `Fact`: empty antecedent, ground consequent, answered locally
//! - `Local`: a domain rule, answered locally by projection
//! - `Remote`: a capability of some knowledge base, answered by a handler
//!   that may be slow or fail

use crate::binding::BindingSet;
use crate::primitives::MAX_PATTERN_SIZE;
use crate::types::{
    HandlerError, KeweaveError, RuleId, TriplePattern, Variable, format_pattern, pattern_variables,
};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, ready};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// HANDLERS
// =============================================================================

/// The future returned by a handler.
pub type HandlerFuture = BoxFuture<'static, Result<BindingSet, HandlerError>>;

/// Turns the bindings requested from a rule into the bindings it produces.
///
/// The request is expressed in the variables of the rule's antecedent (or
/// is the unconstrained set for rules without antecedent); the answer must
/// be expressed in the variables of the rule's consequent.
pub trait BindingSetHandler: Send + Sync {
    fn handle(&self, request: BindingSet) -> HandlerFuture;
}

/// Answers a ground fact: exactly one empty binding.
#[derive(Debug, Clone, Copy, Default)]
pub struct FactHandler;

impl BindingSetHandler for FactHandler {
    fn handle(&self, _request: BindingSet) -> HandlerFuture {
        ready(Ok(BindingSet::unconstrained())).boxed()
    }
}

/// Answers a local rule by projecting each request binding onto the
/// consequent variables. Bindings missing a consequent variable are dropped.
#[derive(Debug, Clone, Default)]
pub struct ProjectionHandler {
    consequent_vars: BTreeSet<Variable>,
}

impl ProjectionHandler {
    #[must_use]
    pub fn new(consequent: &BTreeSet<TriplePattern>) -> Self {
        Self {
            consequent_vars: pattern_variables(consequent),
        }
    }

    fn project(&self, request: &BindingSet) -> BindingSet {
        request
            .iter()
            .filter(|b| self.consequent_vars.iter().all(|v| b.contains(v)))
            .map(|b| b.project(&self.consequent_vars))
            .collect()
    }
}

impl BindingSetHandler for ProjectionHandler {
    fn handle(&self, request: BindingSet) -> HandlerFuture {
        ready(Ok(self.project(&request))).boxed()
    }
}

/// Wraps a synchronous function.
pub struct FnHandler<F>(pub F);

impl<F> BindingSetHandler for FnHandler<F>
where
    F: Fn(BindingSet) -> Result<BindingSet, HandlerError> + Send + Sync,
{
    fn handle(&self, request: BindingSet) -> HandlerFuture {
        ready((self.0)(request)).boxed()
    }
}

/// Answers with a fixed binding set, filtered by the request.
#[derive(Debug, Clone, Default)]
pub struct StaticHandler {
    response: BindingSet,
}

impl StaticHandler {
    #[must_use]
    pub fn new(response: BindingSet) -> Self {
        Self { response }
    }
}

impl BindingSetHandler for StaticHandler {
    fn handle(&self, request: BindingSet) -> HandlerFuture {
        ready(Ok(self.response.keep_compatible(&request))).boxed()
    }
}

// =============================================================================
// RULE
// =============================================================================

/// How a rule is evaluated.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuleKind {
    Fact,
    Local,
    Remote { capability: String },
}

/// An antecedent, a consequent and the handler connecting them.
#[derive(Clone)]
pub struct Rule {
    name: String,
    antecedent: BTreeSet<TriplePattern>,
    consequent: BTreeSet<TriplePattern>,
    kind: RuleKind,
    handler: Arc<dyn BindingSetHandler>,
}

impl Rule {
    /// Create a rule with an explicit handler.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRule` if both patterns are empty or a pattern exceeds
    /// [`MAX_PATTERN_SIZE`].
    pub fn new(
        name: impl Into<String>,
        antecedent: BTreeSet<TriplePattern>,
        consequent: BTreeSet<TriplePattern>,
        kind: RuleKind,
        handler: Arc<dyn BindingSetHandler>,
    ) -> Result<Self, KeweaveError> {
        let name = name.into();
        let invalid = |reason: &str| KeweaveError::InvalidRule {
            name: name.clone(),
            reason: reason.to_string(),
        };

        if antecedent.is_empty() && consequent.is_empty() {
            return Err(invalid("antecedent and consequent are both empty"));
        }
        if antecedent.len() > MAX_PATTERN_SIZE || consequent.len() > MAX_PATTERN_SIZE {
            return Err(invalid("graph pattern too large"));
        }

        Ok(Self {
            name,
            antecedent,
            consequent,
            kind,
            handler,
        })
    }

    /// A fact: no antecedent, a ground consequent.
    pub fn fact(
        name: impl Into<String>,
        consequent: BTreeSet<TriplePattern>,
    ) -> Result<Self, KeweaveError> {
        let name = name.into();
        if !consequent.iter().all(TriplePattern::is_ground) {
            return Err(KeweaveError::InvalidRule {
                name,
                reason: "fact contains variables".to_string(),
            });
        }
        Self::new(
            name,
            BTreeSet::new(),
            consequent,
            RuleKind::Fact,
            Arc::new(FactHandler),
        )
    }

    /// A local domain rule answered by projection.
    pub fn local(
        name: impl Into<String>,
        antecedent: BTreeSet<TriplePattern>,
        consequent: BTreeSet<TriplePattern>,
    ) -> Result<Self, KeweaveError> {
        let handler = Arc::new(ProjectionHandler::new(&consequent));
        Self::new(name, antecedent, consequent, RuleKind::Local, handler)
    }

    /// A capability of a remote knowledge base.
    pub fn remote(
        name: impl Into<String>,
        capability: impl Into<String>,
        antecedent: BTreeSet<TriplePattern>,
        consequent: BTreeSet<TriplePattern>,
        handler: Arc<dyn BindingSetHandler>,
    ) -> Result<Self, KeweaveError> {
        let kind = RuleKind::Remote {
            capability: capability.into(),
        };
        Self::new(name, antecedent, consequent, kind, handler)
    }

    /// Replace the handler, keeping everything else.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn BindingSetHandler>) -> Self {
        self.handler = handler;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn antecedent(&self) -> &BTreeSet<TriplePattern> {
        &self.antecedent
    }

    #[must_use]
    pub fn consequent(&self) -> &BTreeSet<TriplePattern> {
        &self.consequent
    }

    #[must_use]
    pub fn kind(&self) -> &RuleKind {
        &self.kind
    }

    #[must_use]
    pub fn handler(&self) -> &Arc<dyn BindingSetHandler> {
        &self.handler
    }

    /// Label used when reporting handler failures.
    #[must_use]
    pub fn capability(&self) -> &str {
        match &self.kind {
            RuleKind::Remote { capability } => capability,
            RuleKind::Fact | RuleKind::Local => &self.name,
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("antecedent", &self.antecedent)
            .field("consequent", &self.consequent)
            .field("kind", &self.kind)
            .finish()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {{{}}} -> {{{}}}",
            self.name,
            format_pattern(&self.antecedent),
            format_pattern(&self.consequent)
        )
    }
}

// =============================================================================
// RULE SET
// =============================================================================

/// Arena of rules. A rule's index is its identity.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule and return its identifier.
    pub fn add(&mut self, rule: Rule) -> RuleId {
        let id = RuleId(self.rules.len() as u32);
        self.rules.push(rule);
        id
    }

    #[must_use]
    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(id.0 as usize)
    }

    /// Like [`Self::get`] but reports unknown identifiers as errors.
    pub fn rule(&self, id: RuleId) -> Result<&Rule, KeweaveError> {
        self.get(id).ok_or(KeweaveError::UnknownRule(id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RuleId, &Rule)> {
        self.rules
            .iter()
            .enumerate()
            .map(|(i, rule)| (RuleId(i as u32), rule))
    }
}

impl FromIterator<Rule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
