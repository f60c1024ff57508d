//! # Knowledge Network Files
//!
//! A TOML description of a small knowledge network: reasoner settings,
//! ground facts, local domain rules, capabilities of (simulated) knowledge
//! bases and the goal to answer.
//!
//! Triples are written as three tagged values, so no triple syntax has to
//! be parsed:
//!
//! ```toml
//! [reasoner]
//! strategy = "normal"
//! round_timeout_ms = 500
//!
//! [[fact]]
//! name = "sensors"
//! triples = [[{ lit = "<s1>" }, { lit = "rdf:type" }, { lit = "Sensor" }]]
//!
//! [[capability]]
//! id = "kb1/temperature"
//! kind = "answer"
//! result = [[{ var = "s" }, { lit = "hasTemp" }, { var = "t" }]]
//! response = [{ s = "<s1>", t = "21" }]
//! delay_ms = 20
//!
//! [goal]
//! patterns = [[{ var = "a" }, { lit = "hasTemp" }, { var = "v" }]]
//! ```

use futures_util::FutureExt;
use keweave_core::{
    Binding, BindingSet, BindingSetHandler, Capability, CapabilityKind, CapabilityRegistry,
    HandlerError, HandlerFuture, KeweaveError, Literal, ReasonerConfig, Rule, TriplePattern,
    Value, Variable,
};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a network file (4 MB).
const MAX_NETWORK_FILE_SIZE: u64 = 4 * 1024 * 1024;

// =============================================================================
// FILE SCHEMA
// =============================================================================

/// Subject, predicate and object.
pub type TripleConfig = [Value; 3];

/// One binding as variable name -> lexical value.
pub type BindingConfig = BTreeMap<String, String>;

/// Top-level layout of a network file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkFile {
    #[serde(default)]
    pub reasoner: ReasonerConfig,
    #[serde(default, rename = "fact")]
    pub facts: Vec<FactConfig>,
    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleConfig>,
    #[serde(default, rename = "capability")]
    pub capabilities: Vec<ProviderConfig>,
    pub goal: GoalConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FactConfig {
    pub name: String,
    pub triples: Vec<TripleConfig>,
}

/// A local domain rule.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    pub name: String,
    pub antecedent: Vec<TripleConfig>,
    pub consequent: Vec<TripleConfig>,
}

/// A capability of a simulated knowledge base.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    pub id: String,
    pub kind: CapabilityKind,
    #[serde(default)]
    pub argument: Vec<TripleConfig>,
    #[serde(default)]
    pub result: Vec<TripleConfig>,
    /// Canned answer, filtered by the request before being returned.
    #[serde(default)]
    pub response: Vec<BindingConfig>,
    /// Simulated latency.
    pub delay_ms: Option<u64>,
    /// When set, every call fails with this reason.
    pub fail: Option<String>,
}

/// The goal, either inline or taken from an `ask` capability.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GoalConfig {
    pub ask: Option<String>,
    #[serde(default)]
    pub patterns: Vec<TripleConfig>,
    #[serde(default)]
    pub bindings: Vec<BindingConfig>,
}

// =============================================================================
// LOADED NETWORK
// =============================================================================

/// A network ready to reason over.
#[derive(Debug, Clone)]
pub struct Network {
    pub registry: CapabilityRegistry,
    pub goal: BTreeSet<TriplePattern>,
    pub incoming: BindingSet,
    pub config: ReasonerConfig,
}

impl Network {
    /// Parse a network from TOML text.
    pub fn parse(text: &str) -> Result<Self, KeweaveError> {
        let file: NetworkFile = toml::from_str(text)
            .map_err(|e| KeweaveError::Serialization(format!("Invalid network file: {}", e)))?;
        file.into_network()
    }

    /// Read and parse a network file.
    pub fn load(path: &Path) -> Result<Self, KeweaveError> {
        let path = validate_file_path(path)?;
        let metadata = std::fs::metadata(&path)
            .map_err(|e| KeweaveError::Io(format!("Cannot read file metadata: {}", e)))?;
        if metadata.len() > MAX_NETWORK_FILE_SIZE {
            return Err(KeweaveError::Serialization(format!(
                "File size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_NETWORK_FILE_SIZE
            )));
        }

        let text = std::fs::read_to_string(&path)
            .map_err(|e| KeweaveError::Io(format!("Cannot read '{}': {}", path.display(), e)))?;
        let network = Self::parse(&text)?;
        tracing::debug!(
            path = %path.display(),
            capabilities = network.registry.capabilities().count(),
            goal_triples = network.goal.len(),
            "network loaded"
        );
        Ok(network)
    }
}

impl NetworkFile {
    /// Validate the file and build the registry and goal.
    pub fn into_network(self) -> Result<Network, KeweaveError> {
        self.reasoner.validate()?;
        let mut registry = CapabilityRegistry::new();

        for fact in self.facts {
            let triples = triples(&fact.triples);
            if let Some(open) = triples.iter().find(|t| !t.is_ground()) {
                return Err(KeweaveError::InvalidConfig(format!(
                    "fact '{}' contains a variable: {}",
                    fact.name, open
                )));
            }
            registry.add_fact(fact.name, triples);
        }

        for rule in self.rules {
            registry.add_rule(Rule::local(
                rule.name,
                triples(&rule.antecedent),
                triples(&rule.consequent),
            )?);
        }

        for provider in self.capabilities {
            registry.add_capability(provider.into_capability()?)?;
        }

        let goal = match &self.goal.ask {
            Some(id) => {
                if !self.goal.patterns.is_empty() {
                    return Err(KeweaveError::InvalidConfig(
                        "goal must give either 'ask' or 'patterns', not both".to_string(),
                    ));
                }
                registry.ask_pattern(id).cloned().ok_or_else(|| {
                    KeweaveError::InvalidConfig(format!("no ask capability '{}'", id))
                })?
            }
            None => triples(&self.goal.patterns),
        };
        if goal.is_empty() {
            return Err(KeweaveError::InvalidConfig("goal has no triples".to_string()));
        }

        Ok(Network {
            registry,
            goal,
            incoming: binding_set(&self.goal.bindings),
            config: self.reasoner,
        })
    }
}

impl ProviderConfig {
    fn into_capability(self) -> Result<Capability, KeweaveError> {
        if self.result.is_empty() {
            return Err(KeweaveError::InvalidConfig(format!(
                "capability '{}' has no result pattern",
                self.id
            )));
        }
        if !self.kind.is_supplier() && (!self.response.is_empty() || self.fail.is_some()) {
            return Err(KeweaveError::InvalidConfig(format!(
                "capability '{}' is {:?} and cannot answer",
                self.id, self.kind
            )));
        }

        let handler = SimulatedKnowledgeBase {
            capability: self.id.clone(),
            response: binding_set(&self.response),
            delay: self.delay_ms.map(Duration::from_millis),
            failure: self.fail,
        };
        Ok(Capability {
            id: self.id,
            kind: self.kind,
            argument: triples(&self.argument),
            result: triples(&self.result),
            handler: Arc::new(handler),
        })
    }
}

// =============================================================================
// SIMULATED KNOWLEDGE BASE
// =============================================================================

/// Stands in for a remote knowledge base: waits for the configured delay,
/// then answers with the canned response or fails.
#[derive(Debug, Clone)]
pub struct SimulatedKnowledgeBase {
    pub capability: String,
    pub response: BindingSet,
    pub delay: Option<Duration>,
    pub failure: Option<String>,
}

impl BindingSetHandler for SimulatedKnowledgeBase {
    fn handle(&self, request: BindingSet) -> HandlerFuture {
        let kb = self.clone();
        async move {
            if let Some(delay) = kb.delay {
                tokio::time::sleep(delay).await;
            }
            match kb.failure {
                Some(reason) => Err(HandlerError::Failed {
                    capability: kb.capability,
                    reason,
                }),
                None => Ok(kb.response.keep_compatible(&request)),
            }
        }
        .boxed()
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn triples(configs: &[TripleConfig]) -> BTreeSet<TriplePattern> {
    configs
        .iter()
        .map(|[s, p, o]| TriplePattern::new(s.clone(), p.clone(), o.clone()))
        .collect()
}

fn binding_set(configs: &[BindingConfig]) -> BindingSet {
    configs
        .iter()
        .map(|config| {
            config
                .iter()
                .map(|(name, value)| (Variable::new(name.as_str()), Literal::new(value.as_str())))
                .collect::<Binding>()
        })
        .collect()
}

/// Resolve symlinks and `..`, and make sure the path is a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, KeweaveError> {
    let canonical = path.canonicalize().map_err(|e| {
        KeweaveError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(KeweaveError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

// =============================================================================
// TESTS
// =============================================================================
