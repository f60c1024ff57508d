//! # keweave-core
//!
//! The backward-chaining reasoning engine for Keweave - THE LOGIC.
//!
//! Knowledge bases register capabilities as triple patterns. Given a goal,
//! this crate finds the rules and capabilities that can answer it, chains
//! through domain rules where needed, and schedules the capability calls in
//! batched rounds.
//!
//! ## Pipeline
//!
//! ```text
//! CapabilityRegistry --rules()--> RuleSet
//!        goal + RuleSet --build--> ReasoningPlan
//!   ReasoningPlan <--rounds--> TaskBoard --handlers--> answers
//! ```
//!
//! ## Architectural Constraints
//!
//! - No network I/O and no persistence: handlers are supplied by the caller
//! - Deterministic: `BTreeMap`/`BTreeSet` only, so plans, matches and gaps
//!   come out in the same order on every run
//! - Planning is synchronous; the only await points are handler futures
//!   joined by the task board

// =============================================================================
// MODULES
// =============================================================================

pub mod binding;
pub mod config;
pub mod graph_binding;
pub mod matcher;
pub mod matching;
pub mod plan;
pub mod primitives;
pub mod provider;
pub mod reasoner;
pub mod rule;
pub mod strategy;
pub mod taskboard;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    HandlerError, KeweaveError, Literal, NodeId, RuleId, Substitution, TriplePattern, Value,
    Variable, format_pattern, match_triple, pattern_variables,
};

// =============================================================================
// RE-EXPORTS: Matching
// =============================================================================

pub use binding::{Binding, BindingSet};
pub use graph_binding::{TripleVar, TripleVarBinding, TripleVarBindingSet};
pub use matcher::{CombiMatch, find_combinations, find_matches, find_rule_matches};
pub use matching::{Match, TripleNode};
pub use strategy::{MatchFlags, MatchStrategy};

// =============================================================================
// RE-EXPORTS: Rules and Planning
// =============================================================================

pub use config::ReasonerConfig;
pub use plan::{KnowledgeGaps, NodeState, ReasoningNode, ReasoningPlan, plan};
pub use provider::{Capability, CapabilityKind, CapabilityRegistry, RuleProvider};
pub use reasoner::{Reasoner, ReasoningOutcome};
pub use rule::{
    BindingSetHandler, FactHandler, FnHandler, HandlerFuture, ProjectionHandler, Rule, RuleKind,
    RuleSet, StaticHandler,
};
pub use taskboard::{DrainReport, NodeFailure, Task, TaskBoard};
