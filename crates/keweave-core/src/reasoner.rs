//! # Reasoner
//!
//! Execution driver for one goal. A `Reasoner` owns its plan, its task
//! board and the rule set, and alternates plan passes with board drains
//! until the goal is answered.

use crate::binding::BindingSet;
use crate::config::ReasonerConfig;
use crate::plan::{KnowledgeGaps, ReasoningPlan};
use crate::provider::RuleProvider;
use crate::rule::RuleSet;
use crate::taskboard::{DrainReport, NodeFailure, TaskBoard};
use crate::types::{KeweaveError, TriplePattern};
use serde::Serialize;
use std::collections::BTreeSet;

/// Final report of a reasoning execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReasoningOutcome {
    /// Answers to the goal.
    pub bindings: BindingSet,
    pub rounds: usize,
    pub handler_calls: usize,
    pub failed_nodes: Vec<NodeFailure>,
    pub knowledge_gaps: KnowledgeGaps,
}

/// Plans a goal and drives it to an answer.
#[derive(Debug)]
pub struct Reasoner {
    rules: RuleSet,
    plan: ReasoningPlan,
    board: TaskBoard,
    config: ReasonerConfig,
    rounds: usize,
    handler_calls: usize,
    failures: Vec<NodeFailure>,
}

impl Reasoner {
    /// Validate the configuration and build the plan for `goal`.
    pub fn new(
        rules: RuleSet,
        goal: BTreeSet<TriplePattern>,
        config: ReasonerConfig,
    ) -> Result<Self, KeweaveError> {
        config.validate()?;
        let plan = ReasoningPlan::build(goal, &rules, config.strategy)?;
        Ok(Self {
            rules,
            plan,
            board: TaskBoard::new(),
            config,
            rounds: 0,
            handler_calls: 0,
            failures: Vec::new(),
        })
    }

    /// Like [`Self::new`], taking the rules from a provider.
    pub fn from_provider(
        provider: &impl RuleProvider,
        goal: BTreeSet<TriplePattern>,
        config: ReasonerConfig,
    ) -> Result<Self, KeweaveError> {
        Self::new(provider.rules()?, goal, config)
    }

    #[must_use]
    pub fn plan(&self) -> &ReasoningPlan {
        &self.plan
    }

    #[must_use]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    #[must_use]
    pub fn board(&self) -> &TaskBoard {
        &self.board
    }

    #[must_use]
    pub fn config(&self) -> &ReasonerConfig {
        &self.config
    }

    #[must_use]
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Text rendering of the plan with current node states.
    #[must_use]
    pub fn render(&self) -> String {
        self.plan.render(&self.rules)
    }

    /// Knowledge gaps of the goal.
    pub fn knowledge_gaps(&self) -> Result<KnowledgeGaps, KeweaveError> {
        self.plan.knowledge_gaps(self.plan.root())
    }

    /// One synchronous pass over the plan from the root.
    pub fn continue_reasoning(
        &mut self,
        incoming: &BindingSet,
    ) -> Result<Option<BindingSet>, KeweaveError> {
        let root = self.plan.root();
        self.plan.continue_reasoning(root, incoming, &mut self.board)
    }

    /// Invoke the pending handlers and deliver their answers.
    pub async fn drain(&mut self) -> Result<DrainReport, KeweaveError> {
        let report = self
            .board
            .drain(&mut self.plan, &self.rules, self.config.round_timeout())
            .await?;
        self.handler_calls += report.handler_calls;
        self.failures.extend(report.failures.iter().cloned());
        Ok(report)
    }

    /// Alternate passes and drains until the goal is answered.
    ///
    /// # Errors
    ///
    /// - `Stalled` if a pass leaves the goal open with nothing to drain
    /// - `RoundLimitExceeded` after `max_rounds` rounds
    pub async fn run(&mut self, incoming: &BindingSet) -> Result<ReasoningOutcome, KeweaveError> {
        loop {
            if self.rounds >= self.config.max_rounds {
                return Err(KeweaveError::RoundLimitExceeded {
                    rounds: self.rounds,
                });
            }
            self.rounds += 1;

            if let Some(bindings) = self.continue_reasoning(incoming)? {
                tracing::info!(
                    rounds = self.rounds,
                    answers = bindings.len(),
                    handler_calls = self.handler_calls,
                    failed = self.failures.len(),
                    "reasoning finished"
                );
                return Ok(ReasoningOutcome {
                    bindings,
                    rounds: self.rounds,
                    handler_calls: self.handler_calls,
                    failed_nodes: self.failures.clone(),
                    knowledge_gaps: self.knowledge_gaps()?,
                });
            }

            if self.board.is_empty() {
                return Err(KeweaveError::Stalled {
                    rounds: self.rounds,
                });
            }

            let report = self.drain().await?;
            tracing::info!(
                round = self.rounds,
                handler_calls = report.handler_calls,
                resolved = report.resolved,
                failed = report.failures.len(),
                "round complete"
            );
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Binding;
    use crate::rule::Rule;
    use crate::types::Value;

    fn sensor_rules() -> RuleSet {
        let mut rules = RuleSet::new();
        rules.add(
            Rule::fact(
                "sensor",
                BTreeSet::from([TriplePattern::new(
                    Value::lit("<s1>"),
                    Value::lit("rdf:type"),
                    Value::lit("Sensor"),
                )]),
            )
            .expect("fact"),
        );
        rules
    }

    fn sensor_goal() -> BTreeSet<TriplePattern> {
        BTreeSet::from([TriplePattern::new(
            Value::var("a"),
            Value::lit("rdf:type"),
            Value::lit("Sensor"),
        )])
    }

    #[tokio::test]
    async fn run_answers_fact_in_two_rounds() {
        let mut reasoner =
            Reasoner::new(sensor_rules(), sensor_goal(), ReasonerConfig::default()).expect("reasoner");

        let outcome = reasoner.run(&BindingSet::new()).await.expect("outcome");
        assert_eq!(
            outcome.bindings,
            [Binding::from_pairs(&[("a", "<s1>")])].into_iter().collect()
        );
        assert_eq!(outcome.rounds, 2);
        assert_eq!(outcome.handler_calls, 1);
        assert!(outcome.failed_nodes.is_empty());
        assert!(outcome.knowledge_gaps.is_empty());
    }

    #[tokio::test]
    async fn round_limit_is_enforced() {
        let config = ReasonerConfig {
            max_rounds: 1,
            ..ReasonerConfig::default()
        };
        let mut reasoner = Reasoner::new(sensor_rules(), sensor_goal(), config).expect("reasoner");

        let result = reasoner.run(&BindingSet::new()).await;
        assert!(matches!(
            result,
            Err(KeweaveError::RoundLimitExceeded { rounds: 1 })
        ));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = ReasonerConfig {
            max_rounds: 0,
            ..ReasonerConfig::default()
        };
        assert!(Reasoner::new(sensor_rules(), sensor_goal(), config).is_err());
    }
}
