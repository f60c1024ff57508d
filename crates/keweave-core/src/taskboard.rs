//! # Task Board
//!
//! Batching scheduler between the plan and the rule handlers.
//!
//! During a pass over the plan, nodes post the bindings they need from
//! their rule. [`TaskBoard::drain`] then invokes every distinct rule's
//! handler exactly once with the union of all requests for it, waits for
//! all handlers together, and hands each requesting node the part of the
//! answer compatible with its own request.
//!
//! One board belongs to one plan execution. Nothing is shared between
//! boards.

use crate::binding::BindingSet;
use crate::plan::ReasoningPlan;
use crate::rule::RuleSet;
use crate::types::{HandlerError, KeweaveError, NodeId, RuleId};
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Pending requests for one rule, per requesting node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Task {
    requests: BTreeMap<NodeId, BindingSet>,
}

impl Task {
    /// Union of the requests of every node.
    #[must_use]
    pub fn combined(&self) -> BindingSet {
        self.requests
            .values()
            .fold(BindingSet::new(), |acc, request| acc.union(request))
    }

    #[must_use]
    pub fn requests(&self) -> &BTreeMap<NodeId, BindingSet> {
        &self.requests
    }
}

/// A node whose handler failed or timed out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeFailure {
    pub node: NodeId,
    pub rule: RuleId,
    pub error: HandlerError,
}

/// What one drain did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Handler invocations (one per distinct rule).
    pub handler_calls: usize,
    /// Nodes that received an answer.
    pub resolved: usize,
    pub failures: Vec<NodeFailure>,
}

/// Per-execution scheduling surface.
#[derive(Debug, Clone, Default)]
pub struct TaskBoard {
    tasks: BTreeMap<RuleId, Task>,
}

impl TaskBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `request` from `node` for `rule`.
    ///
    /// Repeated posts for the same node are merged, never overwritten.
    pub fn post(&mut self, rule: RuleId, node: NodeId, request: BindingSet) {
        let task = self.tasks.entry(rule).or_default();
        let slot = task.requests.entry(node).or_default();
        *slot = slot.union(&request);
        tracing::trace!(%rule, %node, bindings = slot.len(), "task posted");
    }

    /// Number of distinct rules waiting for a handler call.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    #[must_use]
    pub fn task(&self, rule: RuleId) -> Option<&Task> {
        self.tasks.get(&rule)
    }

    /// Invoke every pending rule's handler once and deliver the answers.
    ///
    /// With a `timeout`, a handler that does not answer in time fails its
    /// nodes with [`HandlerError::TimedOut`].
    pub async fn drain(
        &mut self,
        plan: &mut ReasoningPlan,
        rules: &RuleSet,
        timeout: Option<Duration>,
    ) -> Result<DrainReport, KeweaveError> {
        let tasks = std::mem::take(&mut self.tasks);
        let mut report = DrainReport::default();
        let mut calls = Vec::with_capacity(tasks.len());

        for (rule_id, task) in &tasks {
            let rule = rules.rule(*rule_id)?;
            let request = task.combined();
            let capability = rule.capability().to_string();
            let started = Instant::now();
            for node in task.requests.keys() {
                plan.mark_started(*node, started)?;
            }

            tracing::debug!(
                rule = rule.name(),
                nodes = task.requests.len(),
                bindings = request.len(),
                "invoking handler"
            );
            let future = rule.handler().handle(request);

            calls.push(async move {
                let outcome = match timeout {
                    Some(limit) => match tokio::time::timeout(limit, future).await {
                        Ok(outcome) => outcome,
                        Err(_) => Err(HandlerError::TimedOut {
                            capability,
                            after_ms: limit.as_millis() as u64,
                        }),
                    },
                    None => future.await,
                };
                (outcome, Instant::now())
            });
        }

        report.handler_calls = calls.len();
        let outcomes = join_all(calls).await;

        for ((rule_id, task), (outcome, finished)) in tasks.into_iter().zip(outcomes) {
            for (node, request) in task.requests {
                plan.mark_finished(node, finished)?;
                match &outcome {
                    Ok(answer) => {
                        plan.set_result(node, answer.keep_compatible(&request))?;
                        report.resolved += 1;
                    }
                    Err(error) => {
                        tracing::warn!(%node, rule = %rule_id, %error, "handler failed");
                        plan.set_failed(node, error.clone())?;
                        report.failures.push(NodeFailure {
                            node,
                            rule: rule_id,
                            error: error.clone(),
                        });
                    }
                }
            }
        }

        Ok(report)
    }
}

// =============================================================================
// TESTS
// =============================================================================
