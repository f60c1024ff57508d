//! # Reasoning Plan
//!
//! The tree of rule applications that decomposes a goal into sub-goals.
//!
//! ## Construction
//!
//! The root holds the goal as its antecedent. Every node's antecedent is
//! matched against the consequents of all rules; each matching rule becomes
//! a child whose antecedent is expanded in turn. A rule that already occurs
//! on the path from the root to a node is never applied again below it,
//! which bounds the depth of the tree by the number of rules.
//!
//! ## Execution
//!
//! [`ReasoningPlan::continue_reasoning`] walks the tree once. Nodes whose
//! children all have answers post a request to the [`TaskBoard`] and wait;
//! the board delivers results between rounds. A node whose subtree has a
//! knowledge gap can never answer; it resolves to no answers without
//! descending, so none of its descendants call a handler. Node states only
//! move forward:
//!
//! ```text
//! NotRequested -> Requested -> Available
//!                           \-> Failed
//! ```

use crate::binding::BindingSet;
use crate::graph_binding::TripleVarBindingSet;
use crate::matcher::find_rule_matches;
use crate::matching::Match;
use crate::primitives::MAX_PATTERN_SIZE;
use crate::rule::RuleSet;
use crate::strategy::{MatchFlags, MatchStrategy};
use crate::taskboard::TaskBoard;
use crate::types::{HandlerError, KeweaveError, NodeId, RuleId, TriplePattern, format_pattern};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::{Duration, Instant};

/// A disjunction of knowledge gaps; each inner set must be filled jointly.
pub type KnowledgeGaps = BTreeSet<BTreeSet<TriplePattern>>;

// =============================================================================
// NODE
// =============================================================================

/// Execution state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum NodeState {
    NotRequested,
    Requested,
    Available,
    Failed,
}

impl NodeState {
    /// One-character marker used by [`ReasoningPlan::render`].
    #[must_use]
    pub fn marker(self) -> char {
        match self {
            Self::NotRequested => 'x',
            Self::Requested => '=',
            Self::Available => '-',
            Self::Failed => '!',
        }
    }
}

/// One rule application (or the goal, at the root).
#[derive(Debug, Clone)]
pub struct ReasoningNode {
    id: NodeId,
    rule: Option<RuleId>,
    parent: Option<NodeId>,
    depth: usize,
    antecedent: BTreeSet<TriplePattern>,
    consequent: BTreeSet<TriplePattern>,
    children: BTreeMap<NodeId, BTreeSet<Match>>,
    refused: BTreeSet<RuleId>,
    gapped: bool,
    state: NodeState,
    result: Option<BindingSet>,
    request: Option<BindingSet>,
    failure: Option<HandlerError>,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
}

impl ReasoningNode {
    fn new(
        id: NodeId,
        rule: Option<RuleId>,
        parent: Option<NodeId>,
        depth: usize,
        antecedent: BTreeSet<TriplePattern>,
        consequent: BTreeSet<TriplePattern>,
    ) -> Self {
        Self {
            id,
            rule,
            parent,
            depth,
            antecedent,
            consequent,
            children: BTreeMap::new(),
            refused: BTreeSet::new(),
            gapped: false,
            state: NodeState::NotRequested,
            result: None,
            request: None,
            failure: None,
            started_at: None,
            finished_at: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The applied rule, `None` at the root.
    #[must_use]
    pub fn rule(&self) -> Option<RuleId> {
        self.rule
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[must_use]
    pub fn antecedent(&self) -> &BTreeSet<TriplePattern> {
        &self.antecedent
    }

    #[must_use]
    pub fn consequent(&self) -> &BTreeSet<TriplePattern> {
        &self.consequent
    }

    /// Children with the matches connecting this antecedent to their consequent.
    #[must_use]
    pub fn children(&self) -> &BTreeMap<NodeId, BTreeSet<Match>> {
        &self.children
    }

    /// Rules that matched but were refused because they occur on the path.
    #[must_use]
    pub fn refused(&self) -> &BTreeSet<RuleId> {
        &self.refused
    }

    #[must_use]
    pub fn state(&self) -> NodeState {
        self.state
    }

    #[must_use]
    pub fn result(&self) -> Option<&BindingSet> {
        self.result.as_ref()
    }

    /// The binding set this node posted to the task board.
    #[must_use]
    pub fn request(&self) -> Option<&BindingSet> {
        self.request.as_ref()
    }

    #[must_use]
    pub fn failure(&self) -> Option<&HandlerError> {
        self.failure.as_ref()
    }

    #[must_use]
    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    #[must_use]
    pub fn finished_at(&self) -> Option<Instant> {
        self.finished_at
    }

    /// Time the handler took for this node, once it answered.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        Some(self.finished_at?.saturating_duration_since(self.started_at?))
    }

    /// Whether some antecedent triple is claimed by no child.
    #[must_use]
    pub fn has_knowledge_gap(&self) -> bool {
        let covered: BTreeSet<&TriplePattern> = self
            .children
            .values()
            .flatten()
            .flat_map(|m| m.matching_patterns().keys())
            .collect();
        self.antecedent.iter().any(|t| !covered.contains(t))
    }

    /// Whether the subtree rooted here has a knowledge gap. Such a node can
    /// never produce answers and is resolved without calling any handler.
    #[must_use]
    pub fn is_gapped(&self) -> bool {
        self.gapped
    }

    fn resolve(&mut self, result: BindingSet) -> BindingSet {
        self.state = NodeState::Available;
        self.result = Some(result.clone());
        result
    }
}

// =============================================================================
// PLAN
// =============================================================================

/// Arena of reasoning nodes rooted at a goal.
#[derive(Debug, Clone)]
pub struct ReasoningPlan {
    nodes: Vec<ReasoningNode>,
    strategy: MatchStrategy,
}

/// Build a plan for `goal`. Shorthand for [`ReasoningPlan::build`].
pub fn plan(
    goal: BTreeSet<TriplePattern>,
    rules: &RuleSet,
    strategy: MatchStrategy,
) -> Result<ReasoningPlan, KeweaveError> {
    ReasoningPlan::build(goal, rules, strategy)
}

impl ReasoningPlan {
    /// Construct the full node tree for `goal`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the goal exceeds [`MAX_PATTERN_SIZE`]
    /// triples, and `CycleViolation` if the finished tree applies a rule
    /// below itself. Construction refuses such children, so the latter
    /// indicates a bug.
    pub fn build(
        goal: BTreeSet<TriplePattern>,
        rules: &RuleSet,
        strategy: MatchStrategy,
    ) -> Result<Self, KeweaveError> {
        if goal.len() > MAX_PATTERN_SIZE {
            return Err(KeweaveError::InvalidConfig(format!(
                "goal has {} triples, at most {MAX_PATTERN_SIZE} are allowed",
                goal.len()
            )));
        }

        let root = ReasoningNode::new(NodeId(0), None, None, 0, goal, BTreeSet::new());
        let mut plan = Self {
            nodes: vec![root],
            strategy,
        };

        let flags = strategy.flags(true);
        let mut worklist = VecDeque::from([NodeId(0)]);

        while let Some(id) = worklist.pop_front() {
            let node = plan.node(id).ok_or(KeweaveError::UnknownNode(id))?;
            if node.antecedent.is_empty() {
                continue;
            }
            let antecedent = node.antecedent.clone();
            let depth = node.depth;
            let on_path = plan.rules_on_path(id);

            let candidates: Vec<(RuleId, &BTreeSet<TriplePattern>)> = rules
                .iter()
                .filter(|(rule_id, rule)| !on_path.contains(rule_id) && !rule.consequent().is_empty())
                .map(|(rule_id, rule)| (rule_id, rule.consequent()))
                .collect();

            let refused: BTreeSet<RuleId> = rules
                .iter()
                .filter(|(rule_id, rule)| {
                    on_path.contains(rule_id) && overlaps(&antecedent, rule.consequent())
                })
                .map(|(rule_id, _)| rule_id)
                .collect();
            for rule_id in &refused {
                tracing::debug!(node = %id, rule = %rule_id, "refused rule already on path");
            }

            let mut per_rule = find_rule_matches(&antecedent, &candidates, flags);
            if per_rule.is_empty() && flags.contains(MatchFlags::FULLY_COVERED) {
                per_rule = find_rule_matches(
                    &antecedent,
                    &candidates,
                    flags.difference(MatchFlags::FULLY_COVERED),
                );
                tracing::debug!(
                    node = %id,
                    partial_rules = per_rule.len(),
                    "antecedent not fully covered, probing for knowledge gap"
                );
            }

            let mut children = BTreeMap::new();
            for (rule_id, matches) in per_rule {
                let rule = rules.rule(rule_id)?;
                let child_id = NodeId(plan.nodes.len() as u32);
                plan.nodes.push(ReasoningNode::new(
                    child_id,
                    Some(rule_id),
                    Some(id),
                    depth + 1,
                    rule.antecedent().clone(),
                    rule.consequent().clone(),
                ));
                tracing::debug!(
                    node = %child_id,
                    parent = %id,
                    rule = rule.name(),
                    matches = matches.len(),
                    "planned rule application"
                );
                children.insert(child_id, matches);
                worklist.push_back(child_id);
            }

            let node = plan.node_mut(id)?;
            node.children = children;
            node.refused = refused;
        }

        plan.verify_acyclic()?;

        let gaps = plan.subtree_gaps();
        let mut gapped = 0usize;
        for (node, node_gaps) in plan.nodes.iter_mut().zip(&gaps) {
            node.gapped = !node_gaps.is_empty();
            gapped += usize::from(node.gapped);
        }

        tracing::debug!(
            nodes = plan.nodes.len(),
            depth = plan.depth(),
            gapped,
            %strategy,
            "plan built"
        );
        Ok(plan)
    }

    /// Check that no rule occurs twice on any root-to-node path.
    pub fn verify_acyclic(&self) -> Result<(), KeweaveError> {
        for node in &self.nodes {
            let Some(rule) = node.rule else { continue };
            let mut cursor = node.parent;
            while let Some(ancestor) = cursor.and_then(|id| self.node(id)) {
                if ancestor.rule == Some(rule) {
                    return Err(KeweaveError::CycleViolation {
                        rule,
                        node: node.id,
                    });
                }
                cursor = ancestor.parent;
            }
        }
        Ok(())
    }

    fn rules_on_path(&self, id: NodeId) -> BTreeSet<RuleId> {
        let mut rules = BTreeSet::new();
        let mut cursor = Some(id);
        while let Some(node) = cursor.and_then(|id| self.node(id)) {
            rules.extend(node.rule);
            cursor = node.parent;
        }
        rules
    }

    // =========================================================================
    // INSPECTION
    // =========================================================================

    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&ReasoningNode> {
        self.nodes.get(id.0 as usize)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut ReasoningNode, KeweaveError> {
        self.nodes
            .get_mut(id.0 as usize)
            .ok_or(KeweaveError::UnknownNode(id))
    }

    /// Child identifiers of `id`, in creation order.
    #[must_use]
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .map(|n| n.children.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ReasoningNode> {
        self.nodes.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Depth of the deepest node (the root has depth 0).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    #[must_use]
    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    /// The answer of the root, once available.
    #[must_use]
    pub fn root_result(&self) -> Option<&BindingSet> {
        self.node(self.root()).and_then(|n| n.result.as_ref())
    }

    /// Knowledge gaps of the subtree rooted at `id`.
    ///
    /// For every antecedent triple: unclaimed triples are gaps themselves;
    /// a triple claimed by a child without gaps is covered; otherwise the
    /// gaps of the claiming children are alternatives. Alternatives of
    /// different triples are combined pairwise.
    pub fn knowledge_gaps(&self, id: NodeId) -> Result<KnowledgeGaps, KeweaveError> {
        self.node(id).ok_or(KeweaveError::UnknownNode(id))?;
        let mut gaps = self.subtree_gaps();
        Ok(gaps.swap_remove(id.0 as usize))
    }

    /// Knowledge gaps of every node, indexed by node id.
    fn subtree_gaps(&self) -> Vec<KnowledgeGaps> {
        // Children are always created after their parent, so a reverse walk
        // sees every child before its parent.
        let mut gaps: Vec<KnowledgeGaps> = vec![KnowledgeGaps::new(); self.nodes.len()];
        for node in self.nodes.iter().rev() {
            let mut node_gaps = KnowledgeGaps::new();

            for triple in &node.antecedent {
                let claiming: Vec<NodeId> = node
                    .children
                    .iter()
                    .filter(|(_, matches)| matches.iter().any(|m| m.matching_patterns().contains_key(triple)))
                    .map(|(child, _)| *child)
                    .collect();

                let alternatives = if claiming.is_empty() {
                    KnowledgeGaps::from([BTreeSet::from([triple.clone()])])
                } else {
                    let child_gaps: Vec<&KnowledgeGaps> = claiming
                        .iter()
                        .filter_map(|child| gaps.get(child.0 as usize))
                        .collect();
                    if child_gaps.iter().any(|g| g.is_empty()) {
                        continue;
                    }
                    child_gaps.into_iter().flatten().cloned().collect()
                };

                node_gaps = merge_gaps(&node_gaps, &alternatives);
            }

            if let Some(slot) = gaps.get_mut(node.id.0 as usize) {
                *slot = node_gaps;
            }
        }
        gaps
    }

    /// Indented tree with one state marker per node.
    ///
    /// `x` not requested, `=` requested, `-` available, `!` failed.
    #[must_use]
    pub fn render(&self, rules: &RuleSet) -> String {
        let mut out = String::new();
        let mut stack = vec![self.root()];

        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else { continue };
            let indent = "  ".repeat(node.depth);

            let label = match node.rule.and_then(|r| rules.get(r)) {
                Some(rule) => format!(
                    "{}: {} <- {}",
                    rule.name(),
                    format_pattern(&node.consequent),
                    format_pattern(&node.antecedent)
                ),
                None => format!("goal: {}", format_pattern(&node.antecedent)),
            };
            out.push_str(&format!("{indent}{} {label}", node.state.marker()));
            if node.has_knowledge_gap() {
                out.push_str(" [gap]");
            }
            out.push('\n');

            for refused in &node.refused {
                let name = rules.get(*refused).map_or("?", |r| r.name());
                out.push_str(&format!("{indent}  loop {name}\n"));
            }

            stack.extend(node.children.keys().rev().copied());
        }
        out
    }

    // =========================================================================
    // EXECUTION
    // =========================================================================

    /// Run one pass over the subtree rooted at `id`.
    ///
    /// Returns `Some` with the answers once the node is resolved, `None`
    /// while some descendant is waiting on the task board.
    pub fn continue_reasoning(
        &mut self,
        id: NodeId,
        incoming: &BindingSet,
        board: &mut TaskBoard,
    ) -> Result<Option<BindingSet>, KeweaveError> {
        let incoming = if id == self.root() && incoming.is_empty() {
            BindingSet::unconstrained()
        } else {
            incoming.clone()
        };
        self.continue_node(id, &incoming, board)
    }

    fn continue_node(
        &mut self,
        id: NodeId,
        incoming: &BindingSet,
        board: &mut TaskBoard,
    ) -> Result<Option<BindingSet>, KeweaveError> {
        let node = self.node_mut(id)?;
        match node.state {
            NodeState::Available => return Ok(node.result.clone()),
            NodeState::Failed => return Ok(Some(BindingSet::new())),
            NodeState::Requested => return Ok(None),
            NodeState::NotRequested => {}
        }

        if incoming.is_empty() || node.gapped {
            tracing::trace!(node = %id, "resolved without answers");
            return Ok(Some(node.resolve(BindingSet::new())));
        }

        let antecedent = node.antecedent.clone();
        let children: Vec<(NodeId, BTreeSet<Match>)> = node
            .children
            .iter()
            .map(|(child, matches)| (*child, matches.clone()))
            .collect();

        let mut child_results = Vec::with_capacity(children.len());
        let mut waiting = false;
        for (child, matches) in &children {
            let child_incoming = incoming.translate_all(matches);
            match self.continue_node(*child, &child_incoming, board)? {
                Some(result) => child_results.push((result, matches)),
                None => waiting = true,
            }
        }
        if waiting {
            return Ok(None);
        }

        let mut combined = TripleVarBindingSet::new(antecedent.clone());
        for (result, matches) in child_results {
            let mut translated =
                TripleVarBindingSet::from_child_result(antecedent.clone(), &result, matches);
            if matches.len() > 1 {
                translated = translated.merge(&translated);
            }
            combined = combined.merge(&translated);
        }
        // An empty antecedent is trivially satisfied by the incoming bindings.
        let answers = if antecedent.is_empty() {
            incoming.clone()
        } else {
            combined
                .full_bindings()
                .to_binding_set()
                .keep_compatible(incoming)
        };

        let node = self.node_mut(id)?;
        let Some(rule) = node.rule else {
            tracing::trace!(answers = answers.len(), "goal resolved");
            return Ok(Some(node.resolve(answers)));
        };

        // The bindings found for the antecedent are what the rule is asked for.
        if answers.is_empty() {
            return Ok(Some(node.resolve(BindingSet::new())));
        }

        node.state = NodeState::Requested;
        node.request = Some(answers.clone());
        board.post(rule, id, answers);
        Ok(None)
    }

    // =========================================================================
    // TASK BOARD CALLBACKS
    // =========================================================================

    /// Record the moment the handler for `id` was invoked.
    pub(crate) fn mark_started(&mut self, id: NodeId, at: Instant) -> Result<(), KeweaveError> {
        self.node_mut(id)?.started_at = Some(at);
        Ok(())
    }

    /// Deliver the handler answer for a requested node.
    ///
    /// Nodes that are not waiting keep their state.
    pub fn set_result(&mut self, id: NodeId, result: BindingSet) -> Result<(), KeweaveError> {
        let node = self.node_mut(id)?;
        if node.state == NodeState::Requested {
            node.finished_at.get_or_insert_with(Instant::now);
            node.resolve(result);
        }
        Ok(())
    }

    /// Move a requested node to the terminal `Failed` state.
    pub fn set_failed(&mut self, id: NodeId, error: HandlerError) -> Result<(), KeweaveError> {
        let node = self.node_mut(id)?;
        if node.state == NodeState::Requested {
            node.finished_at.get_or_insert_with(Instant::now);
            node.state = NodeState::Failed;
            node.failure = Some(error);
        }
        Ok(())
    }

    pub(crate) fn mark_finished(&mut self, id: NodeId, at: Instant) -> Result<(), KeweaveError> {
        self.node_mut(id)?.finished_at = Some(at);
        Ok(())
    }
}

/// Whether some triple of `target` unifies with some triple of `candidate`.
fn overlaps(target: &BTreeSet<TriplePattern>, candidate: &BTreeSet<TriplePattern>) -> bool {
    target
        .iter()
        .any(|t| candidate.iter().any(|c| Match::single(t, c).is_some()))
}

/// Pairwise union of two gap alternatives (an AND of two ORs).
fn merge_gaps(left: &KnowledgeGaps, right: &KnowledgeGaps) -> KnowledgeGaps {
    if left.is_empty() {
        return right.clone();
    }
    if right.is_empty() {
        return left.clone();
    }
    left.iter()
        .flat_map(|l| right.iter().map(move |r| l.union(r).cloned().collect()))
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
