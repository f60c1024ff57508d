//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::Overrides;
use crate::network::Network;
use keweave_core::{
    KeweaveError, KnowledgeGaps, Reasoner, ReasoningOutcome, RuleKind, RuleProvider,
    format_pattern,
};
use std::path::Path;

// =============================================================================
// SHARED HELPERS
// =============================================================================

/// Load a network file and apply command-line overrides.
pub fn load_network(file: &Path, overrides: Overrides) -> Result<Network, KeweaveError> {
    let mut network = Network::load(file)?;
    network.config = overrides.apply(network.config);
    network.config.validate()?;
    Ok(network)
}

/// Plan the goal of `network`.
pub fn plan_network(network: &Network) -> Result<Reasoner, KeweaveError> {
    Reasoner::from_provider(&network.registry, network.goal.clone(), network.config)
}

/// Plan and execute the goal of `network`.
pub async fn run_network(network: &Network) -> Result<(Reasoner, ReasoningOutcome), KeweaveError> {
    let mut reasoner = plan_network(network)?;
    let outcome = reasoner.run(&network.incoming).await?;
    Ok((reasoner, outcome))
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

fn print_gaps(gaps: &KnowledgeGaps) {
    if gaps.is_empty() {
        println!("No knowledge gaps.");
        return;
    }
    println!("Knowledge gaps ({} alternatives):", gaps.len());
    for gap in gaps {
        println!("  {{ {} }}", format_pattern(gap));
    }
}

// =============================================================================
// PLAN COMMAND
// =============================================================================

/// Print the reasoning plan.
pub fn cmd_plan(file: &Path, overrides: Overrides, json_mode: bool) -> Result<(), KeweaveError> {
    let network = load_network(file, overrides)?;
    let reasoner = plan_network(&network)?;
    let plan = reasoner.plan();

    if json_mode {
        let output = serde_json::json!({
            "strategy": plan.strategy(),
            "nodes": plan.len(),
            "depth": plan.depth(),
            "plan": reasoner.render().lines().collect::<Vec<_>>(),
        });
        print_json(&output);
        return Ok(());
    }

    println!("Reasoning Plan");
    println!("==============");
    println!("Strategy: {}", plan.strategy());
    println!("Nodes:    {}", plan.len());
    println!("Depth:    {}", plan.depth());
    println!();
    print!("{}", reasoner.render());

    Ok(())
}

// =============================================================================
// RUN COMMAND
// =============================================================================

/// Answer the goal and print the outcome.
pub async fn cmd_run(
    file: &Path,
    overrides: Overrides,
    json_mode: bool,
    verbose: bool,
) -> Result<(), KeweaveError> {
    let network = load_network(file, overrides)?;
    let (reasoner, outcome) = run_network(&network).await?;

    if json_mode {
        let output = serde_json::to_value(&outcome)
            .map_err(|e| KeweaveError::Serialization(e.to_string()))?;
        print_json(&output);
        return Ok(());
    }

    println!("Goal: {}", format_pattern(&network.goal));
    println!();
    println!("Answers ({}):", outcome.bindings.len());
    for binding in &outcome.bindings {
        println!("  {}", binding);
    }
    println!();
    println!("Rounds:        {}", outcome.rounds);
    println!("Handler calls: {}", outcome.handler_calls);

    if !outcome.failed_nodes.is_empty() {
        println!();
        println!("Failed nodes:");
        for failure in &outcome.failed_nodes {
            println!("  {} ({}): {}", failure.node, failure.rule, failure.error);
        }
    }

    println!();
    print_gaps(&outcome.knowledge_gaps);

    if verbose {
        println!();
        print!("{}", reasoner.render());
    }

    Ok(())
}

// =============================================================================
// GAPS COMMAND
// =============================================================================

/// Report the knowledge gaps of the goal without executing anything.
pub fn cmd_gaps(file: &Path, overrides: Overrides, json_mode: bool) -> Result<(), KeweaveError> {
    let network = load_network(file, overrides)?;
    let reasoner = plan_network(&network)?;
    let gaps = reasoner.knowledge_gaps()?;

    if json_mode {
        let output = serde_json::json!({
            "goal": network.goal,
            "knowledge_gaps": gaps,
        });
        print_json(&output);
        return Ok(());
    }

    println!("Goal: {}", format_pattern(&network.goal));
    print_gaps(&gaps);
    Ok(())
}

// =============================================================================
// RULES COMMAND
// =============================================================================

/// List the rules the network contributes.
pub fn cmd_rules(file: &Path, json_mode: bool) -> Result<(), KeweaveError> {
    let network = Network::load(file)?;
    let rules = network.registry.rules()?;

    if json_mode {
        let entries: Vec<_> = rules
            .iter()
            .map(|(id, rule)| {
                let (kind, capability) = match rule.kind() {
                    RuleKind::Fact => ("fact", None),
                    RuleKind::Local => ("local", None),
                    RuleKind::Remote { capability } => ("remote", Some(capability)),
                };
                serde_json::json!({
                    "id": id,
                    "name": rule.name(),
                    "kind": kind,
                    "capability": capability,
                    "antecedent": rule.antecedent(),
                    "consequent": rule.consequent(),
                })
            })
            .collect();
        print_json(&serde_json::Value::Array(entries));
        return Ok(());
    }

    println!("Rules ({}):", rules.len());
    for (id, rule) in rules.iter() {
        let kind = match rule.kind() {
            RuleKind::Fact => "fact".to_string(),
            RuleKind::Local => "local".to_string(),
            RuleKind::Remote { capability } => format!("remote {}", capability),
        };
        println!("  {} [{}] {}", id, kind, rule);
    }
    Ok(())
}
