//! Integration tests for network loading and end-to-end command runs.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use keweave::cli::{Overrides, cmd_gaps, cmd_plan, cmd_rules, cmd_run, load_network, run_network};
use keweave::network::Network;
use keweave_core::{
    Binding, BindingSet, HandlerError, KeweaveError, MatchStrategy, RuleProvider, TriplePattern,
    Value,
};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn demo_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../demos/smart_building.toml")
}

fn write_network(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const SLOW_NETWORK: &str = r#"
[[capability]]
id = "kb/slow"
kind = "answer"
result = [[{ var = "s" }, { lit = "hasTemp" }, { var = "t" }]]
response = [{ s = "<s1>", t = "20" }]
delay_ms = 500

[goal]
patterns = [[{ var = "a" }, { lit = "hasTemp" }, { var = "v" }]]
"#;

const GAPPED_NETWORK: &str = r#"
[[fact]]
name = "sensors"
triples = [[{ lit = "<s1>" }, { lit = "rdf:type" }, { lit = "Sensor" }]]

[goal]
patterns = [
    [{ var = "a" }, { lit = "rdf:type" }, { lit = "Sensor" }],
    [{ var = "a" }, { lit = "locatedIn" }, { var = "room" }],
]
"#;

// =============================================================================
// LOADING
// =============================================================================

#[test]
fn test_demo_network_loads() {
    let network = Network::load(&demo_path()).unwrap();

    assert_eq!(network.config.strategy, MatchStrategy::Normal);
    assert_eq!(network.config.max_rounds, 16);
    assert_eq!(network.registry.capabilities().count(), 4);
    assert_eq!(network.goal.len(), 1);

    // 1 fact + 1 domain rule + 4 answer capabilities
    assert_eq!(network.registry.rules().unwrap().len(), 6);
}

#[test]
fn test_missing_file_is_io_error() {
    let result = Network::load(&PathBuf::from("/definitely/not/here.toml"));
    assert!(matches!(result, Err(KeweaveError::Io(_))));
}

#[test]
fn test_overrides_replace_file_settings() {
    let file = write_network(SLOW_NETWORK);
    let overrides = Overrides {
        strategy: Some(MatchStrategy::Supreme),
        max_rounds: None,
        timeout_ms: Some(25),
    };

    let network = load_network(file.path(), overrides).unwrap();
    assert_eq!(network.config.strategy, MatchStrategy::Supreme);
    assert_eq!(network.config.round_timeout_ms, Some(25));
}

#[test]
fn test_invalid_override_is_rejected() {
    let file = write_network(SLOW_NETWORK);
    let overrides = Overrides {
        max_rounds: Some(0),
        ..Overrides::default()
    };
    assert!(matches!(
        load_network(file.path(), overrides),
        Err(KeweaveError::InvalidConfig(_))
    ));
}

#[test]
fn test_incoming_bindings_are_loaded() {
    let text = format!("{SLOW_NETWORK}bindings = [{{ a = \"<s1>\" }}]\n");
    let network = Network::parse(&text).unwrap();
    let expected: BindingSet = [Binding::from_pairs(&[("a", "<s1>")])].into_iter().collect();
    assert_eq!(network.incoming, expected);
}

// =============================================================================
// EXECUTION
// =============================================================================

#[tokio::test]
async fn test_demo_network_answers_room_temperatures() {
    let network = Network::load(&demo_path()).unwrap();
    let (reasoner, outcome) = run_network(&network).await.unwrap();

    let expected: BindingSet = [
        Binding::from_pairs(&[("room", "<room1>"), ("temp", "21")]),
        Binding::from_pairs(&[("room", "<room2>"), ("temp", "19")]),
    ]
    .into_iter()
    .collect();
    assert_eq!(outcome.bindings, expected);
    assert_eq!(outcome.rounds, 3);
    assert_eq!(outcome.handler_calls, 5);
    assert_eq!(outcome.failed_nodes.len(), 1);
    assert!(matches!(
        outcome.failed_nodes[0].error,
        HandlerError::Failed { .. }
    ));
    assert!(outcome.knowledge_gaps.is_empty());
    assert!(reasoner.render().contains("room-temperature"));
}

#[tokio::test]
async fn test_slow_capability_times_out() {
    let file = write_network(SLOW_NETWORK);
    let overrides = Overrides {
        timeout_ms: Some(20),
        ..Overrides::default()
    };
    let network = load_network(file.path(), overrides).unwrap();
    let (_, outcome) = run_network(&network).await.unwrap();

    assert!(outcome.bindings.is_empty());
    assert!(matches!(
        outcome.failed_nodes[0].error,
        HandlerError::TimedOut { after_ms: 20, .. }
    ));
}

#[test]
fn test_gapped_goal_reports_uncovered_triple() {
    let network = Network::parse(GAPPED_NETWORK).unwrap();
    let reasoner = keweave::cli::plan_network(&network).unwrap();

    let uncovered = TriplePattern::new(
        Value::var("a"),
        Value::lit("locatedIn"),
        Value::var("room"),
    );
    assert_eq!(
        reasoner.knowledge_gaps().unwrap(),
        BTreeSet::from([BTreeSet::from([uncovered])])
    );
}

// =============================================================================
// COMMANDS
// =============================================================================

#[tokio::test]
async fn test_commands_run_on_demo() {
    let path = demo_path();

    assert!(cmd_plan(&path, Overrides::default(), false).is_ok());
    assert!(cmd_plan(&path, Overrides::default(), true).is_ok());
    assert!(cmd_rules(&path, true).is_ok());
    assert!(cmd_gaps(&path, Overrides::default(), false).is_ok());
    assert!(cmd_run(&path, Overrides::default(), true, false).await.is_ok());
    assert!(cmd_run(&path, Overrides::default(), false, true).await.is_ok());
}

#[tokio::test]
async fn test_run_fails_on_round_budget() {
    let file = write_network(GAPPED_NETWORK);
    let overrides = Overrides {
        max_rounds: Some(1),
        ..Overrides::default()
    };

    // A gapped goal resolves in the first round, so one round is enough.
    assert!(cmd_run(file.path(), overrides, true, false).await.is_ok());

    let slow = write_network(SLOW_NETWORK);
    let result = cmd_run(slow.path(), overrides, true, false).await;
    assert!(matches!(
        result,
        Err(KeweaveError::RoundLimitExceeded { rounds: 1 })
    ));
}
