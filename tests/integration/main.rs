//! Integration tests for reqgraph
//!
//! These tests drive the engine the way the CLI does: config, scripts and
//! saved state all come from files on disk.

use reqgraph_core::script::{Outcome, run_script};
use reqgraph_core::{
    DiagramEngine, DiagramState, EngineConfig, NodeKind, Param, Position, Script, ScriptError,
};
use tempfile::TempDir;

const SESSION_YAML: &str = r#"
steps:
  - op: create
    name: gearbox
    kind: system
    label: Gearbox
  - op: create
    name: shaft
    kind: component
    x: 120
  - op: create
    name: bearing
    kind: component
    x: 240
  - op: create
    name: shop
    kind: manufacturing
    y: 200
  - op: connect
    a: gearbox
    b: shaft
  - op: connect
    a: shaft
    b: bearing
  - op: set_params
    a: bearing
    b: shaft
    params:
      - { key: fit, value: H7/k6 }
  - op: connect
    a: shop
    b: shaft
  - op: assign_process
    manufacturing: shop
    component: shaft
    process: turning
  - op: assign_software
    node: bearing
    software: cad
"#;

const CONFIG_TOML: &str = r#"
[history]
capacity = 50

[nodes]
default_links = []

[[catalog.processes]]
id = "turning"
name = "CNC turning"

[[catalog.software]]
id = "cad"
name = "CAD suite"
"#;

fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_yaml_script_with_config() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig::load(&write(&dir, "reqgraph.toml", CONFIG_TOML)).unwrap();
    let script = Script::load(&write(&dir, "session.yaml", SESSION_YAML)).unwrap();
    assert_eq!(script.steps.len(), 10);

    let (engine, reports) = run_script(DiagramEngine::with_config(&config), &script).unwrap();
    assert_eq!(reports.len(), 10);

    let shaft = match reports[1].outcome {
        Outcome::Node(id) => id,
        ref other => panic!("expected a node, got {other:?}"),
    };
    let bearing = match reports[2].outcome {
        Outcome::Node(id) => id,
        ref other => panic!("expected a node, got {other:?}"),
    };
    let shop = match reports[3].outcome {
        Outcome::Node(id) => id,
        ref other => panic!("expected a node, got {other:?}"),
    };

    assert!(engine.node(shaft).unwrap().links.is_empty());
    assert_eq!(engine.interlink_params(shaft, bearing), vec![Param::new("fit", "H7/k6")]);
    assert_eq!(engine.process_assignment(shop, shaft).unwrap().name, "CNC turning");
    assert_eq!(engine.software_assignment(bearing).unwrap().name, "CAD suite");
    // Baseline plus one checkpoint per step
    assert_eq!(engine.history_len(), 11);
}

#[test]
fn test_saved_state_reloads_identically() {
    let dir = TempDir::new().unwrap();
    let script = Script::load(&write(&dir, "session.yml", SESSION_YAML)).unwrap();
    let (engine, _) = run_script(DiagramEngine::new(), &script).unwrap();

    let saved = serde_json::to_string_pretty(&engine.export_state()).unwrap();
    let path = write(&dir, "state.json", &saved);

    let raw = std::fs::read_to_string(&path).unwrap();
    let state: DiagramState = serde_json::from_str(&raw).unwrap();
    let mut reloaded = DiagramEngine::new();
    let report = reloaded.import_state(state);

    assert!(report.is_clean(), "unexpected repairs: {report:?}");
    assert_eq!(reloaded.export_state(), engine.export_state());

    // Ids keep counting past the loaded ones
    let fresh = reloaded.create_node(NodeKind::System, "Extra", Position::default());
    assert!(engine.node(fresh).is_none());
}

#[test]
fn test_json_script_stops_at_first_failure() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "broken.json",
        r#"{
  "steps": [
    { "op": "create", "name": "a", "kind": "component" },
    { "op": "connect", "a": "a", "b": "a" },
    { "op": "create", "name": "b", "kind": "component" }
  ]
}"#,
    );
    let script = Script::load(&path).unwrap();

    let err = run_script(DiagramEngine::new(), &script).unwrap_err();
    match err {
        ScriptError::Rejected { step, op, source } => {
            assert_eq!(step, 2);
            assert_eq!(op, "connect");
            assert!(source.is_invalid());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_malformed_inputs_are_errors() {
    let dir = TempDir::new().unwrap();
    let bad_op = write(&dir, "bad.yaml", "steps:\n  - op: explode\n");
    assert!(Script::load(&bad_op).is_err());
    assert!(Script::load(&dir.path().join("missing.json")).is_err());

    let bad_config = write(&dir, "bad.toml", "[history]\ncapacity = \"lots\"\n");
    assert!(EngineConfig::load(&bad_config).is_err());
}

#[test]
fn test_undo_across_script_boundaries() {
    let script = Script::from_yaml_str(SESSION_YAML).unwrap();
    let (mut engine, _) = run_script(DiagramEngine::new(), &script).unwrap();
    let full = engine.export_state();

    let mut undone = 0;
    while engine.undo().is_some() {
        undone += 1;
    }
    assert_eq!(undone, 10);
    assert!(engine.export_state().is_empty());

    while engine.redo().is_some() {}
    assert_eq!(engine.export_state(), full);
}
