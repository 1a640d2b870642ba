//! CLI command implementations

use anyhow::Context;
use reqgraph_core::script::run_script;
use reqgraph_core::{DiagramEngine, DiagramState, EngineConfig, Script};
use std::path::Path;

pub fn run(
    script_path: &Path,
    config_path: Option<&Path>,
    state_in: Option<&Path>,
    state_out: Option<&Path>,
) -> anyhow::Result<()> {
    let config = match config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let mut engine = DiagramEngine::with_config(&config);

    if let Some(path) = state_in {
        let report = engine.import_state(read_state(path)?);
        if !report.is_clean() {
            tracing::warn!("{} needed repairs on load", path.display());
        }
    }

    let script = Script::load(script_path)?;
    tracing::info!(
        "Running {} steps from {}",
        script.steps.len(),
        script_path.display()
    );

    let (engine, reports) = run_script(engine, &script)
        .with_context(|| format!("script {} failed", script_path.display()))?;
    for report in &reports {
        tracing::debug!("step {} {}: {:?}", report.step, report.op, report.outcome);
    }
    tracing::info!(
        "Script finished: {} nodes, {} edges, {} snapshots",
        engine.nodes().len(),
        engine.edges().len(),
        engine.history_len()
    );

    let state = serde_json::to_string_pretty(&engine.export_state())?;
    match state_out {
        Some(path) => {
            std::fs::write(path, state)
                .with_context(|| format!("write state {}", path.display()))?;
            tracing::info!("State written to {}", path.display());
        }
        None => println!("{state}"),
    }
    Ok(())
}

pub fn check(state_path: &Path) -> anyhow::Result<()> {
    let state = read_state(state_path)?;
    let (nodes, edges) = (state.nodes.len(), state.edges.len());

    let mut engine = DiagramEngine::new();
    let report = engine.import_state(state);

    tracing::info!(
        "{}: {} nodes, {} edges, {} interlinks",
        state_path.display(),
        nodes,
        edges,
        engine.interlinks().count()
    );
    if report.is_clean() {
        tracing::info!("No repairs needed");
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn read_state(path: &Path) -> anyhow::Result<DiagramState> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read state {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse state {}", path.display()))
}
