//! Operation scripts: replay a recorded sequence of editor actions
//!
//! Nodes are referred to by script-local aliases bound at creation, since
//! ids are only known once the engine hands them out.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::engine::DiagramEngine;
use crate::error::DiagramError;
use crate::model::{EdgeId, Link, NodeId, NodeKind, Param, Position, Size};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Script {
    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw).context("parse JSON script")
    }

    pub fn from_yaml_str(raw: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(raw).context("parse YAML script")
    }

    /// Load a script, choosing the format from the file extension.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read script {}", path.display()))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yml") | Some("yaml") => Self::from_yaml_str(&raw),
            _ => Self::from_json_str(&raw),
        }
        .with_context(|| format!("load script {}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Create {
        name: String,
        kind: NodeKind,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        x: f64,
        #[serde(default)]
        y: f64,
    },
    /// A whole drag gesture ending at (x, y).
    Move { node: String, x: f64, y: f64 },
    Rename { node: String, label: String },
    Resize { node: String, width: f64, height: f64 },
    Connect { a: String, b: String },
    Disconnect { a: String, b: String },
    Delete { node: String },
    SetParams {
        a: String,
        b: String,
        #[serde(default)]
        params: Vec<Param>,
    },
    OpenInterlink { a: String, b: String },
    AddLink {
        node: String,
        name: String,
        #[serde(default)]
        url: String,
    },
    EditLink {
        node: String,
        index: usize,
        name: String,
        #[serde(default)]
        url: String,
    },
    RemoveLink { node: String, index: usize },
    AssignProcess {
        manufacturing: String,
        component: String,
        #[serde(default)]
        process: Option<String>,
    },
    AssignSoftware {
        node: String,
        #[serde(default)]
        software: Option<String>,
    },
    Click { node: String },
    DeleteSelection,
    Undo,
    Redo,
    Clear,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Create { .. } => "create",
            Step::Move { .. } => "move",
            Step::Rename { .. } => "rename",
            Step::Resize { .. } => "resize",
            Step::Connect { .. } => "connect",
            Step::Disconnect { .. } => "disconnect",
            Step::Delete { .. } => "delete",
            Step::SetParams { .. } => "set_params",
            Step::OpenInterlink { .. } => "open_interlink",
            Step::AddLink { .. } => "add_link",
            Step::EditLink { .. } => "edit_link",
            Step::RemoveLink { .. } => "remove_link",
            Step::AssignProcess { .. } => "assign_process",
            Step::AssignSoftware { .. } => "assign_software",
            Step::Click { .. } => "click",
            Step::DeleteSelection => "delete_selection",
            Step::Undo => "undo",
            Step::Redo => "redo",
            Step::Clear => "clear",
        }
    }
}

/// Result of one executed step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Node(NodeId),
    Edge(Option<EdgeId>),
    Params(Vec<Param>),
    /// Whether the step changed persisted state.
    Changed(bool),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub op: &'static str,
    pub outcome: Outcome,
}

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("step {step}: unknown node alias `{alias}`")]
    UnknownAlias { step: usize, alias: String },
    #[error("step {step}: node alias `{alias}` is already bound")]
    DuplicateAlias { step: usize, alias: String },
    #[error("step {step} ({op}): {source}")]
    Rejected {
        step: usize,
        op: &'static str,
        #[source]
        source: DiagramError,
    },
}

/// Executes scripts against an engine, stopping at the first failure.
pub struct ScriptRunner {
    engine: DiagramEngine,
    aliases: BTreeMap<String, NodeId>,
}

impl ScriptRunner {
    pub fn new(engine: DiagramEngine) -> Self {
        ScriptRunner {
            engine,
            aliases: BTreeMap::new(),
        }
    }

    pub fn engine(&self) -> &DiagramEngine {
        &self.engine
    }

    pub fn into_engine(self) -> DiagramEngine {
        self.engine
    }

    pub fn alias(&self, name: &str) -> Option<NodeId> {
        self.aliases.get(name).copied()
    }

    /// Run every step in order. Steps are numbered from 1 in reports and
    /// errors; steps before a failure stay applied.
    pub fn run(&mut self, script: &Script) -> Result<Vec<StepReport>, ScriptError> {
        let mut reports = Vec::with_capacity(script.steps.len());
        for (i, step) in script.steps.iter().enumerate() {
            let number = i + 1;
            let outcome = self.apply(number, step)?;
            debug!("step {} ({}): {:?}", number, step.name(), outcome);
            reports.push(StepReport {
                step: number,
                op: step.name(),
                outcome,
            });
        }
        Ok(reports)
    }

    fn apply(&mut self, number: usize, step: &Step) -> Result<Outcome, ScriptError> {
        let op = step.name();
        let rejected = |source: DiagramError| ScriptError::Rejected {
            step: number,
            op,
            source,
        };

        let outcome = match step {
            Step::Create {
                name,
                kind,
                label,
                x,
                y,
            } => {
                if self.aliases.contains_key(name) {
                    return Err(ScriptError::DuplicateAlias {
                        step: number,
                        alias: name.clone(),
                    });
                }
                let label = label.clone().unwrap_or_else(|| name.clone());
                let id = self.engine.create_node(*kind, label, Position::new(*x, *y));
                self.aliases.insert(name.clone(), id);
                Outcome::Node(id)
            }
            Step::Move { node, x, y } => {
                let id = self.resolve(number, node)?;
                self.engine
                    .move_node(id, Position::new(*x, *y))
                    .map_err(rejected)?;
                Outcome::Changed(self.engine.end_move())
            }
            Step::Rename { node, label } => {
                let id = self.resolve(number, node)?;
                Outcome::Changed(self.engine.rename_node(id, label.clone()).map_err(rejected)?)
            }
            Step::Resize {
                node,
                width,
                height,
            } => {
                let id = self.resolve(number, node)?;
                let size = Size {
                    width: *width,
                    height: *height,
                };
                Outcome::Changed(self.engine.resize_node(id, Some(size)).map_err(rejected)?)
            }
            Step::Connect { a, b } => {
                let (a, b) = (self.resolve(number, a)?, self.resolve(number, b)?);
                Outcome::Edge(Some(self.engine.connect_nodes(a, b).map_err(rejected)?))
            }
            Step::Disconnect { a, b } => {
                let (a, b) = (self.resolve(number, a)?, self.resolve(number, b)?);
                let edge = self
                    .engine
                    .find_edge(a, b)
                    .ok_or_else(|| rejected(DiagramError::not_found(format!("edge between {a} and {b}"))))?;
                self.engine.disconnect_edge(edge).map_err(rejected)?;
                Outcome::Changed(true)
            }
            Step::Delete { node } => {
                let id = self.resolve(number, node)?;
                self.engine.delete_node(id).map_err(rejected)?;
                Outcome::Changed(true)
            }
            Step::SetParams { a, b, params } => {
                let (a, b) = (self.resolve(number, a)?, self.resolve(number, b)?);
                Outcome::Changed(
                    self.engine
                        .set_interlink_params(a, b, params.clone())
                        .map_err(rejected)?,
                )
            }
            Step::OpenInterlink { a, b } => {
                let (a, b) = (self.resolve(number, a)?, self.resolve(number, b)?);
                Outcome::Params(self.engine.open_interlink(a, b).map_err(rejected)?)
            }
            Step::AddLink { node, name, url } => {
                let id = self.resolve(number, node)?;
                self.engine
                    .add_link(id, Link::new(name.clone(), url.clone()))
                    .map_err(rejected)?;
                Outcome::Changed(true)
            }
            Step::EditLink {
                node,
                index,
                name,
                url,
            } => {
                let id = self.resolve(number, node)?;
                let link = Link::new(name.clone(), url.clone());
                Outcome::Changed(self.engine.edit_link(id, *index, link).map_err(rejected)?)
            }
            Step::RemoveLink { node, index } => {
                let id = self.resolve(number, node)?;
                self.engine.remove_link(id, *index).map_err(rejected)?;
                Outcome::Changed(true)
            }
            Step::AssignProcess {
                manufacturing,
                component,
                process,
            } => {
                let m = self.resolve(number, manufacturing)?;
                let c = self.resolve(number, component)?;
                Outcome::Changed(
                    self.engine
                        .set_process_assignment(m, c, process.clone())
                        .map_err(rejected)?,
                )
            }
            Step::AssignSoftware { node, software } => {
                let id = self.resolve(number, node)?;
                Outcome::Changed(
                    self.engine
                        .set_software_assignment(id, software.clone())
                        .map_err(rejected)?,
                )
            }
            Step::Click { node } => {
                let id = self.resolve(number, node)?;
                Outcome::Edge(self.engine.click_node(id).map_err(rejected)?)
            }
            Step::DeleteSelection => {
                Outcome::Changed(self.engine.delete_selection().map_err(rejected)?)
            }
            Step::Undo => Outcome::Changed(self.engine.undo().is_some()),
            Step::Redo => Outcome::Changed(self.engine.redo().is_some()),
            Step::Clear => Outcome::Changed(self.engine.clear_all()),
        };
        Ok(outcome)
    }

    fn resolve(&self, step: usize, alias: &str) -> Result<NodeId, ScriptError> {
        self.alias(alias).ok_or_else(|| ScriptError::UnknownAlias {
            step,
            alias: alias.to_string(),
        })
    }
}

/// Run a script on a fresh engine.
pub fn run_script(
    engine: DiagramEngine,
    script: &Script,
) -> Result<(DiagramEngine, Vec<StepReport>), ScriptError> {
    let mut runner = ScriptRunner::new(engine);
    let reports = runner.run(script)?;
    Ok((runner.into_engine(), reports))
}
