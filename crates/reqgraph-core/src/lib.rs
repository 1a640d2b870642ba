//! Reqgraph Core: requirement diagram model, interlinks, and undo history

pub mod catalog;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod graph;
pub mod history;
pub mod interaction;
pub mod interlink;
pub mod model;
pub mod reconcile;
pub mod script;


pub use catalog::{Catalog, CatalogEntry, Catalogs};
pub use config::EngineConfig;
pub use diff::GraphDiff;
pub use engine::DiagramEngine;
pub use error::{DiagramError, DiagramResult};
pub use graph::GraphStore;
pub use history::{HistoryManager, Snapshot, DEFAULT_HISTORY_CAPACITY};
pub use interaction::Selection;
pub use interlink::InterlinkIndex;
pub use model::{
    CatalogId, DiagramState, EdgeId, GraphEdge, GraphNode, InterlinkEntry, InterlinkId, KindData,
    Link, NodeId, NodeKind, PairKey, Param, Position, Size,
};
pub use reconcile::{ReconcileReport, Reconciler};
pub use script::{Script, ScriptError, ScriptRunner, Step};
