//! Diagram engine: the public surface the UI layer drives
//!
//! Every operation that changes persisted state ends in exactly one history
//! checkpoint. Queries, in-flight drag moves and rejected operations never
//! checkpoint.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::catalog::{CatalogEntry, Catalogs};
use crate::config::{EngineConfig, NodeDefaults};
use crate::diff::{DiffEngine, GraphDiff};
use crate::error::{DiagramError, DiagramResult};
use crate::graph::GraphStore;
use crate::history::HistoryManager;
use crate::interaction::{MoveGesture, Selection};
use crate::interlink::InterlinkIndex;
use crate::model::*;
use crate::reconcile::{IdWatermarks, ReconcileReport, Reconciler};

pub struct DiagramEngine {
    store: GraphStore,
    interlinks: InterlinkIndex,
    history: HistoryManager,
    catalogs: Catalogs,
    defaults: NodeDefaults,
    selection: Selection,
    gesture: Option<MoveGesture>,
    diffs: DiffEngine,
}

impl std::fmt::Debug for DiagramEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagramEngine")
            .field("store", &self.store)
            .field("interlinks", &self.interlinks.len())
            .field("history_len", &self.history.len())
            .field("history_index", &self.history.index())
            .finish()
    }
}

impl DiagramEngine {
    /// Engine with default configuration and empty catalogs.
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    /// Engine whose catalogs come from the config's tables.
    pub fn with_config(config: &EngineConfig) -> Self {
        Self::with_catalogs(config, config.catalogs())
    }

    /// Engine referring into externally owned catalogs. Records the empty
    /// baseline as the first snapshot.
    pub fn with_catalogs(config: &EngineConfig, catalogs: Catalogs) -> Self {
        let mut engine = DiagramEngine {
            store: GraphStore::new(),
            interlinks: InterlinkIndex::new(),
            history: HistoryManager::new(config.history.capacity),
            catalogs,
            defaults: config.nodes.clone(),
            selection: Selection::default(),
            gesture: None,
            diffs: DiffEngine::new(),
        };
        engine.commit("baseline");
        engine
    }

    // ── Queries ─────────────────────────────────────────────

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn interlink_index(&self) -> &InterlinkIndex {
        &self.interlinks
    }

    /// All nodes, ordered by id.
    pub fn nodes(&self) -> Vec<&GraphNode> {
        self.store.sorted_nodes()
    }

    /// All edges, ordered by creation.
    pub fn edges(&self) -> Vec<&GraphEdge> {
        self.store.sorted_edges()
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.store.node(id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&GraphEdge> {
        self.store.edge(id)
    }

    pub fn find_edge(&self, a: NodeId, b: NodeId) -> Option<EdgeId> {
        self.store.find_edge(a, b)
    }

    pub fn neighbors(
        &self,
        id: NodeId,
        kind_filter: Option<NodeKind>,
    ) -> DiagramResult<BTreeSet<NodeId>> {
        self.store.neighbors(id, kind_filter)
    }

    pub fn interlink_params(&self, a: NodeId, b: NodeId) -> Vec<Param> {
        self.interlinks.params(a, b)
    }

    pub fn interlinks(&self) -> impl Iterator<Item = &InterlinkEntry> {
        self.interlinks.entries()
    }

    /// Raw process id assigned to a component on a manufacturing node.
    pub fn process_assignment_id(&self, manufacturing: NodeId, component: NodeId) -> Option<&str> {
        self.store
            .node(manufacturing)?
            .process_assignments()?
            .get(&component)
            .map(String::as_str)
    }

    /// Catalog entry for an assignment; `None` when unassigned or stale.
    pub fn process_assignment(
        &self,
        manufacturing: NodeId,
        component: NodeId,
    ) -> Option<&CatalogEntry> {
        let id = self.process_assignment_id(manufacturing, component)?;
        self.catalogs.processes.lookup(id)
    }

    pub fn software_assignment_id(&self, node: NodeId) -> Option<&str> {
        self.store.node(node)?.software_id()
    }

    /// Catalog entry for a node's software; `None` when unassigned or stale.
    pub fn software_assignment(&self, node: NodeId) -> Option<&CatalogEntry> {
        let id = self.software_assignment_id(node)?;
        self.catalogs.software.lookup(id)
    }

    pub fn catalogs(&self) -> &Catalogs {
        &self.catalogs
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn history_index(&self) -> usize {
        self.history.index()
    }

    pub fn history_labels(&self) -> Vec<&str> {
        self.history.labels()
    }

    /// Serializable copy of the whole graph.
    pub fn export_state(&self) -> DiagramState {
        DiagramState {
            nodes: self.store.sorted_nodes().into_iter().cloned().collect(),
            edges: self.store.sorted_edges().into_iter().cloned().collect(),
            interlinks: self.interlinks.entries().cloned().collect(),
        }
    }

    // ── Node edits ──────────────────────────────────────────

    pub fn create_node(
        &mut self,
        kind: NodeKind,
        label: impl Into<String>,
        position: Position,
    ) -> NodeId {
        let id = self.store.create_node(
            kind,
            label,
            position,
            self.defaults.default_links.clone(),
            self.defaults.default_size,
        );
        self.commit("create node");
        id
    }

    /// Start a drag gesture on a node without moving it yet.
    pub fn begin_move(&mut self, id: NodeId) -> DiagramResult<()> {
        let origin = self.store.require_node(id)?.position;
        self.gesture
            .get_or_insert_with(MoveGesture::default)
            .track(id, origin);
        Ok(())
    }

    /// In-flight drag update. Never checkpoints; joins or starts the
    /// current gesture.
    pub fn move_node(&mut self, id: NodeId, position: Position) -> DiagramResult<()> {
        self.begin_move(id)?;
        self.store.move_node(id, position)?;
        Ok(())
    }

    /// End the drag gesture. Commits one checkpoint iff some node moved.
    pub fn end_move(&mut self) -> bool {
        let Some(gesture) = self.gesture.take() else {
            return false;
        };
        if gesture.has_net_movement(&self.store) {
            self.commit("move node")
        } else {
            debug!("move gesture ended without net movement");
            false
        }
    }

    /// Abort the drag gesture, putting nodes back where it started.
    pub fn cancel_move(&mut self) {
        let Some(gesture) = self.gesture.take() else {
            return;
        };
        for (id, origin) in gesture.into_origins() {
            if let Ok(previous) = self.store.move_node(id, origin) {
                debug!("move of {} cancelled, {:?} -> {:?}", id, previous, origin);
            }
        }
    }

    /// One-shot committed move, e.g. from a keyboard nudge.
    pub fn place_node(&mut self, id: NodeId, position: Position) -> DiagramResult<bool> {
        let previous = self.store.move_node(id, position)?;
        Ok(previous != position && self.commit("place node"))
    }

    pub fn resize_node(&mut self, id: NodeId, size: Option<Size>) -> DiagramResult<bool> {
        let previous = self.store.set_size(id, size)?;
        Ok(previous != size && self.commit("resize node"))
    }

    pub fn rename_node(&mut self, id: NodeId, label: impl Into<String>) -> DiagramResult<bool> {
        let label = label.into();
        let previous = self.store.set_label(id, label.clone())?;
        Ok(previous != label && self.commit("rename node"))
    }

    pub fn add_link(&mut self, id: NodeId, link: Link) -> DiagramResult<usize> {
        let index = self.store.add_link(id, link)?;
        self.commit("add link");
        Ok(index)
    }

    /// Replace the link at `index` on a node.
    pub fn edit_link(&mut self, id: NodeId, index: usize, link: Link) -> DiagramResult<bool> {
        let previous = self.store.replace_link(id, index, link.clone())?;
        Ok(previous != link && self.commit("edit link"))
    }

    pub fn remove_link(&mut self, id: NodeId, index: usize) -> DiagramResult<Link> {
        let removed = self.store.remove_link(id, index)?;
        self.commit("remove link");
        Ok(removed)
    }

    pub fn set_software_assignment(
        &mut self,
        id: NodeId,
        software: Option<CatalogId>,
    ) -> DiagramResult<bool> {
        let previous = self.store.set_software(id, software.clone())?;
        Ok(previous != software && self.commit("set software"))
    }

    pub fn set_process_assignment(
        &mut self,
        manufacturing: NodeId,
        component: NodeId,
        process: Option<CatalogId>,
    ) -> DiagramResult<bool> {
        let previous = self
            .store
            .set_process_assignment(manufacturing, component, process.clone())?;
        Ok(previous != process && self.commit("set process"))
    }

    /// Delete a node and everything that referenced it.
    pub fn delete_node(&mut self, id: NodeId) -> DiagramResult<()> {
        let (node, incident) = self.store.remove_node(id)?;
        let report = Reconciler::run(&mut self.store, &mut self.interlinks);
        if let Some(gesture) = self.gesture.as_mut() {
            gesture.forget(id);
        }
        self.selection.retain_valid(&self.store);
        info!(
            "deleted {} node {} ({} edges, {} interlinks)",
            node.kind(),
            id,
            incident.len(),
            report.stale_interlinks.len()
        );
        self.commit("delete node");
        Ok(())
    }

    // ── Edges and interlinks ────────────────────────────────

    /// Connect two nodes. An already-connected pair returns its existing
    /// edge and records nothing.
    pub fn connect_nodes(&mut self, a: NodeId, b: NodeId) -> DiagramResult<EdgeId> {
        let (edge_id, created) = self.store.connect(a, b)?;
        if created {
            if let Some(edge) = self.store.edge(edge_id).cloned() {
                self.interlinks.sync(&mut self.store, &edge, true);
            }
            self.commit("connect nodes");
        }
        Ok(edge_id)
    }

    pub fn disconnect_edge(&mut self, id: EdgeId) -> DiagramResult<()> {
        let edge = self.store.disconnect(id)?;
        self.interlinks.sync(&mut self.store, &edge, false);
        Reconciler::run(&mut self.store, &mut self.interlinks);
        self.selection.retain_valid(&self.store);
        debug!("disconnected {} from {}", edge.a, edge.b);
        self.commit("disconnect edge");
        Ok(())
    }

    /// Replace the shared parameters of a connected component pair.
    pub fn set_interlink_params(
        &mut self,
        a: NodeId,
        b: NodeId,
        params: Vec<Param>,
    ) -> DiagramResult<bool> {
        let previous = self.interlinks.set_params(a, b, params.clone())?;
        Ok(previous != params && self.commit("set interlink params"))
    }

    /// Open the parameter editor for two components, connecting them first
    /// if needed.
    pub fn open_interlink(&mut self, a: NodeId, b: NodeId) -> DiagramResult<Vec<Param>> {
        for id in [a, b] {
            if !self.store.require_node(id)?.is_component() {
                return Err(DiagramError::invalid(format!(
                    "interlink parameters need two components, {id} is not one"
                )));
            }
        }
        if !self.interlinks.contains(a, b) {
            self.connect_nodes(a, b)?;
        }
        Ok(self.interlinks.params(a, b))
    }

    // ── Selection ───────────────────────────────────────────

    /// Click a node: select it, and either arm it as connection source or,
    /// if another node is armed, connect the two. Returns the edge when a
    /// connection was made.
    pub fn click_node(&mut self, id: NodeId) -> DiagramResult<Option<EdgeId>> {
        self.store.require_node(id)?;
        let edge = match self.selection.connection_source {
            None => {
                self.selection.connection_source = Some(id);
                None
            }
            Some(source) if source == id => None,
            Some(source) => {
                let edge = self.connect_nodes(source, id)?;
                self.selection.connection_source = None;
                Some(edge)
            }
        };
        self.selection.node = Some(id);
        self.selection.edge = None;
        Ok(edge)
    }

    pub fn select_edge(&mut self, id: EdgeId) -> DiagramResult<()> {
        if self.store.edge(id).is_none() {
            return Err(DiagramError::not_found(format!("edge {id}")));
        }
        self.selection.edge = Some(id);
        self.selection.node = None;
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Delete the selected node, or else disconnect the selected edge.
    /// Returns false when nothing was selected.
    pub fn delete_selection(&mut self) -> DiagramResult<bool> {
        if let Some(node) = self.selection.node {
            self.delete_node(node)?;
            self.selection.node = None;
            return Ok(true);
        }
        if let Some(edge) = self.selection.edge {
            self.disconnect_edge(edge)?;
            self.selection.edge = None;
            return Ok(true);
        }
        Ok(false)
    }

    // ── History and whole-state operations ──────────────────

    /// Step back one snapshot. `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Option<GraphDiff> {
        let state = self.history.undo()?.state.clone();
        info!("undo to snapshot {}", self.history.index());
        Some(self.restore(state))
    }

    /// Step forward one snapshot. `None` when there is nothing to redo.
    pub fn redo(&mut self) -> Option<GraphDiff> {
        let state = self.history.redo()?.state.clone();
        info!("redo to snapshot {}", self.history.index());
        Some(self.restore(state))
    }

    /// Remove every node, edge and interlink.
    pub fn clear_all(&mut self) -> bool {
        if self.store.node_count() == 0 && self.interlinks.is_empty() {
            return false;
        }
        info!("clearing {} nodes", self.store.node_count());
        self.store.clear();
        self.interlinks.clear();
        self.selection.clear();
        self.gesture = None;
        self.commit("clear all")
    }

    /// Replace the whole graph with `state`, repairing what it must.
    pub fn import_state(&mut self, state: DiagramState) -> ReconcileReport {
        info!(
            "importing {} nodes, {} edges",
            state.nodes.len(),
            state.edges.len()
        );
        let report = self.replace_state(state, "import");
        if !report.is_clean() {
            warn!("imported state needed repairs: {:?}", report);
        }
        report
    }

    fn restore(&mut self, state: DiagramState) -> GraphDiff {
        let before = self.export_state();
        self.history.begin_restore();
        let report = self.replace_state(state, "restore");
        self.history.end_restore();
        if !report.is_clean() {
            warn!("restored snapshot needed repairs: {:?}", report);
        }
        let after = self.export_state();
        self.diffs.compute_diff(&before, &after)
    }

    /// Shared load path for import and restore. The trailing checkpoint is
    /// suppressed by the history manager while restoring.
    fn replace_state(&mut self, state: DiagramState, label: &str) -> ReconcileReport {
        let watermarks = IdWatermarks::of(&self.store, &self.interlinks);
        let (store, interlinks, report) = Reconciler::load(state, watermarks);
        self.store = store;
        self.interlinks = interlinks;
        self.gesture = None;
        self.selection.retain_valid(&self.store);
        self.commit(label);
        report
    }

    fn commit(&mut self, label: &str) -> bool {
        let state = self.export_state();
        let recorded = self.history.checkpoint(state, label);
        if recorded {
            debug!(
                "checkpoint `{}` ({} of {})",
                label,
                self.history.index() + 1,
                self.history.len()
            );
        }
        recorded
    }
}

impl Default for DiagramEngine {
    fn default() -> Self {
        Self::new()
    }
}
