//! Graph store wrapping petgraph::StableUnGraph with custom NodeId/EdgeId

use crate::error::{DiagramError, DiagramResult};
use crate::model::*;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableUnGraph};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// The requirement graph: an undirected graph with stable indices.
///
/// Owns every node and edge record. Other components read through `&self`
/// accessors and mutate only through the dedicated methods here.
pub struct GraphStore {
    inner: StableUnGraph<GraphNode, GraphEdge>,
    node_slots: HashMap<NodeId, NodeIndex>,
    edge_slots: HashMap<EdgeId, EdgeIndex>,
    next_node: u64,
    next_edge: u64,
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl GraphStore {
    pub fn new() -> Self {
        GraphStore {
            inner: StableUnGraph::default(),
            node_slots: HashMap::new(),
            edge_slots: HashMap::new(),
            next_node: 1,
            next_edge: 1,
        }
    }

    /// Create a node with fresh id and empty kind-specific fields.
    pub fn create_node(
        &mut self,
        kind: NodeKind,
        label: impl Into<String>,
        position: Position,
        links: Vec<Link>,
        size: Option<Size>,
    ) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node = self.next_node.saturating_add(1);
        let node = GraphNode {
            id,
            label: label.into(),
            position,
            size,
            links,
            data: KindData::empty(kind),
        };
        let idx = self.inner.add_node(node);
        self.node_slots.insert(id, idx);
        debug!("created {} node {}", kind, id);
        id
    }

    /// Insert a node record verbatim (restore/import path).
    pub fn insert_node(&mut self, node: GraphNode) -> DiagramResult<()> {
        if node.id.0 > MAX_ID {
            return Err(DiagramError::invalid(format!("node id {} out of range", node.id)));
        }
        if self.node_slots.contains_key(&node.id) {
            return Err(DiagramError::invalid(format!("duplicate node id {}", node.id)));
        }
        self.next_node = self.next_node.max(node.id.0.saturating_add(1));
        let id = node.id;
        let idx = self.inner.add_node(node);
        self.node_slots.insert(id, idx);
        Ok(())
    }

    /// Insert an edge record verbatim. Does not collapse duplicate pairs;
    /// that is left to the reconciler.
    pub fn insert_edge(&mut self, edge: GraphEdge) -> DiagramResult<()> {
        if edge.id.0 > MAX_ID {
            return Err(DiagramError::invalid(format!("edge id {} out of range", edge.id)));
        }
        if edge.a == edge.b {
            return Err(DiagramError::invalid(format!("edge {} is a self connection", edge.id)));
        }
        if self.edge_slots.contains_key(&edge.id) {
            return Err(DiagramError::invalid(format!("duplicate edge id {}", edge.id)));
        }
        let a = self.slot(edge.a)?;
        let b = self.slot(edge.b)?;
        self.next_edge = self.next_edge.max(edge.id.0.saturating_add(1));
        let id = edge.id;
        let idx = self.inner.add_edge(a, b, edge);
        self.edge_slots.insert(id, idx);
        Ok(())
    }

    /// Get a node by ID.
    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.node_slots
            .get(&id)
            .and_then(|idx| self.inner.node_weight(*idx))
    }

    /// Get a node by ID or fail with `NotFound`.
    pub fn require_node(&self, id: NodeId) -> DiagramResult<&GraphNode> {
        self.node(id)
            .ok_or_else(|| DiagramError::not_found(format!("node {id}")))
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.node_slots.contains_key(&id)
    }

    /// Get an edge by ID.
    pub fn edge(&self, id: EdgeId) -> Option<&GraphEdge> {
        self.edge_slots
            .get(&id)
            .and_then(|idx| self.inner.edge_weight(*idx))
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Iterate over all nodes, in no particular order.
    pub fn all_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.inner
            .node_indices()
            .filter_map(move |idx| self.inner.node_weight(idx))
    }

    /// Iterate over all edges, in no particular order.
    pub fn all_edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.inner
            .edge_indices()
            .filter_map(move |idx| self.inner.edge_weight(idx))
    }

    /// All node records sorted by id.
    pub fn sorted_nodes(&self) -> Vec<&GraphNode> {
        let mut nodes: Vec<_> = self.all_nodes().collect();
        nodes.sort_by_key(|n| n.id);
        nodes
    }

    /// All edge records sorted by id, i.e. by creation order.
    pub fn sorted_edges(&self) -> Vec<&GraphEdge> {
        let mut edges: Vec<_> = self.all_edges().collect();
        edges.sort_by_key(|e| e.id);
        edges
    }

    /// Edges incident to a node.
    pub fn edges_of(&self, id: NodeId) -> Vec<&GraphEdge> {
        let Some(idx) = self.node_slots.get(&id) else {
            return Vec::new();
        };
        self.inner
            .edges(*idx)
            .map(|edge_ref| edge_ref.weight())
            .collect()
    }

    /// The earliest edge joining `a` and `b`, if any.
    pub fn find_edge(&self, a: NodeId, b: NodeId) -> Option<EdgeId> {
        self.edges_of(a)
            .into_iter()
            .filter(|e| e.other(a) == b)
            .map(|e| e.id)
            .min()
    }

    pub fn are_connected(&self, a: NodeId, b: NodeId) -> bool {
        self.find_edge(a, b).is_some()
    }

    /// Neighbours of a node, optionally restricted to one kind.
    pub fn neighbors(
        &self,
        id: NodeId,
        kind_filter: Option<NodeKind>,
    ) -> DiagramResult<BTreeSet<NodeId>> {
        self.require_node(id)?;
        Ok(self
            .edges_of(id)
            .into_iter()
            .map(|e| e.other(id))
            .filter(|other| match kind_filter {
                Some(kind) => self.node(*other).is_some_and(|n| n.kind() == kind),
                None => true,
            })
            .collect())
    }

    /// Update a node's position. Returns the previous one.
    pub fn move_node(&mut self, id: NodeId, position: Position) -> DiagramResult<Position> {
        let node = self.node_mut(id)?;
        let previous = node.position;
        node.position = position;
        Ok(previous)
    }

    pub fn set_size(&mut self, id: NodeId, size: Option<Size>) -> DiagramResult<Option<Size>> {
        let node = self.node_mut(id)?;
        Ok(std::mem::replace(&mut node.size, size))
    }

    pub fn set_label(&mut self, id: NodeId, label: impl Into<String>) -> DiagramResult<String> {
        let node = self.node_mut(id)?;
        Ok(std::mem::replace(&mut node.label, label.into()))
    }

    pub fn add_link(&mut self, id: NodeId, link: Link) -> DiagramResult<usize> {
        let node = self.node_mut(id)?;
        node.links.push(link);
        Ok(node.links.len() - 1)
    }

    /// Replace the link at `index`. Returns the old one.
    pub fn replace_link(&mut self, id: NodeId, index: usize, link: Link) -> DiagramResult<Link> {
        let node = self.node_mut(id)?;
        let slot = node
            .links
            .get_mut(index)
            .ok_or_else(|| DiagramError::not_found(format!("link #{index} on node {id}")))?;
        Ok(std::mem::replace(slot, link))
    }

    pub fn remove_link(&mut self, id: NodeId, index: usize) -> DiagramResult<Link> {
        let node = self.node_mut(id)?;
        if index >= node.links.len() {
            return Err(DiagramError::not_found(format!("link #{index} on node {id}")));
        }
        Ok(node.links.remove(index))
    }

    /// Set the design-software reference on a system or component node.
    pub fn set_software(
        &mut self,
        id: NodeId,
        software: Option<CatalogId>,
    ) -> DiagramResult<Option<CatalogId>> {
        let node = self.node_mut(id)?;
        match &mut node.data {
            KindData::System { software_id } | KindData::Component { software_id, .. } => {
                Ok(std::mem::replace(software_id, software))
            }
            KindData::Manufacturing { .. } => Err(DiagramError::invalid(format!(
                "node {id} is a manufacturing node and cannot reference design software"
            ))),
        }
    }

    /// Assign (or clear with `None`) the process a manufacturing node uses
    /// for one of its connected components.
    pub fn set_process_assignment(
        &mut self,
        manufacturing: NodeId,
        component: NodeId,
        process: Option<CatalogId>,
    ) -> DiagramResult<Option<CatalogId>> {
        let target = self.require_node(component)?;
        if !target.is_component() {
            return Err(DiagramError::invalid(format!(
                "node {component} is not a component"
            )));
        }
        let connected = self.are_connected(manufacturing, component);
        let node = self.node_mut(manufacturing)?;
        let KindData::Manufacturing {
            process_assignments,
        } = &mut node.data
        else {
            return Err(DiagramError::invalid(format!(
                "node {manufacturing} is not a manufacturing node"
            )));
        };
        match process {
            Some(_) if !connected => Err(DiagramError::invalid(format!(
                "node {component} is not connected to {manufacturing}"
            ))),
            Some(process) => Ok(process_assignments.insert(component, process)),
            None => Ok(process_assignments.remove(&component)),
        }
    }

    /// Drop process assignments the predicate rejects. Returns how many.
    pub fn retain_process_assignments(
        &mut self,
        manufacturing: NodeId,
        mut keep: impl FnMut(NodeId) -> bool,
    ) -> usize {
        let Ok(node) = self.node_mut(manufacturing) else {
            return 0;
        };
        match &mut node.data {
            KindData::Manufacturing {
                process_assignments,
            } => {
                let before = process_assignments.len();
                process_assignments.retain(|component, _| keep(*component));
                before - process_assignments.len()
            }
            _ => 0,
        }
    }

    /// Record `b` in `a`'s interlink mirror and vice versa.
    pub fn link_interlink(&mut self, a: NodeId, b: NodeId) {
        self.edit_interlink_ids(a, |ids| ids.insert(b));
        self.edit_interlink_ids(b, |ids| ids.insert(a));
    }

    /// Remove each endpoint from the other's interlink mirror.
    pub fn unlink_interlink(&mut self, a: NodeId, b: NodeId) {
        self.edit_interlink_ids(a, |ids| ids.remove(&b));
        self.edit_interlink_ids(b, |ids| ids.remove(&a));
    }

    /// Overwrite a component's interlink mirror. Returns true if it changed.
    pub fn set_interlink_ids(&mut self, id: NodeId, expected: BTreeSet<NodeId>) -> bool {
        self.edit_interlink_ids(id, |ids| {
            if *ids == expected {
                false
            } else {
                *ids = expected;
                true
            }
        })
    }

    fn edit_interlink_ids(
        &mut self,
        id: NodeId,
        edit: impl FnOnce(&mut BTreeSet<NodeId>) -> bool,
    ) -> bool {
        match self.node_mut(id).map(|node| &mut node.data) {
            Ok(KindData::Component { interlink_ids, .. }) => edit(interlink_ids),
            _ => false,
        }
    }

    /// Connect two nodes. Returns the edge id and whether it is new;
    /// an already-connected pair yields its existing edge.
    pub fn connect(&mut self, a: NodeId, b: NodeId) -> DiagramResult<(EdgeId, bool)> {
        if a == b {
            return Err(DiagramError::invalid(format!("cannot connect node {a} to itself")));
        }
        let a_idx = self.slot(a)?;
        let b_idx = self.slot(b)?;
        if let Some(existing) = self.find_edge(a, b) {
            debug!("nodes {} and {} already connected by {}", a, b, existing);
            return Ok((existing, false));
        }
        let id = EdgeId(self.next_edge);
        self.next_edge = self.next_edge.saturating_add(1);
        let idx = self.inner.add_edge(a_idx, b_idx, GraphEdge { id, a, b });
        self.edge_slots.insert(id, idx);
        debug!("connected {} and {} with {}", a, b, id);
        Ok((id, true))
    }

    /// Remove an edge by ID.
    pub fn disconnect(&mut self, id: EdgeId) -> DiagramResult<GraphEdge> {
        let idx = self
            .edge_slots
            .remove(&id)
            .ok_or_else(|| DiagramError::not_found(format!("edge {id}")))?;
        self.inner
            .remove_edge(idx)
            .ok_or_else(|| DiagramError::not_found(format!("edge {id}")))
    }

    /// Remove a node and all its edges. Returns the node and the removed
    /// edges so callers can cascade.
    pub fn remove_node(&mut self, id: NodeId) -> DiagramResult<(GraphNode, Vec<GraphEdge>)> {
        let idx = self.slot(id)?;
        let incident: Vec<GraphEdge> = self
            .inner
            .edges(idx)
            .map(|edge_ref| edge_ref.weight().clone())
            .collect();
        for edge in &incident {
            self.edge_slots.remove(&edge.id);
        }
        self.node_slots.remove(&id);
        let node = self
            .inner
            .remove_node(idx)
            .ok_or_else(|| DiagramError::not_found(format!("node {id}")))?;
        debug!("removed node {} with {} incident edges", id, incident.len());
        Ok((node, incident))
    }

    /// Remove everything. Id counters keep running so ids are never reused.
    pub fn clear(&mut self) {
        self.inner.clear();
        self.node_slots.clear();
        self.edge_slots.clear();
    }

    /// Next ids this store would hand out.
    pub fn id_watermarks(&self) -> (u64, u64) {
        (self.next_node, self.next_edge)
    }

    /// Never allocate ids below the given watermarks.
    pub fn reserve_ids(&mut self, (next_node, next_edge): (u64, u64)) {
        self.next_node = self.next_node.max(next_node);
        self.next_edge = self.next_edge.max(next_edge);
    }

    fn slot(&self, id: NodeId) -> DiagramResult<NodeIndex> {
        self.node_slots
            .get(&id)
            .copied()
            .ok_or_else(|| DiagramError::not_found(format!("node {id}")))
    }

    fn node_mut(&mut self, id: NodeId) -> DiagramResult<&mut GraphNode> {
        let idx = self.slot(id)?;
        self.inner
            .node_weight_mut(idx)
            .ok_or_else(|| DiagramError::not_found(format!("node {id}")))
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}
