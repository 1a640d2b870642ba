//! State diff computation for incremental re-rendering after undo/redo

use crate::model::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What changed between two graph states, for the rendering layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDiff {
    /// Monotonically increasing diff sequence number.
    pub sequence: u64,
    /// Nodes added in this update.
    pub added_nodes: Vec<GraphNode>,
    /// Nodes removed in this update.
    pub removed_nodes: Vec<NodeId>,
    /// Edges added in this update.
    pub added_edges: Vec<GraphEdge>,
    /// Edges removed in this update.
    pub removed_edges: Vec<EdgeId>,
    /// Nodes present in both states whose record changed.
    pub modified_nodes: Vec<NodeId>,
    /// Component pairs whose shared params changed.
    pub modified_interlinks: Vec<InterlinkId>,
}

impl GraphDiff {
    /// Create an empty diff with given sequence number.
    pub fn new(sequence: u64) -> Self {
        GraphDiff {
            sequence,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
            added_edges: Vec::new(),
            removed_edges: Vec::new(),
            modified_nodes: Vec::new(),
            modified_interlinks: Vec::new(),
        }
    }

    /// Check if this diff is empty (no changes).
    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty()
            && self.removed_nodes.is_empty()
            && self.added_edges.is_empty()
            && self.removed_edges.is_empty()
            && self.modified_nodes.is_empty()
            && self.modified_interlinks.is_empty()
    }
}

/// Hands out diffs with increasing sequence numbers.
pub struct DiffEngine {
    sequence: u64,
}

impl DiffEngine {
    pub fn new() -> Self {
        DiffEngine { sequence: 0 }
    }

    /// Compute the difference between two graph states.
    /// Returns a GraphDiff with the sequence number incremented.
    pub fn compute_diff(&mut self, old: &DiagramState, new: &DiagramState) -> GraphDiff {
        self.sequence += 1;
        let mut diff = GraphDiff::new(self.sequence);

        let old_nodes: BTreeMap<NodeId, &GraphNode> = old.nodes.iter().map(|n| (n.id, n)).collect();
        let new_nodes: BTreeMap<NodeId, &GraphNode> = new.nodes.iter().map(|n| (n.id, n)).collect();

        for (id, node) in &new_nodes {
            match old_nodes.get(id) {
                None => diff.added_nodes.push((*node).clone()),
                Some(previous) if previous != node => diff.modified_nodes.push(*id),
                Some(_) => {}
            }
        }
        diff.removed_nodes = old_nodes
            .keys()
            .filter(|id| !new_nodes.contains_key(*id))
            .copied()
            .collect();

        let old_edges: BTreeMap<EdgeId, &GraphEdge> = old.edges.iter().map(|e| (e.id, e)).collect();
        let new_edges: BTreeMap<EdgeId, &GraphEdge> = new.edges.iter().map(|e| (e.id, e)).collect();

        diff.added_edges = new_edges
            .iter()
            .filter(|(id, _)| !old_edges.contains_key(*id))
            .map(|(_, edge)| (*edge).clone())
            .collect();
        diff.removed_edges = old_edges
            .keys()
            .filter(|id| !new_edges.contains_key(*id))
            .copied()
            .collect();

        let old_params: BTreeMap<PairKey, &InterlinkEntry> =
            old.interlinks.iter().map(|i| (i.pair(), i)).collect();
        diff.modified_interlinks = new
            .interlinks
            .iter()
            .filter(|entry| {
                old_params
                    .get(&entry.pair())
                    .is_some_and(|previous| previous.params != entry.params)
            })
            .map(|entry| entry.id)
            .collect();

        diff
    }

    /// Get current sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u64, label: &str) -> GraphNode {
        GraphNode {
            id: NodeId(id),
            label: label.to_string(),
            position: Position::default(),
            size: None,
            links: vec![],
            data: KindData::empty(NodeKind::Component),
        }
    }

    #[test]
    fn test_diff_classifies_changes() {
        let old = DiagramState {
            nodes: vec![node(1, "A"), node(2, "B")],
            edges: vec![GraphEdge { id: EdgeId(1), a: NodeId(1), b: NodeId(2) }],
            interlinks: vec![],
        };
        let new = DiagramState {
            nodes: vec![node(1, "A renamed"), node(3, "C")],
            edges: vec![],
            interlinks: vec![],
        };

        let mut engine = DiffEngine::new();
        let diff = engine.compute_diff(&old, &new);
        assert_eq!(diff.sequence, 1);
        assert_eq!(diff.added_nodes.len(), 1);
        assert_eq!(diff.added_nodes[0].id, NodeId(3));
        assert_eq!(diff.removed_nodes, vec![NodeId(2)]);
        assert_eq!(diff.modified_nodes, vec![NodeId(1)]);
        assert_eq!(diff.removed_edges, vec![EdgeId(1)]);

        let again = engine.compute_diff(&new, &new);
        assert!(again.is_empty());
        assert_eq!(again.sequence, 2);
    }
}
