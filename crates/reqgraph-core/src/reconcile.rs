//! Structural integrity pass over the graph store and interlink index
//!
//! Every delete path and every restore ends in [`Reconciler::run`], so the
//! cascade lives in one place. Both passes are idempotent.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::graph::GraphStore;
use crate::interlink::InterlinkIndex;
use crate::model::{DiagramState, EdgeId, InterlinkId, MAX_ID, NodeId, NodeKind, PairKey};

/// What a reconcile pass had to repair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Later edges for an already-connected pair.
    pub duplicate_edges: Vec<EdgeId>,
    /// Edges that were self connections or referenced missing nodes.
    pub orphan_edges: Vec<EdgeId>,
    /// Node records skipped because their id was already taken.
    pub duplicate_nodes: Vec<NodeId>,
    /// Interlink records dropped because their pair already had one.
    pub duplicate_interlinks: usize,
    /// Interlinks whose edge or component endpoints are gone.
    pub stale_interlinks: Vec<InterlinkId>,
    /// Component pairs that had an edge but no interlink.
    pub missing_interlinks: usize,
    /// Components whose interlink mirror had to be rewritten.
    pub repaired_mirrors: usize,
    /// Process assignments pointing at missing or disconnected components.
    pub scrubbed_assignments: usize,
    /// Records dropped because their id is above [`MAX_ID`].
    pub out_of_range_ids: Vec<String>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        *self == ReconcileReport::default()
    }

    pub fn merge(&mut self, other: ReconcileReport) {
        self.duplicate_edges.extend(other.duplicate_edges);
        self.orphan_edges.extend(other.orphan_edges);
        self.duplicate_nodes.extend(other.duplicate_nodes);
        self.duplicate_interlinks += other.duplicate_interlinks;
        self.stale_interlinks.extend(other.stale_interlinks);
        self.missing_interlinks += other.missing_interlinks;
        self.repaired_mirrors += other.repaired_mirrors;
        self.scrubbed_assignments += other.scrubbed_assignments;
        self.out_of_range_ids.extend(other.out_of_range_ids);
    }
}

/// Id counters that must survive a full restore so ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IdWatermarks {
    pub node: u64,
    pub edge: u64,
    pub interlink: u64,
}

impl IdWatermarks {
    pub fn of(store: &GraphStore, index: &InterlinkIndex) -> Self {
        let (node, edge) = store.id_watermarks();
        IdWatermarks {
            node,
            edge,
            interlink: index.next_id(),
        }
    }
}

fn is_component(store: &GraphStore, id: NodeId) -> bool {
    store.node(id).is_some_and(|n| n.is_component())
}

fn keep_id(raw: u64, id: impl std::fmt::Display, dropped: &mut Vec<String>) -> bool {
    let keep = raw <= MAX_ID;
    if !keep {
        dropped.push(id.to_string());
    }
    keep
}

pub struct Reconciler;

impl Reconciler {
    /// Collapse duplicate edges, prune stale interlinks, rebuild missing
    /// ones, and scrub node back-references.
    pub fn run(store: &mut GraphStore, index: &mut InterlinkIndex) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        // Earliest edge per pair survives.
        let mut seen = HashSet::new();
        let edges: Vec<_> = store.sorted_edges().into_iter().cloned().collect();
        for edge in edges {
            if !seen.insert(edge.pair()) && store.disconnect(edge.id).is_ok() {
                report.duplicate_edges.push(edge.id);
            }
        }

        report.stale_interlinks = index
            .retain(|pair| {
                is_component(store, pair.lo)
                    && is_component(store, pair.hi)
                    && store.are_connected(pair.lo, pair.hi)
            })
            .into_iter()
            .map(|entry| entry.id)
            .collect();

        let missing: Vec<PairKey> = store
            .sorted_edges()
            .into_iter()
            .map(|edge| edge.pair())
            .filter(|pair| {
                is_component(store, pair.lo)
                    && is_component(store, pair.hi)
                    && !index.contains(pair.lo, pair.hi)
            })
            .collect();
        for pair in missing {
            index.insert_empty(pair);
            report.missing_interlinks += 1;
        }

        let nodes: Vec<(NodeId, NodeKind)> =
            store.sorted_nodes().iter().map(|n| (n.id, n.kind())).collect();
        for (id, kind) in nodes {
            match kind {
                NodeKind::Component => {
                    if store.set_interlink_ids(id, index.partners(id)) {
                        report.repaired_mirrors += 1;
                    }
                }
                NodeKind::Manufacturing => {
                    let allowed = store
                        .neighbors(id, Some(NodeKind::Component))
                        .unwrap_or_default();
                    report.scrubbed_assignments +=
                        store.retain_process_assignments(id, |c| allowed.contains(&c));
                }
                NodeKind::System => {}
            }
        }

        if !report.is_clean() {
            debug!("reconcile pass: {:?}", report);
        }
        report
    }

    /// Drop raw records that cannot be loaded: ids above [`MAX_ID`],
    /// duplicate node ids, and edges that are self connections, reuse an
    /// edge id, or dangle.
    pub fn prune_records(state: &mut DiagramState) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let out_of_range = &mut report.out_of_range_ids;
        state.nodes.retain(|node| keep_id(node.id.0, node.id, out_of_range));
        state.edges.retain(|edge| keep_id(edge.id.0, edge.id, out_of_range));
        state
            .interlinks
            .retain(|entry| keep_id(entry.id.0, entry.id, out_of_range));

        let mut node_ids = HashSet::new();
        state.nodes.retain(|node| {
            let fresh = node_ids.insert(node.id);
            if !fresh {
                report.duplicate_nodes.push(node.id);
            }
            fresh
        });

        let mut edge_ids = HashSet::new();
        state.edges.retain(|edge| {
            let valid = edge.a != edge.b
                && node_ids.contains(&edge.a)
                && node_ids.contains(&edge.b)
                && edge_ids.insert(edge.id);
            if !valid {
                report.orphan_edges.push(edge.id);
            }
            valid
        });

        report
    }

    /// Build a consistent store and index from raw state.
    pub fn load(
        mut state: DiagramState,
        watermarks: IdWatermarks,
    ) -> (GraphStore, InterlinkIndex, ReconcileReport) {
        let mut report = Self::prune_records(&mut state);

        let mut store = GraphStore::new();
        store.reserve_ids((watermarks.node, watermarks.edge));
        for node in state.nodes {
            let id = node.id;
            if let Err(err) = store.insert_node(node) {
                warn!("skipping node {}: {}", id, err);
                report.duplicate_nodes.push(id);
            }
        }
        for edge in state.edges {
            let id = edge.id;
            if let Err(err) = store.insert_edge(edge) {
                warn!("skipping edge {}: {}", id, err);
                report.orphan_edges.push(id);
            }
        }

        let (mut index, collapsed) = InterlinkIndex::load(state.interlinks);
        index.reserve_ids(watermarks.interlink);
        report.duplicate_interlinks += collapsed;

        report.merge(Self::run(&mut store, &mut index));
        (store, index, report)
    }
}
