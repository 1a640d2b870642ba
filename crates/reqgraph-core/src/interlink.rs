//! Interlink index: shared parameters for component-to-component edges
//!
//! An entry for `{a, b}` exists exactly when an edge joins `a` and `b` and
//! both are components. Parameters belong to the pair, not to either node,
//! so there is one copy and nothing to keep in step.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::{DiagramError, DiagramResult};
use crate::graph::GraphStore;
use crate::model::{GraphEdge, InterlinkEntry, InterlinkId, NodeId, PairKey, Param, MAX_ID};

#[derive(Debug, Clone)]
pub struct InterlinkIndex {
    entries: BTreeMap<PairKey, InterlinkEntry>,
    next_id: u64,
}

impl InterlinkIndex {
    pub fn new() -> Self {
        InterlinkIndex {
            entries: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Build an index from carried records. The first record for a pair
    /// wins; returns the index and how many later duplicates were dropped.
    pub fn load(records: Vec<InterlinkEntry>) -> (Self, usize) {
        let mut index = Self::new();
        let mut collapsed = 0;
        for record in records {
            if record.id.0 > MAX_ID {
                collapsed += 1;
                continue;
            }
            index.next_id = index.next_id.max(record.id.0 + 1);
            let pair = record.pair();
            if pair.lo == pair.hi || index.entries.contains_key(&pair) {
                collapsed += 1;
                continue;
            }
            index.entries.insert(pair, record);
        }
        (index, collapsed)
    }

    /// Keep the index and node mirrors in step with one edge change.
    /// Returns true if the index changed.
    pub fn sync(&mut self, store: &mut GraphStore, edge: &GraphEdge, created: bool) -> bool {
        let pair = edge.pair();
        if created {
            let both_components = [edge.a, edge.b]
                .iter()
                .all(|id| store.node(*id).is_some_and(|n| n.is_component()));
            if !both_components {
                return false;
            }
            store.link_interlink(edge.a, edge.b);
            if self.entries.contains_key(&pair) {
                return false;
            }
            let id = self.insert_empty(pair);
            debug!("interlink {} created for {}", id, pair);
            true
        } else {
            store.unlink_interlink(edge.a, edge.b);
            match self.entries.remove(&pair) {
                Some(entry) => {
                    debug!("interlink {} removed for {}", entry.id, pair);
                    true
                }
                None => false,
            }
        }
    }

    pub fn entry(&self, a: NodeId, b: NodeId) -> Option<&InterlinkEntry> {
        self.entries.get(&PairKey::new(a, b))
    }

    pub fn contains(&self, a: NodeId, b: NodeId) -> bool {
        self.entries.contains_key(&PairKey::new(a, b))
    }

    /// Parameters for a pair; empty when there is no entry.
    pub fn params(&self, a: NodeId, b: NodeId) -> Vec<Param> {
        self.entry(a, b)
            .map(|entry| entry.params.clone())
            .unwrap_or_default()
    }

    /// Replace a pair's whole parameter list. Returns the previous list.
    pub fn set_params(
        &mut self,
        a: NodeId,
        b: NodeId,
        params: Vec<Param>,
    ) -> DiagramResult<Vec<Param>> {
        let pair = PairKey::new(a, b);
        let entry = self
            .entries
            .get_mut(&pair)
            .ok_or_else(|| DiagramError::not_found(format!("interlink for {pair}")))?;
        Ok(std::mem::replace(&mut entry.params, params))
    }

    /// All entries ordered by pair.
    pub fn entries(&self) -> impl Iterator<Item = &InterlinkEntry> {
        self.entries.values()
    }

    pub fn pairs(&self) -> impl Iterator<Item = PairKey> + '_ {
        self.entries.keys().copied()
    }

    /// Component nodes sharing an interlink with `node`.
    pub fn partners(&self, node: NodeId) -> BTreeSet<NodeId> {
        self.entries
            .keys()
            .filter(|pair| pair.contains(node))
            .map(|pair| if pair.lo == node { pair.hi } else { pair.lo })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn reserve_ids(&mut self, next_id: u64) {
        self.next_id = self.next_id.max(next_id);
    }

    pub(crate) fn insert_empty(&mut self, pair: PairKey) -> InterlinkId {
        let id = InterlinkId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.entries.insert(
            pair,
            InterlinkEntry {
                id,
                a: pair.lo,
                b: pair.hi,
                params: Vec::new(),
            },
        );
        id
    }

    /// Drop entries the predicate rejects; returns the dropped entries.
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(PairKey) -> bool) -> Vec<InterlinkEntry> {
        let doomed: Vec<PairKey> = self.pairs().filter(|pair| !keep(*pair)).collect();
        doomed
            .into_iter()
            .filter_map(|pair| self.entries.remove(&pair))
            .collect()
    }
}

impl Default for InterlinkIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeKind, Position};

    fn components(store: &mut GraphStore, n: usize) -> Vec<NodeId> {
        (0..n)
            .map(|i| store.create_node(NodeKind::Component, format!("C{i}"), Position::default(), vec![], None))
            .collect()
    }

    #[test]
    fn test_sync_creates_entry_and_mirrors() {
        let mut store = GraphStore::new();
        let mut index = InterlinkIndex::new();
        let ids = components(&mut store, 2);
        let (edge_id, _) = store.connect(ids[0], ids[1]).unwrap();
        let edge = store.edge(edge_id).unwrap().clone();

        assert!(index.sync(&mut store, &edge, true));
        assert!(!index.sync(&mut store, &edge, true));
        assert_eq!(index.len(), 1);
        assert!(index.params(ids[1], ids[0]).is_empty());
        assert!(store.node(ids[0]).unwrap().interlink_ids().unwrap().contains(&ids[1]));
        assert!(store.node(ids[1]).unwrap().interlink_ids().unwrap().contains(&ids[0]));
    }

    #[test]
    fn test_sync_ignores_non_component_pairs() {
        let mut store = GraphStore::new();
        let mut index = InterlinkIndex::new();
        let c = components(&mut store, 1)[0];
        let s = store.create_node(NodeKind::System, "S", Position::default(), vec![], None);
        let (edge_id, _) = store.connect(s, c).unwrap();
        let edge = store.edge(edge_id).unwrap().clone();

        assert!(!index.sync(&mut store, &edge, true));
        assert!(index.is_empty());
        assert!(store.node(c).unwrap().interlink_ids().unwrap().is_empty());
    }

    #[test]
    fn test_sync_removal_scrubs_mirrors() {
        let mut store = GraphStore::new();
        let mut index = InterlinkIndex::new();
        let ids = components(&mut store, 2);
        let (edge_id, _) = store.connect(ids[0], ids[1]).unwrap();
        let edge = store.edge(edge_id).unwrap().clone();
        index.sync(&mut store, &edge, true);

        let removed = store.disconnect(edge_id).unwrap();
        assert!(index.sync(&mut store, &removed, false));
        assert!(index.is_empty());
        assert!(store.node(ids[0]).unwrap().interlink_ids().unwrap().is_empty());
    }

    #[test]
    fn test_set_params_requires_entry() {
        let mut index = InterlinkIndex::new();
        let err = index
            .set_params(NodeId(1), NodeId(2), vec![Param::new("k", "v")])
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_params_keep_order_and_duplicate_keys() {
        let mut index = InterlinkIndex::new();
        index.insert_empty(PairKey::new(NodeId(1), NodeId(2)));
        let params = vec![
            Param::new("tolerance", "0.2mm"),
            Param::new("material", "steel"),
            Param::new("tolerance", "0.1mm"),
        ];
        index.set_params(NodeId(2), NodeId(1), params.clone()).unwrap();
        assert_eq!(index.params(NodeId(1), NodeId(2)), params);
    }

    #[test]
    fn test_load_collapses_duplicate_pairs() {
        let first = InterlinkEntry {
            id: InterlinkId(3),
            a: NodeId(1),
            b: NodeId(2),
            params: vec![Param::new("k", "first")],
        };
        let second = InterlinkEntry {
            id: InterlinkId(7),
            a: NodeId(2),
            b: NodeId(1),
            params: vec![Param::new("k", "second")],
        };
        let (index, collapsed) = InterlinkIndex::load(vec![first, second]);
        assert_eq!(collapsed, 1);
        assert_eq!(index.len(), 1);
        assert_eq!(index.params(NodeId(1), NodeId(2))[0].value, "first");
        assert_eq!(index.next_id(), 8);
    }
}
