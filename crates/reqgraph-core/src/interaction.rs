//! Click selection and in-flight move gestures

use std::collections::BTreeMap;

use serde::Serialize;

use crate::graph::GraphStore;
use crate::model::{EdgeId, NodeId, Position};

/// What the user has clicked. Mirrors the UI's state so the engine can
/// drop references that a delete, undo or import made stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub node: Option<NodeId>,
    pub edge: Option<EdgeId>,
    /// First node of a click-to-connect pair, waiting for the second click.
    pub connection_source: Option<NodeId>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.node.is_none() && self.edge.is_none() && self.connection_source.is_none()
    }

    pub fn clear(&mut self) {
        *self = Selection::default();
    }

    /// Forget anything that no longer resolves in `store`. Returns true if
    /// a reference was dropped.
    pub fn retain_valid(&mut self, store: &GraphStore) -> bool {
        let before = *self;
        self.node = self.node.filter(|id| store.contains_node(*id));
        self.connection_source = self.connection_source.filter(|id| store.contains_node(*id));
        self.edge = self.edge.filter(|id| store.edge(*id).is_some());
        before != *self
    }
}

/// Start positions of every node touched by the current drag, so the
/// gesture can commit once at the end, or not at all if nothing moved.
#[derive(Debug, Clone, Default)]
pub struct MoveGesture {
    origins: BTreeMap<NodeId, Position>,
}

impl MoveGesture {
    /// Remember where `id` started. Later calls for the same node keep the
    /// first origin.
    pub fn track(&mut self, id: NodeId, origin: Position) {
        self.origins.entry(id).or_insert(origin);
    }

    pub fn forget(&mut self, id: NodeId) {
        self.origins.remove(&id);
    }

    pub fn is_tracking(&self, id: NodeId) -> bool {
        self.origins.contains_key(&id)
    }

    /// Whether any tracked node ended up somewhere other than its origin.
    pub fn has_net_movement(&self, store: &GraphStore) -> bool {
        self.origins
            .iter()
            .any(|(id, origin)| store.node(*id).is_some_and(|n| n.position != *origin))
    }

    pub fn into_origins(self) -> BTreeMap<NodeId, Position> {
        self.origins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeKind;

    #[test]
    fn test_retain_valid_drops_deleted_references() {
        let mut store = GraphStore::new();
        let a = store.create_node(NodeKind::System, "A", Position::default(), vec![], None);
        let b = store.create_node(NodeKind::System, "B", Position::default(), vec![], None);
        let (edge, _) = store.connect(a, b).unwrap();
        let mut selection = Selection {
            node: Some(b),
            edge: Some(edge),
            connection_source: Some(a),
        };

        assert!(!selection.retain_valid(&store));
        store.remove_node(b).unwrap();
        assert!(selection.retain_valid(&store));
        assert_eq!(selection.node, None);
        assert_eq!(selection.edge, None);
        assert_eq!(selection.connection_source, Some(a));
    }

    #[test]
    fn test_gesture_keeps_first_origin() {
        let mut store = GraphStore::new();
        let a = store.create_node(NodeKind::Component, "A", Position::new(1.0, 1.0), vec![], None);
        let mut gesture = MoveGesture::default();
        gesture.track(a, Position::new(1.0, 1.0));
        store.move_node(a, Position::new(5.0, 5.0)).unwrap();
        gesture.track(a, Position::new(5.0, 5.0));
        assert!(gesture.has_net_movement(&store));

        store.move_node(a, Position::new(1.0, 1.0)).unwrap();
        assert!(!gesture.has_net_movement(&store));
    }
}
