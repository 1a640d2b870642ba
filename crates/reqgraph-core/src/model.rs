//! Core data structures for the requirement graph

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DiagramError;

/// Highest id a loaded record may carry. Counters start above every loaded
/// id, so the upper half of the range is kept free for allocation.
pub const MAX_ID: u64 = u64::MAX >> 1;

macro_rules! prefixed_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        #[serde(into = "String", try_from = "String")]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.to_string()
            }
        }

        impl TryFrom<String> for $name {
            type Error = DiagramError;

            fn try_from(raw: String) -> Result<Self, Self::Error> {
                raw.parse()
            }
        }

        impl FromStr for $name {
            type Err = DiagramError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                raw.strip_prefix($prefix)
                    .and_then(|digits| digits.parse::<u64>().ok())
                    .map($name)
                    .ok_or_else(|| {
                        DiagramError::invalid(format!(
                            concat!("malformed ", stringify!($name), " `{}`"),
                            raw
                        ))
                    })
            }
        }
    };
}

prefixed_id!(
    /// Unique node identifier, allocated by the graph store and never reused.
    NodeId,
    "n"
);
prefixed_id!(
    /// Unique edge identifier. Lower ids were created earlier.
    EdgeId,
    "e"
);
prefixed_id!(
    /// Unique interlink entry identifier.
    InterlinkId,
    "i"
);

/// Opaque reference into one of the externally owned catalogs.
pub type CatalogId = String;

/// Discriminates what kind of requirement a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    System,
    Component,
    Manufacturing,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::System => "system",
            NodeKind::Component => "component",
            NodeKind::Manufacturing => "manufacturing",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = DiagramError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "system" => Ok(NodeKind::System),
            "component" => Ok(NodeKind::Component),
            "manufacturing" => Ok(NodeKind::Manufacturing),
            other => Err(DiagramError::invalid(format!("unknown node kind `{other}`"))),
        }
    }
}

/// Logical canvas coordinate. Layout owns what it means on screen.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Position { x, y }
    }
}

/// Block dimensions as last reported by the layout layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// A user-editable named hyperlink shown on a block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Link {
    pub name: String,
    #[serde(default)]
    pub url: String,
}

impl Link {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Link {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// A shared key/value parameter on a component pair. Keys may repeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub key: String,
    pub value: String,
}

impl Param {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Param {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Kind-specific node fields. Only the variant matching the node's kind
/// carries them, so a system node can never hold process assignments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum KindData {
    System {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        software_id: Option<CatalogId>,
    },
    Component {
        /// Mirror of the component neighbours reachable through interlinks.
        #[serde(default)]
        interlink_ids: BTreeSet<NodeId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        software_id: Option<CatalogId>,
    },
    Manufacturing {
        /// Connected component -> process catalog id.
        #[serde(default)]
        process_assignments: BTreeMap<NodeId, CatalogId>,
    },
}

impl KindData {
    /// Empty kind-specific fields for a freshly created node.
    pub fn empty(kind: NodeKind) -> Self {
        match kind {
            NodeKind::System => KindData::System { software_id: None },
            NodeKind::Component => KindData::Component {
                interlink_ids: BTreeSet::new(),
                software_id: None,
            },
            NodeKind::Manufacturing => KindData::Manufacturing {
                process_assignments: BTreeMap::new(),
            },
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            KindData::System { .. } => NodeKind::System,
            KindData::Component { .. } => NodeKind::Component,
            KindData::Manufacturing { .. } => NodeKind::Manufacturing,
        }
    }
}

/// A single requirement block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub label: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(flatten)]
    pub data: KindData,
}

impl GraphNode {
    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }

    pub fn is_component(&self) -> bool {
        matches!(self.data, KindData::Component { .. })
    }

    /// Interlinked component neighbours; empty for other kinds.
    pub fn interlink_ids(&self) -> Option<&BTreeSet<NodeId>> {
        match &self.data {
            KindData::Component { interlink_ids, .. } => Some(interlink_ids),
            _ => None,
        }
    }

    pub fn process_assignments(&self) -> Option<&BTreeMap<NodeId, CatalogId>> {
        match &self.data {
            KindData::Manufacturing {
                process_assignments,
            } => Some(process_assignments),
            _ => None,
        }
    }

    pub fn software_id(&self) -> Option<&str> {
        match &self.data {
            KindData::System { software_id } | KindData::Component { software_id, .. } => {
                software_id.as_deref()
            }
            KindData::Manufacturing { .. } => None,
        }
    }
}

/// An undirected connection. `a`/`b` keep creation order for display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: EdgeId,
    pub a: NodeId,
    pub b: NodeId,
}

impl GraphEdge {
    pub fn pair(&self) -> PairKey {
        PairKey::new(self.a, self.b)
    }

    pub fn touches(&self, node: NodeId) -> bool {
        self.a == node || self.b == node
    }

    /// The endpoint opposite `node`.
    pub fn other(&self, node: NodeId) -> NodeId {
        if self.a == node { self.b } else { self.a }
    }
}

/// Canonical unordered node pair: `lo <= hi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey {
    pub lo: NodeId,
    pub hi: NodeId,
}

impl PairKey {
    pub fn new(a: NodeId, b: NodeId) -> Self {
        if a <= b {
            PairKey { lo: a, hi: b }
        } else {
            PairKey { lo: b, hi: a }
        }
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.lo == node || self.hi == node
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}, {}}}", self.lo, self.hi)
    }
}

/// Shared parameters for a component-to-component connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterlinkEntry {
    pub id: InterlinkId,
    pub a: NodeId,
    pub b: NodeId,
    #[serde(default)]
    pub params: Vec<Param>,
}

impl InterlinkEntry {
    pub fn pair(&self) -> PairKey {
        PairKey::new(self.a, self.b)
    }
}

/// Serializable whole-graph state. Node back-references and the interlink
/// index are rebuilt from `edges` on import; `interlinks` only carries the
/// per-pair params that cannot be derived.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DiagramState {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
    #[serde(default)]
    pub interlinks: Vec<InterlinkEntry>,
}

impl DiagramState {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty() && self.interlinks.is_empty()
    }
}
