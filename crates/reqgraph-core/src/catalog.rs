//! Externally owned reference tables (manufacturing processes, design
//! software). The engine holds shared handles and only ever stores ids.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::CatalogId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: CatalogId,
    pub name: String,
}

impl CatalogEntry {
    pub fn new(id: impl Into<CatalogId>, name: impl Into<String>) -> Self {
        CatalogEntry {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A flat, ordered list of entries addressed by opaque id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Catalog { entries }
    }

    /// Look up an entry. Stale or unknown ids resolve to `None`.
    pub fn lookup(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The two catalogs a diagram refers into.
#[derive(Debug, Clone, Default)]
pub struct Catalogs {
    pub processes: Arc<Catalog>,
    pub software: Arc<Catalog>,
}

impl Catalogs {
    pub fn new(processes: Arc<Catalog>, software: Arc<Catalog>) -> Self {
        Catalogs {
            processes,
            software,
        }
    }
}
